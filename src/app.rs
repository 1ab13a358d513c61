//! Poll loop that keeps the indicator in sync with the VPN client.
//!
//! One task owns the [`Orchestrator`]: status polls, user actions and
//! command completions are all handled in turn, so the override and the
//! poll timer never need locking.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::config::{Category, FavoriteEdit, Settings};
use crate::state::{DisplayState, OverrideKeys, Resolver, StatusLabel};
use crate::ui::{MenuLists, MenuModel, PanelLabel, UiSink};
use crate::vpn::parser::{self, StatusRecord};
use crate::vpn::servers::{NoServers, ServerDirectory};
use crate::vpn::{CommandGateway, GatewayError, VpnCommand};

/// Fixed cadence while the extra-large button shows uptime and transfer
pub const EXTRA_LARGE_REFRESH_SECS: u64 = 3;

/// Minimum spacing between two connect attempts
pub const CONNECT_THROTTLE: Duration = Duration::from_secs(9);

/// Minimum spacing between two country/city/server list rebuilds
pub const LIST_REBUILD_INTERVAL: Duration = Duration::from_secs(30);

/// Longest time polling stays suspended behind a connect or disconnect
pub const SUSPEND_GUARD: Duration = Duration::from_secs(30);

/// Consecutive failed polls before the panel switches to Error
const FAILURES_BEFORE_ERROR: u32 = 2;

/// Requests from the UI side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    MenuOpened,
    MenuClosed,
    Refresh,
    Connect(Option<OverrideKeys>),
    Disconnect,
    Login,
    Logout,
    Favorite(FavoriteEdit),
    Shutdown,
}

impl FromStr for Control {
    type Err = anyhow::Error;

    /// Parse a console line such as `connect cities New York`.
    ///
    /// Without a leading target kind, `connect` words name a country.
    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            anyhow::bail!("empty command");
        };

        let control = match verb.to_lowercase().as_str() {
            "open" => Control::MenuOpened,
            "close" => Control::MenuClosed,
            "refresh" => Control::Refresh,
            "connect" => {
                let rest: Vec<&str> = words.collect();
                let target = match rest.as_slice() {
                    [] => None,
                    [first, value @ ..] if !value.is_empty() => match Category::from_name(first) {
                        Some(scope) => Some(OverrideKeys::new(scope, value.join("_"))),
                        None => Some(OverrideKeys::new(Category::Countries, rest.join("_"))),
                    },
                    names => Some(OverrideKeys::new(Category::Countries, names.join("_"))),
                };
                Control::Connect(target)
            }
            "disconnect" => Control::Disconnect,
            "login" => Control::Login,
            "logout" => Control::Logout,
            "favorite" | "fav" => {
                let rest: Vec<&str> = words.collect();
                Control::Favorite(rest.join(" ").parse()?)
            }
            "quit" | "exit" => Control::Shutdown,
            other => anyhow::bail!("unknown command `{}`", other),
        };
        Ok(control)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Connect,
    Disconnect,
    Login,
    Logout,
}

/// Completion of a command issued in the background
#[derive(Debug)]
struct Finished {
    action: Action,
    result: Result<String, GatewayError>,
}

/// Single pending one-shot deadline for the next poll
#[derive(Debug, Default)]
pub struct PollTimer {
    deadline: Option<Instant>,
}

impl PollTimer {
    /// Replace any pending deadline
    pub fn schedule(&mut self, after: Duration) {
        self.deadline = Some(Instant::now() + after);
    }

    pub fn schedule_at(&mut self, at: Instant) {
        self.deadline = Some(at);
    }

    /// Idempotent
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Poll `status` and `account` once
pub async fn fetch_status(gateway: &dyn CommandGateway) -> Result<StatusRecord, GatewayError> {
    let status = gateway.exec_if_running(&VpnCommand::Status).await?;
    let account = gateway.exec_if_running(&VpnCommand::Account).await?;

    let mut record = parser::parse_status(&status);
    record.logged_in = parser::parse_account(&account).logged_in;
    Ok(record)
}

/// Countries, the selected countries' cities and servers, favorites first
async fn fetch_lists(
    gateway: &dyn CommandGateway,
    directory: &dyn ServerDirectory,
    settings: &Settings,
) -> Result<MenuLists> {
    let favorites = &settings.favorites;
    let common = settings.commonfavorite;

    let raw = gateway.exec_if_running(&VpnCommand::Countries).await?;
    let countries = favorites.order(
        Category::Countries,
        common,
        parser::parse_city_country_list(&raw),
    );

    let mut cities = BTreeMap::new();
    for country in &settings.countries_selected_for_cities {
        match gateway
            .exec_if_running(&VpnCommand::Cities(country.clone()))
            .await
        {
            Ok(raw) => {
                let mut list = favorites.order(
                    Category::Cities,
                    common,
                    parser::parse_city_country_list(&raw),
                );
                list.truncate(settings.number_cities_per_countries as usize);
                cities.insert(country.clone(), list);
            }
            Err(e) => tracing::warn!("Could not list cities for {}: {}", country, e),
        }
    }

    let mut servers = BTreeMap::new();
    let limit = settings.number_servers_per_countries as usize;
    for country in &settings.countries_selected_for_servers {
        match directory.servers(country, limit).await {
            Ok(mut list) => {
                list.truncate(limit);
                servers.insert(
                    country.clone(),
                    favorites.order(Category::Servers, common, list),
                );
            }
            Err(e) => tracing::warn!("Could not list servers for {}: {}", country, e),
        }
    }

    Ok(MenuLists {
        countries,
        cities,
        servers,
    })
}

pub struct Orchestrator {
    gateway: Arc<dyn CommandGateway>,
    servers: Arc<dyn ServerDirectory>,
    settings: Settings,
    sink: Box<dyn UiSink>,
    settings_path: Option<PathBuf>,

    resolver: Resolver,
    timer: PollTimer,
    running: bool,
    quick_refresh: bool,
    display: Option<DisplayState>,
    failures: u32,

    // Polling pauses while connect/disconnect runs, up to SUSPEND_GUARD
    suspension: Option<(Action, Instant)>,
    last_connect: Option<Instant>,
    last_list_rebuild: Option<Instant>,

    finished_tx: mpsc::UnboundedSender<Finished>,
    finished_rx: mpsc::UnboundedReceiver<Finished>,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn CommandGateway>, settings: Settings, sink: Box<dyn UiSink>) -> Self {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            servers: Arc::new(NoServers),
            settings,
            sink,
            settings_path: None,
            resolver: Resolver::new(),
            timer: PollTimer::default(),
            running: false,
            quick_refresh: false,
            display: None,
            failures: 0,
            suspension: None,
            last_connect: None,
            last_list_rebuild: None,
            finished_tx,
            finished_rx,
        }
    }

    /// Persist favorite edits to `path`
    pub fn with_settings_path(mut self, path: PathBuf) -> Self {
        self.settings_path = Some(path);
        self
    }

    #[cfg(test)]
    fn with_servers(mut self, servers: Arc<dyn ServerDirectory>) -> Self {
        self.servers = servers;
        self
    }

    #[cfg(test)]
    fn is_suspended(&self) -> bool {
        self.suspension.is_some()
    }

    pub async fn start(&mut self) {
        tracing::info!("Starting status polling");
        self.running = true;
        self.refresh().await;
    }

    pub fn stop(&mut self) {
        tracing::info!("Stopping status polling");
        self.running = false;
        self.timer.cancel();
    }

    /// Drive the orchestrator until `Shutdown` arrives or the sender is dropped
    pub async fn run(mut self, mut control: mpsc::Receiver<Control>) -> Result<()> {
        self.start().await;

        loop {
            let deadline = self.timer.deadline();
            tokio::select! {
                _ = wait_for(deadline) => {
                    self.timer.cancel();
                    self.refresh().await;
                    self.ensure_scheduled();
                }
                Some(finished) = self.finished_rx.recv() => {
                    self.command_finished(finished).await;
                }
                message = control.recv() => match message {
                    Some(Control::Shutdown) | None => break,
                    Some(message) => self.handle_control(message).await,
                },
            }
        }

        self.stop();
        Ok(())
    }

    async fn handle_control(&mut self, control: Control) {
        match control {
            Control::MenuOpened => {
                self.set_quick_refresh(true);
                self.refresh().await;
            }
            Control::MenuClosed => self.set_quick_refresh(false),
            Control::Refresh => self.refresh().await,
            Control::Connect(target) => {
                self.connect(target).await;
            }
            Control::Disconnect => self.disconnect().await,
            Control::Login => self.login().await,
            Control::Logout => self.logout().await,
            Control::Favorite(edit) => self.edit_favorites(&edit).await,
            Control::Shutdown => {}
        }
    }

    /// Poll, resolve, publish and schedule the next poll.
    ///
    /// No-op while suspended. Failures are logged and the next poll is
    /// scheduled at the Error cadence; nothing propagates.
    pub async fn refresh(&mut self) {
        if let Some((_, until)) = self.suspension {
            if Instant::now() < until {
                tracing::debug!("Refresh skipped while a command is in flight");
                return;
            }
            tracing::warn!(
                "Command still running after {}s, resuming polling",
                SUSPEND_GUARD.as_secs()
            );
            self.suspension = None;
        }

        self.timer.cancel();

        let next = match self.poll().await {
            Ok(shown) => {
                self.failures = 0;
                self.cadence(&shown)
            }
            Err(e) => {
                self.failures += 1;
                tracing::error!("Status refresh failed ({} in a row): {}", self.failures, e);
                if self.failures >= FAILURES_BEFORE_ERROR {
                    let shown = DisplayState {
                        descriptor: StatusLabel::Error.descriptor(),
                        overridden: false,
                    };
                    self.publish(&shown, &StatusRecord::default());
                }
                StatusLabel::Error.descriptor().refresh_timeout_secs
            }
        };

        if self.running {
            self.timer.schedule(Duration::from_secs(next));
        }
    }

    async fn poll(&mut self) -> Result<DisplayState, GatewayError> {
        let record = fetch_status(self.gateway.as_ref()).await?;
        let shown = self.resolver.resolve(&record, self.quick_refresh);
        let (state, secs) = (shown.state(), shown.refresh_timeout_secs());
        tracing::debug!(
            "Polled {} -> {} (next in {}s)",
            record.connect_status_label,
            state,
            secs
        );

        self.publish(&shown, &record);
        if shown.descriptor.show_lists {
            self.rebuild_lists_if_due().await;
        }
        Ok(shown)
    }

    fn publish(&mut self, shown: &DisplayState, record: &StatusRecord) {
        let state = shown.state();
        let previous = self.display.map(|d| d.state());
        if previous != Some(state) {
            tracing::info!("VPN state: {}", state);
            if previous.is_some() {
                self.notify_transition(state, record);
            }
        }

        self.sink
            .update_menu(&MenuModel::build(shown, record, &self.settings));
        self.sink
            .update_panel_label(&PanelLabel::render(shown, record, &self.settings));
        self.display = Some(*shown);
    }

    fn notify_transition(&self, state: StatusLabel, record: &StatusRecord) {
        if !self.settings.desktop_notifications {
            return;
        }
        let body = match state {
            StatusLabel::Connected => format!("Connected to {}", record.country),
            StatusLabel::Disconnected => "VPN disconnected".to_string(),
            _ => return,
        };
        if let Err(e) = notify_rust::Notification::new()
            .summary("NordVPN")
            .body(&body)
            .icon("network-vpn")
            .show()
        {
            tracing::warn!("Could not show notification: {}", e);
        }
    }

    /// The extra-large button replaces the state's cadence with a fixed one
    fn cadence(&self, shown: &DisplayState) -> u64 {
        if self.settings.extra_large_button {
            EXTRA_LARGE_REFRESH_SECS
        } else {
            shown.refresh_timeout_secs()
        }
    }

    /// Keep the loop alive when a tick landed inside a suspension
    fn ensure_scheduled(&mut self) {
        if !self.running || self.timer.is_pending() {
            return;
        }
        if let Some((_, until)) = self.suspension {
            self.timer.schedule_at(until);
        }
    }

    async fn rebuild_lists_if_due(&mut self) {
        if let Some(last) = self.last_list_rebuild {
            if last.elapsed() < LIST_REBUILD_INTERVAL {
                return;
            }
        }
        self.last_list_rebuild = Some(Instant::now());

        match fetch_lists(self.gateway.as_ref(), self.servers.as_ref(), &self.settings).await {
            Ok(lists) => self.sink.update_lists(&lists),
            Err(e) => tracing::warn!("Could not rebuild lists: {}", e),
        }
    }

    /// Takes effect on the next refresh
    pub fn set_quick_refresh(&mut self, on: bool) {
        tracing::debug!("Quick refresh {}", if on { "on" } else { "off" });
        self.quick_refresh = on;
    }

    /// Show `state` until real status corroborates it, and refresh right away
    pub async fn push_override(&mut self, state: StatusLabel, keys: Option<OverrideKeys>) {
        self.resolver.push_override(state, keys);
        self.refresh().await;
    }

    /// Connect to `target` (or the client's pick). Returns false when throttled.
    pub async fn connect(&mut self, target: Option<OverrideKeys>) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_connect {
            if now.duration_since(last) < CONNECT_THROTTLE {
                tracing::debug!(
                    "Connect ignored, previous attempt {}ms ago",
                    now.duration_since(last).as_millis()
                );
                return false;
            }
        }
        self.last_connect = Some(now);

        let command = VpnCommand::Connect(target.as_ref().map(|t| t.value.clone()));
        self.push_override(StatusLabel::Connecting, target).await;
        self.suspend(Action::Connect);
        self.issue(Action::Connect, command);
        true
    }

    pub async fn disconnect(&mut self) {
        self.push_override(StatusLabel::Disconnecting, None).await;
        self.suspend(Action::Disconnect);
        self.issue(Action::Disconnect, VpnCommand::Disconnect);
    }

    pub async fn login(&mut self) {
        self.push_override(StatusLabel::LoggingIn, None).await;
        self.issue(Action::Login, VpnCommand::Login);
    }

    pub async fn logout(&mut self) {
        self.push_override(StatusLabel::LoggingOut, None).await;
        self.issue(Action::Logout, VpnCommand::Logout);
    }

    /// Apply `edit`, save the settings and rebuild the lists on the next poll
    pub async fn edit_favorites(&mut self, edit: &FavoriteEdit) {
        if !edit.apply(&mut self.settings.favorites, self.settings.commonfavorite) {
            tracing::debug!("Favorites unchanged by {:?}", edit);
            return;
        }
        tracing::info!(
            "Favorite {} {} {}",
            if edit.add { "added to" } else { "removed from" },
            edit.category,
            edit.id
        );

        if let Some(path) = &self.settings_path {
            if let Err(e) = self.settings.save_to(path) {
                tracing::warn!("Could not save favorites: {}", e);
            }
        }
        self.last_list_rebuild = None;
        self.refresh().await;
    }

    fn suspend(&mut self, action: Action) {
        let until = Instant::now() + SUSPEND_GUARD;
        self.suspension = Some((action, until));
        if self.running {
            self.timer.schedule_at(until);
        }
    }

    fn issue(&self, action: Action, command: VpnCommand) {
        tracing::info!("Running `{}`", command);
        let gateway = Arc::clone(&self.gateway);
        let finished_tx = self.finished_tx.clone();

        tokio::spawn(async move {
            let result = gateway.exec_if_running(&command).await;
            // The receiver lives as long as the orchestrator
            let _ = finished_tx.send(Finished { action, result });
        });
    }

    async fn command_finished(&mut self, finished: Finished) {
        // Only the command that suspended polling may resume it
        if matches!(self.suspension, Some((action, _)) if action == finished.action) {
            self.suspension = None;
        }

        match finished.result {
            Ok(output) => {
                let output = output.trim();
                if !output.is_empty() {
                    tracing::info!("{:?}: {}", finished.action, output);
                }
            }
            Err(e) => {
                tracing::warn!("{:?} failed: {}", finished.action, e);
                self.resolver.clear_override();
            }
        }

        self.refresh().await;
    }
}
