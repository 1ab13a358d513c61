mod app;
mod config;
mod state;
mod ui;
mod vpn;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::{Control, Orchestrator};
use config::{FavoriteEdit, SettingKey, SettingValue, Settings};
use state::{Resolver, StatusLabel};
use ui::{ConsoleSink, MenuModel, PanelLabel};
use vpn::{CommandGateway, NordCli, VpnCommand};

#[derive(Parser, Debug)]
#[command(name = "nordtray")]
#[command(author = "Sean Fournier")]
#[command(version = "0.1.0")]
#[command(about = "Status indicator daemon for the NordVPN command-line client")]
struct Args {
    /// Run the status poll loop, reading commands from stdin (default)
    #[arg(short, long)]
    daemon: bool,

    /// Output current VPN status as JSON (for status bars)
    #[arg(short, long)]
    status: bool,

    /// Connect, optionally to a country, city or server
    #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
    connect: Option<String>,

    /// Disconnect from VPN
    #[arg(long)]
    disconnect: bool,

    /// Log in to the VPN account
    #[arg(long)]
    login: bool,

    /// Log out of the VPN account
    #[arg(long)]
    logout: bool,

    /// Copy the VPN client's settings into the settings file
    #[arg(long)]
    sync_settings: bool,

    /// Change a VPN client setting, e.g. --set killswitch on
    #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"])]
    set: Option<Vec<String>>,

    /// Print a stored setting, e.g. --get countries-selected-for-cities
    #[arg(long, value_name = "KEY")]
    get: Option<String>,

    /// Edit favorites, e.g. --favorite add countries Sweden
    #[arg(long, num_args = 3.., value_names = ["ACTION", "KIND", "NAME"])]
    favorite: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut settings = Settings::load().context("Could not load settings")?;
    let gateway = Arc::new(NordCli::new(
        settings.cli_path.clone(),
        settings.command_timeout(),
    ));

    if args.status {
        return print_status(gateway.as_ref(), &settings).await;
    }

    if args.sync_settings {
        let applied = vpn::settings::sync_settings(gateway.as_ref(), &mut settings).await?;
        settings.save()?;
        println!("Synced {} settings", applied);
        return Ok(());
    }

    if let Some(key) = args.get {
        let key = SettingKey::from_name(&key).with_context(|| format!("Unknown setting `{}`", key))?;
        println!("{}", serde_json::to_string(&settings.get_value(key))?);
        return Ok(());
    }

    if let Some(words) = args.favorite {
        let edit: FavoriteEdit = words.join(" ").parse()?;
        if edit.apply(&mut settings.favorites, settings.commonfavorite) {
            settings.save()?;
        }
        println!("{}", settings.favorites.list(edit.category, settings.commonfavorite).join("\n"));
        return Ok(());
    }

    if let Some(pair) = args.set {
        let (key, value) = (&pair[0], &pair[1]);
        let key = SettingKey::from_name(key).with_context(|| format!("Unknown setting `{}`", key))?;
        let value = match value.to_lowercase().as_str() {
            "on" | "true" => SettingValue::Bool(true),
            "off" | "false" => SettingValue::Bool(false),
            _ => vpn::parser::resolve_settings_value(value),
        };
        vpn::settings::apply_setting(gateway.as_ref(), &mut settings, key, value).await?;
        return settings.save();
    }

    if let Some(target) = args.connect {
        let command = VpnCommand::Connect((!target.is_empty()).then_some(target));
        return run_once(gateway.as_ref(), &settings, &command, "Connected").await;
    }

    if args.disconnect {
        return run_once(gateway.as_ref(), &settings, &VpnCommand::Disconnect, "VPN disconnected")
            .await;
    }

    if args.login {
        return run_once(gateway.as_ref(), &settings, &VpnCommand::Login, "Login started").await;
    }

    if args.logout {
        return run_once(gateway.as_ref(), &settings, &VpnCommand::Logout, "Logged out").await;
    }

    if !args.daemon {
        tracing::debug!("No action given, running the daemon");
    }
    run_daemon(gateway, settings).await
}

async fn print_status(gateway: &dyn CommandGateway, settings: &Settings) -> Result<()> {
    let record = app::fetch_status(gateway).await?;
    let display = Resolver::new().resolve(&record, false);
    let label = PanelLabel::render(&display, &record, settings);
    let menu = MenuModel::build(&display, &record, settings);

    let class = display.state().label().to_lowercase().replace(' ', "-");
    let output = serde_json::json!({
        "text": label.text,
        "tooltip": menu.tooltip(),
        "class": class,
        "alt": class,
        "state": display.state(),
        "connected": display.state() == StatusLabel::Connected,
        "logged_in": record.logged_in,
        "country": record.country,
        "city": record.city,
        "server": record.current_server,
        "update": record.update_message,
    });

    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

async fn run_once(
    gateway: &dyn CommandGateway,
    settings: &Settings,
    command: &VpnCommand,
    done: &str,
) -> Result<()> {
    if !gateway.is_running().await {
        anyhow::bail!("The NordVPN daemon is not running");
    }

    let output = gateway.exec_async(command).await?;
    let output = output.trim();
    if !output.is_empty() {
        println!("{}", output);
    }
    if settings.desktop_notifications {
        notify("nordtray", done)?;
    }
    Ok(())
}

async fn run_daemon(gateway: Arc<NordCli>, settings: Settings) -> Result<()> {
    tracing::info!("Starting nordtray daemon");

    let (control_tx, control_rx) = mpsc::channel(16);

    let stdin_tx = control_tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Control>() {
                Ok(control) => {
                    if stdin_tx.send(control).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = control_tx.send(Control::Shutdown).await;
        }
    });

    Orchestrator::new(gateway, settings, Box::new(ConsoleSink::new()))
        .with_settings_path(Settings::config_path()?)
        .run(control_rx)
        .await
}

fn notify(summary: &str, body: &str) -> Result<()> {
    notify_rust::Notification::new()
        .summary(summary)
        .body(body)
        .icon("network-vpn")
        .show()?;
    Ok(())
}
