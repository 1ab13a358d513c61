//! Turns a polled status into the state the UI should show.
//!
//! The client reports a new status several seconds after a user action, so
//! the orchestrator installs an override ("Connecting") right away. The
//! override is shown until real status corroborates it, a target-specific
//! key matches, or it has been shown for [`OVERRIDE_DURATION`] polls.

use super::{DisplayState, StateDescriptor, StatusLabel};
use crate::config::Category;
use crate::vpn::parser::StatusRecord;

/// Polls an override survives without corroboration
pub const OVERRIDE_DURATION: u32 = 10;

/// Cadence used while the status submenu is open
pub const QUICK_REFRESH_SECS: u64 = 1;

/// Domain suffix stripped from hostnames before comparing server ids
pub const SERVER_DOMAIN_SUFFIX: &str = ".nordvpn.com";

/// Target an override is waiting for, e.g. `countries` / `United_States`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideKeys {
    pub scope: Category,
    pub value: String,
}

impl OverrideKeys {
    pub fn new(scope: Category, value: impl Into<String>) -> Self {
        Self {
            scope,
            value: value.into(),
        }
    }

    /// True when the polled status shows we arrived at this target
    pub fn matches(&self, record: &StatusRecord) -> bool {
        match self.scope {
            Category::Countries => self.value.replace('_', " ") == record.country,
            Category::Cities => self.value.replace('_', " ") == record.city,
            Category::Servers => {
                strip_server_suffix(&self.value) == strip_server_suffix(&record.current_server)
            }
        }
    }
}

fn strip_server_suffix(server: &str) -> &str {
    server.strip_suffix(SERVER_DOMAIN_SUFFIX).unwrap_or(server)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideState {
    pub descriptor: StateDescriptor,
    pub keys: Option<OverrideKeys>,
    pub ticks_elapsed: u32,
}

/// Owns the single live override
#[derive(Debug, Default)]
pub struct Resolver {
    active: Option<OverrideState>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an override, replacing any existing one
    pub fn push_override(&mut self, state: StatusLabel, keys: Option<OverrideKeys>) {
        tracing::debug!("Override installed: {} ({:?})", state, keys);
        self.active = Some(OverrideState {
            descriptor: state.descriptor(),
            keys,
            ticks_elapsed: 0,
        });
    }

    pub fn clear_override(&mut self) {
        self.active = None;
    }

    #[cfg(test)]
    pub fn active_override(&self) -> Option<&OverrideState> {
        self.active.as_ref()
    }

    pub fn resolve(&mut self, record: &StatusRecord, quick_refresh: bool) -> DisplayState {
        let mut descriptor = StateDescriptor::lookup(&record.connect_status_label);

        // Login state wins over whatever the connection reports
        if !record.logged_in {
            descriptor = StatusLabel::LoggedOut.descriptor();
        }

        let mut overridden = false;
        if let Some(active) = self.active.as_mut() {
            active.ticks_elapsed += 1;

            let cleared_by_key = active
                .keys
                .as_ref()
                .map(|keys| keys.matches(record))
                .unwrap_or(false);
            let cleared_by_state = descriptor.clears_override_id.is_some()
                && descriptor.clears_override_id == active.descriptor.override_id;
            let expired = active.ticks_elapsed > OVERRIDE_DURATION;

            if expired || cleared_by_state || cleared_by_key {
                tracing::debug!(
                    "Override {} released after {} polls (expired: {}, state: {}, key: {})",
                    active.descriptor.state,
                    active.ticks_elapsed,
                    expired,
                    cleared_by_state,
                    cleared_by_key
                );
                self.active = None;
            } else {
                descriptor = active.descriptor;
                overridden = true;
            }
        }

        if quick_refresh {
            descriptor.refresh_timeout_secs = QUICK_REFRESH_SECS;
        }

        DisplayState {
            descriptor,
            overridden,
        }
    }
}
