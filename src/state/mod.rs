//! Connection states the indicator can display.
//!
//! The table lives in [`StatusLabel::descriptor`]: one exhaustive match,
//! so a new label cannot be added without deciding its affordances,
//! cadence and override behaviour.

pub mod resolver;

use serde::Serialize;
use std::fmt;

pub use resolver::{OverrideKeys, Resolver};

/// Canonical status labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusLabel {
    Connected,
    Connecting,
    Disconnected,
    Disconnecting,
    Reconnecting,
    Restarting,
    Error,
    #[serde(rename = "LOGGED OUT")]
    LoggedOut,
    #[serde(rename = "Logging-in")]
    LoggingIn,
    #[serde(rename = "Logging-out")]
    LoggingOut,
}

/// Override family a transitional state belongs to.
///
/// A naturally reached state clears an active override when its
/// `clears_override_id` names the override's family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OverrideFamily {
    Connect = 1,
    Disconnect = 2,
    Logout = 3,
    Login = 4,
}

/// Static behaviour of one connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateDescriptor {
    pub state: StatusLabel,
    pub can_connect: bool,
    pub can_disconnect: bool,
    pub show_lists: bool,
    pub refresh_timeout_secs: u64,
    pub override_id: Option<OverrideFamily>,
    pub clears_override_id: Option<OverrideFamily>,
}

impl StatusLabel {
    pub const ALL: [StatusLabel; 10] = [
        StatusLabel::Connected,
        StatusLabel::Connecting,
        StatusLabel::Disconnected,
        StatusLabel::Disconnecting,
        StatusLabel::Reconnecting,
        StatusLabel::Restarting,
        StatusLabel::Error,
        StatusLabel::LoggedOut,
        StatusLabel::LoggingIn,
        StatusLabel::LoggingOut,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StatusLabel::Connected => "Connected",
            StatusLabel::Connecting => "Connecting",
            StatusLabel::Disconnected => "Disconnected",
            StatusLabel::Disconnecting => "Disconnecting",
            StatusLabel::Reconnecting => "Reconnecting",
            StatusLabel::Restarting => "Restarting",
            StatusLabel::Error => "Error",
            StatusLabel::LoggedOut => "LOGGED OUT",
            StatusLabel::LoggingIn => "Logging-in",
            StatusLabel::LoggingOut => "Logging-out",
        }
    }

    /// Case-insensitive lookup of a canonical label
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(label))
    }

    pub fn descriptor(self) -> StateDescriptor {
        use OverrideFamily::*;

        let d = |can_connect, can_disconnect, show_lists, refresh, override_id, clears| {
            StateDescriptor {
                state: self,
                can_connect,
                can_disconnect,
                show_lists,
                refresh_timeout_secs: refresh,
                override_id,
                clears_override_id: clears,
            }
        };

        match self {
            StatusLabel::Connected => d(false, true, true, 30, None, Some(Connect)),
            StatusLabel::Connecting => d(false, true, false, 1, Some(Connect), None),
            StatusLabel::Disconnected => d(true, false, true, 30, None, Some(Disconnect)),
            StatusLabel::Disconnecting => d(false, false, false, 1, Some(Disconnect), None),
            StatusLabel::Reconnecting => d(false, true, false, 2, None, None),
            StatusLabel::Restarting => d(false, true, false, 2, None, None),
            StatusLabel::Error => d(false, false, false, 5, None, None),
            StatusLabel::LoggedOut => d(false, false, false, 30, None, Some(Logout)),
            StatusLabel::LoggingIn => d(false, false, false, 1, Some(Login), None),
            StatusLabel::LoggingOut => d(false, false, false, 1, Some(Logout), None),
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl StateDescriptor {
    /// Descriptor for a raw label, falling back to Error for anything unknown
    pub fn lookup(label: &str) -> Self {
        StatusLabel::from_label(label)
            .unwrap_or(StatusLabel::Error)
            .descriptor()
    }
}

/// What the UI shows after one resolve: a descriptor copy carrying the
/// effective refresh cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    #[serde(flatten)]
    pub descriptor: StateDescriptor,
    pub overridden: bool,
}

impl DisplayState {
    pub fn state(&self) -> StatusLabel {
        self.descriptor.state
    }

    pub fn refresh_timeout_secs(&self) -> u64 {
        self.descriptor.refresh_timeout_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip() {
        for state in StatusLabel::ALL {
            assert_eq!(StatusLabel::from_label(state.label()), Some(state));
            assert_eq!(state.descriptor().state, state);
        }
        assert_eq!(StatusLabel::from_label("connected"), Some(StatusLabel::Connected));
        assert_eq!(StatusLabel::from_label("Logged out"), Some(StatusLabel::LoggedOut));
    }

    #[test]
    fn test_unknown_label_is_error() {
        assert_eq!(StateDescriptor::lookup("N/A").state, StatusLabel::Error);
        assert_eq!(StateDescriptor::lookup("").state, StatusLabel::Error);
    }

    #[test]
    fn test_clearing_families() {
        let connected = StatusLabel::Connected.descriptor();
        let connecting = StatusLabel::Connecting.descriptor();
        assert_eq!(connected.clears_override_id, connecting.override_id);

        let disconnected = StatusLabel::Disconnected.descriptor();
        let disconnecting = StatusLabel::Disconnecting.descriptor();
        assert_eq!(disconnected.clears_override_id, disconnecting.override_id);

        let logged_out = StatusLabel::LoggedOut.descriptor();
        let logging_out = StatusLabel::LoggingOut.descriptor();
        assert_eq!(logged_out.clears_override_id, logging_out.override_id);
        assert_eq!(logged_out.clears_override_id, Some(OverrideFamily::Logout));
    }

    #[test]
    fn test_affordances() {
        let connected = StatusLabel::Connected.descriptor();
        assert!(!connected.can_connect && connected.can_disconnect && connected.show_lists);

        let disconnected = StatusLabel::Disconnected.descriptor();
        assert!(disconnected.can_connect && !disconnected.can_disconnect);

        let error = StatusLabel::Error.descriptor();
        assert!(!error.can_connect && !error.can_disconnect && !error.show_lists);
    }
}
