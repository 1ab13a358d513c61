use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::Settings;
use crate::state::{DisplayState, StatusLabel};
use crate::vpn::parser::{StatusRecord, NOT_AVAILABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MenuAction {
    Connect,
    Disconnect,
    Login,
    Logout,
}

/// Content of the status menu for one display state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuModel {
    pub display: DisplayState,
    pub header: String,
    pub details: Vec<(String, String)>,
    pub actions: Vec<MenuAction>,
    pub update_notice: Option<String>,
}

impl MenuModel {
    pub fn build(display: &DisplayState, record: &StatusRecord, settings: &Settings) -> Self {
        let state = display.state();
        let d = &display.descriptor;

        let mut details = Vec::new();
        if state == StatusLabel::Connected {
            for (name, value) in [
                ("Country", &record.country),
                ("City", &record.city),
                ("Server", &record.current_server),
                ("IP", &record.server_ip),
                ("Technology", &record.current_tech),
                ("Protocol", &record.current_protocol),
                ("Transfer", &record.transfer),
                ("Uptime", &record.uptime),
            ] {
                if value != NOT_AVAILABLE {
                    details.push((name.to_string(), value.clone()));
                }
            }
        }

        let mut actions = Vec::new();
        if d.can_connect {
            actions.push(MenuAction::Connect);
        }
        if d.can_disconnect {
            actions.push(MenuAction::Disconnect);
        }
        if state == StatusLabel::LoggedOut && settings.showlogin {
            actions.push(MenuAction::Login);
        }
        if record.logged_in && state != StatusLabel::LoggedOut && settings.showlogout {
            actions.push(MenuAction::Logout);
        }

        Self {
            display: *display,
            header: format!("Status: {}", state),
            details,
            actions,
            update_notice: record.update_message.clone(),
        }
    }

    pub fn tooltip(&self) -> String {
        let mut lines = vec![self.header.clone()];
        lines.extend(self.details.iter().map(|(k, v)| format!("{}: {}", k, v)));
        if let Some(notice) = &self.update_notice {
            lines.push(notice.clone());
        }
        lines.join("\n")
    }
}

/// Connection targets offered in the menu, favorites first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MenuLists {
    pub countries: Vec<String>,
    /// country -> cities
    pub cities: BTreeMap<String, Vec<String>>,
    /// country -> servers
    pub servers: BTreeMap<String, Vec<String>>,
}
