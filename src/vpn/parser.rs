//! Parsers for the VPN client's human-oriented output.
//!
//! The client changes wording and ordering between releases and decorates
//! output with ANSI colours and spinner characters, so every parser here
//! works line by line and ignores anything it does not recognise.

use serde::Serialize;

use crate::config::{SettingKey, SettingValue};

/// Placeholder for any status field the client did not report
pub const NOT_AVAILABLE: &str = "N/A";

/// Line the client prints above its list of virtual locations
const VIRTUAL_LOCATION_NOISE: &str = "Virtual location servers";

/// One snapshot of `status`. Missing fields hold [`NOT_AVAILABLE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    /// Word after `Status:`, e.g. "Connected"
    pub connect_status_label: String,
    pub country: String,
    pub city: String,
    pub current_server: String,
    pub server_ip: String,
    pub current_tech: String,
    pub current_protocol: String,
    pub transfer: String,
    pub uptime: String,
    pub update_message: Option<String>,
    pub logged_in: bool,
}

impl Default for StatusRecord {
    fn default() -> Self {
        let na = || NOT_AVAILABLE.to_string();
        Self {
            connect_status_label: na(),
            country: na(),
            city: na(),
            current_server: na(),
            server_ip: na(),
            current_tech: na(),
            current_protocol: na(),
            transfer: na(),
            uptime: na(),
            update_message: None,
            logged_in: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountInfo {
    pub logged_in: bool,
    pub email: Option<String>,
    pub expires: Option<String>,
}

/// Strip ANSI escape sequences (`ESC [ ... <letter>`)
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_escape = false;

    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
        } else if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Drop colours, carriage-return spinner frames and leading junk
fn clean_line(line: &str) -> String {
    let line = strip_ansi(line);
    let last_frame = line
        .rsplit('\r')
        .find(|frame| !frame.trim().is_empty())
        .unwrap_or("");
    last_frame
        .trim_start_matches(|c: char| !is_word_char(c))
        .trim_end()
        .to_string()
}

/// Parse `status` output into a record
pub fn parse_status(raw: &str) -> StatusRecord {
    let mut record = StatusRecord::default();

    for line in raw.lines() {
        let line = clean_line(line);
        if line.is_empty() {
            continue;
        }

        if line.to_lowercase().contains("new version") {
            record.update_message = Some(line);
            continue;
        }

        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let slot = match label.trim().to_lowercase().as_str() {
            "status" => {
                if let Some(word) = value.split_whitespace().next() {
                    record.connect_status_label = word.to_string();
                }
                continue;
            }
            "country" => &mut record.country,
            "city" => &mut record.city,
            "current server" | "hostname" => &mut record.current_server,
            "server ip" | "ip" => &mut record.server_ip,
            "current technology" => &mut record.current_tech,
            "current protocol" => &mut record.current_protocol,
            "transfer" => &mut record.transfer,
            "uptime" => &mut record.uptime,
            _ => continue,
        };
        *slot = value.to_string();
    }

    record
}

/// Parse `account` output. Empty output (daemon down) counts as logged in,
/// so the caller shows the Error state rather than LOGGED OUT.
pub fn parse_account(raw: &str) -> AccountInfo {
    let mut info = AccountInfo {
        logged_in: !raw.to_lowercase().contains("not logged in"),
        ..Default::default()
    };

    for line in raw.lines() {
        let line = clean_line(line);
        if let Some((label, value)) = line.split_once(':') {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match label.trim().to_lowercase().as_str() {
                "email address" | "email" => info.email = Some(value.to_string()),
                "vpn service" | "account expiration" => info.expires = Some(value.to_string()),
                _ => {}
            }
        }
    }

    info
}

/// A list entry is a word optionally followed by words, spaces, apostrophes or hyphens
fn is_list_entry(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if is_word_char(first) => {}
        _ => return false,
    }
    chars.all(|c| is_word_char(c) || c == ' ' || c == '\'' || c == '-')
}

/// Parse `countries` / `cities` output into a sorted list of names.
///
/// Older clients print several names per line separated by commas or tabs;
/// those are split before matching. Underscores are kept.
pub fn parse_city_country_list(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = raw
        .lines()
        .flat_map(|line| {
            strip_ansi(line)
                .split([',', '\t'])
                .map(clean_line)
                .collect::<Vec<_>>()
        })
        .filter(|name| is_list_entry(name) && name != VIRTUAL_LOCATION_NOISE)
        .collect();

    names.sort();
    names.dedup();
    names
}

/// Map a `settings` label to the store key it feeds
pub fn resolve_settings_key(label: &str) -> Option<SettingKey> {
    let label = label.trim().to_lowercase();
    if label.contains("tech") {
        return Some(SettingKey::Technology);
    }
    match label.as_str() {
        "firewall" => Some(SettingKey::Firewall),
        "protocol" => Some(SettingKey::Protocol),
        "kill switch" => Some(SettingKey::Killswitch),
        "analytics" => Some(SettingKey::Analytics),
        "threat protection lite" | "cybersec" => Some(SettingKey::Cybersec),
        "obfuscate" => Some(SettingKey::Obfuscate),
        "notify" => Some(SettingKey::Notify),
        "auto-connect" => Some(SettingKey::Autoconnect),
        "ipv6" => Some(SettingKey::Ipv6),
        _ => None,
    }
}

/// `enabled` / `disabled` become booleans, anything else stays text
pub fn resolve_settings_value(text: &str) -> SettingValue {
    let text = text.trim();
    if text.eq_ignore_ascii_case("enabled") {
        SettingValue::Bool(true)
    } else if text.eq_ignore_ascii_case("disabled") {
        SettingValue::Bool(false)
    } else {
        SettingValue::Text(text.to_string())
    }
}

/// Parse `settings` output, skipping labels the indicator does not track
pub fn parse_settings(raw: &str) -> Vec<(SettingKey, SettingValue)> {
    raw.lines()
        .filter_map(|line| {
            let line = clean_line(line);
            let (label, value) = line.split_once(':')?;
            let key = resolve_settings_key(label)?;
            Some((key, resolve_settings_value(value)))
        })
        .collect()
}
