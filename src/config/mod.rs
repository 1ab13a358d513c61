pub mod favorites;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use favorites::{Category, FavoriteEdit, Favorites};

use crate::state::StatusLabel;

/// Every key the indicator reads from or writes to its settings store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    Protocol,
    Technology,
    Firewall,
    Analytics,
    Autoconnect,
    Cybersec,
    Killswitch,
    Obfuscate,
    Ipv6,
    Notify,
    NumberCitiesPerCountries,
    CountriesSelectedForCities,
    NumberServersPerCountries,
    CountriesSelectedForServers,
    PanelPosition,
    PanelStyles,
    CommonPanelStyle,
    ExtraLargeButton,
    Commonfavorite,
    Showlogin,
    Showlogout,
}

impl SettingKey {
    pub const ALL: [SettingKey; 21] = [
        SettingKey::Protocol,
        SettingKey::Technology,
        SettingKey::Firewall,
        SettingKey::Analytics,
        SettingKey::Autoconnect,
        SettingKey::Cybersec,
        SettingKey::Killswitch,
        SettingKey::Obfuscate,
        SettingKey::Ipv6,
        SettingKey::Notify,
        SettingKey::NumberCitiesPerCountries,
        SettingKey::CountriesSelectedForCities,
        SettingKey::NumberServersPerCountries,
        SettingKey::CountriesSelectedForServers,
        SettingKey::PanelPosition,
        SettingKey::PanelStyles,
        SettingKey::CommonPanelStyle,
        SettingKey::ExtraLargeButton,
        SettingKey::Commonfavorite,
        SettingKey::Showlogin,
        SettingKey::Showlogout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Protocol => "protocol",
            SettingKey::Technology => "technology",
            SettingKey::Firewall => "firewall",
            SettingKey::Analytics => "analytics",
            SettingKey::Autoconnect => "autoconnect",
            SettingKey::Cybersec => "cybersec",
            SettingKey::Killswitch => "killswitch",
            SettingKey::Obfuscate => "obfuscate",
            SettingKey::Ipv6 => "ipv6",
            SettingKey::Notify => "notify",
            SettingKey::NumberCitiesPerCountries => "number-cities-per-countries",
            SettingKey::CountriesSelectedForCities => "countries-selected-for-cities",
            SettingKey::NumberServersPerCountries => "number-servers-per-countries",
            SettingKey::CountriesSelectedForServers => "countries-selected-for-servers",
            SettingKey::PanelPosition => "panel-position",
            SettingKey::PanelStyles => "panel-styles",
            SettingKey::CommonPanelStyle => "common-panel-style",
            SettingKey::ExtraLargeButton => "extra-large-button",
            SettingKey::Commonfavorite => "commonfavorite",
            SettingKey::Showlogin => "showlogin",
            SettingKey::Showlogout => "showlogout",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Name the VPN client uses for this key in `set`, if it owns the setting
    pub fn cli_name(&self) -> Option<&'static str> {
        match self {
            SettingKey::Protocol => Some("protocol"),
            SettingKey::Technology => Some("technology"),
            SettingKey::Firewall => Some("firewall"),
            SettingKey::Analytics => Some("analytics"),
            SettingKey::Autoconnect => Some("autoconnect"),
            SettingKey::Cybersec => Some("threatprotectionlite"),
            SettingKey::Killswitch => Some("killswitch"),
            SettingKey::Obfuscate => Some("obfuscate"),
            SettingKey::Ipv6 => Some("ipv6"),
            SettingKey::Notify => Some("notify"),
            _ => None,
        }
    }
}

/// Typed value read from the settings store or the client's `settings` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
    Count(u32),
    List(Vec<String>),
    Styles(Vec<PanelStyle>),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("setting `{key}` does not hold a {expected} value")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },

    #[error("invalid value `{value}` for setting `{key}`")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelPosition {
    Left,
    Center,
    #[default]
    Right,
}

impl PanelPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelPosition::Left => "left",
            PanelPosition::Center => "center",
            PanelPosition::Right => "right",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" => Some(PanelPosition::Left),
            "center" => Some(PanelPosition::Center),
            "right" => Some(PanelPosition::Right),
            _ => None,
        }
    }
}

/// Panel appearance for one connection state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelStyle {
    pub state: String, // canonical status label, e.g. "Connected"
    pub text: String,  // template, e.g. "{country}"
    #[serde(default)]
    pub style: String,
}

impl PanelStyle {
    fn new(state: StatusLabel, text: &str, style: &str) -> Self {
        Self {
            state: state.label().to_string(),
            text: text.to_string(),
            style: style.to_string(),
        }
    }
}

fn default_panel_styles() -> Vec<PanelStyle> {
    vec![
        PanelStyle::new(StatusLabel::Connected, "{country}", "color: #7ecf6c"),
        PanelStyle::new(StatusLabel::Connecting, "Connecting…", "color: #e5c07b"),
        PanelStyle::new(StatusLabel::Disconnected, "VPN off", "color: #e06c75"),
        PanelStyle::new(StatusLabel::Disconnecting, "Disconnecting…", "color: #e5c07b"),
        PanelStyle::new(StatusLabel::Reconnecting, "Reconnecting…", "color: #e5c07b"),
        PanelStyle::new(StatusLabel::Error, "VPN error", "color: #e06c75"),
        PanelStyle::new(StatusLabel::LoggedOut, "Logged out", "color: #abb2bf"),
    ]
}

/// Persistent indicator settings, one typed field per store key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    // Mirrored from the VPN client
    pub protocol: String,
    pub technology: String,
    pub firewall: bool,
    pub analytics: bool,
    pub autoconnect: bool,
    pub cybersec: bool,
    pub killswitch: bool,
    pub obfuscate: bool,
    pub ipv6: bool,
    pub notify: bool,

    // Lists
    pub number_cities_per_countries: u32,
    pub countries_selected_for_cities: Vec<String>,
    pub number_servers_per_countries: u32,
    pub countries_selected_for_servers: Vec<String>,

    // Panel
    pub panel_position: PanelPosition,
    pub panel_styles: Vec<PanelStyle>,
    pub common_panel_style: bool,
    pub extra_large_button: bool,

    // Menu
    pub commonfavorite: bool,
    pub showlogin: bool,
    pub showlogout: bool,
    pub favorites: Favorites,

    // Daemon
    pub cli_path: String,
    pub command_timeout_secs: u64,
    pub desktop_notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            protocol: "UDP".to_string(),
            technology: "NORDLYNX".to_string(),
            firewall: true,
            analytics: false,
            autoconnect: false,
            cybersec: false,
            killswitch: false,
            obfuscate: false,
            ipv6: false,
            notify: false,
            number_cities_per_countries: 5,
            countries_selected_for_cities: Vec::new(),
            number_servers_per_countries: 5,
            countries_selected_for_servers: Vec::new(),
            panel_position: PanelPosition::Right,
            panel_styles: default_panel_styles(),
            common_panel_style: false,
            extra_large_button: false,
            commonfavorite: false,
            showlogin: true,
            showlogout: true,
            favorites: Favorites::default(),
            cli_path: crate::vpn::DEFAULT_CLI.to_string(),
            command_timeout_secs: crate::vpn::DEFAULT_COMMAND_TIMEOUT.as_secs(),
            desktop_notifications: false,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("nordtray");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir.join("settings.toml"))
    }

    /// Load settings from the default location, writing defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load and validate settings. A malformed file is an error, not a reset.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let settings = Settings::default();
            if let Err(e) = settings.save_to(path) {
                tracing::warn!("Could not write default settings: {}", e);
            }
            return Ok(settings);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Reject values that would only surface later as broken output
    pub fn validate(&self) -> Result<()> {
        if self.cli_path.trim().is_empty() {
            anyhow::bail!("cli-path must not be empty");
        }
        if self.command_timeout_secs == 0 {
            anyhow::bail!("command-timeout-secs must be at least 1");
        }
        for style in &self.panel_styles {
            if StatusLabel::from_label(&style.state).is_none() {
                anyhow::bail!("panel-styles: unknown state `{}`", style.state);
            }
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.command_timeout_secs)
    }

    pub fn get_string(&self, key: SettingKey) -> Option<String> {
        match key {
            SettingKey::Protocol => Some(self.protocol.clone()),
            SettingKey::Technology => Some(self.technology.clone()),
            SettingKey::PanelPosition => Some(self.panel_position.as_str().to_string()),
            _ => None,
        }
    }

    pub fn get_boolean(&self, key: SettingKey) -> Option<bool> {
        let value = match key {
            SettingKey::Firewall => self.firewall,
            SettingKey::Analytics => self.analytics,
            SettingKey::Autoconnect => self.autoconnect,
            SettingKey::Cybersec => self.cybersec,
            SettingKey::Killswitch => self.killswitch,
            SettingKey::Obfuscate => self.obfuscate,
            SettingKey::Ipv6 => self.ipv6,
            SettingKey::Notify => self.notify,
            SettingKey::CommonPanelStyle => self.common_panel_style,
            SettingKey::ExtraLargeButton => self.extra_large_button,
            SettingKey::Commonfavorite => self.commonfavorite,
            SettingKey::Showlogin => self.showlogin,
            SettingKey::Showlogout => self.showlogout,
            _ => return None,
        };
        Some(value)
    }

    pub fn get_value(&self, key: SettingKey) -> SettingValue {
        if let Some(b) = self.get_boolean(key) {
            return SettingValue::Bool(b);
        }
        if let Some(s) = self.get_string(key) {
            return SettingValue::Text(s);
        }
        match key {
            SettingKey::NumberCitiesPerCountries => {
                SettingValue::Count(self.number_cities_per_countries)
            }
            SettingKey::NumberServersPerCountries => {
                SettingValue::Count(self.number_servers_per_countries)
            }
            SettingKey::CountriesSelectedForCities => {
                SettingValue::List(self.countries_selected_for_cities.clone())
            }
            SettingKey::CountriesSelectedForServers => {
                SettingValue::List(self.countries_selected_for_servers.clone())
            }
            SettingKey::PanelStyles => SettingValue::Styles(self.panel_styles.clone()),
            // every remaining key is a string or boolean key handled above
            _ => SettingValue::Text(String::new()),
        }
    }

    pub fn set_string(&mut self, key: SettingKey, value: &str) -> Result<(), SettingsError> {
        match key {
            SettingKey::Protocol => self.protocol = value.trim().to_string(),
            SettingKey::Technology => self.technology = value.trim().to_string(),
            SettingKey::PanelPosition => {
                self.panel_position =
                    PanelPosition::parse(value).ok_or_else(|| SettingsError::InvalidValue {
                        key: key.as_str(),
                        value: value.to_string(),
                    })?;
            }
            _ => {
                return Err(SettingsError::WrongType {
                    key: key.as_str(),
                    expected: "string",
                })
            }
        }
        Ok(())
    }

    pub fn set_boolean(&mut self, key: SettingKey, value: bool) -> Result<(), SettingsError> {
        let slot = match key {
            SettingKey::Firewall => &mut self.firewall,
            SettingKey::Analytics => &mut self.analytics,
            SettingKey::Autoconnect => &mut self.autoconnect,
            SettingKey::Cybersec => &mut self.cybersec,
            SettingKey::Killswitch => &mut self.killswitch,
            SettingKey::Obfuscate => &mut self.obfuscate,
            SettingKey::Ipv6 => &mut self.ipv6,
            SettingKey::Notify => &mut self.notify,
            SettingKey::CommonPanelStyle => &mut self.common_panel_style,
            SettingKey::ExtraLargeButton => &mut self.extra_large_button,
            SettingKey::Commonfavorite => &mut self.commonfavorite,
            SettingKey::Showlogin => &mut self.showlogin,
            SettingKey::Showlogout => &mut self.showlogout,
            _ => {
                return Err(SettingsError::WrongType {
                    key: key.as_str(),
                    expected: "boolean",
                })
            }
        };
        *slot = value;
        Ok(())
    }

    /// Store a value parsed from the client's `settings` output
    pub fn apply(&mut self, key: SettingKey, value: &SettingValue) -> Result<(), SettingsError> {
        match value {
            SettingValue::Bool(b) => self.set_boolean(key, *b),
            SettingValue::Text(s) => self.set_string(key, s),
            _ => Err(SettingsError::WrongType {
                key: key.as_str(),
                expected: "scalar",
            }),
        }
    }

    /// Panel style for `state`, or the shared one when `common-panel-style` is on
    pub fn panel_style_for(&self, state: StatusLabel) -> Option<&PanelStyle> {
        if self.common_panel_style {
            return self.panel_styles.first();
        }
        self.panel_styles
            .iter()
            .find(|s| StatusLabel::from_label(&s.state) == Some(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("nordtray-{}-{}.toml", name, std::process::id()))
    }

    #[test]
    fn test_settings_serialization() {
        let mut settings = Settings::default();
        settings.countries_selected_for_cities = vec!["Germany".to_string()];
        settings.favorites.add(Category::Countries, false, "Sweden");

        let serialized = toml::to_string_pretty(&settings).unwrap();
        assert!(serialized.contains("countries-selected-for-cities"));
        let deserialized: Settings = toml::from_str(&serialized).unwrap();

        assert_eq!(settings, deserialized);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let settings: Settings = toml::from_str("extra-large-button = true\n").unwrap();
        assert!(settings.extra_large_button);
        assert_eq!(settings.number_cities_per_countries, 5);
        assert_eq!(settings.cli_path, "nordvpn");
        assert!(settings.showlogin);
    }

    #[test]
    fn test_load_creates_default_file() {
        let path = temp_path("create");
        let _ = std::fs::remove_file(&path);

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(path.exists());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_fails_fast_on_bad_file() {
        let path = temp_path("bad");
        std::fs::write(&path, "command-timeout-secs = \"soon\"\n").unwrap();
        assert!(Settings::load_from(&path).is_err());

        std::fs::write(&path, "command-timeout-secs = 0\n").unwrap();
        assert!(Settings::load_from(&path).is_err());

        std::fs::write(
            &path,
            "[[panel-styles]]\nstate = \"Sleeping\"\ntext = \"zzz\"\n",
        )
        .unwrap();
        assert!(Settings::load_from(&path).is_err());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_typed_accessors() {
        let mut settings = Settings::default();
        assert_eq!(settings.get_string(SettingKey::Protocol), Some("UDP".to_string()));
        assert_eq!(settings.get_boolean(SettingKey::Protocol), None);

        settings.set_boolean(SettingKey::Killswitch, true).unwrap();
        assert_eq!(settings.get_value(SettingKey::Killswitch), SettingValue::Bool(true));

        settings.set_string(SettingKey::PanelPosition, "Left").unwrap();
        assert_eq!(settings.panel_position, PanelPosition::Left);
        assert!(settings.set_string(SettingKey::PanelPosition, "top").is_err());

        assert!(matches!(
            settings.set_boolean(SettingKey::Technology, true),
            Err(SettingsError::WrongType { .. })
        ));
        assert_eq!(
            settings.get_value(SettingKey::NumberServersPerCountries),
            SettingValue::Count(5)
        );
    }

    #[test]
    fn test_values_print_as_plain_json() {
        let mut settings = Settings::default();
        settings.countries_selected_for_cities = vec!["Sweden".to_string()];
        let json = |key| serde_json::to_string(&settings.get_value(key)).unwrap();

        assert_eq!(json(SettingKey::CountriesSelectedForCities), r#"["Sweden"]"#);
        assert_eq!(json(SettingKey::NumberCitiesPerCountries), "5");
        assert_eq!(json(SettingKey::Showlogin), "true");
        assert_eq!(json(SettingKey::Protocol), r#""UDP""#);
    }

    #[test]
    fn test_every_key_has_a_name() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::from_name(key.as_str()), Some(key));
        }
    }

    #[test]
    fn test_panel_style_lookup() {
        let mut settings = Settings::default();
        let style = settings.panel_style_for(StatusLabel::Disconnected).unwrap();
        assert_eq!(style.text, "VPN off");
        assert!(settings.panel_style_for(StatusLabel::Restarting).is_none());

        settings.common_panel_style = true;
        let style = settings.panel_style_for(StatusLabel::Disconnected).unwrap();
        assert_eq!(style.state, "Connected");
    }
}
