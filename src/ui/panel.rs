use serde::Serialize;

use crate::config::{PanelPosition, Settings};
use crate::state::{DisplayState, StatusLabel};
use crate::vpn::parser::StatusRecord;

/// Rendered panel button
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelLabel {
    pub state: StatusLabel,
    pub text: String,
    /// Second line shown by the extra-large button while connected
    pub detail: Option<String>,
    pub style: String,
    pub position: PanelPosition,
}

impl PanelLabel {
    pub fn render(display: &DisplayState, record: &StatusRecord, settings: &Settings) -> Self {
        let state = display.state();
        let (template, style) = match settings.panel_style_for(state) {
            Some(s) => (s.text.as_str(), s.style.clone()),
            None => ("{status}", String::new()),
        };

        let detail = if settings.extra_large_button && state == StatusLabel::Connected {
            Some(fill_template("{uptime} · {transfer}", state, record))
        } else {
            None
        };

        Self {
            state,
            text: fill_template(template, state, record),
            detail,
            style,
            position: settings.panel_position,
        }
    }
}

/// Substitute `{placeholder}`s with status fields
pub fn fill_template(template: &str, state: StatusLabel, record: &StatusRecord) -> String {
    [
        ("{status}", state.label()),
        ("{country}", record.country.as_str()),
        ("{city}", record.city.as_str()),
        ("{server}", record.current_server.as_str()),
        ("{ip}", record.server_ip.as_str()),
        ("{technology}", record.current_tech.as_str()),
        ("{protocol}", record.current_protocol.as_str()),
        ("{transfer}", record.transfer.as_str()),
        ("{uptime}", record.uptime.as_str()),
    ]
    .into_iter()
    .fold(template.to_string(), |text, (placeholder, value)| {
        text.replace(placeholder, value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelStyle;
    use crate::state::Resolver;
    use crate::vpn::parser::parse_status;

    fn connected() -> (DisplayState, StatusRecord) {
        let record = parse_status(
            "Status: Connected\nCountry: Sweden\nCity: Stockholm\n\
             Transfer: 1 MiB received, 2 MiB sent\nUptime: 3 minutes\n",
        );
        let display = Resolver::new().resolve(&record, false);
        (display, record)
    }

    #[test]
    fn test_render_default_style() {
        let (display, record) = connected();
        let label = PanelLabel::render(&display, &record, &Settings::default());
        assert_eq!(label.text, "Sweden");
        assert_eq!(label.style, "color: #7ecf6c");
        assert_eq!(label.detail, None);
        assert_eq!(label.position, PanelPosition::Right);
    }

    #[test]
    fn test_render_extra_large_detail() {
        let (display, record) = connected();
        let mut settings = Settings::default();
        settings.extra_large_button = true;
        settings.panel_styles = vec![PanelStyle {
            state: "Connected".to_string(),
            text: "{city}, {country} [{technology}]".to_string(),
            style: String::new(),
        }];

        let label = PanelLabel::render(&display, &record, &settings);
        assert_eq!(label.text, "Stockholm, Sweden [N/A]");
        assert_eq!(
            label.detail.as_deref(),
            Some("3 minutes · 1 MiB received, 2 MiB sent")
        );
    }

    #[test]
    fn test_state_without_style_shows_label() {
        let record = parse_status("Status: Restarting\n");
        let display = Resolver::new().resolve(&record, false);
        let label = PanelLabel::render(&display, &record, &Settings::default());
        assert_eq!(label.text, "Restarting");
        assert!(label.style.is_empty());
    }
}
