use anyhow::{Context, Result};

use super::parser::parse_settings;
use super::{CommandGateway, VpnCommand};
use crate::config::{SettingKey, SettingValue, Settings};

/// Copy the client's current settings into the store. Returns how many keys were applied.
pub async fn sync_settings(gateway: &dyn CommandGateway, settings: &mut Settings) -> Result<usize> {
    let raw = gateway
        .exec_if_running(&VpnCommand::Settings)
        .await
        .context("Failed to read VPN settings")?;

    let mut applied = 0;
    for (key, value) in parse_settings(&raw) {
        match settings.apply(key, &value) {
            Ok(()) => applied += 1,
            Err(e) => tracing::warn!("Ignoring VPN setting {}: {}", key.as_str(), e),
        }
    }

    tracing::debug!("Synced {} settings from the VPN client", applied);
    Ok(applied)
}

/// Change a setting in the client, then mirror it into the store
pub async fn apply_setting(
    gateway: &dyn CommandGateway,
    settings: &mut Settings,
    key: SettingKey,
    value: SettingValue,
) -> Result<()> {
    let cli_name = key
        .cli_name()
        .ok_or_else(|| anyhow::anyhow!("`{}` is not a VPN client setting", key.as_str()))?;

    let command = match (&key, &value) {
        (SettingKey::Autoconnect, SettingValue::Bool(on)) => VpnCommand::Autoconnect(*on),
        (_, SettingValue::Bool(on)) => VpnCommand::Set {
            key: cli_name.to_string(),
            value: if *on { "on" } else { "off" }.to_string(),
        },
        (_, SettingValue::Text(text)) => VpnCommand::Set {
            key: cli_name.to_string(),
            value: text.clone(),
        },
        _ => anyhow::bail!("`{}` takes a boolean or text value", key.as_str()),
    };

    gateway
        .exec_if_running(&command)
        .await
        .with_context(|| format!("Failed to set {}", key.as_str()))?;
    settings.apply(key, &value)?;

    tracing::info!("Set {} to {:?}", key.as_str(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vpn::tests::MockGateway;

    #[tokio::test]
    async fn test_sync_settings_applies_known_keys() {
        let gateway = MockGateway::new("Status: Disconnected");
        *gateway.settings.lock().unwrap() = "Technology: OPENVPN\nProtocol: TCP\n\
            Firewall: disabled\nKill Switch: enabled\nMeshnet: enabled\n"
            .to_string();
        let mut settings = Settings::default();

        let applied = sync_settings(&gateway, &mut settings).await.unwrap();
        assert_eq!(applied, 4);
        assert_eq!(settings.technology, "OPENVPN");
        assert_eq!(settings.protocol, "TCP");
        assert!(!settings.firewall);
        assert!(settings.killswitch);
        assert_eq!(gateway.count(|c| *c == VpnCommand::Settings), 1);
    }

    #[tokio::test]
    async fn test_sync_settings_with_dead_daemon() {
        let gateway = MockGateway::new("");
        *gateway.running.lock().unwrap() = false;
        let mut settings = Settings::default();

        assert_eq!(sync_settings(&gateway, &mut settings).await.unwrap(), 0);
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_apply_setting_issues_set() {
        let gateway = MockGateway::new("Status: Disconnected");
        let mut settings = Settings::default();

        apply_setting(&gateway, &mut settings, SettingKey::Cybersec, SettingValue::Bool(true))
            .await
            .unwrap();
        assert!(settings.cybersec);
        assert_eq!(
            gateway.count(|c| *c
                == VpnCommand::Set {
                    key: "threatprotectionlite".to_string(),
                    value: "on".to_string()
                }),
            1
        );

        apply_setting(&gateway, &mut settings, SettingKey::Autoconnect, SettingValue::Bool(true))
            .await
            .unwrap();
        assert!(settings.autoconnect);
        assert_eq!(gateway.count(|c| *c == VpnCommand::Autoconnect(true)), 1);
    }

    #[tokio::test]
    async fn test_apply_setting_rejects_local_keys() {
        let gateway = MockGateway::new("Status: Disconnected");
        let mut settings = Settings::default();
        let result = apply_setting(
            &gateway,
            &mut settings,
            SettingKey::ExtraLargeButton,
            SettingValue::Bool(true),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(gateway.count(|_| true), 0);
    }
}
