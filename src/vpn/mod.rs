pub mod parser;
pub mod servers;
pub mod settings;

use async_trait::async_trait;
use std::fmt;
use std::process::Command;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Default upper bound for a single asynchronous CLI call
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the VPN client binary when none is configured
pub const DEFAULT_CLI: &str = "nordvpn";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code}: {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {}s", .after.as_secs())]
    Timeout { command: String, after: Duration },
}

/// Result of a blocking CLI call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// The fixed set of commands the indicator ever sends to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VpnCommand {
    Status,
    Account,
    Countries,
    Cities(String),
    Settings,
    Set { key: String, value: String },
    Connect(Option<String>),
    Disconnect,
    Login,
    Logout,
    Autoconnect(bool),
}

impl VpnCommand {
    pub fn args(&self) -> Vec<String> {
        let words: Vec<&str> = match self {
            VpnCommand::Status => vec!["status"],
            VpnCommand::Account => vec!["account"],
            VpnCommand::Countries => vec!["countries"],
            VpnCommand::Cities(country) => vec!["cities", country.as_str()],
            VpnCommand::Settings => vec!["settings"],
            VpnCommand::Set { key, value } => vec!["set", key.as_str(), value.as_str()],
            VpnCommand::Connect(Some(target)) => vec!["connect", target.as_str()],
            VpnCommand::Connect(None) => vec!["connect"],
            VpnCommand::Disconnect => vec!["disconnect"],
            VpnCommand::Login => vec!["login"],
            VpnCommand::Logout => vec!["logout"],
            VpnCommand::Autoconnect(true) => vec!["set", "autoconnect", "on"],
            VpnCommand::Autoconnect(false) => vec!["set", "autoconnect", "off"],
        };
        words.into_iter().map(str::to_string).collect()
    }
}

impl fmt::Display for VpnCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args().join(" "))
    }
}

/// Boundary to the VPN client process.
///
/// Everything the indicator learns about the tunnel goes through this trait,
/// so tests swap in a recording implementation.
#[async_trait]
pub trait CommandGateway: Send + Sync {
    /// Run a command to completion on the calling thread
    fn exec_sync(&self, command: &VpnCommand) -> CommandOutput;

    /// Run a command without blocking the runtime; fails on non-zero exit
    async fn exec_async(&self, command: &VpnCommand) -> Result<String, GatewayError>;

    /// The client daemon answers `status` with exit code 0 only when it is up
    async fn is_running(&self) -> bool {
        self.exec_sync(&VpnCommand::Status).exit_code == 0
    }

    /// Run `command` only if the daemon is alive, otherwise return empty output
    async fn exec_if_running(&self, command: &VpnCommand) -> Result<String, GatewayError> {
        if !self.is_running().await {
            tracing::debug!("VPN daemon not running, skipping `{}`", command);
            return Ok(String::new());
        }
        self.exec_async(command).await
    }
}

/// Gateway backed by the real client binary
#[derive(Debug, Clone)]
pub struct NordCli {
    program: String,
    timeout: Duration,
}

impl Default for NordCli {
    fn default() -> Self {
        Self::new(DEFAULT_CLI, DEFAULT_COMMAND_TIMEOUT)
    }
}

impl NordCli {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn describe(&self, command: &VpnCommand) -> String {
        format!("{} {}", self.program, command)
    }
}

#[async_trait]
impl CommandGateway for NordCli {
    fn exec_sync(&self, command: &VpnCommand) -> CommandOutput {
        match Command::new(&self.program).args(command.args()).output() {
            Ok(output) => CommandOutput {
                ok: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                exit_code: output.status.code().unwrap_or(-1),
            },
            Err(e) => {
                tracing::debug!("Could not run {}: {}", self.describe(command), e);
                CommandOutput {
                    ok: false,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    exit_code: -1,
                }
            }
        }
    }

    async fn exec_async(&self, command: &VpnCommand) -> Result<String, GatewayError> {
        let described = self.describe(command);

        let result = timeout(
            self.timeout,
            tokio::process::Command::new(&self.program)
                .args(command.args())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(GatewayError::Spawn {
                    command: described,
                    source,
                })
            }
            Err(_) => {
                return Err(GatewayError::Timeout {
                    command: described,
                    after: self.timeout,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            // The client prints most of its failures on stdout
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GatewayError::Failed {
                command: described,
                code: output.status.code().unwrap_or(-1),
                stderr: if stderr.is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr
                },
            });
        }

        Ok(stdout)
    }

    /// Liveness probe under the same timeout as every other call
    async fn is_running(&self) -> bool {
        match self.exec_async(&VpnCommand::Status).await {
            Ok(_) => true,
            Err(GatewayError::Failed { .. }) => false,
            Err(e) => {
                tracing::debug!("VPN daemon check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scriptable gateway that records every command it is asked to run
    #[derive(Default)]
    pub(crate) struct MockGateway {
        pub running: Mutex<bool>,
        pub status: Mutex<String>,
        pub account: Mutex<String>,
        pub countries: Mutex<String>,
        pub cities: Mutex<String>,
        pub settings: Mutex<String>,
        pub fail_status: Mutex<bool>,
        pub fail_cities: Mutex<bool>,
        pub calls: Mutex<Vec<VpnCommand>>,
    }

    impl MockGateway {
        pub(crate) fn new(status: &str) -> Self {
            let gateway = Self::default();
            *gateway.running.lock().unwrap() = true;
            gateway.set_status(status);
            *gateway.account.lock().unwrap() =
                "Account Information:\nEmail Address: user@example.com\n".to_string();
            gateway
        }

        pub(crate) fn set_status(&self, status: &str) {
            *self.status.lock().unwrap() = status.to_string();
        }

        pub(crate) fn count(&self, pred: impl Fn(&VpnCommand) -> bool) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
        }
    }

    #[async_trait]
    impl CommandGateway for MockGateway {
        fn exec_sync(&self, _command: &VpnCommand) -> CommandOutput {
            let running = *self.running.lock().unwrap();
            CommandOutput {
                ok: running,
                exit_code: if running { 0 } else { 1 },
                ..Default::default()
            }
        }

        async fn exec_async(&self, command: &VpnCommand) -> Result<String, GatewayError> {
            self.calls.lock().unwrap().push(command.clone());
            match command {
                VpnCommand::Status if *self.fail_status.lock().unwrap() => {
                    Err(GatewayError::Failed {
                        command: command.to_string(),
                        code: 1,
                        stderr: "daemon hiccup".to_string(),
                    })
                }
                VpnCommand::Cities(_) if *self.fail_cities.lock().unwrap() => {
                    Err(GatewayError::Failed {
                        command: command.to_string(),
                        code: 1,
                        stderr: "no such country".to_string(),
                    })
                }
                VpnCommand::Status => Ok(self.status.lock().unwrap().clone()),
                VpnCommand::Account => Ok(self.account.lock().unwrap().clone()),
                VpnCommand::Countries => Ok(self.countries.lock().unwrap().clone()),
                VpnCommand::Cities(_) => Ok(self.cities.lock().unwrap().clone()),
                VpnCommand::Settings => Ok(self.settings.lock().unwrap().clone()),
                _ => Ok(String::new()),
            }
        }
    }

    #[test]
    fn test_command_args() {
        assert_eq!(VpnCommand::Status.args(), vec!["status"]);
        assert_eq!(
            VpnCommand::Cities("United_States".to_string()).args(),
            vec!["cities", "United_States"]
        );
        assert_eq!(VpnCommand::Connect(None).to_string(), "connect");
        assert_eq!(
            VpnCommand::Connect(Some("us1234".to_string())).to_string(),
            "connect us1234"
        );
        assert_eq!(VpnCommand::Autoconnect(false).to_string(), "set autoconnect off");
    }

    #[tokio::test]
    async fn test_exec_async_returns_stdout() {
        let cli = NordCli::new("echo", Duration::from_secs(5));
        let out = cli.exec_async(&VpnCommand::Status).await.unwrap();
        assert_eq!(out.trim(), "status");
    }

    #[tokio::test]
    async fn test_exec_async_reports_failure() {
        let cli = NordCli::new("false", Duration::from_secs(5));
        let err = cli.exec_async(&VpnCommand::Status).await.unwrap_err();
        assert!(matches!(err, GatewayError::Failed { code: 1, .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_running() {
        let cli = NordCli::new("/nonexistent/nordvpn-binary", Duration::from_secs(5));
        assert!(!cli.is_running().await);
        let out = cli.exec_if_running(&VpnCommand::Countries).await.unwrap();
        assert!(out.is_empty());

        let err = cli.exec_async(&VpnCommand::Status).await.unwrap_err();
        assert!(matches!(err, GatewayError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_client_is_not_running_after_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let script = std::env::temp_dir().join(format!("nordtray-hung-{}.sh", std::process::id()));
        std::fs::write(&script, "#!/bin/sh\nsleep 10\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cli = NordCli::new(script.to_string_lossy(), Duration::from_millis(500));
        let started = std::time::Instant::now();
        assert!(!cli.is_running().await);
        let out = cli.exec_if_running(&VpnCommand::Countries).await.unwrap();
        assert!(out.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));

        let _ = std::fs::remove_file(&script);
    }

    #[tokio::test]
    async fn test_exec_if_running_skips_dead_daemon() {
        let gateway = MockGateway::new("Status: Connected");
        *gateway.running.lock().unwrap() = false;
        let out = gateway.exec_if_running(&VpnCommand::Status).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(gateway.count(|_| true), 0);
    }
}
