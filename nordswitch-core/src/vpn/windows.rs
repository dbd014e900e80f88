//! Controller for the NordVPN desktop client on Windows
//!
//! The desktop client exposes a flag-form CLI (`-c -n <server>`, `-d`)
//! but no status output, so connectivity is inferred: resolve the current
//! public IP through the insights endpoint and match it against a
//! caller-supplied server table. Detection on this platform is therefore
//! inferential, not authoritative. Before the first command in a
//! controller's lifetime the GUI is launched and given time to reach
//! steady memory usage, since commands issued mid-startup get dropped.

use crate::error::{CliError, ConfigError, Result, SwitchError};
use crate::vpn::ip::IpInsightsClient;
use crate::vpn::poll::{wait_for_steady_state, wait_until, ReadinessOptions};
use crate::vpn::process::{self, CloseReport};
use crate::vpn::runner::{run_system_command, CliDriver, CliRunner, CommandOutput};
use crate::vpn::servers::{ServerIpLookup, ServerRecord};
use crate::vpn::state::ConnectionState;
use crate::vpn::status::StatusSnapshot;
use crate::vpn::PollSettings;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Image name of the desktop client process
pub const PROCESS_NAME: &str = "NordVPN.exe";

const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);
const DNS_FLUSH_TIMEOUT: Duration = Duration::from_secs(20);

/// Locate `NordVPN.exe` in the standard installation directories
///
/// Checks `%ProgramFiles%` and `%ProgramFiles(x86)%`; fails with a
/// configuration error listing every attempted location.
pub fn find_nordvpn_executable(custom_exe_path: Option<&str>) -> Result<PathBuf> {
    if let Some(custom) = custom_exe_path {
        let path = Path::new(custom);
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::InvalidExePath {
            path: custom.to_string(),
        }
        .into());
    }

    let mut attempted = Vec::new();
    for env_var in ["ProgramFiles", "ProgramFiles(x86)"] {
        let Ok(base) = std::env::var(env_var) else {
            attempted.push(format!("%{}%", env_var));
            continue;
        };
        let candidate = Path::new(&base).join("NordVPN").join("NordVPN.exe");
        if candidate.exists() {
            return Ok(candidate);
        }
        attempted.push(candidate.display().to_string());
    }

    Err(ConfigError::ExecutableNotFound {
        attempted: attempted.join(", "),
    }
    .into())
}

/// Controls the NordVPN desktop client via its command-line interface
#[derive(Debug)]
pub struct WindowsController<D = CliRunner> {
    driver: D,
    exe_path: Option<PathBuf>,
    state: ConnectionState,
    /// One-time readiness gate; reset when the GUI process is closed
    cli_ready: bool,
    readiness: ReadinessOptions,
    poll: PollSettings,
    insights: IpInsightsClient,
    server_lookup: ServerIpLookup,
}

impl WindowsController<CliRunner> {
    /// Build a controller around the installed desktop client
    pub fn new(custom_exe_path: Option<&str>) -> Result<Self> {
        let exe = find_nordvpn_executable(custom_exe_path)?;
        info!(exe = %exe.display(), "Using NordVPN desktop client");
        let mut controller =
            Self::with_driver(CliRunner::via_shell(exe.clone()), IpInsightsClient::nordvpn()?);
        controller.exe_path = Some(exe);
        controller.cli_ready = false;
        Ok(controller)
    }
}

impl<D: CliDriver> WindowsController<D> {
    /// Build a controller around an arbitrary driver
    ///
    /// Driver injection implies the caller manages the client process, so
    /// the GUI readiness gate is already satisfied.
    pub fn with_driver(driver: D, insights: IpInsightsClient) -> Self {
        Self {
            driver,
            exe_path: None,
            state: ConnectionState::Unknown,
            cli_ready: true,
            readiness: ReadinessOptions::default(),
            poll: PollSettings::default(),
            insights,
            server_lookup: ServerIpLookup::default(),
        }
    }

    /// Last lifecycle stage this controller drove the client into
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Override the state-transition polling cadence
    pub fn set_poll_settings(&mut self, poll: PollSettings) {
        self.poll = poll;
    }

    /// Override GUI readiness detection tuning
    pub fn set_readiness_options(&mut self, readiness: ReadinessOptions) {
        self.readiness = readiness;
    }

    /// Replace the public-IP insights client
    pub fn set_insights_client(&mut self, insights: IpInsightsClient) {
        self.insights = insights;
    }

    /// Replace the station-IP lookup table wholesale
    pub fn set_server_ip_lookup(&mut self, servers: &[ServerRecord]) {
        self.server_lookup = ServerIpLookup::from_records(servers);
    }

    /// Whether a server table has been supplied
    ///
    /// Without one every status query reports Disconnected, since there
    /// is nothing to match the public IP against.
    pub fn has_server_ip_lookup(&self) -> bool {
        !self.server_lookup.is_empty()
    }

    /// Launch the GUI and wait for it to finish initializing, once
    async fn ensure_cli_ready(&mut self) -> Result<()> {
        if self.cli_ready {
            return Ok(());
        }

        if let Some(exe) = &self.exe_path {
            info!("NordVPN launch command issued");
            let mut command = tokio::process::Command::new(exe);
            if let Some(dir) = exe.parent() {
                command.current_dir(dir);
            }
            command
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null());
            match command.spawn() {
                // The GUI keeps running on its own; we track it through the
                // process table, not this handle.
                Ok(child) => drop(child),
                Err(e) => warn!(error = %e, "NordVPN launch failed, waiting for an existing instance"),
            }
        }

        info!("Waiting for NordVPN to become stable");
        wait_for_steady_state(PROCESS_NAME, &self.readiness).await?;
        info!("NordVPN CLI is ready");
        self.cli_ready = true;
        Ok(())
    }

    async fn run_cli(&mut self, args: Vec<String>) -> Result<CommandOutput> {
        self.ensure_cli_ready().await?;
        self.driver.run(&args, COMMAND_TIMEOUT).await
    }

    /// Resolve the inferential status snapshot
    ///
    /// Public IP is looked up remotely and matched against the server
    /// table; a hit means Connected to that server.
    async fn status_snapshot(&self) -> Result<StatusSnapshot> {
        let current_ip = self.insights.public_ip().await?;
        let entry = current_ip
            .as_deref()
            .and_then(|ip| self.server_lookup.lookup_ip(ip));

        let mut fields = HashMap::new();
        fields.insert(
            "status".to_string(),
            if entry.is_some() {
                "Connected".to_string()
            } else {
                "Disconnected".to_string()
            },
        );
        if let Some(ip) = &current_ip {
            fields.insert("current ip".to_string(), ip.clone());
        }
        if let Some(entry) = entry {
            if let Some(server) = entry.display_server() {
                fields.insert("current server".to_string(), server.to_string());
            }
            if let Some(name) = &entry.name {
                fields.insert("server name".to_string(), name.clone());
            }
            if let Some(hostname) = &entry.hostname {
                fields.insert("server hostname".to_string(), hostname.clone());
            }
        }
        Ok(StatusSnapshot::from_fields(fields))
    }

    /// Current VPN status, inferred from the public IP
    pub async fn get_status(&self) -> Result<String> {
        Ok(self.status_snapshot().await?.status_text().to_string())
    }

    /// Full inferred status snapshot
    pub async fn get_status_full(&self) -> Result<StatusSnapshot> {
        self.status_snapshot().await
    }

    /// Current public-facing IP
    pub async fn get_current_ip(&self) -> Result<Option<String>> {
        self.insights.public_ip().await
    }

    /// Currently connected server per the lookup table, if any
    pub async fn get_connected_server(&self) -> Result<Option<String>> {
        Ok(self
            .status_snapshot()
            .await?
            .connected_server()
            .map(str::to_string))
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.status_snapshot().await?.is_connected())
    }

    async fn wait_for_status(&self, connected: bool) -> Result<()> {
        let target = if connected { "connected" } else { "disconnected" };
        wait_until(target, self.poll.interval, self.poll.timeout, || async {
            Ok(self.is_connected().await? == connected)
        })
        .await
    }

    /// Connect to a server or group and wait until the public IP matches
    pub async fn connect(&mut self, target: &str, is_group: bool) -> Result<()> {
        let args = if is_group {
            vec!["-c".to_string(), "-g".to_string(), target.to_string()]
        } else {
            vec!["-c".to_string(), "-n".to_string(), target.to_string()]
        };
        let label = if is_group { "group" } else { "server" };
        info!(%target, label, "Connecting to NordVPN");

        self.state = ConnectionState::Connecting;
        if let Err(e) = self.run_cli(args).await {
            self.state = ConnectionState::Unknown;
            return Err(e);
        }

        match self.wait_for_status(true).await {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Unknown;
                Err(e)
            }
        }
    }

    /// Disconnect and wait until the public IP leaves the server table
    pub async fn disconnect(&mut self) -> Result<()> {
        info!("Disconnecting from NordVPN");

        self.state = ConnectionState::Disconnecting;
        if let Err(e) = self.run_cli(vec!["-d".to_string()]).await {
            self.state = ConnectionState::Unknown;
            return Err(e);
        }

        match self.wait_for_status(false).await {
            Ok(()) => {
                self.state = ConnectionState::Disconnected;
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Unknown;
                Err(e)
            }
        }
    }

    /// Flush the Windows DNS resolver cache via `ipconfig /flushdns`
    pub async fn flush_dns_cache(&self) -> Result<()> {
        run_system_command("ipconfig", &["/flushdns"], DNS_FLUSH_TIMEOUT)
            .await
            .map_err(|e| {
                SwitchError::Cli(CliError::DnsFlushFailed {
                    detail: e.to_string(),
                })
            })?;
        info!("Flushed DNS cache");
        Ok(())
    }

    /// Close the desktop client and reset the readiness gate
    pub async fn close(&mut self, force: bool) -> Result<Vec<CloseReport>> {
        info!("Closing NordVPN.exe");
        let reports = process::close_processes(&[PROCESS_NAME], force)
            .await
            .map_err(SwitchError::Io)?;
        self.cli_ready = false;
        self.state = ConnectionState::Unknown;
        Ok(reports)
    }
}
