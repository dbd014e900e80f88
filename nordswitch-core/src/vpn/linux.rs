//! Controller for the NordVPN terminal client on Linux
//!
//! Drives the `nordvpn` CLI: status is parsed from its key-value text
//! output, connect/disconnect issue the matching subcommand and then poll
//! until the client actually reports the target state. The command's exit
//! code alone is never trusted as proof of the resulting network state.

use crate::error::{CliError, ConfigError, Result, SwitchError};
use crate::vpn::poll::wait_until;
use crate::vpn::process::{self, CloseReport};
use crate::vpn::runner::{run_system_command, CliDriver, CliRunner};
use crate::vpn::state::ConnectionState;
use crate::vpn::status::StatusSnapshot;
use crate::vpn::PollSettings;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Name of the terminal client binary
pub const DEFAULT_EXE: &str = "nordvpn";

/// Processes torn down by [`LinuxController::close`]
pub const PROCESS_NAMES: [&str; 2] = ["nordvpn", "nordvpnd"];

const STATUS_TIMEOUT: Duration = Duration::from_secs(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(120);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(90);
const DNS_FLUSH_TIMEOUT: Duration = Duration::from_secs(20);

/// DNS cache flush candidates, tried in order
const DNS_FLUSH_CANDIDATES: [(&str, &[&str]); 2] = [
    ("resolvectl", &["flush-caches"]),
    ("systemd-resolve", &["--flush-caches"]),
];

/// Locate the NordVPN CLI executable
///
/// Resolves the candidate through `PATH` first; an absolute path that
/// exists on disk is also accepted. Anything else is a configuration
/// error naming what was attempted.
pub fn find_nordvpn_executable(custom_exe_path: Option<&str>) -> Result<PathBuf> {
    let candidate = custom_exe_path.unwrap_or(DEFAULT_EXE);

    if let Ok(resolved) = which::which(candidate) {
        return Ok(resolved);
    }

    let path = Path::new(candidate);
    if path.is_absolute() && path.exists() {
        return Ok(path.to_path_buf());
    }

    Err(ConfigError::ExecutableNotFound {
        attempted: format!("'{}' via PATH lookup and as an absolute path", candidate),
    }
    .into())
}

/// Controls the NordVPN terminal client via the `nordvpn` CLI
#[derive(Debug)]
pub struct LinuxController<D = CliRunner> {
    driver: D,
    state: ConnectionState,
    poll: PollSettings,
}

impl LinuxController<CliRunner> {
    /// Build a controller around the installed `nordvpn` binary
    pub fn new(custom_exe_path: Option<&str>) -> Result<Self> {
        let exe = find_nordvpn_executable(custom_exe_path)?;
        info!(exe = %exe.display(), "Using NordVPN CLI");
        Ok(Self::with_driver(CliRunner::direct(exe)))
    }
}

impl<D: CliDriver> LinuxController<D> {
    /// Build a controller around an arbitrary driver
    pub fn with_driver(driver: D) -> Self {
        Self {
            driver,
            state: ConnectionState::Unknown,
            poll: PollSettings::default(),
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

    async fn status_snapshot(&self) -> Result<StatusSnapshot> {
        let output = self
            .driver
            .run(&["status".to_string()], STATUS_TIMEOUT)
            .await?;
        Ok(StatusSnapshot::from_cli_output(&output.stdout))
    }

    /// Current VPN status as reported by the client
    pub async fn get_status(&self) -> Result<String> {
        Ok(self.status_snapshot().await?.status_text().to_string())
    }

    /// Full parsed status snapshot
    pub async fn get_status_full(&self) -> Result<StatusSnapshot> {
        self.status_snapshot().await
    }

    /// Currently reported VPN/public IP, if any
    pub async fn get_current_ip(&self) -> Result<Option<String>> {
        Ok(self
            .status_snapshot()
            .await?
            .current_ip()
            .map(str::to_string))
    }

    /// Currently connected server, if any
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

    /// Connect to a server or group and wait until the client confirms
    pub async fn connect(&mut self, target: &str, is_group: bool) -> Result<()> {
        let label = if is_group { "group" } else { "server" };
        info!(%target, label, "Connecting to NordVPN");

        self.state = ConnectionState::Connecting;
        let issued = self
            .driver
            .run(
                &["connect".to_string(), target.to_string()],
                CONNECT_TIMEOUT,
            )
            .await;
        if let Err(e) = issued {
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

    /// Disconnect and wait until the client confirms
    pub async fn disconnect(&mut self) -> Result<()> {
        info!("Disconnecting from NordVPN");

        self.state = ConnectionState::Disconnecting;
        let issued = self
            .driver
            .run(&["disconnect".to_string()], DISCONNECT_TIMEOUT)
            .await;
        if let Err(e) = issued {
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

    /// Flush the system DNS resolver cache
    ///
    /// Tries `resolvectl flush-caches`, then `systemd-resolve
    /// --flush-caches`. Fails only when every candidate is unavailable or
    /// errored.
    pub async fn flush_dns_cache(&self) -> Result<()> {
        let mut errors = Vec::new();

        for (program, args) in DNS_FLUSH_CANDIDATES {
            if which::which(program).is_err() {
                errors.push(format!("{} not found", program));
                continue;
            }

            match run_system_command(program, args, DNS_FLUSH_TIMEOUT).await {
                Ok(_) => {
                    info!(program, "Flushed DNS cache");
                    return Ok(());
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        let detail = if errors.is_empty() {
            "no supported DNS flush command available".to_string()
        } else {
            errors.join("; ")
        };
        Err(CliError::DnsFlushFailed { detail }.into())
    }

    /// Close NordVPN client processes
    ///
    /// Graceful close by default; `force` kills immediately. Returns the
    /// per-process report (empty when nothing was running).
    pub async fn close(&mut self, force: bool) -> Result<Vec<CloseReport>> {
        info!("Closing NordVPN processes");
        let reports = process::close_processes(&PROCESS_NAMES, force)
            .await
            .map_err(SwitchError::Io)?;
        self.state = ConnectionState::Unknown;
        Ok(reports)
    }
}
