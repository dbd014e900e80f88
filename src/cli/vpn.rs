//! VPN automation commands
//!
//! Each handler loads configuration, builds the controller for the
//! current platform and performs one operation end to end. Connect and
//! disconnect only report success once the client's observable state
//! confirms the transition.

use colored::Colorize;
use nordswitch_core::config::toml_config::{load_config, load_config_from_path};
use nordswitch_core::config::SwitchConfig;
use nordswitch_core::error::Result;
use nordswitch_core::vpn::VpnStatus;
use std::path::Path;

#[cfg(windows)]
use nordswitch_core::error::{ConfigError, SwitchError};
#[cfg(windows)]
use nordswitch_core::vpn::ip::{IpInsightsClient, INSIGHTS_TIMEOUT};
#[cfg(windows)]
use nordswitch_core::vpn::{ServerRecord, WindowsController};

#[cfg(not(windows))]
use nordswitch_core::vpn::LinuxController;

#[cfg(windows)]
type Controller = WindowsController;
#[cfg(not(windows))]
type Controller = LinuxController;

fn load_settings(config_path: Option<&Path>) -> Result<SwitchConfig> {
    match config_path {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    }
}

#[cfg(windows)]
fn load_server_records(path: &Path) -> Result<Vec<ServerRecord>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        SwitchError::Config(ConfigError::IoError {
            message: format!("Failed to read server list {}: {}", path.display(), e),
        })
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        SwitchError::Config(ConfigError::ValidationError {
            message: format!("Invalid server list {}: {}", path.display(), e),
        })
    })
}

#[cfg(windows)]
fn build_controller(config: &SwitchConfig, servers: Option<&Path>) -> Result<Controller> {
    let mut controller = WindowsController::new(config.exe_path.as_deref())?;
    controller.set_poll_settings(config.poll_settings());
    controller.set_readiness_options(config.readiness_options());
    if let Some(endpoint) = &config.insights_endpoint {
        controller.set_insights_client(IpInsightsClient::new(endpoint.clone(), INSIGHTS_TIMEOUT)?);
    }
    if let Some(path) = servers {
        controller.set_server_ip_lookup(&load_server_records(path)?);
    }
    Ok(controller)
}

#[cfg(not(windows))]
fn build_controller(config: &SwitchConfig, servers: Option<&Path>) -> Result<Controller> {
    if servers.is_some() {
        tracing::warn!("A server list only applies to the Windows desktop client, ignoring it");
    }
    let mut controller = LinuxController::new(config.exe_path.as_deref())?;
    controller.set_poll_settings(config.poll_settings());
    Ok(controller)
}

/// Connect to a server or group and wait for confirmation
pub async fn run_connect(
    config: Option<&Path>,
    servers: Option<&Path>,
    target: &str,
    group: bool,
) -> Result<()> {
    let settings = load_settings(config)?;
    let mut controller = build_controller(&settings, servers)?;

    println!("Connecting to {}...", target.bold());
    controller.connect(target, group).await?;
    println!("{} Connected", "✓".green());

    if let Ok(Some(server)) = controller.get_connected_server().await {
        println!("Server: {}", server);
    }
    if let Ok(Some(ip)) = controller.get_current_ip().await {
        println!("IP: {}", ip);
    }
    Ok(())
}

/// Disconnect and wait for confirmation
pub async fn run_disconnect(config: Option<&Path>, servers: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    let mut controller = build_controller(&settings, servers)?;

    println!("Disconnecting...");
    controller.disconnect().await?;
    println!("{} Disconnected", "✓".green());
    Ok(())
}

/// Print the current VPN status
pub async fn run_status(config: Option<&Path>, servers: Option<&Path>, full: bool) -> Result<()> {
    let settings = load_settings(config)?;
    let controller = build_controller(&settings, servers)?;
    let snapshot = controller.get_status_full().await?;

    if full {
        let mut keys: Vec<&String> = snapshot.fields().keys().collect();
        keys.sort();
        for key in keys {
            if let Some(value) = snapshot.get(key) {
                println!("{}: {}", key, value);
            }
        }
        return Ok(());
    }

    let text = snapshot.status_text();
    let status = match snapshot.status() {
        VpnStatus::Connected => text.green(),
        VpnStatus::Disconnected => text.yellow(),
        VpnStatus::Unknown => text.normal(),
    };
    println!("Status: {}", status);
    Ok(())
}

/// Print the current VPN/public IP
pub async fn run_ip(config: Option<&Path>, servers: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    let controller = build_controller(&settings, servers)?;

    match controller.get_current_ip().await? {
        Some(ip) => println!("{}", ip),
        None => println!("No VPN IP reported"),
    }
    Ok(())
}

/// Print the currently connected server
pub async fn run_server(config: Option<&Path>, servers: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    let controller = build_controller(&settings, servers)?;

    match controller.get_connected_server().await? {
        Some(server) => println!("{}", server),
        None => println!("Not connected to any server"),
    }
    Ok(())
}

/// Flush the system DNS resolver cache
pub async fn run_flush_dns(config: Option<&Path>, servers: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    let controller = build_controller(&settings, servers)?;

    controller.flush_dns_cache().await?;
    println!("{} DNS cache flushed", "✓".green());
    Ok(())
}

/// Close the NordVPN client processes
pub async fn run_close(config: Option<&Path>, servers: Option<&Path>, force: bool) -> Result<()> {
    let settings = load_settings(config)?;
    let mut controller = build_controller(&settings, servers)?;

    let reports = controller.close(force).await?;
    if reports.is_empty() {
        println!("No NordVPN processes running");
        return Ok(());
    }
    for report in reports {
        println!("{} ({}): {}", report.name, report.pid, report.outcome);
    }
    Ok(())
}
