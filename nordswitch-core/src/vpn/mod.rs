//! VPN client automation
//!
//! Platform controllers compose the command runner, status parsing,
//! polling and process lifecycle pieces into `connect` / `disconnect` /
//! status / DNS-flush / close operations. Everything is sequential and
//! blocking by design: the underlying client supports exactly one
//! session, so no two operations ever run concurrently.

pub mod ip;
pub mod linux;
pub mod poll;
pub mod process;
pub mod runner;
pub mod servers;
pub mod state;
pub mod status;
pub mod windows;

use std::time::Duration;

// Public re-exports
pub use linux::LinuxController;
pub use runner::{CliDriver, CliRunner, CommandOutput};
pub use servers::{ServerIpLookup, ServerRecord};
pub use state::ConnectionState;
pub use status::{StatusSnapshot, VpnStatus};
pub use windows::WindowsController;

/// Cadence for state-transition polling after connect/disconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Spacing between status probes
    pub interval: Duration,
    /// Overall deadline for reaching the target state
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(45),
        }
    }
}
