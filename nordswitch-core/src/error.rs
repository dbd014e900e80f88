//! Error types for the nordswitch automation toolkit
//!
//! Two top-level failure classes exist: configuration errors describe a
//! broken environment (missing executable, bad path) the caller has to fix
//! before retrying, while CLI errors describe runtime failures of the
//! NordVPN client or its surrounding commands.

use thiserror::Error;

/// Main error type for the nordswitch crates
#[derive(Error, Debug)]
pub enum SwitchError {
    /// Errors related to environment and setup
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors related to driving the NordVPN client
    #[error("NordVPN CLI error: {0}")]
    Cli(#[from] CliError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl SwitchError {
    /// Whether the error may resolve on its own while polling
    ///
    /// CLI failures are transient: the daemon may still be reconfiguring
    /// routes when a status query fails, so polling keeps going.
    /// Configuration errors never resolve without operator action and
    /// abort a poll immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, SwitchError::Cli(_))
    }
}

/// Environment and setup errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not find the NordVPN executable. Attempted: {attempted}")]
    ExecutableNotFound { attempted: String },

    #[error("Executable not found at path: {path}")]
    InvalidExePath { path: String },

    #[error("Failed to load configuration file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to save configuration file: {path}")]
    SaveFailed { path: String },

    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Runtime failures of the NordVPN client and surrounding commands
#[derive(Error, Debug)]
pub enum CliError {
    #[error("NordVPN CLI command '{command}' failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("NordVPN CLI command '{command}' timed out after {seconds} seconds")]
    CommandTimeout { command: String, seconds: u64 },

    #[error("NordVPN did not become {state} within {seconds} seconds")]
    StateTimeout { state: String, seconds: u64 },

    #[error("NordVPN did not reach steady state within {seconds} seconds. Please ensure the application is running and logged in.")]
    NotReady { seconds: u64 },

    #[error("DNS flush failed: {detail}")]
    DnsFlushFailed { detail: String },

    #[error("Failed to resolve public IP for status lookup: {reason}")]
    IpLookupFailed { reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SwitchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_errors_are_transient() {
        let err = SwitchError::Cli(CliError::StateTimeout {
            state: "connected".to_string(),
            seconds: 45,
        });
        assert!(err.is_transient());
    }

    #[test]
    fn test_config_errors_are_terminal() {
        let err = SwitchError::Config(ConfigError::ExecutableNotFound {
            attempted: "nordvpn".to_string(),
        });
        assert!(!err.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = CliError::StateTimeout {
            state: "connected".to_string(),
            seconds: 45,
        };
        assert_eq!(
            err.to_string(),
            "NordVPN did not become connected within 45 seconds"
        );
    }
}
