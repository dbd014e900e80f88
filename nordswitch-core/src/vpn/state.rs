//! Connection lifecycle state tracked by a controller
//!
//! The state records which lifecycle stage the controller last drove the
//! client into. It is bookkeeping, not ground truth: status queries always
//! re-derive connectivity from the client itself.

/// Lifecycle states of a controller instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Nothing observed yet, or the last operation failed mid-transition
    #[default]
    Unknown,

    /// A connect command was issued, awaiting confirmation
    Connecting,

    /// The client confirmed an established connection
    Connected,

    /// A disconnect command was issued, awaiting confirmation
    Disconnecting,

    /// The client confirmed the connection is down
    Disconnected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Unknown => write!(f, "unknown"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnecting => write!(f, "disconnecting"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}
