//! Parser for the NordVPN client's key-value status output
//!
//! Turns raw line-oriented `Key: Value` text into a normalized snapshot.
//! Malformed input never errors, it just degrades to a partial or empty
//! snapshot.

use std::collections::HashMap;

/// Values the client prints for "no meaningful value here"
const ABSENT_MARKERS: [&str; 3] = ["n/a", "none", "-"];

/// Status field keys that may carry the current IP, in priority order
const IP_KEYS: [&str; 3] = ["your new ip", "current ip", "ip"];

/// Status field keys that may carry the connected server, in priority order
const SERVER_KEYS: [&str; 2] = ["current server", "server"];

/// Normalized connection status reported by a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpnStatus {
    Connected,
    Disconnected,
    Unknown,
}

impl std::fmt::Display for VpnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VpnStatus::Connected => write!(f, "Connected"),
            VpnStatus::Disconnected => write!(f, "Disconnected"),
            VpnStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Parse key-value style output into a field map
///
/// Each non-empty line is split on the first colon; keys are trimmed and
/// lower-cased, values are trimmed. Lines without a colon are ignored.
pub fn parse_key_values(output: &str) -> HashMap<String, String> {
    let mut parsed = HashMap::new();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        parsed.insert(key.trim().to_lowercase(), value.trim().to_string());
    }
    parsed
}

/// Returns true when the value means "absent" (`n/a`, `none`, `-`)
pub fn is_absent_marker(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    lowered.is_empty() || ABSENT_MARKERS.contains(&lowered.as_str())
}

/// A point-in-time view of the client's reported status
///
/// Rebuilt fresh on every status query, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    fields: HashMap<String, String>,
}

impl StatusSnapshot {
    /// Build a snapshot from raw CLI status output
    pub fn from_cli_output(output: &str) -> Self {
        Self {
            fields: parse_key_values(output),
        }
    }

    /// Build a snapshot from an already-assembled field map
    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }

    /// All parsed fields, keyed by lower-cased field name
    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    /// Raw value of a single field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Human-readable status text, `"Unknown"` if the field is missing
    pub fn status_text(&self) -> &str {
        self.get("status").unwrap_or("Unknown")
    }

    /// Normalized status classification
    pub fn status(&self) -> VpnStatus {
        let Some(raw) = self.get("status") else {
            return VpnStatus::Unknown;
        };
        if Self::connected_heuristic(raw) {
            VpnStatus::Connected
        } else if raw.trim().to_lowercase().contains("disconnected") {
            VpnStatus::Disconnected
        } else {
            VpnStatus::Unknown
        }
    }

    /// Whether the snapshot reports an established connection
    ///
    /// Matches the client's wording loosely: an exact "connected", or any
    /// status containing "connected" but not "disconnected".
    pub fn is_connected(&self) -> bool {
        self.get("status")
            .map(Self::connected_heuristic)
            .unwrap_or(false)
    }

    fn connected_heuristic(raw: &str) -> bool {
        let status = raw.trim().to_lowercase();
        status == "connected"
            || (status.contains("connected") && !status.contains("disconnected"))
    }

    /// Current IP as reported in the snapshot, if any
    pub fn current_ip(&self) -> Option<&str> {
        self.first_present(&IP_KEYS)
    }

    /// Connected server as reported in the snapshot, if any
    pub fn connected_server(&self) -> Option<&str> {
        self.first_present(&SERVER_KEYS)
    }

    fn first_present(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.get(key))
            .find(|value| !is_absent_marker(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_values_basic() {
        let parsed = parse_key_values("Status: Connected\nServer: de123");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["status"], "Connected");
        assert_eq!(parsed["server"], "de123");
    }

    #[test]
    fn test_parse_ignores_colonless_lines() {
        let parsed = parse_key_values("no colon here\nStatus: Connected\n\nanother line");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["status"], "Connected");
    }

    #[test]
    fn test_parse_splits_on_first_colon_only() {
        let parsed = parse_key_values("Current server: de123.nordvpn.com:443");
        assert_eq!(parsed["current server"], "de123.nordvpn.com:443");
    }

    #[test]
    fn test_malformed_input_degrades_to_empty() {
        assert!(parse_key_values("").is_empty());
        assert!(parse_key_values("garbage without separators").is_empty());
    }

    #[test]
    fn test_status_classification() {
        let connected = StatusSnapshot::from_cli_output("Status: Connected");
        assert_eq!(connected.status(), VpnStatus::Connected);
        assert!(connected.is_connected());

        let disconnected = StatusSnapshot::from_cli_output("Status: Disconnected");
        assert_eq!(disconnected.status(), VpnStatus::Disconnected);
        assert!(!disconnected.is_connected());

        let empty = StatusSnapshot::from_cli_output("");
        assert_eq!(empty.status(), VpnStatus::Unknown);
        assert_eq!(empty.status_text(), "Unknown");
    }

    #[test]
    fn test_decorated_connected_status_still_reads_connected() {
        let restored = StatusSnapshot::from_cli_output("Status: Connected (restored)");
        assert!(restored.is_connected());
    }

    #[test]
    fn test_ip_key_priority_order() {
        let snapshot = StatusSnapshot::from_cli_output(
            "IP: 10.0.0.1\nYour new IP: 185.1.2.3\nCurrent IP: 185.9.9.9",
        );
        assert_eq!(snapshot.current_ip(), Some("185.1.2.3"));
    }

    #[test]
    fn test_absent_markers_skip_to_next_key() {
        let snapshot = StatusSnapshot::from_cli_output("Your new IP: N/A\nCurrent IP: 185.1.2.3");
        assert_eq!(snapshot.current_ip(), Some("185.1.2.3"));

        let all_absent = StatusSnapshot::from_cli_output("Current IP: -\nServer: none");
        assert_eq!(all_absent.current_ip(), None);
        assert_eq!(all_absent.connected_server(), None);
    }

    #[test]
    fn test_connected_server_extraction() {
        let snapshot =
            StatusSnapshot::from_cli_output("Current server: de123.nordvpn.com\nServer: de999");
        assert_eq!(snapshot.connected_server(), Some("de123.nordvpn.com"));
    }
}
