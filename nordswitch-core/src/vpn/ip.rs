//! IP canonicalization and public-IP resolution
//!
//! The Windows client exposes no status output, so connectivity is
//! inferred by resolving the current public IP through the NordVPN
//! insights endpoint and matching it against a known server table.
//! Both sides of that match go through [`normalize_ip`] first.

use crate::error::{CliError, Result, SwitchError};
use crate::vpn::status::is_absent_marker;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// NordVPN helper endpoint returning the caller's public IP
pub const DEFAULT_INSIGHTS_ENDPOINT: &str = "https://api.nordvpn.com/v1/helpers/ips/insights";

/// Default timeout for the insights lookup
pub const INSIGHTS_TIMEOUT: Duration = Duration::from_secs(20);

/// Normalize an IP string to canonical form
///
/// Strips IPv6 zone identifiers and CIDR suffixes, unwraps bracketed IPv6
/// literals, and reduces `host:port` to the host when exactly one colon
/// appears alongside a dot (IPv4-with-port). Returns `None` when the
/// remainder does not parse as an IP address or the input is an absent
/// marker.
pub fn normalize_ip(value: &str) -> Option<String> {
    let mut candidate = value.trim();
    if is_absent_marker(candidate) {
        return None;
    }

    if let Some(inner) = candidate
        .strip_prefix('[')
        .and_then(|rest| rest.split(']').next())
    {
        candidate = inner;
    }

    if let Some((host, _zone)) = candidate.split_once('%') {
        candidate = host;
    }

    if let Some((host, _prefix)) = candidate.split_once('/') {
        candidate = host;
    }

    if let Ok(ip) = candidate.parse::<IpAddr>() {
        return Some(ip.to_string());
    }

    // IPv4-with-port heuristic: "1.2.3.4:443" has one colon and a dot
    if candidate.matches(':').count() == 1 && candidate.contains('.') {
        let host = candidate.rsplit_once(':').map(|(host, _port)| host)?;
        return host.parse::<IpAddr>().ok().map(|ip| ip.to_string());
    }

    None
}

#[derive(Debug, Deserialize)]
struct IpInsights {
    ip: Option<String>,
}

/// Client for the NordVPN public-IP insights endpoint
#[derive(Debug, Clone)]
pub struct IpInsightsClient {
    client: reqwest::Client,
    endpoint: String,
}

impl IpInsightsClient {
    /// Create a client for the given endpoint URL
    ///
    /// The endpoint must be an HTTP or HTTPS URL; anything else is a
    /// configuration-level mistake and is rejected up front.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        let url = Url::parse(&endpoint).map_err(|e| {
            SwitchError::Config(crate::error::ConfigError::ValidationError {
                message: format!("Invalid insights endpoint '{}': {}", endpoint, e),
            })
        })?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(SwitchError::Config(
                    crate::error::ConfigError::ValidationError {
                        message: format!(
                            "Only HTTP/HTTPS insights endpoints are supported, got: {}",
                            scheme
                        ),
                    },
                ));
            }
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| {
                SwitchError::Config(crate::error::ConfigError::ValidationError {
                    message: format!("Failed to create HTTP client: {}", e),
                })
            })?;

        Ok(Self { client, endpoint })
    }

    /// Client for the production NordVPN endpoint
    pub fn nordvpn() -> Result<Self> {
        Self::new(DEFAULT_INSIGHTS_ENDPOINT, INSIGHTS_TIMEOUT)
    }

    /// Resolve the current public-facing IP
    ///
    /// Returns `None` when the endpoint answers without a usable `ip`
    /// field. Network failures surface as [`CliError::IpLookupFailed`].
    pub async fn public_ip(&self) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| CliError::IpLookupFailed {
                reason: e.to_string(),
            })?;

        let payload: IpInsights =
            response.json().await.map_err(|e| CliError::IpLookupFailed {
                reason: format!("malformed insights response: {}", e),
            })?;

        let ip = payload
            .ip
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        debug!(ip = ?ip, "Resolved public IP from insights endpoint");
        Ok(ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain_ipv4() {
        assert_eq!(normalize_ip("10.0.0.1"), Some("10.0.0.1".to_string()));
    }

    #[test]
    fn test_normalize_strips_cidr_suffix() {
        assert_eq!(normalize_ip("10.0.0.1/24"), Some("10.0.0.1".to_string()));
    }

    #[test]
    fn test_normalize_unwraps_brackets() {
        assert_eq!(normalize_ip("[::1]"), Some("::1".to_string()));
        assert_eq!(normalize_ip("[::1]:8080"), Some("::1".to_string()));
    }

    #[test]
    fn test_normalize_strips_zone_id() {
        assert_eq!(normalize_ip("fe80::1%eth0"), Some("fe80::1".to_string()));
    }

    #[test]
    fn test_normalize_ipv4_with_port() {
        assert_eq!(normalize_ip("1.2.3.4:443"), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(normalize_ip("not-an-ip"), None);
        assert_eq!(normalize_ip("999.1.1.1"), None);
        assert_eq!(normalize_ip("host.example.com:443"), None);
    }

    #[test]
    fn test_normalize_absent_markers() {
        assert_eq!(normalize_ip(""), None);
        assert_eq!(normalize_ip("N/A"), None);
        assert_eq!(normalize_ip("-"), None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let canonical = normalize_ip("[fe80::1%eth0]").or(normalize_ip("fe80::1%eth0")).unwrap();
        assert_eq!(normalize_ip(&canonical), Some(canonical.clone()));
    }

    #[test]
    fn test_insights_client_rejects_non_http_endpoint() {
        let result = IpInsightsClient::new("ftp://example.com/ip", Duration::from_secs(5));
        assert!(result.is_err());
    }
}
