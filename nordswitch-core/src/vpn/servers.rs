//! Server table keyed by station IP
//!
//! Built once from an externally supplied server list (the NordVPN
//! recommendations API JSON deserializes straight into
//! [`ServerRecord`]), replaced wholesale on rebuild, and read-only in
//! between. Keys are always canonical IP strings.

use crate::vpn::ip::normalize_ip;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One server as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    /// Station (exit) IP of the server
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Server metadata stored under its canonical station IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLookupEntry {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub hostname: Option<String>,
    pub station: Option<String>,
    pub status: Option<String>,
}

impl ServerLookupEntry {
    /// Preferred display form: hostname, falling back to name
    pub fn display_server(&self) -> Option<&str> {
        self.hostname.as_deref().or(self.name.as_deref())
    }
}

/// Lookup table from canonical station IP to server metadata
#[derive(Debug, Clone, Default)]
pub struct ServerIpLookup {
    entries: HashMap<String, ServerLookupEntry>,
}

impl ServerIpLookup {
    /// Build the table, skipping records without a usable station IP
    pub fn from_records(records: &[ServerRecord]) -> Self {
        let mut entries = HashMap::new();
        for record in records {
            let Some(station) = record.station.as_deref().and_then(normalize_ip) else {
                continue;
            };
            entries.insert(
                station,
                ServerLookupEntry {
                    id: record.id,
                    name: record.name.clone(),
                    hostname: record.hostname.clone(),
                    station: record.station.clone(),
                    status: record.status.clone(),
                },
            );
        }
        debug!(servers = entries.len(), "Built server IP lookup table");
        Self { entries }
    }

    /// Look up by raw IP text; normalization happens here
    pub fn lookup_ip(&self, raw: &str) -> Option<&ServerLookupEntry> {
        let canonical = normalize_ip(raw)?;
        self.entries.get(&canonical)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
