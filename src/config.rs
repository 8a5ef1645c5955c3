use std::{collections::HashSet, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;

use crate::sync::{FailureCountMode, SyncOptions};

#[derive(Debug)]
pub struct Config {
    pub db_connection_string: String,
    pub bind_addr: String,
    pub servers_file: String,
    pub servers: Vec<ServerConnection>,
    /// Zero disables the background pass.
    pub sync_interval: Duration,
    /// Zero disables releasing abandoned `SYNCING` records.
    pub syncing_lease: Duration,
    pub legacy_failure_count: bool,
}

/// One authenticated server the device keeps reading history with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConnection {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub base_url: String,
    #[serde(default)]
    pub auth: ServerAuth,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerAuth {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

const DEFAULT_DB_CONNECTION_STRING: &str = "sqlite://progress.sqlite?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SERVERS_FILE: &str = "servers.yaml";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_SYNCING_LEASE_SECS: u64 = 900;

fn env_secs(name: &str, default: u64) -> anyhow::Result<Duration> {
    match std::env::var(name) {
        Ok(raw) => {
            let secs = raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid {}: {}", name, raw))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let db_connection_string =
            std::env::var("DB_CONNECTION_STRING").unwrap_or(DEFAULT_DB_CONNECTION_STRING.into());
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR.into());
        let servers_file = std::env::var("SERVERS_FILE").unwrap_or(DEFAULT_SERVERS_FILE.into());
        let servers = if Path::new(&servers_file).exists() {
            let raw = std::fs::read_to_string(&servers_file)
                .with_context(|| format!("Failed to read {}", servers_file))?;
            parse_servers(&raw).with_context(|| format!("Invalid servers file {}", servers_file))?
        } else {
            tracing::warn!(%servers_file, "servers file not found, no server will be synced");
            vec![]
        };

        Ok(Config {
            db_connection_string,
            bind_addr,
            servers_file,
            servers,
            sync_interval: env_secs("SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS)?,
            syncing_lease: env_secs("SYNCING_LEASE_SECS", DEFAULT_SYNCING_LEASE_SECS)?,
            legacy_failure_count: env_flag("LEGACY_FAILURE_COUNT"),
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.id.trim().is_empty() {
                return Err("server id is missing".into());
            }
            if server.base_url.trim().is_empty() {
                return Err(format!("base_url is missing for server {}", server.id));
            }
            if !seen.insert(server.id.as_str()) {
                return Err(format!("server {} is configured twice", server.id));
            }
        }
        Ok(())
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            failure_count: if self.legacy_failure_count {
                FailureCountMode::Legacy
            } else {
                FailureCountMode::Actual
            },
            syncing_lease: (!self.syncing_lease.is_zero()).then_some(self.syncing_lease),
        }
    }
}

pub fn parse_servers(raw: &str) -> anyhow::Result<Vec<ServerConnection>> {
    let servers: Vec<ServerConnection> = serde_yml::from_str(raw)?;
    Ok(servers)
}
