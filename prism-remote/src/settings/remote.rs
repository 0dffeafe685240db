//! Remote cluster setting keys
//!
//! Every key is scoped per cluster alias. Sniff mode connects to seed nodes
//! and discovers the rest of the remote cluster; simple mode connects to a
//! fixed list of addresses (typically a load balancer).

use super::{AffixSetting, Settings};
use crate::error::RemoteError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const REMOTE_CLUSTER_COMPRESS: AffixSetting =
    AffixSetting::new("cluster.remote.", "transport.compress");

pub const REMOTE_CLUSTER_PING_SCHEDULE: AffixSetting =
    AffixSetting::new("cluster.remote.", "transport.ping_schedule");

pub const REMOTE_CONNECTION_MODE: AffixSetting = AffixSetting::new("cluster.remote.", "mode");

/// Proxy address used for all sniff connections of an alias
pub const REMOTE_CLUSTERS_PROXY: AffixSetting = AffixSetting::new("cluster.remote.", "proxy");

pub const REMOTE_CLUSTER_SEEDS: AffixSetting = AffixSetting::new("cluster.remote.", "seeds");

/// Deprecated seeds key, read only when the current key is absent
pub const REMOTE_CLUSTER_SEEDS_OLD: AffixSetting = AffixSetting::new("search.remote.", "seeds");

pub const REMOTE_NODE_CONNECTIONS: AffixSetting =
    AffixSetting::new("cluster.remote.", "node_connections");

pub const REMOTE_CLUSTER_ADDRESSES: AffixSetting =
    AffixSetting::new("cluster.remote.", "simple.addresses");

pub const REMOTE_SOCKET_CONNECTIONS: AffixSetting =
    AffixSetting::new("cluster.remote.", "simple.socket_connections");

pub const DEFAULT_NODE_CONNECTIONS: u32 = 3;
pub const DEFAULT_SOCKET_CONNECTIONS: u32 = 18;

/// The full key set a remote cluster subscription listens to
pub fn remote_cluster_settings() -> Vec<AffixSetting> {
    vec![
        REMOTE_CLUSTER_COMPRESS,
        REMOTE_CLUSTER_PING_SCHEDULE,
        REMOTE_CONNECTION_MODE,
        REMOTE_CLUSTERS_PROXY,
        REMOTE_CLUSTER_SEEDS,
        REMOTE_CLUSTER_SEEDS_OLD,
        REMOTE_NODE_CONNECTIONS,
        REMOTE_CLUSTER_ADDRESSES,
        REMOTE_SOCKET_CONNECTIONS,
    ]
}

/// How a remote cluster is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Connect to seed nodes and discover gateway nodes from them
    #[default]
    Sniff,
    /// Connect to a fixed list of addresses
    Simple,
}

impl ConnectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMode::Sniff => "sniff",
            ConnectionMode::Simple => "simple",
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionMode {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sniff" => Ok(ConnectionMode::Sniff),
            "simple" => Ok(ConnectionMode::Simple),
            other => Err(RemoteError::Settings(format!(
                "unknown remote connection mode [{}], expected [sniff] or [simple]",
                other
            ))),
        }
    }
}

/// Seed addresses for an alias, falling back to the deprecated key
pub fn seed_addresses(alias: &str, settings: &Settings) -> Vec<String> {
    let current = REMOTE_CLUSTER_SEEDS.concrete_key(alias);
    if settings.contains_key(&current) {
        settings.get_as_list(&current)
    } else {
        settings.get_as_list(&REMOTE_CLUSTER_SEEDS_OLD.concrete_key(alias))
    }
}

/// Whether the settings enable a connection for the alias.
///
/// Only the presence of addresses is checked here; malformed values are
/// rejected when the connection config is built.
pub fn is_connection_enabled(alias: &str, settings: &Settings) -> bool {
    let mode = settings
        .get(&REMOTE_CONNECTION_MODE.concrete_key(alias))
        .and_then(|raw| raw.parse::<ConnectionMode>().ok())
        .unwrap_or_default();

    match mode {
        ConnectionMode::Sniff => !seed_addresses(alias, settings).is_empty(),
        ConnectionMode::Simple => !settings
            .get_as_list(&REMOTE_CLUSTER_ADDRESSES.concrete_key(alias))
            .is_empty(),
    }
}

/// Aliases whose connection is enabled in these settings
pub fn enabled_remote_clusters(settings: &Settings) -> BTreeSet<String> {
    AffixSetting::group_namespaces(&remote_cluster_settings(), settings)
        .into_iter()
        .filter(|alias| is_connection_enabled(alias, settings))
        .collect()
}
