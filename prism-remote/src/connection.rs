//! Per-alias remote connection state
//!
//! [`RemoteClusterService`] is the [`RemoteClusterHook`] used by nodes: it
//! turns the settings of one alias into a typed [`RemoteConnectionConfig`]
//! and creates, replaces or tears down the alias's connection entry.
//!
//! Each entry is an immutable `Arc<RemoteClusterConnection>`; an update
//! swaps the whole `Arc`, so a reader holding an entry always sees one
//! consistent configuration.

use crate::error::{RemoteError, Result};
use crate::grouping::REMOTE_CLUSTER_INDEX_SEPARATOR;
use crate::metrics;
use crate::registry::RemoteClusterHook;
use crate::settings::{
    seed_addresses, ConnectionMode, Settings, TimeValue, DEFAULT_NODE_CONNECTIONS,
    DEFAULT_SOCKET_CONNECTIONS, REMOTE_CLUSTERS_PROXY, REMOTE_CLUSTER_ADDRESSES,
    REMOTE_CLUSTER_COMPRESS, REMOTE_CLUSTER_PING_SCHEDULE, REMOTE_CONNECTION_MODE,
    REMOTE_NODE_CONNECTIONS, REMOTE_SOCKET_CONNECTIONS,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Mode-specific connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ConnectionStrategy {
    Sniff {
        seeds: Vec<String>,
        proxy: Option<String>,
        node_connections: u32,
    },
    Simple {
        addresses: Vec<String>,
        socket_connections: u32,
    },
}

impl ConnectionStrategy {
    pub fn mode(&self) -> ConnectionMode {
        match self {
            ConnectionStrategy::Sniff { .. } => ConnectionMode::Sniff,
            ConnectionStrategy::Simple { .. } => ConnectionMode::Simple,
        }
    }
}

/// Typed connection configuration for one remote cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteConnectionConfig {
    pub alias: String,
    #[serde(flatten)]
    pub strategy: ConnectionStrategy,
    pub compress: bool,
    pub ping_schedule: TimeValue,
}

impl RemoteConnectionConfig {
    /// Build the configuration for an alias.
    ///
    /// Returns `Ok(None)` when the settings leave the alias without seeds
    /// (sniff) or addresses (simple), i.e. the alias is disabled.
    pub fn from_settings(alias: &str, settings: &Settings) -> Result<Option<Self>> {
        if alias.contains(REMOTE_CLUSTER_INDEX_SEPARATOR) {
            return Err(RemoteError::Settings(format!(
                "remote cluster alias [{}] must not contain [{}]",
                alias, REMOTE_CLUSTER_INDEX_SEPARATOR
            )));
        }

        let mode = match settings.get(&REMOTE_CONNECTION_MODE.concrete_key(alias)) {
            Some(raw) => raw.parse()?,
            None => ConnectionMode::default(),
        };

        let strategy = match mode {
            ConnectionMode::Sniff => {
                let seeds = seed_addresses(alias, settings);
                if seeds.is_empty() {
                    return Ok(None);
                }
                for seed in &seeds {
                    validate_address(alias, seed)?;
                }

                let proxy = settings
                    .get(&REMOTE_CLUSTERS_PROXY.concrete_key(alias))
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string);
                if let Some(proxy) = &proxy {
                    validate_address(alias, proxy)?;
                }

                let node_connections = positive(
                    alias,
                    &REMOTE_NODE_CONNECTIONS.concrete_key(alias),
                    settings.get_as_u32(
                        &REMOTE_NODE_CONNECTIONS.concrete_key(alias),
                        DEFAULT_NODE_CONNECTIONS,
                    )?,
                )?;

                ConnectionStrategy::Sniff {
                    seeds,
                    proxy,
                    node_connections,
                }
            }
            ConnectionMode::Simple => {
                let addresses =
                    settings.get_as_list(&REMOTE_CLUSTER_ADDRESSES.concrete_key(alias));
                if addresses.is_empty() {
                    return Ok(None);
                }
                for address in &addresses {
                    validate_address(alias, address)?;
                }

                let socket_connections = positive(
                    alias,
                    &REMOTE_SOCKET_CONNECTIONS.concrete_key(alias),
                    settings.get_as_u32(
                        &REMOTE_SOCKET_CONNECTIONS.concrete_key(alias),
                        DEFAULT_SOCKET_CONNECTIONS,
                    )?,
                )?;

                ConnectionStrategy::Simple {
                    addresses,
                    socket_connections,
                }
            }
        };

        let compress = settings.get_as_bool(&REMOTE_CLUSTER_COMPRESS.concrete_key(alias), false)?;
        let ping_schedule = settings.get_as_time(
            &REMOTE_CLUSTER_PING_SCHEDULE.concrete_key(alias),
            TimeValue::MINUS_ONE,
        )?;

        Ok(Some(Self {
            alias: alias.to_string(),
            strategy,
            compress,
            ping_schedule,
        }))
    }

    pub fn mode(&self) -> ConnectionMode {
        self.strategy.mode()
    }
}

fn positive(alias: &str, key: &str, value: u32) -> Result<u32> {
    if value == 0 {
        return Err(RemoteError::Settings(format!(
            "setting [{}] for remote cluster [{}] must be >= 1",
            key, alias
        )));
    }
    Ok(value)
}

/// Check that an address has the form `host:port`
fn validate_address(alias: &str, address: &str) -> Result<()> {
    let invalid = || {
        RemoteError::Settings(format!(
            "invalid address [{}] for remote cluster [{}], expected host:port",
            address, alias
        ))
    };
    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}

/// Materialized connection state for one alias
#[derive(Debug, Clone, Serialize)]
pub struct RemoteClusterConnection {
    config: RemoteConnectionConfig,
    generation: u64,
}

impl RemoteClusterConnection {
    pub fn alias(&self) -> &str {
        &self.config.alias
    }

    pub fn config(&self) -> &RemoteConnectionConfig {
        &self.config
    }

    /// Incremented every time an alias's connection is (re)built
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Events emitted when connection state changes
#[derive(Debug, Clone)]
pub enum RemoteClusterEvent {
    /// A new alias was configured
    Connected(Arc<RemoteClusterConnection>),

    /// An existing alias was reconfigured
    Updated(Arc<RemoteClusterConnection>),

    /// An alias was disabled and its connection closed
    Disconnected(String),
}

/// Holds the connection state of every configured remote cluster
pub struct RemoteClusterService {
    connections: RwLock<HashMap<String, Arc<RemoteClusterConnection>>>,
    generation: AtomicU64,
    event_tx: broadcast::Sender<RemoteClusterEvent>,
}

impl Default for RemoteClusterService {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteClusterService {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            connections: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            event_tx,
        }
    }

    /// Subscribe to connection events
    pub fn subscribe(&self) -> broadcast::Receiver<RemoteClusterEvent> {
        self.event_tx.subscribe()
    }

    /// Current connection for an alias
    pub fn get_connection(&self, alias: &str) -> Option<Arc<RemoteClusterConnection>> {
        self.connections.read().get(alias).cloned()
    }

    pub fn is_connected(&self, alias: &str) -> bool {
        self.connections.read().contains_key(alias)
    }

    /// All current connections, sorted by alias
    pub fn connections(&self) -> Vec<Arc<RemoteClusterConnection>> {
        let mut all: Vec<_> = self.connections.read().values().cloned().collect();
        all.sort_by(|a, b| a.alias().cmp(b.alias()));
        all
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn disconnect(&self, alias: &str) {
        let removed = self.connections.write().remove(alias);
        match removed {
            Some(old) => {
                info!(alias = %alias, generation = old.generation, "Closed remote cluster connection");
                metrics::record_connection_change("closed");
                let _ = self
                    .event_tx
                    .send(RemoteClusterEvent::Disconnected(alias.to_string()));
            }
            None => {
                debug!(alias = %alias, "Remote cluster not configured, nothing to close");
            }
        }
    }

    fn connect(&self, config: RemoteConnectionConfig) {
        let alias = config.alias.clone();
        let event = {
            let mut connections = self.connections.write();
            let existing = connections.get(&alias).cloned();

            if let Some(existing) = &existing {
                if existing.config == config {
                    debug!(alias = %alias, "Remote cluster settings unchanged");
                    return;
                }
            }

            let connection = Arc::new(RemoteClusterConnection {
                config,
                generation: self.next_generation(),
            });
            connections.insert(alias.clone(), Arc::clone(&connection));

            if existing.is_some() {
                RemoteClusterEvent::Updated(connection)
            } else {
                RemoteClusterEvent::Connected(connection)
            }
        };

        match &event {
            RemoteClusterEvent::Connected(c) => {
                info!(
                    alias = %alias,
                    mode = %c.config.mode(),
                    generation = c.generation,
                    "Opened remote cluster connection"
                );
                metrics::record_connection_change("opened");
            }
            RemoteClusterEvent::Updated(c) => {
                info!(
                    alias = %alias,
                    mode = %c.config.mode(),
                    generation = c.generation,
                    "Rebuilt remote cluster connection"
                );
                metrics::record_connection_change("rebuilt");
            }
            RemoteClusterEvent::Disconnected(_) => {}
        }

        let _ = self.event_tx.send(event);
    }
}

#[async_trait]
impl RemoteClusterHook for RemoteClusterService {
    async fn update_remote_cluster(&self, alias: &str, settings: &Settings) -> Result<()> {
        match RemoteConnectionConfig::from_settings(alias, settings)? {
            Some(config) => self.connect(config),
            None => self.disconnect(alias),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniff_settings(alias: &str, seeds: &str) -> Settings {
        Settings::builder()
            .put(format!("cluster.remote.{}.seeds", alias), seeds)
            .build()
    }

    #[test]
    fn test_sniff_config_defaults() {
        let config = RemoteConnectionConfig::from_settings("east", &sniff_settings("east", "10.0.0.1:9300"))
            .unwrap()
            .unwrap();

        assert_eq!(config.mode(), ConnectionMode::Sniff);
        assert!(!config.compress);
        assert_eq!(config.ping_schedule, TimeValue::MINUS_ONE);
        assert_eq!(
            config.strategy,
            ConnectionStrategy::Sniff {
                seeds: vec!["10.0.0.1:9300".into()],
                proxy: None,
                node_connections: DEFAULT_NODE_CONNECTIONS,
            }
        );
    }

    #[test]
    fn test_simple_config() {
        let settings = Settings::builder()
            .put("cluster.remote.west.mode", "simple")
            .put("cluster.remote.west.simple.addresses", "lb.west:9300")
            .put("cluster.remote.west.simple.socket_connections", "4")
            .put("cluster.remote.west.transport.compress", "true")
            .put("cluster.remote.west.transport.ping_schedule", "30s")
            .build();

        let config = RemoteConnectionConfig::from_settings("west", &settings)
            .unwrap()
            .unwrap();

        assert_eq!(config.mode(), ConnectionMode::Simple);
        assert!(config.compress);
        assert_eq!(config.ping_schedule, TimeValue::from_secs(30));
        assert_eq!(
            config.strategy,
            ConnectionStrategy::Simple {
                addresses: vec!["lb.west:9300".into()],
                socket_connections: 4,
            }
        );
    }

    #[test]
    fn test_disabled_without_seeds() {
        let settings = Settings::builder()
            .put("cluster.remote.east.transport.compress", "true")
            .build();
        assert!(RemoteConnectionConfig::from_settings("east", &settings)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_seed = sniff_settings("east", "no-port");
        assert!(matches!(
            RemoteConnectionConfig::from_settings("east", &bad_seed),
            Err(RemoteError::Settings(_))
        ));

        let bad_mode = sniff_settings("east", "10.0.0.1:9300")
            .to_builder()
            .put("cluster.remote.east.mode", "proxy")
            .build();
        assert!(RemoteConnectionConfig::from_settings("east", &bad_mode).is_err());

        let zero = sniff_settings("east", "10.0.0.1:9300")
            .to_builder()
            .put("cluster.remote.east.node_connections", "0")
            .build();
        assert!(RemoteConnectionConfig::from_settings("east", &zero).is_err());
    }

    #[test]
    fn test_alias_with_separator_rejected() {
        let settings = sniff_settings("a:b", "10.0.0.1:9300");
        assert!(RemoteConnectionConfig::from_settings("a:b", &settings).is_err());
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("a", "host:9300").is_ok());
        assert!(validate_address("a", "[::1]:9300").is_ok());
        assert!(validate_address("a", ":9300").is_err());
        assert!(validate_address("a", "host:port").is_err());
        assert!(validate_address("a", "host:70000").is_err());
    }

    #[tokio::test]
    async fn test_connect_update_disconnect() {
        let service = RemoteClusterService::new();
        let mut events = service.subscribe();

        service
            .update_remote_cluster("east", &sniff_settings("east", "10.0.0.1:9300"))
            .await
            .unwrap();
        let first = service.get_connection("east").unwrap();
        assert!(matches!(events.try_recv().unwrap(), RemoteClusterEvent::Connected(_)));

        service
            .update_remote_cluster("east", &sniff_settings("east", "10.0.0.2:9300"))
            .await
            .unwrap();
        let second = service.get_connection("east").unwrap();
        assert!(second.generation() > first.generation());
        assert!(matches!(events.try_recv().unwrap(), RemoteClusterEvent::Updated(_)));

        // The reader's pinned entry still sees the old configuration
        assert!(matches!(
            &first.config().strategy,
            ConnectionStrategy::Sniff { seeds, .. } if seeds == &vec!["10.0.0.1:9300".to_string()]
        ));

        service
            .update_remote_cluster("east", &Settings::empty())
            .await
            .unwrap();
        assert!(!service.is_connected("east"));
        assert!(matches!(
            events.try_recv().unwrap(),
            RemoteClusterEvent::Disconnected(alias) if alias == "east"
        ));
    }

    #[tokio::test]
    async fn test_unchanged_settings_is_noop() {
        let service = RemoteClusterService::new();
        let settings = sniff_settings("east", "10.0.0.1:9300");

        service.update_remote_cluster("east", &settings).await.unwrap();
        let first = service.get_connection("east").unwrap();

        let mut events = service.subscribe();
        service.update_remote_cluster("east", &settings).await.unwrap();
        let second = service.get_connection("east").unwrap();

        assert_eq!(first.generation(), second.generation());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalid_update_keeps_previous_state() {
        let service = RemoteClusterService::new();
        service
            .update_remote_cluster("east", &sniff_settings("east", "10.0.0.1:9300"))
            .await
            .unwrap();

        let result = service
            .update_remote_cluster("east", &sniff_settings("east", "broken"))
            .await;
        assert!(result.is_err());

        let conn = service.get_connection("east").unwrap();
        assert!(matches!(
            &conn.config().strategy,
            ConnectionStrategy::Sniff { seeds, .. } if seeds[0] == "10.0.0.1:9300"
        ));
    }

    #[test]
    fn test_connections_sorted() {
        let service = RemoteClusterService::new();
        for alias in ["west", "east"] {
            let config = RemoteConnectionConfig::from_settings(alias, &sniff_settings(alias, "h:1"))
                .unwrap()
                .unwrap();
            service.connect(config);
        }
        let aliases: Vec<_> = service
            .connections()
            .iter()
            .map(|c| c.alias().to_string())
            .collect();
        assert_eq!(aliases, vec!["east", "west"]);
    }
}
