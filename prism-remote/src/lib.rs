//! Prism Remote - cross-cluster alias resolution and index routing
//!
//! This crate lets a Prism node address independently administered remote
//! clusters by alias (`east:logs-*`) and keeps its view of those clusters in
//! sync with dynamic settings.
//!
//! # Architecture
//!
//! - **Resolver**: resolves alias expressions (`east`, `eu-*`) against the known aliases
//! - **Grouping**: splits mixed index expressions into per-cluster groups
//! - **Settings**: flat settings snapshots and the per-alias remote cluster keys
//! - **Cluster settings**: dynamic settings store with grouped change notification
//! - **Registry**: validates settings changes and publishes the enabled alias set
//! - **Connection**: per-alias connection state built from settings
//!
//! # Key Operations
//!
//! - `group_cluster_indices`: `["east:logs", "logs"]` → `{"east": ["logs"], "": ["logs"]}`
//! - `build_remote_index_name`: `("east", "logs")` → `"east:logs"`
//! - `validate_and_update_remote_cluster`: apply one alias's settings
//! - `listen_for_updates`: subscribe the registry to dynamic settings

pub mod cluster_settings;
pub mod config;
pub mod connection;
pub mod error;
pub mod grouping;
pub mod metrics;
pub mod registry;
pub mod resolver;
pub mod settings;

pub use cluster_settings::{AffixGroupConsumer, ClusterSettings};
pub use config::{LoggingConfig, RemoteClusterConfig, RemoteConfig};
pub use connection::{
    ConnectionStrategy, RemoteClusterConnection, RemoteClusterEvent, RemoteClusterService,
    RemoteConnectionConfig,
};
pub use error::{RemoteError, Result};
pub use grouping::{
    build_remote_index_name, split_index_name, GroupedIndices, IndexGrouper,
    LOCAL_CLUSTER_GROUP_KEY, REMOTE_CLUSTER_INDEX_SEPARATOR,
};
pub use registry::{RemoteClusterHook, RemoteClusterRegistry, RemoteClusterState};
pub use resolver::{ClusterNameResolver, WildcardResolver};
pub use settings::{AffixSetting, ConnectionMode, Settings, SettingsBuilder, TimeValue};
