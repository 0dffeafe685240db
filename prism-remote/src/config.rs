//! Remote cluster configuration
//!
//! Node-level configuration is read from TOML and flattened into the dotted
//! [`Settings`] keys the registry consumes:
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "pretty"
//!
//! [remote.east]
//! seeds = ["10.0.0.1:9300", "10.0.0.2:9300"]
//! compress = true
//! ping_schedule = "30s"
//!
//! [remote.west]
//! mode = "simple"
//! addresses = ["lb.west.internal:9300"]
//! socket_connections = 6
//!
//! [settings]
//! "search.remote.legacy.seeds" = "10.1.0.1:9300"
//! ```

use crate::error::{RemoteError, Result};
use crate::grouping::REMOTE_CLUSTER_INDEX_SEPARATOR;
use crate::settings::{
    ConnectionMode, Settings, SettingsBuilder, REMOTE_CLUSTERS_PROXY, REMOTE_CLUSTER_ADDRESSES,
    REMOTE_CLUSTER_COMPRESS, REMOTE_CLUSTER_PING_SCHEDULE, REMOTE_CLUSTER_SEEDS,
    REMOTE_CONNECTION_MODE, REMOTE_NODE_CONNECTIONS, REMOTE_SOCKET_CONNECTIONS,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Remote clusters keyed by alias
    #[serde(default)]
    pub remote: BTreeMap<String, RemoteClusterConfig>,

    /// Raw settings passed through unchanged
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_level")]
    pub level: String,

    /// Log output format: "pretty" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

/// Connection settings for one remote cluster
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteClusterConfig {
    pub mode: Option<ConnectionMode>,

    /// Seed node addresses (sniff mode)
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Proxy address for sniff connections
    pub proxy: Option<String>,

    /// Connections per gateway node (sniff mode)
    pub node_connections: Option<u32>,

    /// Fixed addresses (simple mode)
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Socket connections (simple mode)
    pub socket_connections: Option<u32>,

    pub compress: Option<bool>,

    /// Ping interval such as "30s"; "-1" disables pings
    pub ping_schedule: Option<String>,
}

impl RemoteClusterConfig {
    fn write_settings(&self, alias: &str, mut builder: SettingsBuilder) -> SettingsBuilder {
        if let Some(mode) = self.mode {
            builder = builder.put(REMOTE_CONNECTION_MODE.concrete_key(alias), mode.as_str());
        }
        if !self.seeds.is_empty() {
            builder = builder.put_list(REMOTE_CLUSTER_SEEDS.concrete_key(alias), &self.seeds);
        }
        if let Some(proxy) = &self.proxy {
            builder = builder.put(REMOTE_CLUSTERS_PROXY.concrete_key(alias), proxy.as_str());
        }
        if let Some(n) = self.node_connections {
            builder = builder.put(REMOTE_NODE_CONNECTIONS.concrete_key(alias), n.to_string());
        }
        if !self.addresses.is_empty() {
            builder =
                builder.put_list(REMOTE_CLUSTER_ADDRESSES.concrete_key(alias), &self.addresses);
        }
        if let Some(n) = self.socket_connections {
            builder = builder.put(REMOTE_SOCKET_CONNECTIONS.concrete_key(alias), n.to_string());
        }
        if let Some(compress) = self.compress {
            builder = builder.put(REMOTE_CLUSTER_COMPRESS.concrete_key(alias), compress.to_string());
        }
        if let Some(ping) = &self.ping_schedule {
            builder = builder.put(REMOTE_CLUSTER_PING_SCHEDULE.concrete_key(alias), ping.as_str());
        }
        builder
    }
}

impl RemoteConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject aliases that cannot round-trip through dotted settings keys
    pub fn validate(&self) -> Result<()> {
        for alias in self.remote.keys() {
            if alias.is_empty()
                || alias.contains('.')
                || alias.contains(REMOTE_CLUSTER_INDEX_SEPARATOR)
            {
                return Err(RemoteError::Config(format!(
                    "invalid remote cluster alias [{}]: must be non-empty and contain neither '.' nor '{}'",
                    alias, REMOTE_CLUSTER_INDEX_SEPARATOR
                )));
            }
        }
        Ok(())
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a file, or use defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Flatten into dotted settings keys
    pub fn to_settings(&self) -> Result<Settings> {
        self.validate()?;
        let mut builder = Settings::builder();
        for (key, value) in &self.settings {
            builder = builder.put(key.as_str(), value.as_str());
        }
        for (alias, cluster) in &self.remote {
            builder = cluster.write_settings(alias, builder);
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::enabled_remote_clusters;

    const SAMPLE: &str = r#"
[logging]
level = "debug"

[remote.east]
seeds = ["10.0.0.1:9300", "10.0.0.2:9300"]
compress = true
ping_schedule = "30s"

[remote.west]
mode = "simple"
addresses = ["lb.west:9300"]
socket_connections = 6

[settings]
"search.remote.legacy.seeds" = "10.1.0.1:9300"
"#;

    #[test]
    fn test_parse_and_flatten() {
        let config = RemoteConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.remote.len(), 2);

        let settings = config.to_settings().unwrap();
        assert_eq!(
            settings.get("cluster.remote.east.seeds"),
            Some("10.0.0.1:9300,10.0.0.2:9300")
        );
        assert_eq!(settings.get("cluster.remote.east.transport.compress"), Some("true"));
        assert_eq!(settings.get("cluster.remote.west.mode"), Some("simple"));
        assert_eq!(settings.get("cluster.remote.west.simple.socket_connections"), Some("6"));

        let enabled: Vec<_> = enabled_remote_clusters(&settings).into_iter().collect();
        assert_eq!(enabled, vec!["east", "legacy", "west"]);
    }

    #[test]
    fn test_empty_config() {
        let config = RemoteConfig::from_toml_str("").unwrap();
        assert!(config.remote.is_empty());
        assert!(config.to_settings().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_mode() {
        let err = RemoteConfig::from_toml_str("[remote.east]\nmode = \"proxy\"\n").unwrap_err();
        assert!(matches!(err, RemoteError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = RemoteConfig::load_or_default(Path::new("/nonexistent/prism-remote.toml")).unwrap();
        assert!(config.remote.is_empty());
    }

    #[test]
    fn test_invalid_alias_names() {
        for table in ["[remote.\"eu.west\"]", "[remote.\"eu:west\"]", "[remote.\"\"]"] {
            let content = format!("{}\nseeds = [\"10.0.0.1:9300\"]\n", table);
            let err = RemoteConfig::from_toml_str(&content).unwrap_err();
            assert!(matches!(err, RemoteError::Config(_)), "accepted {}", table);
        }
    }

    #[test]
    fn test_to_settings_rejects_dotted_alias() {
        let mut config = RemoteConfig::default();
        config.remote.insert(
            "eu.west".into(),
            RemoteClusterConfig {
                seeds: vec!["10.0.0.1:9300".into()],
                ..Default::default()
            },
        );
        assert!(matches!(config.to_settings(), Err(RemoteError::Config(_))));
    }
}
