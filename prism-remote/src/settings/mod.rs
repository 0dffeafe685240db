//! Flat key/value settings snapshots
//!
//! Settings are an immutable, ordered map of dotted keys to string values,
//! e.g. `cluster.remote.east.seeds = "10.0.0.1:9300,10.0.0.2:9300"`. List
//! values are stored comma-separated and parsed on read.
//!
//! # Example
//!
//! ```ignore
//! use prism_remote::settings::Settings;
//!
//! let settings = Settings::builder()
//!     .put("cluster.remote.east.mode", "sniff")
//!     .put_list("cluster.remote.east.seeds", ["10.0.0.1:9300", "10.0.0.2:9300"])
//!     .build();
//!
//! assert_eq!(settings.get_as_list("cluster.remote.east.seeds").len(), 2);
//! ```

mod affix;
mod remote;

pub use affix::AffixSetting;
pub use remote::{
    enabled_remote_clusters, is_connection_enabled, remote_cluster_settings, seed_addresses,
    ConnectionMode, DEFAULT_NODE_CONNECTIONS, DEFAULT_SOCKET_CONNECTIONS,
    REMOTE_CLUSTERS_PROXY, REMOTE_CLUSTER_ADDRESSES, REMOTE_CLUSTER_COMPRESS,
    REMOTE_CLUSTER_PING_SCHEDULE, REMOTE_CLUSTER_SEEDS, REMOTE_CLUSTER_SEEDS_OLD,
    REMOTE_CONNECTION_MODE, REMOTE_NODE_CONNECTIONS, REMOTE_SOCKET_CONNECTIONS,
};

use crate::error::{RemoteError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Immutable settings snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Create an empty settings snapshot
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a settings snapshot
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Copy this snapshot into a builder for modification
    pub fn to_builder(&self) -> SettingsBuilder {
        SettingsBuilder {
            values: self.values.clone(),
        }
    }

    /// Get the raw value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Get a comma-separated list value. Missing keys yield an empty list.
    pub fn get_as_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get a boolean value, accepting only `true` and `false`
    pub fn get_as_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(other) => Err(RemoteError::Settings(format!(
                "failed to parse value [{}] as only [true] or [false] are allowed for [{}]",
                other, key
            ))),
        }
    }

    /// Get an unsigned integer value
    pub fn get_as_u32(&self, key: &str, default: u32) -> Result<u32> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                RemoteError::Settings(format!("failed to parse value [{}] for [{}]", raw, key))
            }),
        }
    }

    /// Get a time value such as `30s` or `-1`
    pub fn get_as_time(&self, key: &str, default: TimeValue) -> Result<TimeValue> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => TimeValue::parse(raw).map_err(|e| {
                RemoteError::Settings(format!("failed to parse setting [{}]: {}", key, e))
            }),
        }
    }

    /// Keep only the entries whose key satisfies the predicate
    pub fn filter<F>(&self, mut predicate: F) -> Settings
    where
        F: FnMut(&str) -> bool,
    {
        Settings {
            values: self
                .values
                .iter()
                .filter(|(k, _)| predicate(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Keep only the entries under the given key prefix
    pub fn filter_prefix(&self, prefix: &str) -> Settings {
        self.filter(|k| k.starts_with(prefix))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Settings
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Settings {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Builder for [`Settings`]
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    values: BTreeMap<String, String>,
}

impl SettingsBuilder {
    pub fn put(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Store a list value as a comma-separated string
    pub fn put_list<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.values.insert(key.into(), joined);
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.values.remove(key);
        self
    }

    pub fn build(self) -> Settings {
        Settings {
            values: self.values,
        }
    }
}

/// A duration setting where `-1` means "disabled"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeValue {
    millis: i64,
}

impl TimeValue {
    /// The disabled value
    pub const MINUS_ONE: TimeValue = TimeValue { millis: -1 };

    pub const fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self {
            millis: secs * 1000,
        }
    }

    pub fn millis(&self) -> i64 {
        self.millis
    }

    /// The duration, or `None` when disabled
    pub fn as_duration(&self) -> Option<Duration> {
        u64::try_from(self.millis).ok().map(Duration::from_millis)
    }

    /// Parse `-1`, `0`, or a number followed by one of `ms`, `s`, `m`, `h`, `d`
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let raw = raw.trim();
        match raw {
            "-1" => return Ok(Self::MINUS_ONE),
            "0" => return Ok(Self::from_millis(0)),
            _ => {}
        }

        let split = raw
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in time value [{}]", raw))?;
        let (number, unit) = raw.split_at(split);
        let number: i64 = number
            .parse()
            .map_err(|_| format!("invalid number in time value [{}]", raw))?;

        let factor = match unit {
            "ms" => 1,
            "s" => 1000,
            "m" => 60 * 1000,
            "h" => 60 * 60 * 1000,
            "d" => 24 * 60 * 60 * 1000,
            other => return Err(format!("unknown time unit [{}] in [{}]", other, raw)),
        };

        number
            .checked_mul(factor)
            .map(Self::from_millis)
            .ok_or_else(|| format!("time value [{}] overflows", raw))
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis < 0 {
            write!(f, "-1")
        } else if self.millis % 1000 == 0 {
            write!(f, "{}s", self.millis / 1000)
        } else {
            write!(f, "{}ms", self.millis)
        }
    }
}
