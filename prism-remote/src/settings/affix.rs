//! Namespaced ("affix") setting keys
//!
//! An affix setting is a key template `<prefix><namespace>.<suffix>`. For
//! remote clusters the namespace is the cluster alias, so the template
//! `cluster.remote.*.seeds` expands to `cluster.remote.east.seeds` for the
//! alias `east`.

use super::Settings;
use std::collections::BTreeSet;
use std::fmt;

/// A key template scoped per namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AffixSetting {
    prefix: &'static str,
    suffix: &'static str,
}

impl AffixSetting {
    /// `prefix` must end with `.`; `suffix` must not start with one
    pub const fn new(prefix: &'static str, suffix: &'static str) -> Self {
        Self { prefix, suffix }
    }

    /// The concrete key for a namespace
    pub fn concrete_key(&self, namespace: &str) -> String {
        format!("{}{}.{}", self.prefix, namespace, self.suffix)
    }

    /// Extract the namespace from a concrete key, if the key matches this template.
    ///
    /// The namespace may be empty (`cluster.remote..seeds`); callers decide
    /// whether that is acceptable.
    pub fn namespace_of<'a>(&self, key: &'a str) -> Option<&'a str> {
        let namespace = key
            .strip_prefix(self.prefix)?
            .strip_suffix(self.suffix)?
            .strip_suffix('.')?;
        if namespace.contains('.') {
            return None;
        }
        Some(namespace)
    }

    /// All namespaces present for this template in the settings
    pub fn namespaces(&self, settings: &Settings) -> BTreeSet<String> {
        settings
            .keys()
            .filter_map(|k| self.namespace_of(k))
            .map(str::to_string)
            .collect()
    }

    /// All namespaces present for any template of a group
    pub fn group_namespaces(group: &[AffixSetting], settings: &Settings) -> BTreeSet<String> {
        group
            .iter()
            .flat_map(|setting| setting.namespaces(settings))
            .collect()
    }

    /// The full view of a group's keys for one namespace
    pub fn group_view(group: &[AffixSetting], namespace: &str, settings: &Settings) -> Settings {
        settings.filter(|key| {
            group
                .iter()
                .any(|setting| setting.namespace_of(key) == Some(namespace))
        })
    }
}

impl fmt::Display for AffixSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*.{}", self.prefix, self.suffix)
    }
}
