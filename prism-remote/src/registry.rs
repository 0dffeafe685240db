//! Registry of enabled remote clusters
//!
//! The registry owns the set of enabled remote cluster aliases and keeps it
//! in sync with dynamic settings:
//!
//! ```text
//! Per-alias states: Unconfigured → Active ⇄ Updating → Unconfigured
//!
//! Transitions:
//!   unconfigured → active: first settings update enabling the alias
//!   active → updating → active: later update, applied by the hook
//!   active → unconfigured: update leaving the alias without seeds/addresses
//! ```
//!
//! Updates for the same alias are applied one at a time in arrival order;
//! updates for different aliases may run concurrently. The alias set is an
//! immutable snapshot that is republished only after the hook has finished,
//! so grouping never observes a half-applied transition.

use crate::cluster_settings::{AffixGroupConsumer, ClusterSettings};
use crate::error::{RemoteError, Result};
use crate::grouping::{GroupedIndices, IndexGrouper, LOCAL_CLUSTER_GROUP_KEY};
use crate::metrics;
use crate::resolver::ClusterNameResolver;
use crate::settings::{enabled_remote_clusters, is_connection_enabled, remote_cluster_settings, Settings};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Materializes settings changes for one alias.
///
/// Implementations must be idempotent and must have fully created, updated
/// or torn down the alias's connection state when the future completes.
#[async_trait]
pub trait RemoteClusterHook: Send + Sync {
    async fn update_remote_cluster(&self, alias: &str, settings: &Settings) -> Result<()>;
}

#[async_trait]
impl<T: RemoteClusterHook + ?Sized> RemoteClusterHook for Arc<T> {
    async fn update_remote_cluster(&self, alias: &str, settings: &Settings) -> Result<()> {
        (**self).update_remote_cluster(alias, settings).await
    }
}

/// Lifecycle state of a remote cluster alias
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteClusterState {
    /// Alias is not in the enabled set
    Unconfigured,
    /// Alias is enabled and its connection state is materialized
    Active,
    /// A settings update for the alias is being applied
    Updating,
}

impl RemoteClusterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteClusterState::Unconfigured => "unconfigured",
            RemoteClusterState::Active => "active",
            RemoteClusterState::Updating => "updating",
        }
    }
}

/// Marks an alias as updating for the lifetime of the guard
struct UpdatingGuard<'a> {
    updating: &'a Mutex<HashSet<String>>,
    alias: &'a str,
}

impl<'a> UpdatingGuard<'a> {
    fn new(updating: &'a Mutex<HashSet<String>>, alias: &'a str) -> Self {
        updating.lock().insert(alias.to_string());
        Self { updating, alias }
    }
}

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        self.updating.lock().remove(self.alias);
    }
}

/// Tracks enabled remote clusters and routes index expressions to them
pub struct RemoteClusterRegistry<H> {
    hook: H,
    grouper: IndexGrouper,
    remote_clusters: ArcSwap<BTreeSet<String>>,
    alias_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    updating: Mutex<HashSet<String>>,
}

impl<H: RemoteClusterHook> RemoteClusterRegistry<H> {
    /// Create a registry using the default wildcard resolver
    pub fn new(hook: H) -> Self {
        Self::with_grouper(hook, IndexGrouper::default())
    }

    /// Create a registry with a custom alias resolver
    pub fn with_resolver(hook: H, resolver: Arc<dyn ClusterNameResolver>) -> Self {
        Self::with_grouper(hook, IndexGrouper::new(resolver))
    }

    fn with_grouper(hook: H, grouper: IndexGrouper) -> Self {
        Self {
            hook,
            grouper,
            remote_clusters: ArcSwap::from_pointee(BTreeSet::new()),
            alias_locks: Mutex::new(HashMap::new()),
            updating: Mutex::new(HashSet::new()),
        }
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    /// Apply every remote cluster enabled in the node settings
    pub async fn initialize(&self, settings: &Settings) -> Result<()> {
        let enabled = enabled_remote_clusters(settings);
        info!(count = enabled.len(), "Initializing remote clusters");
        for alias in enabled {
            self.validate_and_update_remote_cluster(&alias, settings).await?;
        }
        Ok(())
    }

    /// Current snapshot of enabled aliases
    pub fn remote_clusters(&self) -> Arc<BTreeSet<String>> {
        self.remote_clusters.load_full()
    }

    pub fn is_remote_cluster_registered(&self, alias: &str) -> bool {
        self.remote_clusters.load().contains(alias)
    }

    /// Advisory lifecycle state of an alias.
    ///
    /// The in-flight set and the alias snapshot are read separately, so an
    /// alias finishing its first update may briefly report `Unconfigured`.
    /// Route with [`Self::remote_clusters`] or [`Self::group_indices`].
    pub fn state(&self, alias: &str) -> RemoteClusterState {
        if self.updating.lock().contains(alias) {
            RemoteClusterState::Updating
        } else if self.is_remote_cluster_registered(alias) {
            RemoteClusterState::Active
        } else {
            RemoteClusterState::Unconfigured
        }
    }

    /// Group index expressions against the current alias snapshot
    pub fn group_indices<S: AsRef<str>>(&self, indices: &[S]) -> Result<GroupedIndices> {
        let snapshot = self.remote_clusters.load_full();
        self.grouper.group_cluster_indices(&snapshot, indices)
    }

    /// Validate the alias and apply its settings through the hook.
    ///
    /// The empty alias is reserved for the local cluster and is rejected
    /// before the hook is called. Hook errors are returned unchanged and leave
    /// the alias set untouched.
    pub async fn validate_and_update_remote_cluster(
        &self,
        alias: &str,
        settings: &Settings,
    ) -> Result<()> {
        if alias == LOCAL_CLUSTER_GROUP_KEY {
            let err = RemoteError::InvalidAlias(alias.to_string());
            warn!("Rejected remote cluster settings for the empty alias");
            metrics::record_update_error(err.error_type());
            return Err(err);
        }

        let lock = self.alias_lock(alias);
        let result = {
            let _serialized = lock.lock().await;
            let _updating = UpdatingGuard::new(&self.updating, alias);

            debug!(alias = %alias, "Applying remote cluster settings");
            self.hook
                .update_remote_cluster(alias, settings)
                .await
                .map(|()| self.publish(alias, is_connection_enabled(alias, settings)))
        };
        self.release_alias_lock(alias, lock);

        match result {
            Ok(transition) => {
                info!(alias = %alias, transition = transition, "Remote cluster settings applied");
                metrics::record_update_success(transition);
                Ok(())
            }
            Err(e) => {
                warn!(alias = %alias, error = %e, "Failed to apply remote cluster settings");
                metrics::record_update_error(e.error_type());
                Err(e)
            }
        }
    }

    /// Publish the new alias set and name the transition that happened
    fn publish(&self, alias: &str, enabled: bool) -> &'static str {
        let previous = self.remote_clusters.rcu(|current| {
            let mut next: BTreeSet<String> = (**current).clone();
            if enabled {
                next.insert(alias.to_string());
            } else {
                next.remove(alias);
            }
            next
        });
        metrics::set_active_remote_clusters(self.remote_clusters.load().len());

        match (previous.contains(alias), enabled) {
            (false, true) => "added",
            (true, true) => "updated",
            (true, false) => "removed",
            (false, false) => "unchanged",
        }
    }

    fn alias_lock(&self, alias: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.alias_locks.lock().entry(alias.to_string()).or_default())
    }

    /// Drop the alias's lock entry once no other update holds or awaits it
    fn release_alias_lock(&self, alias: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.alias_locks.lock();
        if Arc::strong_count(&lock) == 2 && !self.is_remote_cluster_registered(alias) {
            locks.remove(alias);
        }
    }
}

impl<H: RemoteClusterHook + 'static> RemoteClusterRegistry<H> {
    /// Subscribe to remote cluster settings changes
    pub fn listen_for_updates(self: &Arc<Self>, cluster_settings: &ClusterSettings) {
        cluster_settings.add_affix_group_update_consumer(
            remote_cluster_settings(),
            Arc::clone(self) as Arc<dyn AffixGroupConsumer>,
        );
    }
}

#[async_trait]
impl<H: RemoteClusterHook> AffixGroupConsumer for RemoteClusterRegistry<H> {
    async fn accept(&self, namespace: &str, settings: &Settings) -> Result<()> {
        self.validate_and_update_remote_cluster(namespace, settings).await
    }
}
