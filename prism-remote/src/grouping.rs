//! Per-cluster grouping of index expressions
//!
//! A request may name indices on the local cluster (`logs`) and on remote
//! clusters (`east:logs`, `eu-*:logs`). The grouper splits such a batch into
//! one list per target cluster so the request can be fanned out.
//!
//! # Example
//!
//! ```ignore
//! let grouper = IndexGrouper::default();
//! let known = ["east", "west"].iter().map(|s| s.to_string()).collect();
//! let groups = grouper.group_cluster_indices(&known, &["east:logs-1", "logs-2"])?;
//!
//! assert_eq!(groups["east"], vec!["logs-1"]);
//! assert_eq!(groups[LOCAL_CLUSTER_GROUP_KEY], vec!["logs-2"]);
//! ```

use crate::error::Result;
use crate::metrics;
use crate::resolver::{ClusterNameResolver, WildcardResolver};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Separates the cluster alias from the index name
pub const REMOTE_CLUSTER_INDEX_SEPARATOR: char = ':';

/// Group key for indices on the local cluster
pub const LOCAL_CLUSTER_GROUP_KEY: &str = "";

/// Index names keyed by target cluster alias, local indices under [`LOCAL_CLUSTER_GROUP_KEY`]
pub type GroupedIndices = HashMap<String, Vec<String>>;

/// Groups index expressions by target cluster
#[derive(Clone)]
pub struct IndexGrouper {
    resolver: Arc<dyn ClusterNameResolver>,
}

impl Default for IndexGrouper {
    fn default() -> Self {
        Self::new(Arc::new(WildcardResolver))
    }
}

impl std::fmt::Debug for IndexGrouper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexGrouper").finish_non_exhaustive()
    }
}

impl IndexGrouper {
    pub fn new(resolver: Arc<dyn ClusterNameResolver>) -> Self {
        Self { resolver }
    }

    /// Group indices by cluster.
    ///
    /// Each name is split on the first [`REMOTE_CLUSTER_INDEX_SEPARATOR`];
    /// the alias part is resolved against `remote_clusters` and the index
    /// part is appended to every resolved alias. Names without a separator go
    /// to the local group unchanged. Order within a group follows input order.
    /// A resolution error aborts the whole call.
    pub fn group_cluster_indices<S: AsRef<str>>(
        &self,
        remote_clusters: &BTreeSet<String>,
        indices: &[S],
    ) -> Result<GroupedIndices> {
        let mut per_cluster: GroupedIndices = HashMap::new();
        let mut fan_out = 0usize;

        for index in indices {
            let index = index.as_ref();
            match split_index_name(index) {
                Some((expression, index_name)) => {
                    let clusters = self
                        .resolver
                        .resolve_cluster_names(remote_clusters, expression)
                        .inspect_err(|e| metrics::record_grouping_error(e.error_type()))?;
                    fan_out += clusters.len();
                    for cluster in clusters {
                        per_cluster
                            .entry(cluster)
                            .or_default()
                            .push(index_name.to_string());
                    }
                }
                None => {
                    per_cluster
                        .entry(LOCAL_CLUSTER_GROUP_KEY.to_string())
                        .or_default()
                        .push(index.to_string());
                }
            }
        }

        metrics::record_grouping(per_cluster.len(), fan_out);
        Ok(per_cluster)
    }
}

/// Split `alias:index` on the first separator. The alias part may be empty.
pub fn split_index_name(index: &str) -> Option<(&str, &str)> {
    index.split_once(REMOTE_CLUSTER_INDEX_SEPARATOR)
}

/// Build `alias:index`, or return `index` unchanged for the local cluster
pub fn build_remote_index_name(cluster_alias: Option<&str>, index: &str) -> String {
    match cluster_alias {
        None | Some(LOCAL_CLUSTER_GROUP_KEY) => index.to_string(),
        Some(alias) => format!("{}{}{}", alias, REMOTE_CLUSTER_INDEX_SEPARATOR, index),
    }
}
