//! Cluster alias expression resolution
//!
//! Resolves an alias expression such as `east`, `eu-*` or `*` against the
//! set of registered remote cluster aliases.

use crate::error::{RemoteError, Result};
use std::collections::BTreeSet;

/// Resolves alias expressions against a set of known aliases.
///
/// Implementations must be pure over the alias set they are given.
pub trait ClusterNameResolver: Send + Sync {
    /// Resolve an expression to the concrete aliases it names.
    ///
    /// Returns [`RemoteError::NoSuchRemoteCluster`] when a non-wildcard
    /// expression names no known alias. A wildcard matching nothing is an
    /// empty list.
    fn resolve_cluster_names(
        &self,
        remote_clusters: &BTreeSet<String>,
        expression: &str,
    ) -> Result<Vec<String>>;
}

/// Default resolver supporting exact names and `*` wildcards
#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardResolver;

impl WildcardResolver {
    pub fn new() -> Self {
        Self
    }
}

impl ClusterNameResolver for WildcardResolver {
    fn resolve_cluster_names(
        &self,
        remote_clusters: &BTreeSet<String>,
        expression: &str,
    ) -> Result<Vec<String>> {
        if remote_clusters.contains(expression) {
            return Ok(vec![expression.to_string()]);
        }

        if is_wildcard(expression) {
            return Ok(remote_clusters
                .iter()
                .filter(|alias| wildcard_match(expression, alias))
                .cloned()
                .collect());
        }

        Err(RemoteError::NoSuchRemoteCluster(expression.to_string()))
    }
}

/// Whether the expression uses wildcard syntax
pub fn is_wildcard(expression: &str) -> bool {
    expression.contains('*')
}

/// Match `text` against a pattern where `*` matches any sequence of characters
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    let mut dp = vec![vec![false; text_chars.len() + 1]; pattern_chars.len() + 1];
    dp[0][0] = true;

    for (i, &p) in pattern_chars.iter().enumerate() {
        if p == '*' {
            dp[i + 1][0] = dp[i][0];
        }
    }

    for (i, &p) in pattern_chars.iter().enumerate() {
        for (j, &t) in text_chars.iter().enumerate() {
            if p == '*' {
                dp[i + 1][j + 1] = dp[i][j + 1] || dp[i + 1][j];
            } else if p == t {
                dp[i + 1][j + 1] = dp[i][j];
            }
        }
    }

    dp[pattern_chars.len()][text_chars.len()]
}
