//! Remote cluster observability metrics
//!
//! Provides Prometheus-compatible metrics for:
//! - Remote cluster settings updates and rejections
//! - Active remote cluster count
//! - Index grouping and fan-out
//!
//! Aliases are operator-defined and unbounded, so they are never used as
//! labels; per-alias detail goes to the logs instead.

/// Record an applied remote cluster settings update
pub fn record_update_success(transition: &str) {
    metrics::counter!(
        "prism_remote_cluster_updates_total",
        "transition" => transition.to_string(),
        "status" => "ok",
    )
    .increment(1);
}

/// Record a failed remote cluster settings update
pub fn record_update_error(error_type: &str) {
    metrics::counter!(
        "prism_remote_cluster_updates_total",
        "status" => "error",
    )
    .increment(1);

    metrics::counter!(
        "prism_remote_cluster_update_errors_total",
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Update the number of active remote clusters
pub fn set_active_remote_clusters(count: usize) {
    metrics::gauge!("prism_remote_clusters_active").set(count as f64);
}

/// Record a remote connection being opened, replaced or closed
pub fn record_connection_change(change: &str) {
    metrics::counter!(
        "prism_remote_connection_changes_total",
        "change" => change.to_string(),
    )
    .increment(1);
}

/// Record a successful grouping call
pub fn record_grouping(group_count: usize, remote_targets: usize) {
    metrics::counter!("prism_remote_grouping_total", "status" => "ok").increment(1);
    metrics::histogram!("prism_remote_grouping_groups").record(group_count as f64);
    metrics::histogram!("prism_remote_grouping_fan_out").record(remote_targets as f64);
}

/// Record a failed grouping call
pub fn record_grouping_error(error_type: &str) {
    metrics::counter!(
        "prism_remote_grouping_total",
        "status" => "error",
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}
