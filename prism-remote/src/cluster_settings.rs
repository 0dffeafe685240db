//! Dynamic cluster settings with grouped change notification
//!
//! [`ClusterSettings`] holds the node's current [`Settings`] snapshot and
//! notifies registered consumers when it changes. A consumer registers a
//! group of [`AffixSetting`]s; whenever any key of the group changes for a
//! namespace, the consumer is called once for that namespace with the full
//! current view of the group's keys (not just the changed ones).
//!
//! Changes are diffed against the last snapshot that every consumer accepted,
//! not the last one published. A namespace whose delivery failed (or was
//! part of a failed application) is delivered again on the next application.

use crate::error::Result;
use crate::settings::{AffixSetting, Settings, SettingsBuilder};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Receives consolidated per-namespace updates for a group of affix settings
#[async_trait]
pub trait AffixGroupConsumer: Send + Sync {
    /// Called with the namespace that changed and the group's current keys for it
    async fn accept(&self, namespace: &str, settings: &Settings) -> Result<()>;
}

struct GroupSubscription {
    keys: Vec<AffixSetting>,
    consumer: Arc<dyn AffixGroupConsumer>,
}

/// In-process dynamic settings store
pub struct ClusterSettings {
    current: ArcSwap<Settings>,
    /// Last snapshot delivered to every consumer without error
    applied: ArcSwap<Settings>,
    subscriptions: RwLock<Vec<Arc<GroupSubscription>>>,
    apply_lock: tokio::sync::Mutex<()>,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self::new(Settings::empty())
    }
}

impl ClusterSettings {
    pub fn new(initial: Settings) -> Self {
        let initial = Arc::new(initial);
        Self {
            current: ArcSwap::new(Arc::clone(&initial)),
            applied: ArcSwap::new(initial),
            subscriptions: RwLock::new(Vec::new()),
            apply_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Current settings snapshot
    pub fn get(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    /// Register a consumer for a group of affix settings
    pub fn add_affix_group_update_consumer(
        &self,
        keys: Vec<AffixSetting>,
        consumer: Arc<dyn AffixGroupConsumer>,
    ) {
        debug!(
            keys = %keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
            "Registered affix group update consumer"
        );
        self.subscriptions
            .write()
            .push(Arc::new(GroupSubscription { keys, consumer }));
    }

    /// Publish new settings and notify consumers of every changed namespace.
    ///
    /// Applications are serialized. Namespaces are delivered in sorted order
    /// and a failing namespace does not stop the others; the first error is
    /// returned. The new snapshot is published either way, but the applied
    /// baseline only advances when every delivery succeeded.
    pub async fn apply_settings(&self, settings: Settings) -> Result<()> {
        let _guard = self.apply_lock.lock().await;

        let next = Arc::new(settings);
        self.current.store(Arc::clone(&next));
        let baseline = self.applied.load_full();
        let subscriptions: Vec<_> = self.subscriptions.read().iter().cloned().collect();

        let mut first_error = None;
        for subscription in subscriptions {
            let mut namespaces = AffixSetting::group_namespaces(&subscription.keys, &baseline);
            namespaces.extend(AffixSetting::group_namespaces(&subscription.keys, &next));

            for namespace in namespaces {
                let old_view = AffixSetting::group_view(&subscription.keys, &namespace, &baseline);
                let new_view = AffixSetting::group_view(&subscription.keys, &namespace, &next);
                if old_view == new_view {
                    continue;
                }

                debug!(namespace = %namespace, keys = new_view.len(), "Delivering settings update");
                if let Err(e) = subscription.consumer.accept(&namespace, &new_view).await {
                    warn!(namespace = %namespace, error = %e, "Settings update rejected");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                self.applied.store(next);
                Ok(())
            }
        }
    }

    /// Apply a modification of the current settings
    pub async fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(SettingsBuilder) -> SettingsBuilder,
    {
        let next = f(self.get().to_builder()).build();
        self.apply_settings(next).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use parking_lot::Mutex;

    const SEEDS: AffixSetting = AffixSetting::new("cluster.remote.", "seeds");
    const COMPRESS: AffixSetting = AffixSetting::new("cluster.remote.", "transport.compress");

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, Settings)>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl AffixGroupConsumer for Recorder {
        async fn accept(&self, namespace: &str, settings: &Settings) -> Result<()> {
            if self.fail_on.as_deref() == Some(namespace) {
                return Err(RemoteError::Settings(format!("rejected {}", namespace)));
            }
            self.calls
                .lock()
                .push((namespace.to_string(), settings.clone()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_consolidated_event_per_namespace() {
        let store = ClusterSettings::default();
        let recorder = Arc::new(Recorder::default());
        store.add_affix_group_update_consumer(vec![SEEDS, COMPRESS], recorder.clone());

        store
            .apply_settings(
                Settings::builder()
                    .put("cluster.remote.east.seeds", "a:1")
                    .put("cluster.remote.east.transport.compress", "true")
                    .put("cluster.name", "local")
                    .build(),
            )
            .await
            .unwrap();

        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "east");
        assert_eq!(calls[0].1.len(), 2);
    }

    #[tokio::test]
    async fn test_only_changed_namespaces_notified() {
        let store = ClusterSettings::new(
            Settings::builder()
                .put("cluster.remote.east.seeds", "a:1")
                .put("cluster.remote.west.seeds", "b:1")
                .build(),
        );
        let recorder = Arc::new(Recorder::default());
        store.add_affix_group_update_consumer(vec![SEEDS, COMPRESS], recorder.clone());

        store
            .update(|b| b.put("cluster.remote.west.transport.compress", "true"))
            .await
            .unwrap();

        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "west");
        // Full view, not just the delta
        assert_eq!(calls[0].1.get("cluster.remote.west.seeds"), Some("b:1"));
    }

    #[tokio::test]
    async fn test_removed_namespace_notified_with_empty_view() {
        let store = ClusterSettings::new(
            Settings::builder()
                .put("cluster.remote.east.seeds", "a:1")
                .build(),
        );
        let recorder = Arc::new(Recorder::default());
        store.add_affix_group_update_consumer(vec![SEEDS], recorder.clone());

        store.update(|b| b.remove("cluster.remote.east.seeds")).await.unwrap();

        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "east");
        assert!(calls[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_unrelated_change_not_delivered() {
        let store = ClusterSettings::default();
        let recorder = Arc::new(Recorder::default());
        store.add_affix_group_update_consumer(vec![SEEDS], recorder.clone());

        store.update(|b| b.put("cluster.name", "other")).await.unwrap();

        assert!(recorder.calls.lock().is_empty());
        assert_eq!(store.get().get("cluster.name"), Some("other"));
    }

    #[tokio::test]
    async fn test_consumer_error_does_not_block_other_namespaces() {
        let store = ClusterSettings::default();
        let recorder = Arc::new(Recorder {
            fail_on: Some("east".into()),
            ..Default::default()
        });
        store.add_affix_group_update_consumer(vec![SEEDS], recorder.clone());

        let err = store
            .apply_settings(
                Settings::builder()
                    .put("cluster.remote.east.seeds", "a:1")
                    .put("cluster.remote.west.seeds", "b:1")
                    .build(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RemoteError::Settings(_)));
        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "west");
        assert_eq!(store.get().get("cluster.remote.east.seeds"), Some("a:1"));
    }

    /// Accepts each namespace once, but fails the first attempt for `fail_once`
    #[derive(Default)]
    struct FlakyRecorder {
        calls: Mutex<Vec<String>>,
        fail_once: Mutex<Option<String>>,
    }

    #[async_trait]
    impl AffixGroupConsumer for FlakyRecorder {
        async fn accept(&self, namespace: &str, _settings: &Settings) -> Result<()> {
            let mut fail_once = self.fail_once.lock();
            if fail_once.as_deref() == Some(namespace) {
                *fail_once = None;
                return Err(RemoteError::Settings(format!("rejected {}", namespace)));
            }
            self.calls.lock().push(namespace.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_application_redelivered() {
        let store = ClusterSettings::default();
        let recorder = Arc::new(FlakyRecorder {
            fail_once: Mutex::new(Some("east".into())),
            ..Default::default()
        });
        store.add_affix_group_update_consumer(vec![SEEDS, COMPRESS], recorder.clone());

        store
            .apply_settings(
                Settings::builder()
                    .put("cluster.remote.east.seeds", "a:1")
                    .put("cluster.remote.west.seeds", "b:1")
                    .build(),
            )
            .await
            .unwrap_err();

        // An unrelated change re-diffs against the last fully applied snapshot
        store
            .update(|b| b.put("cluster.remote.north.transport.compress", "true"))
            .await
            .unwrap();

        let calls = recorder.calls.lock().clone();
        assert_eq!(calls, vec!["west", "east", "north", "west"]);

        // Fully applied now, so nothing is redelivered
        store.update(|b| b.put("cluster.name", "local")).await.unwrap();
        assert_eq!(recorder.calls.lock().len(), 4);
    }
}
