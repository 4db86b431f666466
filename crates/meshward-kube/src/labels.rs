//! Applying the sidecar injection label to namespaces
//!
//! Each pass lists namespaces fresh, plans the missing labels and patches them.
//! A conflict restarts the whole pass, since the listing it was based on is
//! stale by then.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use meshward_core::{InjectionLabel, LabelPlan, SidecarMigration, plan_label_patches};

use crate::config::{ReconcilerConfig, RetryConfig};
use crate::error::{MeshError, Result};
use crate::namespaces::NamespaceStore;
use crate::retry::{bounded, retry_with};

/// Result of a labeling run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelReport {
    /// Namespaces that received the label
    pub patched: Vec<String>,
    /// Namespaces left alone: reserved or already labeled
    pub skipped: Vec<String>,
    /// Passes needed, 0 when labeling was not active
    pub passes: u32,
}

impl LabelReport {
    pub fn is_active(&self) -> bool {
        self.passes > 0
    }
}

pub struct NamespaceLabelReconciler {
    store: Arc<dyn NamespaceStore>,
    label: InjectionLabel,
    reserved: String,
    retry: RetryConfig,
    operation_timeout: Option<Duration>,
}

impl NamespaceLabelReconciler {
    pub fn new(store: Arc<dyn NamespaceStore>, config: &ReconcilerConfig) -> Self {
        Self {
            store,
            label: config.injection_label.clone(),
            reserved: config.reserved_namespace.clone(),
            retry: config.retry,
            operation_timeout: config.operation_timeout,
        }
    }

    pub fn label(&self) -> &InjectionLabel {
        &self.label
    }

    /// What a pass would patch right now, without patching
    pub async fn plan(&self) -> Result<LabelPlan> {
        let namespaces = bounded(
            "list namespaces",
            self.operation_timeout,
            self.store.list(),
        )
        .await?;
        Ok(plan_label_patches(&namespaces, &self.label, &self.reserved))
    }

    /// Add the label to every eligible namespace when migration is enabled
    ///
    /// Conflicts are retried within the retry budget; any other error aborts.
    pub async fn reconcile(&self, migration: SidecarMigration) -> Result<LabelReport> {
        if !migration.is_active() {
            tracing::debug!(
                migration = %migration,
                "sidecar migration is not enabled, skipping namespace labeling"
            );
            return Ok(LabelReport::default());
        }

        let patched = Mutex::new(Vec::new());
        let patched_ref = &patched;
        let (passes, skipped) = retry_with(&self.retry, MeshError::is_conflict, move |pass| {
            async move {
                if pass > 1 {
                    tracing::warn!(pass, "conflict while labeling namespaces, retrying");
                }
                self.run_pass(patched_ref)
                    .await
                    .map(|skipped| (pass, skipped))
            }
        })
        .await?;

        let patched = patched.into_inner();
        tracing::debug!(
            label = %self.label,
            patched = patched.len(),
            skipped = skipped.len(),
            "namespaces labeled"
        );
        Ok(LabelReport {
            patched,
            skipped,
            passes,
        })
    }

    /// One list-then-patch pass; returns the skipped namespaces
    ///
    /// Names patched by an earlier pass of the same run stay in `patched`.
    async fn run_pass(&self, patched: &Mutex<Vec<String>>) -> Result<Vec<String>> {
        let plan = self.plan().await?;
        let body = self.label.merge_patch();

        for name in plan.to_patch {
            tracing::debug!(namespace = %name, label = %self.label, "patching namespace");
            bounded(
                "patch namespace",
                self.operation_timeout,
                self.store.patch(&name, &body),
            )
            .await?;
            patched.lock().await.push(name);
        }

        let patched = patched.lock().await;
        Ok(plan
            .skipped
            .into_iter()
            .filter(|name| !patched.contains(name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockNamespaceStore;
    use meshward_core::NamespaceSnapshot;

    fn config() -> ReconcilerConfig {
        ReconcilerConfig::default().with_retry(3, Duration::ZERO)
    }

    fn store() -> MockNamespaceStore {
        MockNamespaceStore::with_namespaces([
            NamespaceSnapshot::new("default"),
            NamespaceSnapshot::new("kube-system"),
            NamespaceSnapshot::new("opted-out").with_label("istio-injection", "disabled"),
            NamespaceSnapshot::new("team-a"),
        ])
    }

    fn reconciler(store: &MockNamespaceStore) -> NamespaceLabelReconciler {
        NamespaceLabelReconciler::new(Arc::new(store.clone()), &config())
    }

    #[tokio::test]
    async fn test_inactive_migration_is_noop() {
        let store = store();
        let reconciler = reconciler(&store);

        for migration in [SidecarMigration::Unset, SidecarMigration::Disabled] {
            let report = reconciler.reconcile(migration).await.unwrap();
            assert!(!report.is_active());
        }

        assert_eq!(store.list_calls(), 0);
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn test_labels_unlabeled_namespaces() {
        let store = store();
        let report = reconciler(&store)
            .reconcile(SidecarMigration::Enabled)
            .await
            .unwrap();

        assert_eq!(report.patched, vec!["default", "team-a"]);
        assert_eq!(report.skipped, vec!["kube-system", "opted-out"]);
        assert_eq!(report.passes, 1);

        assert!(store.labels("kube-system").unwrap().is_empty());
        assert_eq!(
            store.labels("opted-out").unwrap().get("istio-injection").map(String::as_str),
            Some("disabled")
        );
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let store = store();
        let reconciler = reconciler(&store);

        reconciler.reconcile(SidecarMigration::Enabled).await.unwrap();
        let patches_after_first = store.patches().len();

        let second = reconciler.reconcile(SidecarMigration::Enabled).await.unwrap();
        assert!(second.patched.is_empty());
        assert_eq!(store.patches().len(), patches_after_first);
        assert!(store.patches().iter().all(|(name, _)| name != "kube-system"));
    }

    #[tokio::test]
    async fn test_conflict_restarts_pass() {
        let store = store();
        store.conflict_next(1);

        let report = reconciler(&store)
            .reconcile(SidecarMigration::Enabled)
            .await
            .unwrap();

        assert_eq!(report.passes, 2);
        assert_eq!(report.patched, vec!["default", "team-a"]);
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_conflict_budget_exhausted() {
        let store = store();
        store.conflict_next(10);

        let err = reconciler(&store)
            .reconcile(SidecarMigration::Enabled)
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_other_errors_abort() {
        let store = store();
        store.fail_with("forbidden");

        let err = reconciler(&store)
            .reconcile(SidecarMigration::Enabled)
            .await
            .unwrap_err();

        assert!(matches!(err, MeshError::Collaborator(_)));
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_plan_does_not_patch() {
        let store = store();
        let plan = reconciler(&store).plan().await.unwrap();

        assert_eq!(plan.to_patch, vec!["default", "team-a"]);
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn test_custom_label() {
        let store = store();
        let config = config().with_injection_label(InjectionLabel::new("sidecar", "on"));
        let reconciler = NamespaceLabelReconciler::new(Arc::new(store.clone()), &config);

        let report = reconciler.reconcile(SidecarMigration::Enabled).await.unwrap();
        assert_eq!(report.patched, vec!["default", "opted-out", "team-a"]);
    }
}
