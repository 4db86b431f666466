//! Reconciliation phases
//!
//! A scheduler drives the phases in order: pre-check, reconcile, post-reset,
//! and uninstall when the mesh is being removed. Each phase reads a fresh status
//! snapshot from the performer, classifies it with the core engine and then
//! calls the collaborators one at a time.

use std::sync::Arc;

use meshward_core::engine::{self, Action, LifecycleState};
use meshward_core::{CoreError, MeshStatus};

use crate::chart_source::ChartValueSource;
use crate::cleaner::ResourceCleaner;
use crate::config::ReconcilerConfig;
use crate::error::{MeshError, Result};
use crate::gatherer::StatusGatherer;
use crate::labels::{LabelReport, NamespaceLabelReconciler};
use crate::namespaces::NamespaceStore;
use crate::performer::Performer;
use crate::retry::bounded;

/// Everything the reconciler talks to
#[derive(Clone)]
pub struct Collaborators {
    pub performer: Arc<dyn Performer>,
    pub gatherer: Arc<dyn StatusGatherer>,
    pub charts: Arc<dyn ChartValueSource>,
    pub namespaces: Arc<dyn NamespaceStore>,
    pub cleaner: Arc<dyn ResourceCleaner>,
}

/// Successful main reconcile
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub action: Action,
    /// Version reported by the cluster after the action
    pub version: String,
    pub labels: LabelReport,
}

/// Post-reset never fails the cycle; it reports what happened instead
#[derive(Debug)]
pub enum ResetOutcome {
    Reset,
    /// Preconditions not met, nothing dispatched
    Skipped(CoreError),
    /// Dispatched but failed; a later cycle retries
    Failed(MeshError),
}

impl ResetOutcome {
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset)
    }
}

#[derive(Debug)]
pub enum UninstallOutcome {
    Uninstalled {
        version: String,
        /// Namespaces cleaned before the uninstall, in order
        cleaned: Vec<String>,
    },
    NotInstalled,
    /// Installed but not removable with the current tooling
    Skipped(CoreError),
}

pub struct MeshReconciler {
    performer: Arc<dyn Performer>,
    gatherer: Arc<dyn StatusGatherer>,
    charts: Arc<dyn ChartValueSource>,
    cleaner: Arc<dyn ResourceCleaner>,
    labels: NamespaceLabelReconciler,
    config: ReconcilerConfig,
}

impl MeshReconciler {
    pub fn new(collaborators: Collaborators, config: ReconcilerConfig) -> Self {
        let labels = NamespaceLabelReconciler::new(collaborators.namespaces, &config);
        Self {
            performer: collaborators.performer,
            gatherer: collaborators.gatherer,
            charts: collaborators.charts,
            cleaner: collaborators.cleaner,
            labels,
            config,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    async fn status(&self) -> Result<MeshStatus> {
        let status = bounded(
            "read mesh status",
            self.config.operation_timeout,
            self.performer.version(),
        )
        .await
        .map_err(|e| MeshError::action("read mesh status", e))?;

        tracing::debug!(
            client = %status.client_version,
            pilot = %status.pilot_version,
            data_plane = %status.data_plane_summary(","),
            target = %status.target_version,
            "observed mesh status"
        );
        Ok(status)
    }

    /// Abort the cycle unless the client tool can drive the target version
    pub async fn pre_check(&self) -> Result<MeshStatus> {
        let status = self.status().await?;
        engine::precheck(&status)?;
        tracing::debug!("pre-check passed");
        Ok(status)
    }

    /// Install or update, then label namespaces regardless of the deploy outcome
    ///
    /// Deploy and labeling failures are returned together as
    /// `MeshError::Reconcile`.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        let deployed = self.deploy().await;
        let labeled = self.label_namespaces().await;

        match (deployed, labeled) {
            (Ok((action, version)), Ok(labels)) => Ok(ReconcileOutcome {
                action,
                version,
                labels,
            }),
            (deployed, labeled) => {
                let combined = MeshError::combine(deployed.err(), labeled.err());
                Err(combined.unwrap_or_else(|| {
                    MeshError::Collaborator("reconcile failed".to_string())
                }))
            }
        }
    }

    async fn deploy(&self) -> Result<(Action, String)> {
        let status = self.status().await?;

        let action = match engine::decide_main(&status) {
            LifecycleState::InstallEligible => {
                tracing::info!(target_version = %status.target_version, "no mesh detected, installing");
                Action::Install
            }
            LifecycleState::UpdateEligible => {
                tracing::info!(
                    pilot = %status.pilot_version,
                    data_plane = %status.data_plane_summary(","),
                    target_version = %status.target_version,
                    "mesh detected, updating"
                );
                Action::Update
            }
            LifecycleState::Incompatible(reason) => {
                tracing::debug!(reason = %reason, "mesh cannot be deployed");
                return Err(reason.into());
            }
            other => {
                return Err(MeshError::Collaborator(format!(
                    "unexpected lifecycle state '{}' for reconcile",
                    other
                )));
            }
        };

        let target = status.target_version.as_str();
        let dispatched = match action {
            Action::Install => {
                bounded("install", self.config.operation_timeout, self.performer.install(target))
                    .await
            }
            Action::Update => {
                bounded("update", self.config.operation_timeout, self.performer.update(target))
                    .await
            }
        };
        dispatched.map_err(|e| MeshError::action(action.to_string(), e))?;

        let reported = bounded(
            "read installed version",
            self.config.operation_timeout,
            self.gatherer.installed_version(),
        )
        .await
        .map_err(|e| MeshError::action("read installed version", e))?;

        engine::verify_convergence(action, target, &reported)?;

        tracing::info!(action = %action, version = %reported, "mesh deployed");
        Ok((action, reported))
    }

    async fn label_namespaces(&self) -> Result<LabelReport> {
        let chart = bounded(
            "read chart values",
            self.config.operation_timeout,
            self.charts.values(),
        )
        .await?;
        let migration = chart.sidecar_migration()?;
        self.labels.reconcile(migration).await
    }

    /// Restart outdated sidecars once the control plane runs the target version
    ///
    /// Only a failure to read the status is returned as an error.
    pub async fn reset_proxies(&self) -> Result<ResetOutcome> {
        let status = self.status().await?;

        if let LifecycleState::Incompatible(reason) = engine::decide_reset(&status) {
            tracing::warn!(reason = %reason, "cannot reset proxies");
            return Ok(ResetOutcome::Skipped(reason));
        }

        match self.dispatch_reset(&status).await {
            Ok(()) => {
                tracing::info!(version = %status.target_version, "proxies reset");
                Ok(ResetOutcome::Reset)
            }
            Err(e) => {
                tracing::warn!(error = %e, "proxy reset failed");
                Ok(ResetOutcome::Failed(e))
            }
        }
    }

    async fn dispatch_reset(&self, status: &MeshStatus) -> Result<()> {
        let chart = bounded(
            "read chart values",
            self.config.operation_timeout,
            self.charts.values(),
        )
        .await?;
        let reset = self.config.proxy_reset_config(
            status.target_prefix.clone(),
            status.target_version.clone(),
            chart.inject_namespaces_by_default()?,
        );

        bounded(
            "reset proxies",
            self.config.operation_timeout,
            self.performer.reset_proxies(&reset),
        )
        .await
        .map_err(|e| MeshError::action("reset proxies", e))
    }

    /// Remove dependent resources, then the mesh itself
    pub async fn uninstall(&self) -> Result<UninstallOutcome> {
        let status = self.status().await?;

        match engine::decide_uninstall(&status) {
            LifecycleState::UninstallEligible => {}
            LifecycleState::Incompatible(reason) => {
                tracing::warn!(reason = %reason, "mesh cannot be uninstalled");
                return Ok(UninstallOutcome::Skipped(reason));
            }
            _ => {
                tracing::warn!("mesh is not installed, nothing to uninstall");
                return Ok(UninstallOutcome::NotInstalled);
            }
        }

        let mut cleaned = Vec::new();
        for namespace in self.config.cleanup_order() {
            let summary = bounded(
                "remove mesh resources",
                self.config.operation_timeout,
                self.cleaner.remove(namespace),
            )
            .await
            .map_err(|e| MeshError::action(format!("clean namespace '{}'", namespace), e))?;

            tracing::debug!(namespace, deleted = summary.deleted.len(), "namespace cleaned");
            cleaned.push(namespace.to_string());
        }

        let version = status.target_version.clone();
        bounded(
            "uninstall",
            self.config.operation_timeout,
            self.performer.uninstall(&version),
        )
        .await
        .map_err(|e| MeshError::action("uninstall", e))?;

        tracing::info!(version = %version, "mesh uninstalled");
        Ok(UninstallOutcome::Uninstalled { version, cleaned })
    }
}
