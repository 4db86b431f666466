//! Meshward Kube - Driving service mesh rollouts against a cluster
//!
//! This crate wires the decisions of `meshward-core` to the outside world:
//! - `phases`: pre-check, reconcile, post-reset and uninstall phases
//! - `labels`: sidecar injection labeling with conflict retry
//! - Collaborator traits (`Performer`, `StatusGatherer`, `ChartValueSource`,
//!   `NamespaceStore`, `ResourceCleaner`) with kube-rs backed implementations
//! - `mock`: in-memory collaborators for tests
//!
//! ## Example
//!
//! ```ignore
//! use meshward_kube::{Collaborators, MeshReconciler, ReconcilerConfig};
//!
//! let reconciler = MeshReconciler::new(collaborators, ReconcilerConfig::default());
//! reconciler.pre_check().await?;
//! let outcome = reconciler.reconcile().await?;
//! reconciler.reset_proxies().await?;
//! ```

pub mod chart_source;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod gatherer;
pub mod labels;
pub mod mock;
pub mod namespaces;
pub mod performer;
pub mod phases;
pub mod retry;

pub use chart_source::{ChartValueSource, DirChartSource};
pub use cleaner::{CleanupSummary, ManifestCleaner, ResourceCleaner};
pub use config::{ProxyResetConfig, ProxyResetSettings, ReconcilerConfig, RetryConfig};
pub use error::{MeshError, Result};
pub use gatherer::{KubeStatusGatherer, StatusGatherer};
pub use labels::{LabelReport, NamespaceLabelReconciler};
pub use mock::{
    MockChartSource, MockNamespaceStore, MockPerformer, MockResourceCleaner, MockStatusGatherer,
    PerformerCall, PerformerOp,
};
pub use namespaces::{KubeNamespaceStore, NamespaceStore};
pub use performer::Performer;
pub use phases::{Collaborators, MeshReconciler, ReconcileOutcome, ResetOutcome, UninstallOutcome};
