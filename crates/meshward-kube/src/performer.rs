//! The collaborator that actually drives the mesh control tool

use async_trait::async_trait;

use meshward_core::MeshStatus;

use crate::config::ProxyResetConfig;
use crate::error::Result;

/// Executes lifecycle actions against the cluster
///
/// Every call is atomic from the reconciler's point of view; partial completion
/// inside a call is the implementation's concern.
#[async_trait]
pub trait Performer: Send + Sync {
    async fn install(&self, target_version: &str) -> Result<()>;

    async fn update(&self, target_version: &str) -> Result<()>;

    /// Remove the mesh using the tooling matching `version`
    async fn uninstall(&self, version: &str) -> Result<()>;

    /// Restart workloads whose sidecars do not match the configured image
    async fn reset_proxies(&self, config: &ProxyResetConfig) -> Result<()>;

    /// Snapshot of client, pilot, and data plane versions against the target
    async fn version(&self) -> Result<MeshStatus>;
}
