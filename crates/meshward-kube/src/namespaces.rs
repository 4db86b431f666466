//! Namespace listing and patching

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    Client,
    api::{Api, ListParams, Patch, PatchParams},
};

use meshward_core::NamespaceSnapshot;

use crate::error::{MeshError, Result};

/// Field manager recorded on label patches
const FIELD_MANAGER: &str = "meshward";

#[async_trait]
pub trait NamespaceStore: Send + Sync {
    /// Fresh snapshot of every namespace
    async fn list(&self) -> Result<Vec<NamespaceSnapshot>>;

    /// Apply a JSON merge patch; a concurrent modification is a conflict
    async fn patch(&self, name: &str, patch: &serde_json::Value) -> Result<()>;
}

pub struct KubeNamespaceStore {
    api: Api<Namespace>,
}

impl KubeNamespaceStore {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl NamespaceStore for KubeNamespaceStore {
    async fn list(&self) -> Result<Vec<NamespaceSnapshot>> {
        let list = self.api.list(&ListParams::default()).await?;
        Ok(list.items.into_iter().map(snapshot_of).collect())
    }

    async fn patch(&self, name: &str, patch: &serde_json::Value) -> Result<()> {
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        match self.api.patch(name, &params, &Patch::Merge(patch)).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 409 => Err(MeshError::Conflict {
                name: name.to_string(),
            }),
            Err(e) => Err(MeshError::Api(e)),
        }
    }
}

fn snapshot_of(ns: Namespace) -> NamespaceSnapshot {
    NamespaceSnapshot {
        name: ns.metadata.name.unwrap_or_default(),
        labels: ns.metadata.labels.unwrap_or_default(),
    }
}
