//! Removal of mesh-dependent resources ahead of an uninstall
//!
//! Objects are described by a rendered manifest (multiple YAML documents
//! separated by `---`) and deleted through dynamic discovery, so no kind needs
//! to be known at compile time.

use async_trait::async_trait;
use kube::{
    Client,
    api::{Api, DeleteParams, DynamicObject, PropagationPolicy},
    core::{GroupVersionKind, TypeMeta},
    discovery::{ApiCapabilities, ApiResource, Discovery, Scope},
};

use crate::error::{MeshError, Result};

#[async_trait]
pub trait ResourceCleaner: Send + Sync {
    /// Delete the mesh-related resources living in `namespace`
    async fn remove(&self, namespace: &str) -> Result<CleanupSummary>;
}

/// Outcome of one cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub deleted: Vec<String>,
    /// Already gone
    pub missing: Vec<String>,
}

impl CleanupSummary {
    pub fn total(&self) -> usize {
        self.deleted.len() + self.missing.len()
    }
}

/// A manifest document resolved against discovery
#[derive(Debug, Clone)]
struct ManifestObject {
    obj: DynamicObject,
    gvk: GroupVersionKind,
    api_resource: ApiResource,
    capabilities: ApiCapabilities,
}

impl ManifestObject {
    fn display_name(&self) -> String {
        let name = self.obj.metadata.name.as_deref().unwrap_or("unnamed");
        match &self.obj.metadata.namespace {
            Some(ns) => format!("{}/{}/{}", ns, self.gvk.kind, name),
            None => format!("{}/{}", self.gvk.kind, name),
        }
    }
}

/// Deletes the objects of a rendered manifest
pub struct ManifestCleaner {
    client: Client,
    discovery: Discovery,
    manifest: String,
}

impl ManifestCleaner {
    pub async fn new(client: Client, manifest: impl Into<String>) -> Result<Self> {
        let discovery = Discovery::new(client.clone()).run().await?;
        Ok(Self {
            client,
            discovery,
            manifest: manifest.into(),
        })
    }

    fn resolve(&self, doc: &str, default_namespace: &str) -> Result<ManifestObject> {
        let mut obj: DynamicObject = serde_yaml::from_str(doc)?;

        let type_meta = obj.types.as_ref().ok_or_else(|| {
            MeshError::InvalidConfig("resource missing apiVersion or kind".to_string())
        })?;
        let gvk = gvk_from_type_meta(type_meta);

        let (api_resource, capabilities) = self.discovery.resolve_gvk(&gvk).ok_or_else(|| {
            MeshError::InvalidConfig(format!(
                "unknown resource type: {}/{}",
                type_meta.api_version, type_meta.kind
            ))
        })?;

        if capabilities.scope == Scope::Namespaced && obj.metadata.namespace.is_none() {
            obj.metadata.namespace = Some(default_namespace.to_string());
        }

        Ok(ManifestObject {
            obj,
            gvk,
            api_resource,
            capabilities,
        })
    }

    fn api_for(&self, object: &ManifestObject) -> Api<DynamicObject> {
        match (&object.capabilities.scope, object.obj.metadata.namespace.as_deref()) {
            (Scope::Namespaced, Some(ns)) => {
                Api::namespaced_with(self.client.clone(), ns, &object.api_resource)
            }
            _ => Api::all_with(self.client.clone(), &object.api_resource),
        }
    }

    async fn delete(&self, object: &ManifestObject) -> Result<bool> {
        let name = object.obj.metadata.name.as_deref().ok_or_else(|| {
            MeshError::InvalidConfig("resource missing metadata.name".to_string())
        })?;

        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        };

        match self.api_for(object).delete(name, &params).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(false),
            Err(e) => Err(MeshError::Api(e)),
        }
    }
}

#[async_trait]
impl ResourceCleaner for ManifestCleaner {
    async fn remove(&self, namespace: &str) -> Result<CleanupSummary> {
        let mut summary = CleanupSummary::default();

        // Reverse order so dependents go before what they depend on
        for (index, doc) in split_documents(&self.manifest).iter().enumerate().rev() {
            let object = self.resolve(doc, namespace).map_err(|e| {
                MeshError::InvalidConfig(format!("failed to parse document {}: {}", index, e))
            })?;

            if !belongs_to(
                &object.capabilities.scope,
                object.obj.metadata.namespace.as_deref(),
                namespace,
            ) {
                continue;
            }

            let name = object.display_name();
            if self.delete(&object).await? {
                tracing::debug!(resource = %name, "deleted");
                summary.deleted.push(name);
            } else {
                summary.missing.push(name);
            }
        }

        tracing::info!(
            namespace,
            deleted = summary.deleted.len(),
            missing = summary.missing.len(),
            "removed mesh resources"
        );
        Ok(summary)
    }
}

/// Non-empty documents of a multi-document manifest, comments-only ones dropped
///
/// Only a `---` line starts a new document; the marker inside a scalar does not.
fn split_documents(manifest: &str) -> Vec<String> {
    let mut docs = Vec::new();
    let mut current = String::new();

    for line in manifest.lines() {
        if is_document_marker(line) {
            docs.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    docs.push(current);

    docs.into_iter()
        .map(|doc| doc.trim().to_string())
        .filter(|doc| {
            !doc.lines()
                .all(|l| l.trim().is_empty() || l.trim().starts_with('#'))
        })
        .collect()
}

fn is_document_marker(line: &str) -> bool {
    let line = line.trim_end();
    line == "---" || line.starts_with("--- ")
}

/// Whether an object is removed when cleaning `namespace`
///
/// Namespaced objects must live in that namespace; cluster-scoped ones are
/// removed with every namespace they are listed for.
fn belongs_to(scope: &Scope, object_namespace: Option<&str>, namespace: &str) -> bool {
    match scope {
        Scope::Namespaced => object_namespace == Some(namespace),
        Scope::Cluster => true,
    }
}

/// "apps/v1" -> group="apps", version="v1"; "v1" -> core group
fn gvk_from_type_meta(tm: &TypeMeta) -> GroupVersionKind {
    let (group, version) = match tm.api_version.rsplit_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), tm.api_version.clone()),
    };

    GroupVersionKind {
        group,
        version,
        kind: tm.kind.clone(),
    }
}
