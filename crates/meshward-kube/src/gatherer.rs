//! Live version reporting from the control plane

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    Client,
    api::{Api, ListParams},
};

use crate::config::{ReconcilerConfig, RetryConfig};
use crate::error::{MeshError, Result};
use crate::retry::retry_with;

/// Reports the mesh version actually running in the cluster
#[async_trait]
pub trait StatusGatherer: Send + Sync {
    async fn installed_version(&self) -> Result<String>;
}

/// Reads the image tag of the pilot pod
pub struct KubeStatusGatherer {
    client: Client,
    namespace: String,
    selector: String,
    retry: RetryConfig,
}

impl KubeStatusGatherer {
    pub fn new(client: Client, config: &ReconcilerConfig) -> Self {
        Self {
            client,
            namespace: config.mesh_namespace.clone(),
            selector: config.pilot_selector.clone(),
            retry: config.retry,
        }
    }

    async fn read_pilot_tag(&self) -> Result<String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = pods.list(&ListParams::default().labels(&self.selector)).await?;

        pilot_version(&list.items, &self.selector, &self.namespace)
    }
}

/// Tag of the first container image among the listed pilot pods
fn pilot_version(pods: &[Pod], selector: &str, namespace: &str) -> Result<String> {
    let image = pods
        .iter()
        .filter_map(|pod| pod.spec.as_ref())
        .flat_map(|spec| spec.containers.iter())
        .find_map(|container| container.image.as_deref())
        .ok_or_else(|| {
            MeshError::Collaborator(format!(
                "no pod matching '{}' found in namespace '{}'",
                selector, namespace
            ))
        })?;

    image_tag(image)
        .map(str::to_string)
        .ok_or_else(|| MeshError::Collaborator(format!("image '{}' has no tag", image)))
}

#[async_trait]
impl StatusGatherer for KubeStatusGatherer {
    async fn installed_version(&self) -> Result<String> {
        let version = retry_with(&self.retry, |_| true, |_| self.read_pilot_tag()).await?;
        tracing::debug!(version = %version, namespace = %self.namespace, "read pilot version");
        Ok(version)
    }
}

/// Tag of an image reference, ignoring registry ports and digests
pub fn image_tag(image: &str) -> Option<&str> {
    let image = image.split_once('@').map_or(image, |(name, _)| name);
    let name = image.rsplit_once('/').map_or(image, |(_, name)| name);
    name.rsplit_once(':')
        .map(|(_, tag)| tag)
        .filter(|tag| !tag.is_empty())
}
