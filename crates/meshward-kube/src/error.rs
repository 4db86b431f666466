//! Error types for meshward-kube

use std::time::Duration;
use thiserror::Error;

use meshward_core::CoreError;

/// Result type for meshward-kube operations
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur while reconciling the mesh
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MeshError {
    /// Decision or parsing failure from the core
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Optimistic concurrency conflict on a namespace
    #[error("namespace '{name}' was modified concurrently")]
    Conflict { name: String },

    /// A collaborator call failed
    #[error("{action} failed: {source}")]
    Action {
        action: String,
        #[source]
        source: Box<MeshError>,
    },

    /// Opaque collaborator failure
    #[error("{0}")]
    Collaborator(String),

    /// Caller-supplied operation bound expired
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Main reconcile outcome: deploy and labeling are reported together
    #[error("{}", reconcile_message(.deploy, .labels))]
    Reconcile {
        deploy: Option<Box<MeshError>>,
        labels: Option<Box<MeshError>>,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MeshError {
    fn from(e: serde_json::Error) -> Self {
        MeshError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for MeshError {
    fn from(e: serde_yaml::Error) -> Self {
        MeshError::Serialization(e.to_string())
    }
}

fn reconcile_message(deploy: &Option<Box<MeshError>>, labels: &Option<Box<MeshError>>) -> String {
    match (deploy, labels) {
        (Some(deploy), Some(labels)) => {
            format!("{}; labeling namespaces failed: {}", deploy, labels)
        }
        (Some(deploy), None) => deploy.to_string(),
        (None, Some(labels)) => format!("labeling namespaces failed: {}", labels),
        (None, None) => "reconcile failed".to_string(),
    }
}

impl MeshError {
    /// Wrap a collaborator failure with the action that produced it
    pub fn action(action: impl Into<String>, source: MeshError) -> Self {
        MeshError::Action {
            action: action.into(),
            source: Box::new(source),
        }
    }

    /// Combine deploy and labeling outcomes; `None` when both succeeded
    pub fn combine(deploy: Option<MeshError>, labels: Option<MeshError>) -> Option<Self> {
        if deploy.is_none() && labels.is_none() {
            return None;
        }
        Some(MeshError::Reconcile {
            deploy: deploy.map(Box::new),
            labels: labels.map(Box::new),
        })
    }

    /// Check if this is a conflict error (409)
    pub fn is_conflict(&self) -> bool {
        match self {
            MeshError::Conflict { .. } => true,
            MeshError::Api(kube::Error::Api(resp)) => resp.code == 409,
            MeshError::Action { source, .. } => source.is_conflict(),
            _ => false,
        }
    }

    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        match self {
            MeshError::Api(kube::Error::Api(resp)) => resp.code == 404,
            MeshError::Action { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Check if the failure is a compatibility rejection
    pub fn is_incompatibility(&self) -> bool {
        match self {
            MeshError::Core(e) => e.is_incompatibility(),
            MeshError::Reconcile { deploy: Some(deploy), .. } => deploy.is_incompatibility(),
            _ => false,
        }
    }
}
