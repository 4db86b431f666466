//! Core error types

use thiserror::Error;

use crate::engine::Action;
use crate::policy::Incompatibility;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    #[error("invalid version '{input}': {source}")]
    InvalidVersion {
        input: String,
        #[source]
        source: semver::Error,
    },

    #[error(transparent)]
    Incompatible(#[from] Incompatibility),

    #[error("pilot version {pilot} does not match target version {target}")]
    PilotMismatch { pilot: String, target: String },

    #[error(
        "client version '{client}' is not compatible with target version {target}: the difference between versions exceeds one minor version"
    )]
    ClientIncompatible { client: String, target: String },

    #[error("version {installed} reported after {action} does not match target version {target}")]
    VersionMismatch {
        action: Action,
        installed: String,
        target: String,
    },

    #[error("the mesh is installed but the client tool is missing, it cannot be uninstalled")]
    ClientMissing,

    #[error("the version report is empty")]
    EmptyVersionReport,

    #[error("invalid value at '{path}': {message}")]
    InvalidValue { path: String, message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Check if this error is a compatibility rejection rather than broken input
    pub fn is_incompatibility(&self) -> bool {
        matches!(
            self,
            CoreError::Incompatible(_)
                | CoreError::PilotMismatch { .. }
                | CoreError::ClientIncompatible { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
