//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use miette::Diagnostic;
use thiserror::Error;

use meshward_core::CoreError;
use meshward_kube::MeshError;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// The mesh cannot be moved to the target version
    #[error("Incompatible: {message}")]
    #[diagnostic(code(meshward::cli::incompatible))]
    Incompatible {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Version report could not be read
    #[error("Invalid report: {message}")]
    #[diagnostic(code(meshward::cli::report))]
    Report {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Chart or configuration could not be loaded
    #[error("Configuration error: {message}")]
    #[diagnostic(code(meshward::cli::config))]
    Config { message: String },

    /// Cluster access failed
    #[error("Cluster error: {message}")]
    #[diagnostic(
        code(meshward::cli::cluster),
        help("check that a kubeconfig is available and points to a reachable cluster")
    )]
    Cluster { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(meshward::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(meshward::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Incompatible { .. } => exit_codes::INCOMPATIBLE,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Report { .. }
            | CliError::Config { .. }
            | CliError::Cluster { .. }
            | CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn report(message: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
            help: None,
        }
    }

    pub fn report_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            e if e.is_incompatibility() => CliError::Incompatible {
                message: e.to_string(),
                help: None,
            },
            e => CliError::config(e.to_string()),
        }
    }
}

impl From<MeshError> for CliError {
    fn from(err: MeshError) -> Self {
        match err {
            MeshError::Core(e) => e.into(),
            MeshError::Io(e) => e.into(),
            MeshError::InvalidConfig(message) | MeshError::Serialization(message) => {
                CliError::Config { message }
            }
            e @ (MeshError::Api(_) | MeshError::Conflict { .. } | MeshError::Timeout { .. }) => {
                CliError::Cluster {
                    message: e.to_string(),
                }
            }
            e if e.is_incompatibility() => CliError::Incompatible {
                message: e.to_string(),
                help: None,
            },
            e => CliError::internal(e.to_string()),
        }
    }
}

impl From<kube::Error> for CliError {
    fn from(err: kube::Error) -> Self {
        CliError::Cluster {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let incompatible = CliError::from(CoreError::ClientIncompatible {
            client: "1.0.0".to_string(),
            target: "1.2.0".to_string(),
        });
        assert_eq!(incompatible.exit_code(), exit_codes::INCOMPATIBLE);

        let io = CliError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.exit_code(), exit_codes::IO_ERROR);

        let config = CliError::from(MeshError::InvalidConfig("bad".to_string()));
        assert_eq!(config.exit_code(), exit_codes::ERROR);
    }

    #[test]
    fn test_core_io_maps_to_io() {
        let err = CliError::from(MeshError::Core(CoreError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ))));
        assert!(matches!(err, CliError::Io { .. }));
    }

    #[test]
    fn test_conflict_maps_to_cluster() {
        let err = CliError::from(MeshError::Conflict {
            name: "default".to_string(),
        });
        assert!(matches!(err, CliError::Cluster { .. }));
    }
}
