//! Reconciler configuration
//!
//! Passed explicitly to the reconciler; nothing here is process-wide.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use meshward_core::InjectionLabel;
use meshward_core::namespace::DEFAULT_RESERVED_NAMESPACE;

use crate::error::{MeshError, Result};

/// Retry budget for conflict-prone and polling calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,

    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

/// Bounds for waiting on restarted workloads during a proxy reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyResetSettings {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for ProxyResetSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
            interval: Duration::from_secs(12),
        }
    }
}

/// Everything a proxy reset needs, resolved from status, chart, and config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResetConfig {
    /// Image prefix expected on proxy containers
    pub image_prefix: String,
    /// Image version expected on proxy containers
    pub image_version: String,
    /// Whether unlabeled namespaces get sidecars injected
    pub inject_by_default: bool,
    pub retry: RetryConfig,
    pub timeout: Duration,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconcilerConfig {
    /// Namespace the control plane runs in
    pub mesh_namespace: String,

    /// Namespaces cleaned up before the mesh namespace on uninstall
    pub related_namespaces: Vec<String>,

    /// Namespace never labeled for injection
    pub reserved_namespace: String,

    pub injection_label: InjectionLabel,

    /// Label selector for the control plane pod
    pub pilot_selector: String,

    pub retry: RetryConfig,

    pub proxy_reset: ProxyResetSettings,

    /// Bound applied to every collaborator call; unbounded when absent
    #[serde(
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_timeout: Option<Duration>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            mesh_namespace: "istio-system".to_string(),
            related_namespaces: vec!["kyma-system".to_string()],
            reserved_namespace: DEFAULT_RESERVED_NAMESPACE.to_string(),
            injection_label: InjectionLabel::default(),
            pilot_selector: "app=istiod".to_string(),
            retry: RetryConfig::default(),
            proxy_reset: ProxyResetSettings::default(),
            operation_timeout: None,
        }
    }
}

impl ReconcilerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate; missing keys take their defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.attempts == 0 {
            return Err(MeshError::InvalidConfig(
                "retry.attempts must be at least 1".to_string(),
            ));
        }
        if self.mesh_namespace.is_empty() {
            return Err(MeshError::InvalidConfig(
                "meshNamespace must not be empty".to_string(),
            ));
        }
        if self.proxy_reset.interval.is_zero() {
            return Err(MeshError::InvalidConfig(
                "proxyReset.interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry = RetryConfig { attempts, delay };
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub fn with_injection_label(mut self, label: InjectionLabel) -> Self {
        self.injection_label = label;
        self
    }

    /// Namespaces to clean before uninstall, related ones first
    pub fn cleanup_order(&self) -> impl Iterator<Item = &str> {
        self.related_namespaces
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.mesh_namespace.as_str()))
    }

    pub fn proxy_reset_config(
        &self,
        image_prefix: impl Into<String>,
        image_version: impl Into<String>,
        inject_by_default: bool,
    ) -> ProxyResetConfig {
        ProxyResetConfig {
            image_prefix: image_prefix.into(),
            image_version: image_version.into(),
            inject_by_default,
            retry: self.retry,
            timeout: self.proxy_reset.timeout,
            interval: self.proxy_reset.interval,
        }
    }
}
