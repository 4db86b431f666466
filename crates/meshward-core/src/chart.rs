//! Typed access to the mesh chart
//!
//! The chart is a directory holding `Chart.yaml` and `values.yaml`. Only the
//! handful of values that drive lifecycle decisions are read here.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::namespace::SidecarMigration;
use crate::values::Values;

pub const CHART_FILE: &str = "Chart.yaml";
pub const VALUES_FILE: &str = "values.yaml";

const SIDECAR_MIGRATION: &str = "global.sidecarMigration";
const PILOT_VERSION: &str = "global.images.istio_pilot.version";
const PROXY_REGISTRY_PATH: &str = "global.images.istio_proxyv2.containerRegistryPath";
const PROXY_DIRECTORY: &str = "global.images.istio_proxyv2.directory";
const INJECT_BY_DEFAULT: &str = "helmValues.sidecarInjectorWebhook.enableNamespacesByDefault";

/// The subset of `Chart.yaml` the reconciler cares about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

/// A loaded mesh chart: metadata plus default values
#[derive(Debug, Clone, Default)]
pub struct MeshChart {
    pub metadata: ChartMetadata,
    pub values: Values,
}

impl MeshChart {
    pub fn new(metadata: ChartMetadata, values: Values) -> Self {
        Self { metadata, values }
    }

    /// Load a chart directory; `values.yaml` is optional
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        let chart_file = dir.join(CHART_FILE);
        let content = std::fs::read_to_string(&chart_file)?;
        let metadata: ChartMetadata = serde_yaml::from_str(&content)?;

        let values_file = dir.join(VALUES_FILE);
        let values = if values_file.exists() {
            Values::from_file(&values_file)?
        } else {
            Values::new()
        };

        Ok(Self { metadata, values })
    }

    /// Tri-state migration flag: an absent key is not the same as `false`
    pub fn sidecar_migration(&self) -> Result<SidecarMigration> {
        Ok(SidecarMigration::from_flag(
            self.values.get_bool(SIDECAR_MIGRATION)?,
        ))
    }

    /// Whether the injector webhook injects sidecars into unlabeled namespaces
    pub fn inject_namespaces_by_default(&self) -> Result<bool> {
        Ok(self.values.get_bool(INJECT_BY_DEFAULT)?.unwrap_or(false))
    }

    /// Target mesh version: the pilot image version, else the chart version
    pub fn target_version(&self) -> Result<String> {
        if let Some(version) = self.values.get_str(PILOT_VERSION)?
            && !version.is_empty()
        {
            return Ok(version.to_string());
        }

        if !self.metadata.version.is_empty() {
            return Ok(self.metadata.version.clone());
        }

        Err(CoreError::MissingField {
            field: format!("{} or {}:version", PILOT_VERSION, CHART_FILE),
        })
    }

    /// Proxy image prefix as `<containerRegistryPath>/<directory>`
    pub fn target_prefix(&self) -> Result<String> {
        let registry = self.values.get_str(PROXY_REGISTRY_PATH)?.unwrap_or_default();
        let directory = self.values.get_str(PROXY_DIRECTORY)?.unwrap_or_default();
        Ok(format!("{}/{}", registry, directory))
    }
}
