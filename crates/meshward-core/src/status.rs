//! Mesh status snapshots

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{CoreError, Result};

/// Point-in-time snapshot of the versions running on a cluster
///
/// Produced once per phase by the status source and only ever classified,
/// never mutated, by the decision engine. Empty strings mean "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshStatus {
    /// Version of the local control tool
    #[serde(default)]
    pub client_version: String,

    /// Version the operator intends to converge to
    pub target_version: String,

    /// Proxy image prefix, carried through to proxy resets
    #[serde(default)]
    pub target_prefix: String,

    /// Control plane version, empty when the control plane is not installed
    #[serde(default)]
    pub pilot_version: String,

    /// Distinct versions observed across all running sidecars
    ///
    /// An empty entry is a sidecar that did not report its version; it still
    /// counts as installed.
    #[serde(default)]
    pub data_plane_versions: BTreeSet<String>,
}

impl MeshStatus {
    /// Create a snapshot with only the target version set
    pub fn new(target_version: impl Into<String>) -> Self {
        Self {
            target_version: target_version.into(),
            ..Default::default()
        }
    }

    pub fn with_client(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }

    pub fn with_pilot(mut self, version: impl Into<String>) -> Self {
        self.pilot_version = version.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.target_prefix = prefix.into();
        self
    }

    /// Add data plane versions (duplicates collapse)
    pub fn with_data_plane<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_plane_versions
            .extend(versions.into_iter().map(Into::into));
        self
    }

    /// A mesh counts as installed when either the pilot or any sidecar is present
    pub fn is_installed(&self) -> bool {
        !self.data_plane_versions.is_empty() || !self.pilot_version.is_empty()
    }

    /// Data plane versions joined for log output
    pub fn data_plane_summary(&self, delimiter: &str) -> String {
        self.data_plane_versions
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(delimiter)
    }

    /// Build a snapshot from the control tool's `version -o json` output
    ///
    /// Anything printed before the first `{` (warnings, progress lines) is skipped.
    pub fn from_version_output(
        output: &[u8],
        target_version: impl Into<String>,
        target_prefix: impl Into<String>,
    ) -> Result<Self> {
        if output.iter().all(u8::is_ascii_whitespace) {
            return Err(CoreError::EmptyVersionReport);
        }

        let start = output.iter().position(|b| *b == b'{').unwrap_or(0);
        let report: VersionReport = serde_json::from_slice(&output[start..])?;

        let client_version = report
            .client_version
            .map(|c| c.version)
            .unwrap_or_default();

        let pilot_version = report
            .mesh_version
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|component| component.info)
            .map(|info| info.version)
            .unwrap_or_default();

        let data_plane_versions = report
            .data_plane_version
            .unwrap_or_default()
            .into_iter()
            .map(|proxy| proxy.istio_version)
            .collect();

        Ok(Self {
            client_version,
            target_version: target_version.into(),
            target_prefix: target_prefix.into(),
            pilot_version,
            data_plane_versions,
        })
    }
}

/// Shape of the control tool's JSON version report
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionReport {
    #[serde(default)]
    client_version: Option<ClientVersion>,
    #[serde(default)]
    mesh_version: Option<Vec<MeshComponent>>,
    #[serde(default)]
    data_plane_version: Option<Vec<ProxyVersion>>,
}

#[derive(Debug, Deserialize)]
struct ClientVersion {
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct MeshComponent {
    #[serde(rename = "Info", default)]
    info: Option<ComponentInfo>,
}

#[derive(Debug, Deserialize)]
struct ComponentInfo {
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct ProxyVersion {
    #[serde(rename = "IstioVersion", default)]
    istio_version: String,
}
