//! Chart value access

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use meshward_core::MeshChart;

use crate::error::{MeshError, Result};

/// Exposes the packaged chart configuration, read once per phase
#[async_trait]
pub trait ChartValueSource: Send + Sync {
    async fn values(&self) -> Result<MeshChart>;
}

/// Chart loaded from a directory on every call
#[derive(Debug, Clone)]
pub struct DirChartSource {
    dir: PathBuf,
}

impl DirChartSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ChartValueSource for DirChartSource {
    async fn values(&self) -> Result<MeshChart> {
        let dir = self.dir.clone();
        let chart = tokio::task::spawn_blocking(move || MeshChart::load(dir))
            .await
            .map_err(|e| MeshError::Collaborator(e.to_string()))??;
        Ok(chart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshward_core::SidecarMigration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_dir_chart_source_reloads() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Chart.yaml"), "name: istio\nversion: 1.2.0\n").unwrap();
        std::fs::write(dir.path().join("values.yaml"), "global:\n  sidecarMigration: false\n")
            .unwrap();

        let source = DirChartSource::new(dir.path());
        let chart = source.values().await.unwrap();
        assert_eq!(chart.sidecar_migration().unwrap(), SidecarMigration::Disabled);

        std::fs::write(dir.path().join("values.yaml"), "global:\n  sidecarMigration: true\n")
            .unwrap();
        let chart = source.values().await.unwrap();
        assert_eq!(chart.sidecar_migration().unwrap(), SidecarMigration::Enabled);
    }

    #[tokio::test]
    async fn test_dir_chart_source_missing_dir() {
        let source = DirChartSource::new("/nonexistent/meshward/chart");
        assert!(source.values().await.is_err());
    }
}
