//! In-memory collaborators for testing
//!
//! Each mock records the calls it receives and can be told to fail, so the
//! reconciler can be exercised without a cluster.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use meshward_core::{MeshChart, MeshStatus, NamespaceSnapshot};

use crate::chart_source::ChartValueSource;
use crate::cleaner::{CleanupSummary, ResourceCleaner};
use crate::config::ProxyResetConfig;
use crate::error::{MeshError, Result};
use crate::gatherer::StatusGatherer;
use crate::namespaces::NamespaceStore;
use crate::performer::Performer;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Performer operations, for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformerOp {
    Install,
    Update,
    Uninstall,
    ResetProxies,
    Version,
}

/// A recorded performer call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PerformerCall {
    Install(String),
    Update(String),
    Uninstall(String),
    ResetProxies(ProxyResetConfig),
    Version,
}

#[derive(Debug, Default)]
struct PerformerState {
    status: MeshStatus,
    calls: Vec<PerformerCall>,
    failures: HashMap<PerformerOp, String>,
}

/// Performer that reports a fixed status and records mutations
///
/// A successful install or update moves the reported pilot version to the
/// requested target, like a real rollout would.
#[derive(Clone, Default)]
pub struct MockPerformer {
    state: Arc<Mutex<PerformerState>>,
}

impl MockPerformer {
    pub fn new(status: MeshStatus) -> Self {
        Self {
            state: Arc::new(Mutex::new(PerformerState {
                status,
                ..Default::default()
            })),
        }
    }

    /// Make `op` fail with `message` until cleared
    pub fn fail_on(&self, op: PerformerOp, message: impl Into<String>) {
        lock(&self.state).failures.insert(op, message.into());
    }

    pub fn clear_failures(&self) {
        lock(&self.state).failures.clear();
    }

    pub fn set_status(&self, status: MeshStatus) {
        lock(&self.state).status = status;
    }

    pub fn status(&self) -> MeshStatus {
        lock(&self.state).status.clone()
    }

    pub fn calls(&self) -> Vec<PerformerCall> {
        lock(&self.state).calls.clone()
    }

    /// Recorded calls excluding status reads
    pub fn mutations(&self) -> Vec<PerformerCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, PerformerCall::Version))
            .collect()
    }

    fn record(&self, op: PerformerOp, call: PerformerCall) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        match state.failures.get(&op) {
            Some(message) => Err(MeshError::Collaborator(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Performer for MockPerformer {
    async fn install(&self, target_version: &str) -> Result<()> {
        self.record(
            PerformerOp::Install,
            PerformerCall::Install(target_version.to_string()),
        )?;
        lock(&self.state).status.pilot_version = target_version.to_string();
        Ok(())
    }

    async fn update(&self, target_version: &str) -> Result<()> {
        self.record(
            PerformerOp::Update,
            PerformerCall::Update(target_version.to_string()),
        )?;
        lock(&self.state).status.pilot_version = target_version.to_string();
        Ok(())
    }

    async fn uninstall(&self, version: &str) -> Result<()> {
        self.record(
            PerformerOp::Uninstall,
            PerformerCall::Uninstall(version.to_string()),
        )?;
        let mut state = lock(&self.state);
        state.status.pilot_version.clear();
        state.status.data_plane_versions.clear();
        Ok(())
    }

    async fn reset_proxies(&self, config: &ProxyResetConfig) -> Result<()> {
        self.record(
            PerformerOp::ResetProxies,
            PerformerCall::ResetProxies(config.clone()),
        )
    }

    async fn version(&self) -> Result<MeshStatus> {
        self.record(PerformerOp::Version, PerformerCall::Version)?;
        Ok(self.status())
    }
}

/// Gatherer returning a scripted version
#[derive(Clone, Default)]
pub struct MockStatusGatherer {
    version: Arc<Mutex<Option<String>>>,
    reads: Arc<Mutex<usize>>,
}

impl MockStatusGatherer {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: Arc::new(Mutex::new(Some(version.into()))),
            reads: Arc::default(),
        }
    }

    /// A gatherer that finds no control plane
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn set_version(&self, version: impl Into<String>) {
        *lock(&self.version) = Some(version.into());
    }

    pub fn reads(&self) -> usize {
        *lock(&self.reads)
    }
}

#[async_trait]
impl StatusGatherer for MockStatusGatherer {
    async fn installed_version(&self) -> Result<String> {
        *lock(&self.reads) += 1;
        lock(&self.version)
            .clone()
            .ok_or_else(|| MeshError::Collaborator("no pilot pod found".to_string()))
    }
}

/// Chart source serving an in-memory chart
#[derive(Clone, Default)]
pub struct MockChartSource {
    chart: Arc<Mutex<MeshChart>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockChartSource {
    pub fn new(chart: MeshChart) -> Self {
        Self {
            chart: Arc::new(Mutex::new(chart)),
            failure: Arc::default(),
        }
    }

    pub fn set_chart(&self, chart: MeshChart) {
        *lock(&self.chart) = chart;
    }

    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.failure) = Some(message.into());
    }
}

#[async_trait]
impl ChartValueSource for MockChartSource {
    async fn values(&self) -> Result<MeshChart> {
        if let Some(message) = lock(&self.failure).clone() {
            return Err(MeshError::Collaborator(message));
        }
        Ok(lock(&self.chart).clone())
    }
}

#[derive(Debug, Default)]
struct NamespaceState {
    namespaces: BTreeMap<String, BTreeMap<String, String>>,
    patches: Vec<(String, serde_json::Value)>,
    lists: usize,
    conflicts: u32,
    failure: Option<String>,
}

/// Namespace store over an in-memory label map
///
/// Merge patches update `metadata.labels`. Conflicts can be injected for the
/// next N patch calls.
#[derive(Clone, Default)]
pub struct MockNamespaceStore {
    state: Arc<Mutex<NamespaceState>>,
}

impl MockNamespaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespaces(namespaces: impl IntoIterator<Item = NamespaceSnapshot>) -> Self {
        let store = Self::new();
        {
            let mut state = lock(&store.state);
            for ns in namespaces {
                state.namespaces.insert(ns.name, ns.labels);
            }
        }
        store
    }

    /// The next `count` patch calls fail with a conflict
    pub fn conflict_next(&self, count: u32) {
        lock(&self.state).conflicts = count;
    }

    /// Every list and patch call fails with `message`
    pub fn fail_with(&self, message: impl Into<String>) {
        lock(&self.state).failure = Some(message.into());
    }

    /// Successfully applied patches, in order
    pub fn patches(&self) -> Vec<(String, serde_json::Value)> {
        lock(&self.state).patches.clone()
    }

    pub fn list_calls(&self) -> usize {
        lock(&self.state).lists
    }

    pub fn labels(&self, name: &str) -> Option<BTreeMap<String, String>> {
        lock(&self.state).namespaces.get(name).cloned()
    }
}

#[async_trait]
impl NamespaceStore for MockNamespaceStore {
    async fn list(&self) -> Result<Vec<NamespaceSnapshot>> {
        let mut state = lock(&self.state);
        state.lists += 1;
        if let Some(message) = &state.failure {
            return Err(MeshError::Collaborator(message.clone()));
        }
        Ok(state
            .namespaces
            .iter()
            .map(|(name, labels)| NamespaceSnapshot {
                name: name.clone(),
                labels: labels.clone(),
            })
            .collect())
    }

    async fn patch(&self, name: &str, patch: &serde_json::Value) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.failure {
            return Err(MeshError::Collaborator(message.clone()));
        }
        if state.conflicts > 0 {
            state.conflicts -= 1;
            return Err(MeshError::Conflict {
                name: name.to_string(),
            });
        }

        let Some(labels) = state.namespaces.get_mut(name) else {
            return Err(MeshError::Collaborator(format!(
                "namespace '{}' not found",
                name
            )));
        };
        if let Some(patch_labels) = patch
            .pointer("/metadata/labels")
            .and_then(|v| v.as_object())
        {
            for (key, value) in patch_labels {
                match value.as_str() {
                    Some(value) => {
                        labels.insert(key.clone(), value.to_string());
                    }
                    None => {
                        labels.remove(key);
                    }
                }
            }
        }

        state.patches.push((name.to_string(), patch.clone()));
        Ok(())
    }
}

/// Cleaner that records which namespaces were cleaned
#[derive(Clone, Default)]
pub struct MockResourceCleaner {
    removed: Arc<Mutex<Vec<String>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockResourceCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.failure) = Some(message.into());
    }

    pub fn removed(&self) -> Vec<String> {
        lock(&self.removed).clone()
    }
}

#[async_trait]
impl ResourceCleaner for MockResourceCleaner {
    async fn remove(&self, namespace: &str) -> Result<CleanupSummary> {
        if let Some(message) = lock(&self.failure).clone() {
            return Err(MeshError::Collaborator(message));
        }
        lock(&self.removed).push(namespace.to_string());
        Ok(CleanupSummary {
            deleted: vec![namespace.to_string()],
            missing: Vec::new(),
        })
    }
}
