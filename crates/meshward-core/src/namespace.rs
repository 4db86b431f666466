//! Namespace injection-label planning
//!
//! Planning is pure: given fresh namespace snapshots it decides which ones need
//! the injection label. Applying the patches, and retrying on conflicts, lives
//! in the kube crate.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

pub const DEFAULT_LABEL_KEY: &str = "istio-injection";
pub const DEFAULT_LABEL_VALUE: &str = "enabled";
pub const DEFAULT_RESERVED_NAMESPACE: &str = "kube-system";

/// A namespace as read from the cluster on this pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSnapshot {
    pub name: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl NamespaceSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Any value counts, including an explicit opt-out
    pub fn has_label(&self, key: &str) -> bool {
        self.labels.contains_key(key)
    }
}

/// The label written onto namespaces to enable sidecar injection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionLabel {
    pub key: String,
    pub value: String,
}

impl InjectionLabel {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Merge-patch body adding this label
    pub fn merge_patch(&self) -> serde_json::Value {
        merge_patch(self)
    }
}

impl Default for InjectionLabel {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL_KEY, DEFAULT_LABEL_VALUE)
    }
}

impl fmt::Display for InjectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl FromStr for InjectionLabel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok(Self::new(key.trim(), value.trim()))
            }
            _ => Err(CoreError::InvalidValue {
                path: "injectionLabel".to_string(),
                message: format!("expected 'key=value', got '{}'", s),
            }),
        }
    }
}

impl Serialize for InjectionLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InjectionLabel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Whether the chart asks for namespaces to be migrated to sidecar injection
///
/// An absent key means "leave namespaces as they are", which is different from
/// an explicit `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SidecarMigration {
    #[default]
    Unset,
    Disabled,
    Enabled,
}

impl SidecarMigration {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            None => Self::Unset,
            Some(false) => Self::Disabled,
            Some(true) => Self::Enabled,
        }
    }

    /// Labeling only runs when the flag is present and `true`
    pub fn is_active(self) -> bool {
        matches!(self, Self::Enabled)
    }

    pub fn is_explicit(self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl fmt::Display for SidecarMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "unset"),
            Self::Disabled => write!(f, "disabled"),
            Self::Enabled => write!(f, "enabled"),
        }
    }
}

/// Outcome of planning one labeling pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPlan {
    /// Namespaces missing the label key
    pub to_patch: Vec<String>,
    /// Reserved or already labeled
    pub skipped: Vec<String>,
}

impl LabelPlan {
    pub fn is_noop(&self) -> bool {
        self.to_patch.is_empty()
    }
}

/// Decide which namespaces get the injection label
///
/// The label is only ever added. Namespaces that carry any value for the key
/// keep it, and the reserved namespace is never touched.
pub fn plan_label_patches(
    namespaces: &[NamespaceSnapshot],
    label: &InjectionLabel,
    reserved: &str,
) -> LabelPlan {
    let mut plan = LabelPlan::default();

    for ns in namespaces {
        if ns.name == reserved || ns.has_label(&label.key) {
            plan.skipped.push(ns.name.clone());
        } else {
            plan.to_patch.push(ns.name.clone());
        }
    }

    plan
}

/// `{"metadata":{"labels":{key: value}}}`
pub fn merge_patch(label: &InjectionLabel) -> serde_json::Value {
    json!({
        "metadata": {
            "labels": {
                label.key.as_str(): label.value.as_str()
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> Vec<NamespaceSnapshot> {
        vec![
            NamespaceSnapshot::new("default"),
            NamespaceSnapshot::new("kube-system"),
            NamespaceSnapshot::new("opted-out").with_label("istio-injection", "disabled"),
            NamespaceSnapshot::new("already").with_label("istio-injection", "enabled"),
            NamespaceSnapshot::new("team-a").with_label("owner", "a"),
        ]
    }

    #[test]
    fn test_plan_skips_reserved_and_labeled() {
        let plan = plan_label_patches(&cluster(), &InjectionLabel::default(), "kube-system");

        assert_eq!(plan.to_patch, vec!["default", "team-a"]);
        assert_eq!(plan.skipped, vec!["kube-system", "opted-out", "already"]);
    }

    #[test]
    fn test_plan_is_idempotent() {
        let label = InjectionLabel::default();
        let mut namespaces = cluster();

        let first = plan_label_patches(&namespaces, &label, DEFAULT_RESERVED_NAMESPACE);
        for ns in namespaces.iter_mut() {
            if first.to_patch.contains(&ns.name) {
                ns.labels.insert(label.key.clone(), label.value.clone());
            }
        }

        let second = plan_label_patches(&namespaces, &label, DEFAULT_RESERVED_NAMESPACE);
        assert!(second.is_noop());
        assert!(second.skipped.iter().any(|n| n == "kube-system"));
        assert!(!namespaces[1].has_label("istio-injection"));
    }

    #[test]
    fn test_plan_empty_cluster() {
        let plan = plan_label_patches(&[], &InjectionLabel::default(), "kube-system");
        assert!(plan.is_noop());
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_merge_patch_body() {
        let patch = merge_patch(&InjectionLabel::default());
        insta::assert_snapshot!(
            patch.to_string(),
            @r#"{"metadata":{"labels":{"istio-injection":"enabled"}}}"#
        );
    }

    #[test]
    fn test_injection_label_parse() {
        let label: InjectionLabel = "sidecar=on".parse().unwrap();
        assert_eq!(label, InjectionLabel::new("sidecar", "on"));
        assert_eq!(label.to_string(), "sidecar=on");

        assert!("novalue".parse::<InjectionLabel>().is_err());
        assert!("=x".parse::<InjectionLabel>().is_err());
    }

    #[test]
    fn test_injection_label_serde() {
        let label: InjectionLabel = serde_yaml::from_str("istio-injection=enabled").unwrap();
        assert_eq!(label, InjectionLabel::default());
    }

    #[test]
    fn test_sidecar_migration_states() {
        assert_eq!(SidecarMigration::from_flag(None), SidecarMigration::Unset);
        assert!(!SidecarMigration::Unset.is_active());
        assert!(!SidecarMigration::Unset.is_explicit());
        assert!(!SidecarMigration::Disabled.is_active());
        assert!(SidecarMigration::Disabled.is_explicit());
        assert!(SidecarMigration::from_flag(Some(true)).is_active());
    }
}
