//! Meshward Core - Version compatibility decisions for service mesh rollouts
//!
//! This crate provides the pure, side-effect free part of Meshward:
//! - `SemanticVersion`: Version triples that ignore pre-release suffixes when compared
//! - `MeshStatus`: Point-in-time snapshot of client, pilot and data plane versions
//! - `policy`: The "within one minor version" rule and the install/update/uninstall predicates
//! - `engine`: Per-phase lifecycle decisions derived from a snapshot
//! - `namespace`: Sidecar injection label planning
//! - `chart`: Typed access to the mesh chart values

pub mod chart;
pub mod engine;
pub mod error;
pub mod namespace;
pub mod policy;
pub mod status;
pub mod values;
pub mod version;

pub use chart::{ChartMetadata, MeshChart};
pub use engine::{Action, LifecycleState, Phase};
pub use error::{CoreError, Result};
pub use namespace::{
    InjectionLabel, LabelPlan, NamespaceSnapshot, SidecarMigration, merge_patch, plan_label_patches,
};
pub use policy::{Compatibility, Component, Direction, Incompatibility};
pub use status::MeshStatus;
pub use values::Values;
pub use version::SemanticVersion;
