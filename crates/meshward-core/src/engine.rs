//! Lifecycle decisions per reconciliation phase
//!
//! Nothing is remembered between phases. Each phase classifies the snapshot it
//! was handed, so re-running a phase after a partial failure yields a fresh and
//! consistent decision.

use std::fmt;

use crate::error::{CoreError, Result};
use crate::policy::{self, Compatibility};
use crate::status::MeshStatus;
use crate::version::SemanticVersion;

/// Reconciliation phases, in the order a scheduler runs them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PreCheck,
    Reconcile,
    PostReset,
    Uninstall,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreCheck => write!(f, "pre-check"),
            Self::Reconcile => write!(f, "reconcile"),
            Self::PostReset => write!(f, "post-reset"),
            Self::Uninstall => write!(f, "uninstall"),
        }
    }
}

/// Mutating actions whose result is verified against the live cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Update,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// State observed for a phase
#[derive(Debug)]
pub enum LifecycleState {
    /// Nothing to uninstall
    NotInstalled,
    InstallEligible,
    UpdateEligible,
    /// The action is refused; the error explains which component and why
    Incompatible(CoreError),
    UninstallEligible,
    ResetEligible,
}

impl LifecycleState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotInstalled => "not-installed",
            Self::InstallEligible => "install-eligible",
            Self::UpdateEligible => "update-eligible",
            Self::Incompatible(_) => "incompatible",
            Self::UninstallEligible => "uninstall-eligible",
            Self::ResetEligible => "reset-eligible",
        }
    }

    /// The rejection reason, if any
    pub fn reason(&self) -> Option<&CoreError> {
        match self {
            Self::Incompatible(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incompatible(reason) => write!(f, "incompatible ({})", reason),
            other => f.write_str(other.name()),
        }
    }
}

/// Gate for the whole cycle: the client tool must be usable for the target
pub fn precheck(status: &MeshStatus) -> Result<()> {
    if policy::client_compatible_with_target(status) {
        Ok(())
    } else {
        Err(CoreError::ClientIncompatible {
            client: status.client_version.clone(),
            target: status.target_version.clone(),
        })
    }
}

/// Install when nothing is present, otherwise update when every component is in the window
pub fn decide_main(status: &MeshStatus) -> LifecycleState {
    if policy::can_install(status) {
        return LifecycleState::InstallEligible;
    }

    match policy::can_update(status) {
        Ok(Compatibility::Compatible) => LifecycleState::UpdateEligible,
        Ok(Compatibility::Incompatible(reason)) => LifecycleState::Incompatible(reason.into()),
        Err(e) => LifecycleState::Incompatible(e),
    }
}

pub fn decide_reset(status: &MeshStatus) -> LifecycleState {
    match policy::ensure_can_reset_proxies(status) {
        Ok(()) => LifecycleState::ResetEligible,
        Err(e) => LifecycleState::Incompatible(e),
    }
}

pub fn decide_uninstall(status: &MeshStatus) -> LifecycleState {
    if policy::can_uninstall(status) {
        LifecycleState::UninstallEligible
    } else if status.is_installed() {
        LifecycleState::Incompatible(CoreError::ClientMissing)
    } else {
        LifecycleState::NotInstalled
    }
}

/// Convergence check after an install or update
///
/// The version reported by the cluster must equal the requested one at
/// `major.minor.patch` granularity.
pub fn verify_convergence(action: Action, requested: &str, reported: &str) -> Result<()> {
    let requested_version = SemanticVersion::parse(requested)?;
    let reported_version = SemanticVersion::parse(reported)?;

    if requested_version != reported_version {
        return Err(CoreError::VersionMismatch {
            action,
            installed: reported.to_string(),
            target: requested.to_string(),
        });
    }

    Ok(())
}
