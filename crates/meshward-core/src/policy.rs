//! Compatibility policy between mesh components
//!
//! Every check reduces to one primitive: two versions are compatible when they
//! share the major version and their minor versions differ by at most one.
//! The predicates below apply that rule to the components of a [`MeshStatus`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

use crate::error::{CoreError, Result};
use crate::status::MeshStatus;
use crate::version::SemanticVersion;

/// Mesh component whose version is checked against the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
    Client,
    Pilot,
    DataPlane,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Pilot => write!(f, "pilot"),
            Self::DataPlane => write!(f, "data plane"),
        }
    }
}

/// What moving a component to the target version would mean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Target is newer than the component
    Upgrade,
    /// Target is older than the component
    Downgrade,
    /// Target and component have the same `major.minor.patch`
    Reconciliation,
}

impl Direction {
    /// Classify by comparing the target against the component version
    pub fn between(component: &SemanticVersion, target: &SemanticVersion) -> Self {
        match target.compare(component) {
            Ordering::Greater => Self::Upgrade,
            Ordering::Less => Self::Downgrade,
            Ordering::Equal => Self::Reconciliation,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upgrade => write!(f, "upgrade"),
            Self::Downgrade => write!(f, "downgrade"),
            Self::Reconciliation => write!(f, "reconciliation"),
        }
    }
}

/// Why a component cannot be moved to the target version
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "cannot perform {direction} of {component} from version {from} to version {to}: the difference between versions exceeds one minor version"
)]
pub struct Incompatibility {
    pub component: Component,
    pub from: String,
    pub to: String,
    pub direction: Direction,
}

/// Outcome of a compatibility check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    Incompatible(Incompatibility),
}

impl Compatibility {
    pub fn is_compatible(&self) -> bool {
        matches!(self, Self::Compatible)
    }

    /// Turn a rejection into an error
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Compatible => Ok(()),
            Self::Incompatible(reason) => Err(reason.into()),
        }
    }
}

/// Same major version and at most one minor version apart, in either direction
pub fn within_one_minor(a: &SemanticVersion, b: &SemanticVersion) -> bool {
    a.major == b.major && a.minor.abs_diff(b.minor) <= 1
}

/// Check a single component against the target
///
/// An empty component version means the component is absent, which is
/// compatible with anything. Unparseable versions are errors, never compatible.
pub fn component_compatibility(
    component_version: &str,
    target_version: &str,
    component: Component,
) -> Result<Compatibility> {
    if component_version.is_empty() {
        return Ok(Compatibility::Compatible);
    }

    let current = SemanticVersion::parse(component_version)?;
    let target = SemanticVersion::parse(target_version)?;

    if within_one_minor(&current, &target) {
        return Ok(Compatibility::Compatible);
    }

    Ok(Compatibility::Incompatible(Incompatibility {
        component,
        from: component_version.to_string(),
        to: target_version.to_string(),
        direction: Direction::between(&current, &target),
    }))
}

/// Install only when nothing of the mesh is present
pub fn can_install(status: &MeshStatus) -> bool {
    !status.is_installed()
}

/// Update when the pilot and every data plane version are within one minor of the target
///
/// Stops at the first incompatible component; the pilot is checked first.
pub fn can_update(status: &MeshStatus) -> Result<Compatibility> {
    let pilot = component_compatibility(
        &status.pilot_version,
        &status.target_version,
        Component::Pilot,
    )?;
    if !pilot.is_compatible() {
        return Ok(pilot);
    }

    for version in &status.data_plane_versions {
        let data_plane =
            component_compatibility(version, &status.target_version, Component::DataPlane)?;
        if !data_plane.is_compatible() {
            return Ok(data_plane);
        }
    }

    Ok(Compatibility::Compatible)
}

/// Uninstall needs an installed mesh and the client tool that removes it
pub fn can_uninstall(status: &MeshStatus) -> bool {
    status.is_installed() && !status.client_version.is_empty()
}

/// Proxies may only be reset once the pilot runs exactly the target version
///
/// Sidecars are allowed to lag by one minor version.
pub fn ensure_can_reset_proxies(status: &MeshStatus) -> Result<()> {
    let pilot = SemanticVersion::parse(&status.pilot_version)?;
    let target = SemanticVersion::parse(&status.target_version)?;

    if pilot != target {
        return Err(CoreError::PilotMismatch {
            pilot: status.pilot_version.clone(),
            target: status.target_version.clone(),
        });
    }

    for version in &status.data_plane_versions {
        component_compatibility(version, &status.target_version, Component::DataPlane)?
            .into_result()?;
    }

    Ok(())
}

/// The client tool must be within one minor of the target; unparseable versions fail closed
pub fn client_compatible_with_target(status: &MeshStatus) -> bool {
    let Ok(client) = SemanticVersion::parse(&status.client_version) else {
        return false;
    };
    let Ok(target) = SemanticVersion::parse(&status.target_version) else {
        return false;
    };
    within_one_minor(&client, &target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_within_one_minor_is_symmetric_and_inclusive() {
        for patch in ["0", "7"] {
            let base = v(&format!("1.11.{}", patch));
            for (other, expected) in [
                ("1.9.3", false),
                ("1.10.0", true),
                ("1.11.9", true),
                ("1.12.1", true),
                ("1.13.0", false),
            ] {
                let other = v(other);
                assert_eq!(within_one_minor(&base, &other), expected, "{} vs {}", base, other);
                assert_eq!(within_one_minor(&other, &base), expected, "{} vs {}", other, base);
            }
        }
    }

    #[test]
    fn test_within_one_minor_requires_same_major() {
        assert!(!within_one_minor(&v("1.0.0"), &v("2.0.0")));
        assert!(!within_one_minor(&v("2.0.0"), &v("1.1.0")));
    }

    #[test]
    fn test_component_compatibility_empty_is_compatible() {
        let result = component_compatibility("", "1.2.0", Component::Pilot).unwrap();
        assert!(result.is_compatible());
    }

    #[test]
    fn test_component_compatibility_rejects_unparseable() {
        let result = component_compatibility("version1", "1.2.0", Component::Pilot);
        assert!(matches!(result, Err(CoreError::InvalidVersion { .. })));

        let result = component_compatibility("1.2.0", "latest", Component::Pilot);
        assert!(matches!(result, Err(CoreError::InvalidVersion { .. })));
    }

    #[test]
    fn test_component_compatibility_directions() {
        let cases = [
            ("1.0.0", "1.2.0", Direction::Upgrade),
            ("1.4.0", "1.2.0", Direction::Downgrade),
            ("2.2.0", "1.2.0", Direction::Downgrade),
        ];

        for (component, target, direction) in cases {
            match component_compatibility(component, target, Component::Pilot).unwrap() {
                Compatibility::Incompatible(reason) => {
                    assert_eq!(reason.direction, direction);
                    assert_eq!(reason.from, component);
                    assert_eq!(reason.to, target);
                }
                Compatibility::Compatible => panic!("{} -> {} should be rejected", component, target),
            }
        }
    }

    #[test]
    fn test_component_compatibility_within_window() {
        for (component, target) in [
            ("1.2.0", "1.2.0"),
            ("1.2.0", "1.2.5"),
            ("1.1.0", "1.2.0"),
            ("1.3.0", "1.2.0"),
        ] {
            assert!(
                component_compatibility(component, target, Component::Pilot)
                    .unwrap()
                    .is_compatible(),
                "{} -> {} should be allowed",
                component,
                target
            );
        }
    }

    #[test]
    fn test_direction_reconciliation_for_equal_triples() {
        assert_eq!(
            Direction::between(&v("1.2.3-a"), &v("1.2.3")),
            Direction::Reconciliation
        );
    }

    #[test]
    fn test_incompatibility_message() {
        let reason = match component_compatibility("1.0.0", "1.2.0", Component::Pilot).unwrap() {
            Compatibility::Incompatible(reason) => reason,
            Compatibility::Compatible => panic!("expected rejection"),
        };

        insta::assert_snapshot!(
            reason.to_string(),
            @"cannot perform upgrade of pilot from version 1.0.0 to version 1.2.0: the difference between versions exceeds one minor version"
        );
    }

    #[test]
    fn test_can_install() {
        assert!(can_install(&MeshStatus::new("1.2.0")));
        assert!(can_install(&MeshStatus::new("1.2.0").with_client("1.2.0")));
        assert!(!can_install(&MeshStatus::new("1.2.0").with_pilot("1.2.0")));
        assert!(!can_install(
            &MeshStatus::new("1.2.0").with_data_plane(["1.2.0"])
        ));
    }

    #[test]
    fn test_can_update_pilot_two_minors_behind() {
        let status = MeshStatus::new("1.2.0")
            .with_client("1.0.0")
            .with_pilot("1.0.0")
            .with_data_plane(["1.0.0"]);

        match can_update(&status).unwrap() {
            Compatibility::Incompatible(reason) => {
                assert_eq!(reason.component, Component::Pilot);
                assert_eq!(reason.direction, Direction::Upgrade);
            }
            Compatibility::Compatible => panic!("update should be rejected"),
        }
    }

    #[test]
    fn test_can_update_pilot_one_minor_ahead() {
        let status = MeshStatus::new("1.1.0")
            .with_client("1.1.0")
            .with_pilot("1.2.0")
            .with_data_plane(["1.1.0"]);

        assert!(can_update(&status).unwrap().is_compatible());
    }

    #[test]
    fn test_can_update_data_plane_downgrade_rejected() {
        let status = MeshStatus::new("1.1.0")
            .with_client("1.1.0")
            .with_pilot("1.1.0")
            .with_data_plane(["1.3.0"]);

        match can_update(&status).unwrap() {
            Compatibility::Incompatible(reason) => {
                assert_eq!(reason.component, Component::DataPlane);
                assert_eq!(reason.direction, Direction::Downgrade);
                assert_eq!(reason.from, "1.3.0");
            }
            Compatibility::Compatible => panic!("update should be rejected"),
        }
    }

    #[test]
    fn test_can_update_checks_every_data_plane_version() {
        let status = MeshStatus::new("1.2.0")
            .with_pilot("1.2.0")
            .with_data_plane(["1.1.0", "1.2.0", "1.0.0"]);

        match can_update(&status).unwrap() {
            Compatibility::Incompatible(reason) => assert_eq!(reason.from, "1.0.0"),
            Compatibility::Compatible => panic!("update should be rejected"),
        }
    }

    #[test]
    fn test_can_update_control_plane_ahead_of_data_plane() {
        let status = MeshStatus::new("1.2.0")
            .with_client("1.2.0")
            .with_pilot("1.2.0")
            .with_data_plane(["1.1.0"]);

        assert!(can_update(&status).unwrap().is_compatible());
    }

    #[test]
    fn test_can_update_propagates_parse_errors() {
        let status = MeshStatus::new("1.2.0").with_pilot("garbage");
        assert!(matches!(
            can_update(&status),
            Err(CoreError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_can_uninstall() {
        let installed = MeshStatus::new("1.2.0")
            .with_client("1.2.0")
            .with_pilot("1.2.0")
            .with_data_plane(["1.2.0"]);
        assert!(can_uninstall(&installed));

        let no_client = MeshStatus::new("1.2.0")
            .with_pilot("1.2.0")
            .with_data_plane(["1.2.0"]);
        assert!(!can_uninstall(&no_client));

        let not_installed = MeshStatus::new("1.2.0").with_client("1.2.0");
        assert!(!can_uninstall(&not_installed));
    }

    #[test]
    fn test_can_uninstall_ignores_version_drift() {
        let status = MeshStatus::new("1.2.0")
            .with_client("1.0.0")
            .with_data_plane(["1.5.0"]);
        assert!(can_uninstall(&status));
    }

    #[test]
    fn test_reset_requires_exact_pilot_version() {
        let status = MeshStatus::new("1.2.0")
            .with_client("1.2.0")
            .with_pilot("1.0.0")
            .with_data_plane(["1.2.0"]);

        let err = ensure_can_reset_proxies(&status).unwrap_err();
        assert!(matches!(err, CoreError::PilotMismatch { .. }));
        insta::assert_snapshot!(
            err.to_string(),
            @"pilot version 1.0.0 does not match target version 1.2.0"
        );
    }

    #[test]
    fn test_reset_allows_data_plane_one_minor_behind() {
        let status = MeshStatus::new("1.2.0")
            .with_pilot("1.2.0")
            .with_data_plane(["1.1.0"]);
        assert!(ensure_can_reset_proxies(&status).is_ok());
    }

    #[test]
    fn test_reset_rejects_data_plane_drift() {
        let status = MeshStatus::new("1.2.0")
            .with_pilot("1.2.0")
            .with_data_plane(["1.0.0"]);

        match ensure_can_reset_proxies(&status) {
            Err(CoreError::Incompatible(reason)) => {
                assert_eq!(reason.component, Component::DataPlane);
                assert_eq!(reason.from, "1.0.0");
            }
            other => panic!("expected data plane rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_reset_without_data_plane() {
        let status = MeshStatus::new("1.2.0").with_pilot("1.2.0");
        assert!(ensure_can_reset_proxies(&status).is_ok());
    }

    #[test]
    fn test_reset_with_prerelease_target() {
        let status = MeshStatus::new("1.2.0-distroless")
            .with_client("1.2.0")
            .with_pilot("1.2.0")
            .with_data_plane(["1.2.0"]);
        assert!(ensure_can_reset_proxies(&status).is_ok());
    }

    #[test]
    fn test_reset_without_pilot_is_an_error() {
        let status = MeshStatus::new("1.2.0");
        assert!(matches!(
            ensure_can_reset_proxies(&status),
            Err(CoreError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_client_compatible_with_target() {
        let cases = [
            ("1.2.0", "1.2.0", true),
            ("1.2.5", "1.2.0", true),
            ("1.2.0", "1.2.5", true),
            ("1.3.0", "1.2.0", true),
            ("1.1.0", "1.2.0", true),
            ("1.0.0", "1.2.0", false),
            ("1.4.0", "1.2.0", false),
        ];

        for (client, target, expected) in cases {
            let status = MeshStatus::new(target).with_client(client);
            assert_eq!(
                client_compatible_with_target(&status),
                expected,
                "client {} target {}",
                client,
                target
            );
        }
    }

    #[test]
    fn test_client_compatible_fails_closed() {
        let status = MeshStatus::new("1.2.0").with_client("version1");
        assert!(!client_compatible_with_target(&status));

        let status = MeshStatus::new("version2").with_client("1.2.0");
        assert!(!client_compatible_with_target(&status));

        let status = MeshStatus::new("1.2.0");
        assert!(!client_compatible_with_target(&status));
    }
}
