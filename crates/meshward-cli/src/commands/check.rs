//! Check command - classify a version report for every phase

use console::style;
use serde::Serialize;
use std::path::Path;

use meshward_core::{LifecycleState, MeshStatus, Phase, engine};

use crate::error::{CliError, Result};
use crate::exit_codes;

/// Decision for a single phase
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub phase: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whether this decision blocks the reconcile cycle
    pub blocking: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub status: MeshStatus,
    pub compatible: bool,
    pub decisions: Vec<Decision>,
}

/// Run the check command, returning the process exit code
pub fn run(
    report: &Path,
    target: Option<&str>,
    prefix: Option<&str>,
    json_output: bool,
) -> Result<i32> {
    let status = load_status(report, target, prefix)?;
    tracing::debug!(
        target_version = %status.target_version,
        pilot = %status.pilot_version,
        data_plane = %status.data_plane_summary(","),
        "loaded mesh status"
    );
    let result = evaluate(status);

    if json_output {
        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::internal(e.to_string()))?;
        println!("{}", json);
    } else {
        print_report(&result);
    }

    Ok(if result.compatible {
        exit_codes::SUCCESS
    } else {
        exit_codes::INCOMPATIBLE
    })
}

/// Read either a serialized `MeshStatus` or the control tool's version output
pub fn load_status(path: &Path, target: Option<&str>, prefix: Option<&str>) -> Result<MeshStatus> {
    let content = std::fs::read_to_string(path)?;

    let start = content.find('{').ok_or_else(|| {
        CliError::report(format!("{} does not contain a JSON document", path.display()))
    })?;
    let mut value: serde_json::Value = serde_json::from_str(&content[start..])
        .map_err(|e| CliError::report(format!("{}: {}", path.display(), e)))?;

    if is_version_output(&value) {
        let target = target.ok_or_else(|| {
            CliError::report_with_help(
                "the version output does not name a target version",
                "pass the version to converge to with --target",
            )
        })?;
        return Ok(MeshStatus::from_version_output(
            content.as_bytes(),
            target,
            prefix.unwrap_or_default(),
        )?);
    }

    if let Some(object) = value.as_object_mut() {
        if let Some(target) = target {
            object.insert("targetVersion".to_string(), target.into());
        }
        if let Some(prefix) = prefix {
            object.insert("targetPrefix".to_string(), prefix.into());
        }
    }

    let status: MeshStatus = serde_json::from_value(value).map_err(|e| {
        CliError::report_with_help(
            format!("{}: {}", path.display(), e),
            "a status report needs at least targetVersion, or pass --target",
        )
    })?;

    if status.target_version.is_empty() {
        return Err(CliError::report_with_help(
            "the target version is empty",
            "pass the version to converge to with --target",
        ));
    }

    Ok(status)
}

/// `version -o json` output nests the client version and lists mesh components
fn is_version_output(value: &serde_json::Value) -> bool {
    value.get("meshVersion").is_some()
        || value.get("dataPlaneVersion").is_some()
        || value.get("clientVersion").is_some_and(|v| v.is_object())
}

/// Classify the status for every phase
pub fn evaluate(status: MeshStatus) -> CheckReport {
    let mut decisions = Vec::with_capacity(4);

    let precheck = engine::precheck(&status);
    let precheck_state = if precheck.is_ok() { "passed" } else { "rejected" };
    decisions.push(Decision {
        phase: Phase::PreCheck.to_string(),
        state: precheck_state.to_string(),
        reason: precheck.as_ref().err().map(ToString::to_string),
        blocking: precheck.is_err(),
    });

    let main = engine::decide_main(&status);
    let main_blocks = matches!(main, LifecycleState::Incompatible(_));
    decisions.push(decision(Phase::Reconcile, &main, main_blocks));
    decisions.push(decision(Phase::PostReset, &engine::decide_reset(&status), false));
    decisions.push(decision(Phase::Uninstall, &engine::decide_uninstall(&status), false));

    let compatible = !decisions.iter().any(|d| d.blocking);
    CheckReport {
        status,
        compatible,
        decisions,
    }
}

fn decision(phase: Phase, state: &LifecycleState, blocking: bool) -> Decision {
    Decision {
        phase: phase.to_string(),
        state: state.name().to_string(),
        reason: state.reason().map(ToString::to_string),
        blocking,
    }
}

fn print_report(report: &CheckReport) {
    let status = &report.status;
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };

    println!(
        "{} Mesh status against target {}",
        style("→").blue().bold(),
        style(&status.target_version).yellow()
    );
    println!("  {:<12} {}", "client", or_dash(&status.client_version));
    println!("  {:<12} {}", "pilot", or_dash(&status.pilot_version));
    println!(
        "  {:<12} {}",
        "data plane",
        or_dash(&status.data_plane_summary(", "))
    );
    println!();

    for decision in &report.decisions {
        let marker = if decision.blocking {
            style("✗").red()
        } else if decision.reason.is_some() {
            style("⚠").yellow()
        } else {
            style("✓").green()
        };
        println!("{} {:<12} {}", marker, decision.phase, decision.state);
        if let Some(reason) = &decision.reason {
            println!("    {}", style(reason).dim());
        }
    }

    println!();
    if report.compatible {
        println!("{} Ready to reconcile", style("✓").green().bold());
    } else {
        println!("{} Reconcile would be refused", style("✗").red().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_evaluate_update() {
        let report = evaluate(
            MeshStatus::new("1.2.0")
                .with_client("1.2.0")
                .with_pilot("1.1.0")
                .with_data_plane(["1.1.0"]),
        );

        assert!(report.compatible);
        let states: Vec<&str> = report.decisions.iter().map(|d| d.state.as_str()).collect();
        assert_eq!(
            states,
            vec!["passed", "update-eligible", "incompatible", "uninstall-eligible"]
        );
    }

    #[test]
    fn test_evaluate_blocked_by_client() {
        let report = evaluate(MeshStatus::new("1.2.0").with_client("1.0.0"));

        assert!(!report.compatible);
        assert!(report.decisions[0].blocking);
        insta::assert_snapshot!(
            report.decisions[0].reason.as_deref().unwrap_or_default(),
            @"client version '1.0.0' is not compatible with target version 1.2.0: the difference between versions exceeds one minor version"
        );
    }

    #[test]
    fn test_load_status_json() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "status.json",
            r#"{"clientVersion":"1.2.0","pilotVersion":"1.1.0","dataPlaneVersions":["1.1.0"]}"#,
        );

        let status = load_status(&path, Some("1.2.0"), None).unwrap();
        assert_eq!(status.target_version, "1.2.0");
        assert_eq!(status.pilot_version, "1.1.0");
    }

    #[test]
    fn test_load_status_requires_target() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "status.json", r#"{"pilotVersion":"1.1.0"}"#);

        assert!(matches!(
            load_status(&path, None, None),
            Err(CliError::Report { .. })
        ));
    }

    #[test]
    fn test_load_version_output() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "version.txt",
            r#"! some warning from the tool
{
  "clientVersion": {"version": "1.2.0"},
  "meshVersion": [{"Component": "pilot", "Info": {"version": "1.1.0"}}],
  "dataPlaneVersion": [{"IstioVersion": "1.1.0"}, {"IstioVersion": "1.0.0"}]
}"#,
        );

        let status = load_status(&path, Some("1.2.0"), Some("eu.gcr.io/istio")).unwrap();
        assert_eq!(status.client_version, "1.2.0");
        assert_eq!(status.pilot_version, "1.1.0");
        assert_eq!(status.data_plane_versions.len(), 2);
        assert_eq!(status.target_prefix, "eu.gcr.io/istio");

        assert!(load_status(&path, None, None).is_err());
    }

    #[test]
    fn test_load_status_missing_file() {
        let result = load_status(Path::new("/nonexistent/report.json"), Some("1.2.0"), None);
        assert!(matches!(result, Err(CliError::Io { .. })));
    }
}
