//! Label command - apply the sidecar injection label to namespaces

use console::style;
use std::path::Path;
use std::sync::Arc;

use meshward_core::{LabelPlan, SidecarMigration};
use meshward_kube::{
    ChartValueSource, DirChartSource, KubeNamespaceStore, LabelReport, NamespaceLabelReconciler,
    ReconcilerConfig,
};

use crate::error::{CliError, Result};

pub async fn run(chart_dir: &Path, config_file: Option<&Path>, dry_run: bool) -> Result<()> {
    let config = match config_file {
        Some(path) => ReconcilerConfig::from_file(path)?,
        None => ReconcilerConfig::default(),
    };

    let chart = DirChartSource::new(chart_dir)
        .values()
        .await
        .map_err(|e| CliError::config(format!("{}: {}", chart_dir.display(), e)))?;
    let migration = chart.sidecar_migration()?;
    tracing::debug!(chart = %chart_dir.display(), %migration, "loaded mesh chart");

    println!(
        "{} Sidecar migration is {} for chart {} {}",
        style("→").blue().bold(),
        style(migration).cyan(),
        style(&chart.metadata.name).cyan(),
        style(&chart.metadata.version).yellow()
    );

    let client = kube::Client::try_default().await?;
    let store = Arc::new(KubeNamespaceStore::new(client));
    let reconciler = NamespaceLabelReconciler::new(store, &config);

    if dry_run {
        let plan = reconciler.plan().await?;
        print_plan(&plan, reconciler.label().to_string(), migration);
        return Ok(());
    }

    let report = reconciler.reconcile(migration).await?;
    print_report(&report, reconciler.label().to_string());
    Ok(())
}

fn print_plan(plan: &LabelPlan, label: String, migration: SidecarMigration) {
    if !migration.is_active() {
        println!(
            "{} Labeling is inactive; a run would not patch any namespace",
            style("⚠").yellow()
        );
    }

    if plan.is_noop() {
        println!("{} All namespaces already carry {}", style("✓").green(), label);
    } else {
        println!("{} Would label with {}:", style("→").blue(), style(&label).cyan());
        for name in &plan.to_patch {
            println!("  {} {}", style("+").green(), name);
        }
    }

    for name in &plan.skipped {
        println!("  {} {}", style("=").dim(), style(name).dim());
    }

    println!();
    println!("{} Dry run: no namespaces were patched", style("ℹ").blue());
}

fn print_report(report: &LabelReport, label: String) {
    if !report.is_active() {
        println!(
            "{} Sidecar migration is not enabled, namespaces left unchanged",
            style("⚠").yellow()
        );
        return;
    }

    for name in &report.patched {
        println!("  {} {} labeled {}", style("✓").green(), name, label);
    }

    println!();
    println!(
        "{} {} namespace(s) labeled, {} skipped",
        style("✓").green().bold(),
        report.patched.len(),
        report.skipped.len()
    );
}
