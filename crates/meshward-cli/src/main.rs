//! Meshward CLI - Service mesh rollout checks and sidecar injection labeling

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;

use error::CliError;

#[derive(Parser)]
#[command(name = "meshward")]
#[command(author = "Meshward Contributors")]
#[command(version)]
#[command(about = "Service mesh rollout checks and sidecar injection labeling", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a version report for every reconciliation phase
    Check {
        /// Status report: a JSON mesh status or `istioctl version -o json` output
        report: PathBuf,

        /// Version to converge to (overrides the report's target)
        #[arg(short, long)]
        target: Option<String>,

        /// Proxy image prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Output the decisions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Label namespaces for sidecar injection according to the chart
    Label {
        /// Mesh chart directory (Chart.yaml and values.yaml)
        #[arg(short, long)]
        chart: PathBuf,

        /// Reconciler configuration file
        #[arg(long, env = "MESHWARD_CONFIG")]
        config: Option<PathBuf>,

        /// Show which namespaces would be labeled without patching
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result: Result<i32, CliError> = match cli.command {
        Commands::Check {
            report,
            target,
            prefix,
            json,
        } => commands::check::run(&report, target.as_deref(), prefix.as_deref(), json),

        Commands::Label {
            chart,
            config,
            dry_run,
        } => commands::label::run(&chart, config.as_deref(), dry_run)
            .await
            .map(|()| exit_codes::SUCCESS),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(code);
        }
    }
}
