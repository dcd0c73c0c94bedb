//! Prune Elasticsearch indices when their CloudWatch storage alarm fires.
//!
//! Meant to be run periodically (cron, systemd timer). Run with:
//! `logpruner --config /etc/logpruner/logpruner_config.yaml`

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use logpruner::{
    config::{Config, DEFAULT_CONFIG_PATH, REQUIRED_ENV_VARS},
    executor::{ContainerRunner, EnvironmentBindings, ProcessExecutor},
    metrics,
    prune::PruneOrchestrator,
    report::{ReportFormat, RunReport},
};

#[derive(Parser)]
#[command(author, version, about = "Prune Elasticsearch indices when their CloudWatch storage alarm fires", long_about = None)]
struct Cli {
    /// Index configuration file
    #[arg(short, long, env = "LOGPRUNER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Maintenance image providing the aws cli and curator
    #[arg(long)]
    image: Option<String>,

    /// Decide and log, but never delete
    #[arg(long)]
    dry_run: bool,

    /// Report format (json, text)
    #[arg(short, long, default_value = "json")]
    format: ReportFormat,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Write Prometheus metrics to this file after the run
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let report = match run(&cli).await {
        Ok(report) => report,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Indices have been processed by now; a publishing failure is reported
    // without hiding the per-index outcome.
    let published = match publish(&cli, &report) {
        Ok(()) => true,
        Err(e) => {
            error!("{:#}", e);
            false
        }
    };

    ExitCode::from(report.exit_code(published))
}

async fn run(cli: &Cli) -> Result<RunReport> {
    // Preconditions: nothing is queried unless all of these hold.
    let mut config = Config::load(&cli.config).context("Failed to load configuration")?;
    if let Some(image) = &cli.image {
        config.execution.image = image.clone();
    }
    config.execution.dry_run = cli.dry_run;

    let env = EnvironmentBindings::from_process_env(&REQUIRED_ENV_VARS)
        .context("Missing AWS credentials")?;
    metrics::register_metrics()?;

    let run_id = Uuid::new_v4();
    let span = info_span!("run", %run_id);

    let report = async {
        info!(
            config = %config.config_path.display(),
            indices = config.indices.len(),
            image = %config.execution.image,
            dry_run = config.execution.dry_run,
            "Starting prune run"
        );

        let runner = Arc::new(ContainerRunner::new(
            Arc::new(ProcessExecutor::new()),
            config.execution.image.clone(),
            env,
        ));
        let orchestrator =
            PruneOrchestrator::new(config.indices.clone(), runner, &config.execution);

        let started_at = Utc::now();
        let results = orchestrator.run_all().await;
        let finished_at = Utc::now();

        let report = RunReport {
            run_id,
            started_at,
            finished_at,
            dry_run: config.execution.dry_run,
            results,
        };
        info!(
            pruned = report.pruned_count(),
            failed = report.failed_count(),
            "Prune run finished"
        );
        report
    }
    .instrument(span)
    .await;

    Ok(report)
}

fn publish(cli: &Cli, report: &RunReport) -> Result<()> {
    println!("{}", report.render(cli.format, cli.pretty)?);

    metrics::mark_run_finished(report.finished_at.timestamp());
    if let Some(path) = &cli.metrics_file {
        metrics::write_textfile(path)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    Ok(())
}
