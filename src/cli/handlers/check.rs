use anyhow::{Context, Result};
use crate::cli::commands::{CheckArgs, ReportFormat};
use crate::config::{describe_environment, BrokerConfig, RawConfig};
use crate::kafka::RdKafkaCluster;
use crate::probe::{run_probes_in_task, ConfigSummary};
use crate::report::{JsonReporter, ReportRenderer, TerminalReporter};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run the probe and return the process exit code
pub async fn handle_check_command(args: CheckArgs) -> Result<i32> {
    let raw = args.apply(RawConfig::from_env());
    let terminal = TerminalReporter::new();

    if args.format == ReportFormat::Terminal {
        terminal.print_environment(&describe_environment(|key| std::env::var(key).ok()))?;
    }

    let config = match BrokerConfig::try_from(raw) {
        Ok(config) => config,
        Err(e) => {
            println!("❌ Configuration is invalid: {}", e);
            return Ok(1);
        }
    };

    if args.format == ReportFormat::Terminal {
        terminal.print_config(&ConfigSummary::from(&config))?;
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping at the next stage");
            interrupt.cancel();
        }
    });

    let cluster = Arc::new(RdKafkaCluster::new(config.clone()));
    let report = run_probes_in_task(cluster, config, cancel)
        .await
        .context("Probe run aborted")?;

    let renderer: Box<dyn ReportRenderer> = match args.format {
        ReportFormat::Terminal => Box::new(terminal),
        ReportFormat::Json => Box::new(JsonReporter::new().with_output(args.output.clone())),
    };
    renderer
        .render(&report)
        .with_context(|| format!("Failed to render {} report", renderer.name()))?;

    if let Some(path) = report_file(&args) {
        info!("Report written to {}", path.display());
    }

    Ok(report.verdict().exit_code())
}

/// File the JSON report goes to; `-` means stdout
fn report_file(args: &CheckArgs) -> Option<&Path> {
    args.output
        .as_deref()
        .filter(|path| args.format == ReportFormat::Json && *path != Path::new("-"))
}
