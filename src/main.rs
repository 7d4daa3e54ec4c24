//! cid-audit — batch retrievability check for a shuttle's stored CIDs.
//!
//! Reads the matching CIDs from the content index, probes each one through
//! the shuttle's gateway with a fixed pool of workers, and prints a summary.
//!
//! Exit codes: 0 all items probed, 1 fatal startup error, 2 the run ended
//! before every item had an outcome (deadline expired or a worker died).

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use cid_audit::config::{Args, AuditConfig, LogFormat};
use cid_audit::{report, ContentIndex, GatewayProbe, SourceQuery, WorkerPool};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("CID audit v{}", env!("CARGO_PKG_VERSION"));

    let config = AuditConfig::resolve(&args).context("Invalid configuration")?;

    let source = ContentIndex::open(&config.db_path).context("Failed to open content index")?;
    info!(path = %source.path().display(), "Content index opened");
    let probe = GatewayProbe::new(&config.gateway_scheme, &config.shuttle, config.probe_timeout)
        .context("Failed to set up gateway probe")?;
    let pool = WorkerPool::new(Arc::new(probe), config.probe_timeout);
    let query = SourceQuery::new(config.shuttle.clone(), config.from_date, config.to_date);

    let run_id = uuid::Uuid::new_v4();
    let span = info_span!("audit", %run_id, shuttle = %config.shuttle);
    let audit = cid_audit::execute(
        &source,
        &query,
        &pool,
        config.worker_count,
        config.deadline,
    )
    .instrument(span)
    .await
    .context("Audit could not start")?;

    if args.summary_json {
        println!(
            "{}",
            report::render_json(&config.shuttle, &audit).context("Failed to encode summary")?
        );
    } else {
        print!("{}", report::render_text(&config.shuttle, &audit));
    }

    Ok(if audit.complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cid_audit=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
