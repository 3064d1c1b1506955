//! packmule entry point.
//!
//! Scans a source directory, queues every file as an upload record, and
//! drives the batch through the scheduler into a destination store,
//! logging progress along the way.

mod config;
mod scanner;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing_subscriber::EnvFilter;

use packmule_scheduler::{BatchEvent, SchedulerConfig, UploadScheduler};
use packmule_transfer::{DirStore, RetryPolicy};

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting packmule");

    let app_config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            AppConfig::default()
        }
    };

    let args = parse_args(std::env::args().skip(1), &app_config)?;

    let records = scanner::scan_directory(&args.source)
        .with_context(|| format!("scanning {}", args.source.display()))?;
    if records.is_empty() {
        bail!("nothing to upload in {}", args.source.display());
    }
    tracing::info!(
        files = records.len(),
        destination = %args.destination.display(),
        concurrency = args.concurrency,
        "batch queued"
    );

    let transport = Arc::new(DirStore::new(&args.destination));
    let scheduler_config = SchedulerConfig {
        concurrent_uploads: args.concurrency,
        retry: RetryPolicy {
            max_attempts: app_config.max_attempts,
            ..RetryPolicy::default()
        },
        metadata: HashMap::from([("submitter".to_string(), app_config.submitter.clone())]),
    };
    let mut scheduler = UploadScheduler::new(transport, scheduler_config);

    let records: Vec<_> = records.into_iter().map(Arc::new).collect();
    let names: HashMap<String, String> = records
        .iter()
        .map(|r| (r.id().to_string(), r.name().to_string()))
        .collect();

    // Log events as they arrive; the scheduler never blocks on us.
    if let Some(mut events) = scheduler.take_events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    BatchEvent::Completed { record_id } => {
                        let name = names.get(&record_id).map(String::as_str).unwrap_or("?");
                        tracing::info!(file = name, "complete");
                    }
                    BatchEvent::Failed { record_id, error } => {
                        let name = names.get(&record_id).map(String::as_str).unwrap_or("?");
                        tracing::warn!(file = name, error = %error, "failed");
                    }
                    BatchEvent::Progress { record_id, percent } => {
                        let name = names.get(&record_id).map(String::as_str).unwrap_or("?");
                        tracing::debug!(file = name, percent, "uploading");
                    }
                    BatchEvent::StatusChanged { record_id, status } => {
                        let name = names.get(&record_id).map(String::as_str).unwrap_or("?");
                        tracing::debug!(file = name, status = ?status, "status changed");
                    }
                }
            }
        });
    }

    let report = scheduler.run(records).await;

    for outcome in &report.outcomes {
        if let Some(error) = &outcome.error {
            tracing::error!(
                file = %outcome.name,
                attempts = outcome.attempts,
                error = %error,
                "upload failed"
            );
        }
    }
    tracing::info!(
        completed = report.completed,
        failed = report.failed,
        "batch finished"
    );

    Ok(if report.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

struct Args {
    source: PathBuf,
    destination: PathBuf,
    concurrency: usize,
}

const USAGE: &str = "usage: packmule <source-dir> [dest-dir] [--concurrency N]";

fn parse_args(
    args: impl Iterator<Item = String>,
    config: &AppConfig,
) -> anyhow::Result<Args> {
    let mut source = None;
    let mut destination = None;
    let mut concurrency = config.concurrent_uploads;

    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--concurrency" | "-c" => {
                let value = args.next().context("--concurrency requires a value")?;
                concurrency = value
                    .parse()
                    .with_context(|| format!("invalid concurrency: {value}"))?;
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            _ if source.is_none() => source = Some(PathBuf::from(arg)),
            _ if destination.is_none() => destination = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument: {arg}"),
        }
    }

    let source = source.context(USAGE)?;
    let destination = match destination {
        Some(d) => d,
        None if !config.destination.is_empty() => PathBuf::from(&config.destination),
        None => bail!("no destination given and none configured"),
    };

    Ok(Args {
        source,
        destination,
        concurrency,
    })
}
