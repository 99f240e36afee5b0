//! Reel worker binary.
//!
//! Submits each request file to an in-process job manager, waits for every
//! job to finish and prints its status.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_models::{JobRequest, JobStatus, JobStatusResponse};
use reel_worker::{metrics, JobManager, WorkerConfig};

#[derive(Debug, Parser)]
#[command(name = "reel-worker", version, about = "Render highlight reels from video clips")]
struct Cli {
    /// Root for reels/, tmp/ and caches (overrides UPLOADS_ROOT)
    #[arg(long, env = "UPLOADS_ROOT")]
    uploads_root: Option<PathBuf>,

    /// Status poll interval in milliseconds
    #[arg(long, default_value_t = 250)]
    poll_ms: u64,

    /// Print the JSON schema of a job request and exit
    #[arg(long)]
    print_schema: bool,

    /// Job request JSON files
    #[arg(value_name = "REQUEST.json")]
    requests: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    if cli.print_schema {
        let schema = schemars::schema_for!(JobRequest);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }
    if cli.requests.is_empty() {
        anyhow::bail!("no request files given");
    }

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let addr: SocketAddr = addr.parse().context("invalid METRICS_ADDR")?;
        metrics::init_prometheus(addr).context("failed to install Prometheus exporter")?;
        info!(%addr, "Serving Prometheus metrics");
    }

    let mut config = WorkerConfig::from_env();
    if let Some(root) = cli.uploads_root {
        config = config.with_uploads_root(root);
    }
    let tools = config.toolchain().resolve().context("FFmpeg toolchain unavailable")?;
    config.ffmpeg_bin = tools.ffmpeg;
    config.ffprobe_bin = tools.ffprobe;
    info!("Worker config: {:?}", config);

    let manager = JobManager::new(config);
    manager.start();

    let mut submitted = Vec::new();
    let mut failures = 0usize;
    for path in &cli.requests {
        let body = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let request: JobRequest = serde_json::from_slice(&body)
            .with_context(|| format!("invalid request in {}", path.display()))?;
        match manager.submit(request).await {
            Ok(response) => {
                info!(job_id = %response.job_id, file = %path.display(), "Submitted");
                submitted.push((path.clone(), response.job_id));
            }
            Err(e) => {
                error!(file = %path.display(), "Rejected: {}", e);
                failures += 1;
            }
        }
    }

    let poll = Duration::from_millis(cli.poll_ms.max(10));
    for (path, job_id) in submitted {
        let Some(job) = manager.wait_for_terminal(&job_id, poll).await else {
            warn!(job_id = %job_id, "Job disappeared before finishing");
            failures += 1;
            continue;
        };
        if job.status == JobStatus::Failed {
            failures += 1;
        }
        let status = JobStatusResponse::from(&job);
        let report = serde_json::json!({
            "request": path,
            "job_id": job_id,
            "status": status,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if failures > 0 {
        anyhow::bail!("{} job(s) failed", failures);
    }
    Ok(())
}

/// Colored output for dev, JSON for production (`LOG_FORMAT=json`).
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("reel=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}
