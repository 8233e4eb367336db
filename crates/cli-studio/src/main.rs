use anyhow::{Context, Result};
use clap::Parser;
use lipsync_studio::reporter::event_channel;
use lipsync_studio::trim::format_time;
use lipsync_studio::{
    JobQueue, JobStatus, MediaAsset, SimulatedReporter, Studio, StudioHandle, UploadSlot,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lipsync")]
#[command(about = "Lip-sync job runner with trim support", long_about = None)]
#[command(version)]
struct Args {
    /// Visual input (video or still image)
    #[arg(long, value_name = "FILE")]
    video: PathBuf,

    /// Audio input
    #[arg(long, value_name = "FILE")]
    audio: PathBuf,

    /// Duration of the visual input in seconds
    #[arg(long, value_name = "SECONDS")]
    video_duration: Option<f64>,

    /// Duration of the audio input in seconds
    #[arg(long, value_name = "SECONDS")]
    audio_duration: Option<f64>,

    /// Trim the visual input to START:END seconds
    #[arg(long, value_name = "START:END", value_parser = parse_trim)]
    video_trim: Option<(f64, f64)>,

    /// Trim the audio input to START:END seconds
    #[arg(long, value_name = "START:END", value_parser = parse_trim)]
    audio_trim: Option<(f64, f64)>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the final studio snapshot as JSON
    #[arg(long)]
    json: bool,
}

fn parse_trim(value: &str) -> std::result::Result<(f64, f64), String> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got '{}'", value))?;
    let start = start
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid trim start '{}': {}", start, e))?;
    let end = end
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid trim end '{}': {}", end, e))?;
    Ok((start, end))
}

/// Build an asset from a file on disk, classifying it by extension
fn load_asset(path: &Path, duration_seconds: Option<f64>) -> Result<MediaAsset> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {:?}", path))?;
    let mime = mime_guess::from_path(path)
        .first()
        .with_context(|| format!("Cannot determine media type of {:?}", path))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let asset = MediaAsset::from_mime(name, metadata.len(), mime.essence_str())?;
    Ok(match duration_seconds {
        Some(duration) => asset.with_duration(duration),
        None => asset,
    })
}

async fn stage_input(
    handle: &StudioHandle,
    slot: UploadSlot,
    asset: MediaAsset,
    trim: Option<(f64, f64)>,
) -> Result<()> {
    info!(
        "{} input: {} ({}, {} bytes)",
        slot, asset.name, asset.kind, asset.size_bytes
    );
    handle.set_asset(slot, asset).await?;

    if let Some((start, end)) = trim {
        let candidate = handle.adjust_range(slot, start, end).await?;
        if (candidate.start(), candidate.end()) != (start, end) {
            warn!("Requested {} trim {}:{} clamped to {}", slot, start, end, candidate);
        }
        let applied = handle.apply_trim(slot).await?;
        info!(
            "Applied {} trim: {} ({} - {})",
            slot,
            applied,
            format_time(applied.start()),
            format_time(applied.end())
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    info!("Lip-sync studio v{}", env!("CARGO_PKG_VERSION"));

    let config = match lipsync_studio::config::load_config(args.config.as_deref()) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    info!("Estimated job time: {} seconds", config.estimated_job_secs);
    info!("Max active jobs: {:?}", config.max_active_jobs);
    info!(
        "Simulated worker: tick {} ms, increments {}..{}%, failure rate {}",
        config.simulator.tick_interval_ms,
        config.simulator.min_increment,
        config.simulator.max_increment,
        config.simulator.failure_rate
    );

    let video = load_asset(&args.video, args.video_duration)?;
    let audio = load_asset(&args.audio, args.audio_duration)?;

    let (events_tx, events_rx) = event_channel();
    let reporter = Arc::new(SimulatedReporter::new(config.simulator.clone(), events_tx));
    let studio = Studio::new(JobQueue::new(reporter, &config));
    let (handle, task) = lipsync_studio::spawn_studio_loop(studio, events_rx);

    let outcome = run_job(&handle, video, audio, &args).await;

    handle.shutdown().await;
    let studio = task.await.context("Studio loop panicked")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&studio.snapshot())?);
    }

    match outcome? {
        JobStatus::Completed => Ok(()),
        status => anyhow::bail!("Job finished as {:?}", status),
    }
}

/// Stage both inputs, submit one job and follow it to a terminal state
async fn run_job(
    handle: &StudioHandle,
    video: MediaAsset,
    audio: MediaAsset,
    args: &Args,
) -> Result<JobStatus> {
    stage_input(handle, UploadSlot::Visual, video, args.video_trim).await?;
    stage_input(handle, UploadSlot::Audio, audio, args.audio_trim).await?;

    let mut snapshots = handle.subscribe();
    let job = handle.submit().await?;
    info!("Submitted job {} ({:?})", job.id, job.status);

    let mut last_progress = -1.0;
    loop {
        if snapshots.changed().await.is_err() {
            anyhow::bail!("Studio loop stopped before job {} finished", job.id);
        }
        let snapshot = snapshots.borrow_and_update().clone();
        let Some(record) = snapshot.job(&job.id) else {
            anyhow::bail!("Job {} disappeared from the queue", job.id);
        };

        if record.progress > last_progress {
            last_progress = record.progress;
            match record.remaining_seconds() {
                Some(remaining) => info!(
                    "Job {}: {:.0}% (about {} remaining)",
                    record.id,
                    record.progress,
                    format_time(remaining as f64)
                ),
                None => info!("Job {}: {:.0}%", record.id, record.progress),
            }
        }

        match record.status {
            JobStatus::Completed => {
                info!(
                    "Job {} completed: {}",
                    record.id,
                    record.result_handle.as_deref().unwrap_or("<no result>")
                );
                if let Some(elapsed) = record.processing_time() {
                    info!(
                        "Processing time: {:.1}s",
                        elapsed.num_milliseconds() as f64 / 1000.0
                    );
                }
                return Ok(JobStatus::Completed);
            }
            JobStatus::Failed => {
                error!(
                    "Job {} failed: {}",
                    record.id,
                    record.failure_reason.as_deref().unwrap_or("unknown reason")
                );
                return Ok(JobStatus::Failed);
            }
            JobStatus::Pending | JobStatus::Processing => {}
        }
    }
}
