use lipsync_studio::config::{SimulatorConfig, StudioConfig};
use lipsync_studio::error::StudioError;
use lipsync_studio::jobs::JobStatus;
use lipsync_studio::media::{MediaAsset, MediaKind, UploadSlot};
use lipsync_studio::queue::JobQueue;
use lipsync_studio::reporter::{
    event_channel, ChannelReporter, ReporterEvent, SimulatedReporter, WorkerRequest,
};
use lipsync_studio::studio::Studio;
use lipsync_studio::studio_loop::spawn_studio_loop;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

fn video() -> MediaAsset {
    MediaAsset::from_mime("face.mp4", 8_192, "video/mp4")
        .unwrap()
        .with_duration(95.3)
}

fn audio() -> MediaAsset {
    MediaAsset::from_mime("voice.mp3", 4_096, "audio/mpeg")
        .unwrap()
        .with_duration(30.0)
}

fn simulated_config(failure_rate: f64) -> StudioConfig {
    StudioConfig {
        simulator: SimulatorConfig {
            failure_rate,
            seed: Some(42),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// **Feature: lipsync-studio, Property 11: Observed progress is non-decreasing**
/// A consumer watching snapshots sees progress for a job rise monotonically
/// and end at exactly 100 once the job completes
#[tokio::test(start_paused = true)]
async fn test_simulated_job_runs_to_completion() {
    let config = simulated_config(0.0);
    let (events_tx, events_rx) = event_channel();
    let reporter = Arc::new(SimulatedReporter::new(config.simulator.clone(), events_tx));
    let studio = Studio::new(JobQueue::new(reporter, &config));
    let (handle, task) = spawn_studio_loop(studio, events_rx);

    handle.set_asset(UploadSlot::Visual, video()).await.unwrap();
    handle.set_asset(UploadSlot::Audio, audio()).await.unwrap();
    handle.adjust_range(UploadSlot::Visual, 10.0, 40.0).await.unwrap();
    let trim = handle.apply_trim(UploadSlot::Visual).await.unwrap();

    let mut snapshots = handle.subscribe();
    let job = handle.submit().await.unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.video_trim, Some(trim));

    let mut last_progress = 0.0;
    loop {
        snapshots.changed().await.unwrap();
        let snapshot = snapshots.borrow_and_update().clone();
        let record = snapshot.job(&job.id).unwrap();

        assert!(record.progress >= last_progress);
        last_progress = record.progress;

        if record.status == JobStatus::Completed {
            assert_eq!(record.progress, 100.0);
            assert_eq!(
                record.result_handle.as_deref(),
                Some(format!("#result-{}", job.id).as_str())
            );
            break;
        }
        assert_eq!(record.status, JobStatus::Processing);
    }

    handle.shutdown().await;
    let studio = task.await.unwrap();
    assert_eq!(studio.queue().count_status(JobStatus::Completed), 1);
}

#[tokio::test(start_paused = true)]
async fn test_simulated_failure_keeps_queue_usable() {
    let config = simulated_config(1.0);
    let (events_tx, events_rx) = event_channel();
    let reporter = Arc::new(SimulatedReporter::new(config.simulator.clone(), events_tx));
    let studio = Studio::new(JobQueue::new(reporter, &config));
    let (handle, task) = spawn_studio_loop(studio, events_rx);

    handle.set_asset(UploadSlot::Visual, video()).await.unwrap();
    handle.set_asset(UploadSlot::Audio, audio()).await.unwrap();
    let job = handle.submit().await.unwrap();

    let mut snapshots = handle.subscribe();
    let failed = loop {
        snapshots.changed().await.unwrap();
        let snapshot = snapshots.borrow_and_update().clone();
        let record = snapshot.job(&job.id).unwrap().clone();
        if record.status == JobStatus::Failed {
            break record;
        }
    };
    assert_eq!(failed.failure_reason.as_deref(), Some("simulated worker failure"));
    assert!(failed.result_handle.is_none());

    // The failed record is kept and a new submission is still accepted
    let retry = handle.submit().await.unwrap();
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.jobs.len(), 2);
    assert_eq!(snapshot.jobs[0].id, retry.id);
    assert_eq!(snapshot.jobs[1].status, JobStatus::Failed);

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_delete_cancels_simulated_job() {
    let config = simulated_config(0.0);
    let (events_tx, events_rx) = event_channel();
    let reporter = Arc::new(SimulatedReporter::new(config.simulator.clone(), events_tx));
    let studio = Studio::new(JobQueue::new(reporter.clone(), &config));
    let (handle, task) = spawn_studio_loop(studio, events_rx);

    handle.set_asset(UploadSlot::Visual, video()).await.unwrap();
    handle.set_asset(UploadSlot::Audio, audio()).await.unwrap();
    let job = handle.submit().await.unwrap();
    assert_eq!(reporter.running_jobs(), 1);

    handle.delete_job(&job.id).await.unwrap();
    assert_eq!(reporter.running_jobs(), 0);

    sleep(Duration::from_secs(60)).await;
    assert!(handle.snapshot().jobs.is_empty());
    assert!(matches!(
        handle.delete_job(&job.id).await,
        Err(StudioError::JobNotFound(_))
    ));

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn test_stale_worker_events_after_delete_are_discarded() {
    let (reporter, mut requests) = ChannelReporter::new();
    let (events_tx, events_rx) = event_channel();
    let studio = Studio::new(JobQueue::new(Arc::new(reporter), &StudioConfig::default()));
    let (handle, task) = spawn_studio_loop(studio, events_rx);

    handle.set_asset(UploadSlot::Visual, video()).await.unwrap();
    handle.set_asset(UploadSlot::Audio, audio()).await.unwrap();
    let job = handle.submit().await.unwrap();
    assert!(matches!(requests.recv().await, Some(WorkerRequest::Begin { .. })));

    handle.delete_job(&job.id).await.unwrap();
    assert_eq!(
        requests.recv().await,
        Some(WorkerRequest::Cancel {
            job_id: job.id.clone()
        })
    );

    // A worker that ignores the cancellation still reports in
    events_tx
        .send(ReporterEvent::Success {
            job_id: job.id.clone(),
            result_handle: "handle-1".to_string(),
        })
        .unwrap();

    // Events are handled in order, so once progress for a live job shows up
    // the stale success has been through the loop too
    let live = handle.submit().await.unwrap();
    let mut snapshots = handle.subscribe();
    events_tx
        .send(ReporterEvent::Progress {
            job_id: live.id.clone(),
            percent: 30.0,
        })
        .unwrap();
    loop {
        snapshots.changed().await.unwrap();
        let snapshot = snapshots.borrow_and_update().clone();
        if snapshot.job(&live.id).map(|record| record.progress) == Some(30.0) {
            break;
        }
    }

    let snapshot = handle.snapshot();
    assert!(snapshot.job(&job.id).is_none());
    assert_eq!(snapshot.jobs.len(), 1);
    assert_eq!(snapshot.jobs[0].status, JobStatus::Processing);
    assert!(snapshot.jobs[0].result_handle.is_none());

    handle.shutdown().await;
    let studio = task.await.unwrap();
    assert_eq!(studio.queue().len(), 1);
    assert_eq!(studio.queue().count_status(JobStatus::Completed), 0);
}

#[tokio::test]
async fn test_handle_surfaces_trim_errors() {
    let (reporter, _requests) = ChannelReporter::new();
    let (_events_tx, events_rx) = event_channel();
    let studio = Studio::new(JobQueue::new(Arc::new(reporter), &StudioConfig::default()));
    let (handle, task) = spawn_studio_loop(studio, events_rx);

    assert!(matches!(
        handle.seek(UploadSlot::Visual, 3.0).await,
        Err(StudioError::MissingInput(UploadSlot::Visual))
    ));

    let image = MediaAsset::new("face.png", 100, MediaKind::Image);
    handle.set_asset(UploadSlot::Visual, image).await.unwrap();
    assert!(matches!(
        handle.adjust_range(UploadSlot::Visual, 0.0, 1.0).await,
        Err(StudioError::UnsupportedKind(_))
    ));

    handle.set_asset(UploadSlot::Audio, audio()).await.unwrap();
    assert!(matches!(
        handle.adjust_range(UploadSlot::Audio, 10.0, 10.05).await,
        Err(StudioError::InvalidRange { .. })
    ));
    let reset = handle.reset_range(UploadSlot::Audio).await.unwrap();
    assert_eq!(reset.end(), 30.0);

    handle.remove_asset(UploadSlot::Audio).await.unwrap();
    assert!(handle.snapshot().audio.asset.is_none());
    assert!(matches!(
        handle.submit().await,
        Err(StudioError::MissingInput(UploadSlot::Audio))
    ));

    handle.shutdown().await;
    task.await.unwrap();
    assert!(matches!(
        handle.submit().await,
        Err(StudioError::LoopClosed)
    ));
}
