use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::StudioConfig;
use crate::error::{Result, StudioError};
use crate::jobs::{create_job, update_job_status, JobRecord, JobStatus, MediaRef};
use crate::media::{MediaAsset, UploadSlot};
use crate::reporter::{ProgressReporter, ReporterEvent};

/// Owns every job record and drives their status transitions.
///
/// Records are kept newest first. They change only through this type: on
/// submission, on user cancellation or deletion, and when the reporter sends
/// an event. Events for ids that are no longer queued are dropped.
pub struct JobQueue {
    jobs: VecDeque<JobRecord>,
    reporter: Arc<dyn ProgressReporter>,
    estimated_job_secs: Option<f64>,
    max_active_jobs: Option<usize>,
}

impl JobQueue {
    pub fn new(reporter: Arc<dyn ProgressReporter>, config: &StudioConfig) -> Self {
        Self {
            jobs: VecDeque::new(),
            reporter,
            estimated_job_secs: Some(config.estimated_job_secs),
            max_active_jobs: config.max_active_jobs,
        }
    }

    /// Submit an untrimmed (visual, audio) pair
    pub fn submit(
        &mut self,
        video: Option<&MediaAsset>,
        audio: Option<&MediaAsset>,
    ) -> Result<JobRecord> {
        self.submit_refs(
            video.map(|asset| MediaRef::new(asset.name.clone(), None)),
            audio.map(|asset| MediaRef::new(asset.name.clone(), None)),
        )
    }

    /// Submit a pair together with the trims committed for each input
    ///
    /// Returns as soon as the record is queued; processing is reported later
    /// through reporter events.
    pub fn submit_refs(
        &mut self,
        video: Option<MediaRef>,
        audio: Option<MediaRef>,
    ) -> Result<JobRecord> {
        let video = video.ok_or(StudioError::MissingInput(UploadSlot::Visual))?;
        let audio = audio.ok_or(StudioError::MissingInput(UploadSlot::Audio))?;

        let job = create_job(video, audio, self.estimated_job_secs);
        let id = job.id.clone();
        info!(
            "Created job {} for {} + {}",
            id, job.video_name, job.audio_name
        );

        self.jobs.push_front(job);
        self.admit_pending();

        self.get(&id)
            .cloned()
            .ok_or_else(|| StudioError::job_not_found(id))
    }

    pub fn get(&self, job_id: &str) -> Option<&JobRecord> {
        self.jobs.iter().find(|job| job.id == job_id)
    }

    /// Like [`JobQueue::get`], but an unknown id is a `JobNotFound` error
    pub fn get_or_err(&self, job_id: &str) -> Result<&JobRecord> {
        self.get(job_id)
            .ok_or_else(|| StudioError::job_not_found(job_id))
    }

    /// Records in display order, newest first
    pub fn jobs(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Number of jobs currently in `Processing`
    pub fn active_count(&self) -> usize {
        self.count_status(JobStatus::Processing)
    }

    pub fn count_status(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|job| job.status == status).count()
    }

    /// Apply one reporter event; returns whether any record changed
    pub fn apply_event(&mut self, event: ReporterEvent) -> bool {
        match event {
            ReporterEvent::Progress { job_id, percent } => self.on_progress(&job_id, percent),
            ReporterEvent::Success {
                job_id,
                result_handle,
            } => self.on_success(&job_id, result_handle),
            ReporterEvent::Failure { job_id, reason } => self.on_failure(&job_id, reason),
        }
    }

    /// Record progress; lower or out-of-range values never move it backwards
    pub fn on_progress(&mut self, job_id: &str, percent: f64) -> bool {
        let Some(job) = self.find_mut(job_id) else {
            debug!("Discarding progress for unknown job {}", job_id);
            return false;
        };

        if job.status != JobStatus::Processing || percent.is_nan() {
            debug!(
                "Ignoring progress {} for job {} in state {:?}",
                percent, job_id, job.status
            );
            return false;
        }

        let percent = percent.clamp(0.0, 100.0);
        if percent <= job.progress {
            return false;
        }
        job.progress = percent;
        true
    }

    pub fn on_success(&mut self, job_id: &str, result_handle: impl Into<String>) -> bool {
        let Some(job) = self.find_mut(job_id) else {
            debug!("Discarding success for unknown job {}", job_id);
            return false;
        };

        if job.status.is_terminal() {
            debug!("Job {} already {:?}, ignoring success", job_id, job.status);
            return false;
        }

        update_job_status(job, JobStatus::Completed);
        job.result_handle = Some(result_handle.into());
        info!("Job {} completed", job_id);

        self.admit_pending();
        true
    }

    pub fn on_failure(&mut self, job_id: &str, reason: impl Into<String>) -> bool {
        let Some(job) = self.find_mut(job_id) else {
            debug!("Discarding failure for unknown job {}", job_id);
            return false;
        };

        if job.status.is_terminal() {
            debug!("Job {} already {:?}, ignoring failure", job_id, job.status);
            return false;
        }

        let reason = reason.into();
        warn!("Job {} failed: {}", job_id, reason);
        update_job_status(job, JobStatus::Failed);
        job.failure_reason = Some(reason);

        self.admit_pending();
        true
    }

    /// Stop a job but keep its record
    ///
    /// Pending and processing jobs end up `Failed`; terminal jobs are left
    /// as they are.
    pub fn cancel(&mut self, job_id: &str) -> Result<()> {
        let status = self.get_or_err(job_id)?.status;
        if status.is_terminal() {
            return Ok(());
        }

        if status == JobStatus::Processing {
            self.reporter.cancel_job(job_id);
        }
        self.on_failure(job_id, "cancelled by user");
        Ok(())
    }

    /// Remove a job from the queue, whatever its state
    ///
    /// A processing job gets a cancellation request first. Any event that
    /// still arrives for it afterwards is dropped.
    pub fn delete(&mut self, job_id: &str) -> Result<JobRecord> {
        if self.get_or_err(job_id)?.status == JobStatus::Processing {
            info!("Requesting cancellation of job {}", job_id);
            self.reporter.cancel_job(job_id);
        }

        let removed = self
            .jobs
            .iter()
            .position(|job| job.id == job_id)
            .and_then(|index| self.jobs.remove(index))
            .ok_or_else(|| StudioError::job_not_found(job_id))?;
        info!("Job {} removed from queue", job_id);

        self.admit_pending();
        Ok(removed)
    }

    fn find_mut(&mut self, job_id: &str) -> Option<&mut JobRecord> {
        self.jobs.iter_mut().find(|job| job.id == job_id)
    }

    fn has_free_slot(&self) -> bool {
        match self.max_active_jobs {
            Some(cap) => self.active_count() < cap,
            None => true,
        }
    }

    /// Start pending jobs, oldest first, while the admission cap allows
    fn admit_pending(&mut self) {
        while self.has_free_slot() {
            let Some(job) = self
                .jobs
                .iter_mut()
                .rev()
                .find(|job| job.status == JobStatus::Pending)
            else {
                break;
            };

            update_job_status(job, JobStatus::Processing);
            debug!("Admitted job {}", job.id);

            let (id, video, audio) = (job.id.clone(), job.video_ref(), job.audio_ref());
            self.reporter.begin_job(&id, &video, &audio);
        }
    }
}
