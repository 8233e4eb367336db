use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::trim::TrimRange;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    // Identity
    pub id: String,
    pub video_name: String,
    pub audio_name: String,

    // Trims committed at submission time
    pub video_trim: Option<TrimRange>,
    pub audio_trim: Option<TrimRange>,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    // Status
    pub status: JobStatus,
    pub progress: f64,
    pub failure_reason: Option<String>,

    // Outcome
    pub result_handle: Option<String>,
    pub estimated_duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One input of a job as handed to the processing worker: the asset name plus
/// the trim that was committed when the job was submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaRef {
    pub name: String,
    pub trim: Option<TrimRange>,
}

impl MediaRef {
    pub fn new(name: impl Into<String>, trim: Option<TrimRange>) -> Self {
        Self {
            name: name.into(),
            trim,
        }
    }
}

pub fn create_job(
    video: MediaRef,
    audio: MediaRef,
    estimated_duration_seconds: Option<f64>,
) -> JobRecord {
    JobRecord {
        id: format!("job-{}", Uuid::new_v4()),
        video_name: video.name,
        audio_name: audio.name,
        video_trim: video.trim,
        audio_trim: audio.trim,
        created_at: Utc::now(),
        started_at: None,
        completed_at: None,
        status: JobStatus::Pending,
        progress: 0.0,
        failure_reason: None,
        result_handle: None,
        estimated_duration_seconds,
    }
}

impl JobRecord {
    pub fn video_ref(&self) -> MediaRef {
        MediaRef::new(self.video_name.clone(), self.video_trim)
    }

    pub fn audio_ref(&self) -> MediaRef {
        MediaRef::new(self.audio_name.clone(), self.audio_trim)
    }

    /// Seconds left according to the advisory estimate, while processing
    pub fn remaining_seconds(&self) -> Option<u64> {
        if self.status != JobStatus::Processing {
            return None;
        }
        let estimate = self.estimated_duration_seconds?;
        let remaining = estimate * (1.0 - self.progress / 100.0);
        Some(remaining.max(0.0).round() as u64)
    }

    /// Wall time from submission to completion
    pub fn processing_time(&self) -> Option<Duration> {
        self.completed_at.map(|done| done - self.created_at)
    }
}

/// Move a job to `status`, stamping the matching timestamp
pub fn update_job_status(job: &mut JobRecord, status: JobStatus) {
    job.status = status;
    match status {
        JobStatus::Processing => job.started_at = Some(Utc::now()),
        JobStatus::Completed => {
            job.progress = 100.0;
            job.completed_at = Some(Utc::now());
        }
        JobStatus::Pending | JobStatus::Failed => {}
    }
}
