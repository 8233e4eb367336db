use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, StudioError};
use crate::jobs::{JobRecord, MediaRef};
use crate::media::{MediaAsset, UploadSlot};
use crate::queue::JobQueue;
use crate::reporter::ReporterEvent;
use crate::session::TrimSession;
use crate::trim::TrimRange;

/// Upload state for one input slot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotState {
    pub asset: Option<MediaAsset>,
    pub session: Option<TrimSession>,
    pub committed_trim: Option<TrimRange>,
}

impl SlotState {
    fn media_ref(&self) -> Option<MediaRef> {
        self.asset
            .as_ref()
            .map(|asset| MediaRef::new(asset.name.clone(), self.committed_trim))
    }
}

/// Read-only view handed to the presentation layer after every mutation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudioSnapshot {
    pub visual: SlotState,
    pub audio: SlotState,
    pub jobs: Vec<JobRecord>,
}

impl StudioSnapshot {
    pub fn job(&self, job_id: &str) -> Option<&JobRecord> {
        self.jobs.iter().find(|job| job.id == job_id)
    }
}

/// Everything one user works with: the two uploads, their trim sessions, and
/// the job queue.
pub struct Studio {
    visual: SlotState,
    audio: SlotState,
    queue: JobQueue,
}

impl Studio {
    pub fn new(queue: JobQueue) -> Self {
        Self {
            visual: SlotState::default(),
            audio: SlotState::default(),
            queue,
        }
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn slot(&self, slot: UploadSlot) -> &SlotState {
        match slot {
            UploadSlot::Visual => &self.visual,
            UploadSlot::Audio => &self.audio,
        }
    }

    fn slot_mut(&mut self, slot: UploadSlot) -> &mut SlotState {
        match slot {
            UploadSlot::Visual => &mut self.visual,
            UploadSlot::Audio => &mut self.audio,
        }
    }

    /// Put an uploaded asset into a slot, replacing whatever was there
    ///
    /// The slot's previous trim session and committed trim are discarded. A
    /// new session starts right away when the asset has a timeline and a
    /// known duration.
    pub fn set_asset(&mut self, slot: UploadSlot, asset: MediaAsset) -> Result<()> {
        if !slot.accepts(asset.kind) {
            return Err(StudioError::unsupported_kind(format!(
                "{} is {}, expected {}",
                asset.name, asset.kind, slot
            )));
        }

        let session = match asset.duration_seconds {
            Some(_) if asset.kind.has_timeline() => Some(TrimSession::for_asset(&asset)?),
            _ => None,
        };

        info!("{} uploaded: {} ({} bytes)", slot, asset.name, asset.size_bytes);
        *self.slot_mut(slot) = SlotState {
            asset: Some(asset),
            session,
            committed_trim: None,
        };
        Ok(())
    }

    /// Record the duration of an asset once it has been probed
    pub fn set_duration(&mut self, slot: UploadSlot, duration_seconds: f64) -> Result<()> {
        let state = self.slot_mut(slot);
        let asset = state
            .asset
            .as_mut()
            .ok_or(StudioError::MissingInput(slot))?;

        let probed = MediaAsset {
            duration_seconds: Some(duration_seconds),
            ..asset.clone()
        };
        let session = TrimSession::for_asset(&probed)?;

        *asset = probed;
        state.session = Some(session);
        state.committed_trim = None;
        Ok(())
    }

    /// Clear a slot entirely
    pub fn remove_asset(&mut self, slot: UploadSlot) {
        let state = self.slot_mut(slot);
        if let Some(asset) = state.asset.take() {
            info!("{} removed: {}", slot, asset.name);
        }
        *state = SlotState::default();
    }

    pub fn session(&self, slot: UploadSlot) -> Option<&TrimSession> {
        self.slot(slot).session.as_ref()
    }

    /// The slot's trim session, or why there is none
    pub fn session_mut(&mut self, slot: UploadSlot) -> Result<&mut TrimSession> {
        let state = self.slot_mut(slot);
        let asset = state.asset.as_ref().ok_or(StudioError::MissingInput(slot))?;
        if !asset.kind.has_timeline() {
            return Err(StudioError::unsupported_kind(format!(
                "{} ({}) cannot be trimmed",
                asset.name, asset.kind
            )));
        }
        state
            .session
            .as_mut()
            .ok_or(StudioError::InvalidDuration(f64::NAN))
    }

    pub fn seek(&mut self, slot: UploadSlot, position: f64) -> Result<f64> {
        Ok(self.session_mut(slot)?.seek(position))
    }

    pub fn adjust_range(&mut self, slot: UploadSlot, start: f64, end: f64) -> Result<TrimRange> {
        self.session_mut(slot)?.adjust_range(start, end)
    }

    pub fn reset_range(&mut self, slot: UploadSlot) -> Result<TrimRange> {
        Ok(self.session_mut(slot)?.reset())
    }

    /// Commit the slot's candidate range, superseding any earlier trim
    pub fn apply_trim(&mut self, slot: UploadSlot) -> Result<TrimRange> {
        let range = self.session_mut(slot)?.apply()?;
        self.slot_mut(slot).committed_trim = Some(range);
        info!("{} trimmed: {}", slot, range);
        Ok(range)
    }

    /// Submit the current pair with whatever trims have been committed
    pub fn submit(&mut self) -> Result<JobRecord> {
        let video = self.visual.media_ref();
        let audio = self.audio.media_ref();
        self.queue.submit_refs(video, audio)
    }

    pub fn cancel_job(&mut self, job_id: &str) -> Result<()> {
        self.queue.cancel(job_id)
    }

    pub fn delete_job(&mut self, job_id: &str) -> Result<JobRecord> {
        self.queue.delete(job_id)
    }

    pub fn handle_event(&mut self, event: ReporterEvent) -> bool {
        let changed = self.queue.apply_event(event);
        if !changed {
            debug!("Reporter event left the queue unchanged");
        }
        changed
    }

    pub fn snapshot(&self) -> StudioSnapshot {
        StudioSnapshot {
            visual: self.visual.clone(),
            audio: self.audio.clone(),
            jobs: self.queue.jobs().cloned().collect(),
        }
    }
}
