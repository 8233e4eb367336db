use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{Result, StudioError};
use crate::jobs::JobRecord;
use crate::media::{MediaAsset, UploadSlot};
use crate::reporter::EventReceiver;
use crate::studio::{Studio, StudioSnapshot};
use crate::trim::TrimRange;

const COMMAND_BUFFER: usize = 64;

/// A user action routed into the studio loop
#[derive(Debug)]
pub enum StudioCommand {
    SetAsset {
        slot: UploadSlot,
        asset: MediaAsset,
        reply: oneshot::Sender<Result<()>>,
    },
    SetDuration {
        slot: UploadSlot,
        duration_seconds: f64,
        reply: oneshot::Sender<Result<()>>,
    },
    RemoveAsset {
        slot: UploadSlot,
        reply: oneshot::Sender<()>,
    },
    Seek {
        slot: UploadSlot,
        position: f64,
        reply: oneshot::Sender<Result<f64>>,
    },
    AdjustRange {
        slot: UploadSlot,
        start: f64,
        end: f64,
        reply: oneshot::Sender<Result<TrimRange>>,
    },
    ResetRange {
        slot: UploadSlot,
        reply: oneshot::Sender<Result<TrimRange>>,
    },
    ApplyTrim {
        slot: UploadSlot,
        reply: oneshot::Sender<Result<TrimRange>>,
    },
    Submit {
        reply: oneshot::Sender<Result<JobRecord>>,
    },
    CancelJob {
        job_id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    DeleteJob {
        job_id: String,
        reply: oneshot::Sender<Result<JobRecord>>,
    },
    Shutdown,
}

/// Main studio loop
///
/// Commands and reporter events are handled one at a time on this task, so
/// no two mutations ever overlap. A fresh snapshot is published after every
/// command and after every event that changed a job. Returns the studio once
/// a `Shutdown` command arrives or every command sender is gone.
pub async fn run_studio_loop(
    mut studio: Studio,
    mut commands: mpsc::Receiver<StudioCommand>,
    mut events: EventReceiver,
    snapshots: watch::Sender<StudioSnapshot>,
) -> Studio {
    info!("Starting studio loop");
    let mut events_open = true;

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(StudioCommand::Shutdown) | None => break,
                    Some(command) => handle_command(&mut studio, command, &snapshots),
                }
            }
            event = events.recv(), if events_open => {
                match event {
                    Some(event) => {
                        debug!("Reporter event: {:?}", event);
                        if studio.handle_event(event) {
                            snapshots.send_replace(studio.snapshot());
                        }
                    }
                    None => {
                        debug!("Reporter event channel closed");
                        events_open = false;
                    }
                }
            }
        }
    }

    info!("Studio loop stopped");
    studio
}

fn handle_command(
    studio: &mut Studio,
    command: StudioCommand,
    snapshots: &watch::Sender<StudioSnapshot>,
) {
    match command {
        StudioCommand::SetAsset { slot, asset, reply } => {
            let result = studio.set_asset(slot, asset);
            respond(studio, snapshots, reply, result);
        }
        StudioCommand::SetDuration {
            slot,
            duration_seconds,
            reply,
        } => {
            let result = studio.set_duration(slot, duration_seconds);
            respond(studio, snapshots, reply, result);
        }
        StudioCommand::RemoveAsset { slot, reply } => {
            studio.remove_asset(slot);
            respond(studio, snapshots, reply, ());
        }
        StudioCommand::Seek {
            slot,
            position,
            reply,
        } => {
            let result = studio.seek(slot, position);
            respond(studio, snapshots, reply, result);
        }
        StudioCommand::AdjustRange {
            slot,
            start,
            end,
            reply,
        } => {
            let result = studio.adjust_range(slot, start, end);
            respond(studio, snapshots, reply, result);
        }
        StudioCommand::ResetRange { slot, reply } => {
            let result = studio.reset_range(slot);
            respond(studio, snapshots, reply, result);
        }
        StudioCommand::ApplyTrim { slot, reply } => {
            let result = studio.apply_trim(slot);
            respond(studio, snapshots, reply, result);
        }
        StudioCommand::Submit { reply } => {
            let result = studio.submit();
            respond(studio, snapshots, reply, result);
        }
        StudioCommand::CancelJob { job_id, reply } => {
            let result = studio.cancel_job(&job_id);
            respond(studio, snapshots, reply, result);
        }
        StudioCommand::DeleteJob { job_id, reply } => {
            let result = studio.delete_job(&job_id);
            respond(studio, snapshots, reply, result);
        }
        StudioCommand::Shutdown => {}
    }
}

/// Publish the new state before answering, so a caller that reads the
/// snapshot after its request returns sees its own change
fn respond<T>(
    studio: &Studio,
    snapshots: &watch::Sender<StudioSnapshot>,
    reply: oneshot::Sender<T>,
    value: T,
) {
    snapshots.send_replace(studio.snapshot());
    // A dropped reply receiver just means the caller stopped waiting
    let _ = reply.send(value);
}

/// Start the studio loop on the current runtime
pub fn spawn_studio_loop(
    studio: Studio,
    events: EventReceiver,
) -> (StudioHandle, JoinHandle<Studio>) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshots_tx, snapshots_rx) = watch::channel(studio.snapshot());

    let task = tokio::spawn(run_studio_loop(studio, commands_rx, events, snapshots_tx));
    let handle = StudioHandle {
        commands: commands_tx,
        snapshots: snapshots_rx,
    };
    (handle, task)
}

/// Cloneable client for a running studio loop
#[derive(Clone)]
pub struct StudioHandle {
    commands: mpsc::Sender<StudioCommand>,
    snapshots: watch::Receiver<StudioSnapshot>,
}

impl StudioHandle {
    /// Subscribe to snapshots published after each mutation
    pub fn subscribe(&self) -> watch::Receiver<StudioSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> StudioSnapshot {
        self.snapshots.borrow().clone()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> StudioCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| StudioError::LoopClosed)?;
        response.await.map_err(|_| StudioError::LoopClosed)
    }

    pub async fn set_asset(&self, slot: UploadSlot, asset: MediaAsset) -> Result<()> {
        self.request(|reply| StudioCommand::SetAsset { slot, asset, reply })
            .await?
    }

    pub async fn set_duration(&self, slot: UploadSlot, duration_seconds: f64) -> Result<()> {
        self.request(|reply| StudioCommand::SetDuration {
            slot,
            duration_seconds,
            reply,
        })
        .await?
    }

    pub async fn remove_asset(&self, slot: UploadSlot) -> Result<()> {
        self.request(|reply| StudioCommand::RemoveAsset { slot, reply })
            .await
    }

    pub async fn seek(&self, slot: UploadSlot, position: f64) -> Result<f64> {
        self.request(|reply| StudioCommand::Seek {
            slot,
            position,
            reply,
        })
        .await?
    }

    pub async fn adjust_range(&self, slot: UploadSlot, start: f64, end: f64) -> Result<TrimRange> {
        self.request(|reply| StudioCommand::AdjustRange {
            slot,
            start,
            end,
            reply,
        })
        .await?
    }

    pub async fn reset_range(&self, slot: UploadSlot) -> Result<TrimRange> {
        self.request(|reply| StudioCommand::ResetRange { slot, reply })
            .await?
    }

    pub async fn apply_trim(&self, slot: UploadSlot) -> Result<TrimRange> {
        self.request(|reply| StudioCommand::ApplyTrim { slot, reply })
            .await?
    }

    pub async fn submit(&self) -> Result<JobRecord> {
        self.request(|reply| StudioCommand::Submit { reply }).await?
    }

    pub async fn cancel_job(&self, job_id: &str) -> Result<()> {
        let job_id = job_id.to_string();
        self.request(|reply| StudioCommand::CancelJob { job_id, reply })
            .await?
    }

    pub async fn delete_job(&self, job_id: &str) -> Result<JobRecord> {
        let job_id = job_id.to_string();
        self.request(|reply| StudioCommand::DeleteJob { job_id, reply })
            .await?
    }

    /// Ask the loop to stop; a loop that is already gone is not an error
    pub async fn shutdown(&self) {
        let _ = self.commands.send(StudioCommand::Shutdown).await;
    }
}
