use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SimulatorConfig;
use crate::jobs::MediaRef;

/// The worker that actually performs lip-sync processing.
///
/// Both calls are fire-and-forget. Outcomes come back later as
/// [`ReporterEvent`]s on the channel the reporter was built with, never as
/// direct mutations of a job record.
pub trait ProgressReporter: Send + Sync {
    fn begin_job(&self, job_id: &str, video: &MediaRef, audio: &MediaRef);

    /// Best effort; the worker may still report on the job afterwards
    fn cancel_job(&self, job_id: &str);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReporterEvent {
    Progress { job_id: String, percent: f64 },
    Success { job_id: String, result_handle: String },
    Failure { job_id: String, reason: String },
}

impl ReporterEvent {
    pub fn job_id(&self) -> &str {
        match self {
            ReporterEvent::Progress { job_id, .. }
            | ReporterEvent::Success { job_id, .. }
            | ReporterEvent::Failure { job_id, .. } => job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReporterEvent::Progress { .. })
    }
}

pub type EventSender = mpsc::UnboundedSender<ReporterEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ReporterEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Requests forwarded to an out-of-process worker by [`ChannelReporter`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum WorkerRequest {
    Begin {
        job_id: String,
        video: MediaRef,
        audio: MediaRef,
    },
    Cancel {
        job_id: String,
    },
}

/// Reporter that hands every request to a worker over a channel.
///
/// The worker answers by sending [`ReporterEvent`]s into the studio's event
/// channel.
pub struct ChannelReporter {
    requests: mpsc::UnboundedSender<WorkerRequest>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkerRequest>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, rx)
    }

    fn forward(&self, request: WorkerRequest) {
        if self.requests.send(request).is_err() {
            warn!("Worker request channel closed, request dropped");
        }
    }
}

impl ProgressReporter for ChannelReporter {
    fn begin_job(&self, job_id: &str, video: &MediaRef, audio: &MediaRef) {
        self.forward(WorkerRequest::Begin {
            job_id: job_id.to_string(),
            video: video.clone(),
            audio: audio.clone(),
        });
    }

    fn cancel_job(&self, job_id: &str) {
        self.forward(WorkerRequest::Cancel {
            job_id: job_id.to_string(),
        });
    }
}

/// Stand-in worker that fakes progress on a timer.
///
/// Each job gets its own task: after `start_delay_ms` it adds a random
/// increment every `tick_interval_ms` and reports success once progress
/// reaches 100. Must be used from inside a Tokio runtime.
pub struct SimulatedReporter {
    config: SimulatorConfig,
    events: EventSender,
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
    jobs_started: AtomicU64,
}

impl SimulatedReporter {
    pub fn new(config: SimulatorConfig, events: EventSender) -> Self {
        Self {
            config,
            events,
            tokens: Arc::new(Mutex::new(HashMap::new())),
            jobs_started: AtomicU64::new(0),
        }
    }

    /// Number of simulated jobs still running
    pub fn running_jobs(&self) -> usize {
        lock_tokens(&self.tokens).len()
    }

    fn plan(&self) -> SimulationPlan {
        let n = self.jobs_started.fetch_add(1, Ordering::SeqCst);
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(n)),
            None => StdRng::from_entropy(),
        };

        let failure_rate = self.config.failure_rate.clamp(0.0, 1.0);
        let fail_at = if rng.gen_bool(failure_rate) {
            Some(rng.gen_range(0.0..100.0))
        } else {
            None
        };

        SimulationPlan {
            rng,
            start_delay: Duration::from_millis(self.config.start_delay_ms),
            tick: Duration::from_millis(self.config.tick_interval_ms),
            min_increment: self.config.min_increment,
            max_increment: self.config.max_increment,
            fail_at,
        }
    }
}

impl ProgressReporter for SimulatedReporter {
    fn begin_job(&self, job_id: &str, video: &MediaRef, audio: &MediaRef) {
        info!(
            "Simulating lip sync for job {}: {} + {}",
            job_id, video.name, audio.name
        );

        let token = CancellationToken::new();
        lock_tokens(&self.tokens).insert(job_id.to_string(), token.clone());

        let plan = self.plan();
        let events = self.events.clone();
        let tokens = Arc::clone(&self.tokens);
        let job_id = job_id.to_string();

        tokio::spawn(async move {
            simulate_job(&job_id, plan, &events, &token).await;
            lock_tokens(&tokens).remove(&job_id);
        });
    }

    fn cancel_job(&self, job_id: &str) {
        match lock_tokens(&self.tokens).remove(job_id) {
            Some(token) => {
                debug!("Cancelling simulated job {}", job_id);
                token.cancel();
            }
            None => debug!("No simulated job {} to cancel", job_id),
        }
    }
}

struct SimulationPlan {
    rng: StdRng,
    start_delay: Duration,
    tick: Duration,
    min_increment: f64,
    max_increment: f64,
    /// Progress at which the simulated worker gives up, if it is going to
    fail_at: Option<f64>,
}

impl SimulationPlan {
    fn next_increment(&mut self) -> f64 {
        if self.max_increment > self.min_increment {
            self.rng.gen_range(self.min_increment..self.max_increment)
        } else {
            self.max_increment
        }
    }
}

async fn simulate_job(
    job_id: &str,
    mut plan: SimulationPlan,
    events: &EventSender,
    token: &CancellationToken,
) {
    if !wait_or_cancel(token, plan.start_delay).await {
        debug!("Simulated job {} cancelled before start", job_id);
        return;
    }

    let mut progress = 0.0_f64;
    loop {
        if !wait_or_cancel(token, plan.tick).await {
            debug!("Simulated job {} cancelled at {:.1}%", job_id, progress);
            return;
        }

        progress += plan.next_increment();

        if let Some(fail_at) = plan.fail_at {
            if progress >= fail_at {
                let _ = events.send(ReporterEvent::Failure {
                    job_id: job_id.to_string(),
                    reason: "simulated worker failure".to_string(),
                });
                return;
            }
        }

        let sent = events.send(ReporterEvent::Progress {
            job_id: job_id.to_string(),
            percent: progress.min(100.0),
        });
        if sent.is_err() {
            debug!("Event channel closed, stopping simulated job {}", job_id);
            return;
        }

        if progress >= 100.0 {
            let _ = events.send(ReporterEvent::Success {
                job_id: job_id.to_string(),
                result_handle: format!("#result-{}", job_id),
            });
            return;
        }
    }
}

/// Sleep for `duration`; false if the token fired first
async fn wait_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

fn lock_tokens(
    tokens: &Mutex<HashMap<String, CancellationToken>>,
) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
    tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
