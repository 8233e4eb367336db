// Lip-sync studio core: trim ranges, trim sessions and the job queue

pub mod config;
pub mod error;
pub mod jobs;
pub mod media;
pub mod queue;
pub mod reporter;
pub mod session;
pub mod studio;
pub mod studio_loop;
pub mod trim;

// Re-export commonly used types
pub use config::StudioConfig;
pub use error::{Result, StudioError};
pub use jobs::{JobRecord, JobStatus, MediaRef};
pub use media::{MediaAsset, MediaKind, UploadSlot};
pub use queue::JobQueue;
pub use reporter::{ProgressReporter, ReporterEvent, SimulatedReporter};
pub use session::TrimSession;
pub use studio::{Studio, StudioSnapshot};
pub use studio_loop::{run_studio_loop, spawn_studio_loop, StudioHandle};
pub use trim::{clamp_range, compute_initial_range, TrimRange, MIN_TRIM_SPAN};
