// crates/scrubcut-media/src/lib.rs
//
// Shared decode access, background generation and playback.
// No UI dependency; consumers talk to it through event channels only.
//
// To add a new generation kind:
//   1. Add a `TaskKind` + params/event variants in scrubcut-core
//   2. Write a `BackgroundJob` module here
//   3. Map the params to it in `task::job_for`

pub mod handle;
pub mod playback;
pub mod source;
pub mod supervisor;
pub mod synthetic;
pub mod task;
pub mod thumbnails;
pub mod waveform;

#[cfg(feature = "backend-ffmpeg")]
pub mod ffmpeg_source;
mod helpers;

// Re-export the main public API so front ends import from one place.
pub use handle::DecodeHandle;
pub use playback::PlaybackDriver;
pub use source::MediaSource;
pub use supervisor::{TaskRecord, TaskSupervisor};
pub use synthetic::SyntheticSource;
pub use task::{CancelFlag, TaskOutcome};
