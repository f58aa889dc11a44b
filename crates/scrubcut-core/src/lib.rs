// crates/scrubcut-core/src/lib.rs
//
// Plain data shared by scrubcut-media and its front ends: channel payloads,
// errors and configuration. No ffmpeg, no threads.

pub mod clip;
pub mod config;
pub mod error;
pub mod generation;
pub mod helpers;
pub mod media_types;
pub mod playback_types;

pub use error::{ConfigError, DecodeError, GenerationError, OpenError, PlaybackError};
pub use generation::{GenerationToken, HandleId, TaskId, TaskKind, TaskState};
