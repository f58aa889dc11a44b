// crates/scrubcut-core/src/error.rs
//
// Error taxonomy for the media core.
//
//   OpenError       : fatal to one load attempt; the handle is never created.
//   DecodeError     : local to one read; the handle stays usable.
//   GenerationError : why a thumbnail/waveform task ended in `failed`.
//   PlaybackError   : transport operation rejected, or its frame failed to decode.
//
// Cancellation is not an error: a superseded task is an expected
// outcome, modelled as `TaskOutcome::Cancelled` in scrubcut-media.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpenError {
    #[error("media file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported media: {0}")]
    Unsupported(String),

    #[error("no decodable stream in {}", .0.display())]
    NoStream(PathBuf),

    #[error("decoder backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("open failed: {0}")]
    Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("timestamp {t:.3}s outside [0, {duration:.3}]")]
    OutOfRange { t: f64, duration: f64 },

    #[error("corrupt data at {t:.3}s: {msg}")]
    Corrupt { t: f64, msg: String },

    #[error("source has no audio stream")]
    NoAudio,

    #[error("decode handle is closed")]
    Closed,

    #[error("decode failed: {0}")]
    Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("non-positive duration")]
    EmptyRange,

    #[error("no audio")]
    NoAudio,

    #[error("could not start worker: {0}")]
    Spawn(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("no media loaded")]
    NoSource,

    #[error("transport is stopped")]
    Stopped,

    /// Position was held; the same failure went out as `PlaybackEvent::Error`.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
