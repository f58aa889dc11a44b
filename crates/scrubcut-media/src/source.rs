// crates/scrubcut-media/src/source.rs
//
// The seam between the concurrency core and whatever actually decodes.
//
// Implementations are free to be stateful and non-reentrant (ffmpeg contexts
// are); `DecodeHandle` guarantees that at most one thread calls into a source
// at a time, so nothing here needs its own locking.

use scrubcut_core::media_types::{AudioSamples, Frame, MediaInfo};
use scrubcut_core::DecodeError;

pub trait MediaSource: Send {
    fn info(&self) -> &MediaInfo;

    /// Decode the frame displayed at `t` seconds, as packed RGBA.
    fn read_frame(&mut self, t: f64) -> Result<Frame, DecodeError>;

    /// Decode mono samples covering `[t0, t1)` at `info().sample_rate`.
    fn read_audio(&mut self, t0: f64, t1: f64) -> Result<AudioSamples, DecodeError>;
}

/// Half a frame of slack when range-checking timestamps near the end.
pub(crate) fn check_range(info: &MediaInfo, t: f64) -> Result<(), DecodeError> {
    let slack = info.frame_interval() * 0.5;
    if t.is_nan() || t < -slack || t > info.duration + slack {
        return Err(DecodeError::OutOfRange { t, duration: info.duration });
    }
    Ok(())
}
