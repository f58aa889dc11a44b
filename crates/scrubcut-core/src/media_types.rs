// crates/scrubcut-core/src/media_types.rs
//
// Types that flow out of a decode handle and across channels to consumers.
// Plain data only; no ffmpeg, no locks.

use std::path::PathBuf;

/// Static description of an open media source, captured once at open time.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    /// `None` for generated sources.
    pub path:        Option<PathBuf>,
    pub duration:    f64,
    pub fps:         f64,
    /// Rate at which `read_audio_range` delivers mono samples.
    pub sample_rate: u32,
    pub width:       u32,
    pub height:      u32,
    pub has_audio:   bool,
}

impl MediaInfo {
    /// Clamp `t` into `[0, duration]`. NaN maps to 0.
    pub fn clamp_time(&self, t: f64) -> f64 {
        if t.is_nan() { return 0.0; }
        t.clamp(0.0, self.duration.max(0.0))
    }

    /// Duration of one frame in seconds, never zero.
    pub fn frame_interval(&self) -> f64 {
        if self.fps > 0.0 { 1.0 / self.fps } else { 1.0 / 24.0 }
    }
}

/// One decoded video frame, tightly packed RGBA8 (no stride padding).
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub timestamp: f64,
    pub width:     u32,
    pub height:    u32,
    pub data:      Vec<u8>,
}

impl Frame {
    /// Byte offset of pixel `(x, y)` in `data`.
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }
}

/// A contiguous run of mono f32 samples starting at `start` seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSamples {
    pub start:       f64,
    pub sample_rate: u32,
    pub samples:     Vec<f32>,
}

impl AudioSamples {
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 { return 0.0; }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A single downsampled preview frame produced by a thumbnail task.
#[derive(Clone, Debug, PartialEq)]
pub struct Thumbnail {
    /// Position in the requested set (0-based, timestamp order).
    pub index:     usize,
    pub timestamp: f64,
    pub frame:     Frame,
}

/// A slice of a waveform envelope delivered before the task finishes.
/// `points` are raw RMS values; the final envelope is normalised.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformChunk {
    /// Index of `points[0]` within the full envelope.
    pub offset: usize,
    pub points: Vec<f32>,
}

/// Complete amplitude envelope, normalised to `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    pub start:             f64,
    pub points_per_second: u32,
    pub envelope:          Vec<f32>,
}

impl Waveform {
    /// Envelope value nearest to `t` seconds, if `t` is covered.
    pub fn value_at(&self, t: f64) -> Option<f32> {
        if t < self.start || self.points_per_second == 0 { return None; }
        let idx = ((t - self.start) * self.points_per_second as f64) as usize;
        self.envelope.get(idx).copied()
    }
}
