// crates/scrubcut-core/src/generation.rs
//
// Generation tokens, task identity, request parameters and the events the
// task supervisor publishes to its subscribers.
//
// A token is a per-handle epoch. Every result carries the token it was issued
// under; consumers only ever see results whose token is still current.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::GenerationError;
use crate::media_types::{Thumbnail, Waveform, WaveformChunk};

/// Identifies one open decode handle.
pub type HandleId = Uuid;
/// Identifies one dispatched background task.
pub type TaskId = Uuid;

/// Upper bound on thumbnails per request.
pub const MAX_THUMBNAILS: usize = 48;

/// Fewest thumbnails a strip sized from its on-screen width gets.
pub const MIN_STRIP_THUMBNAILS: usize = 3;

/// Strip pixels per thumbnail when the count follows the strip width.
pub const STRIP_PX_PER_THUMBNAIL: u32 = 100;

// ── Token ─────────────────────────────────────────────────────────────────────

/// Strictly increasing epoch scoped to one decode handle. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GenerationToken(u64);

impl GenerationToken {
    /// The token a freshly opened handle starts at; no task is ever issued it.
    pub const INITIAL: GenerationToken = GenerationToken(0);

    pub fn new(value: u64) -> Self { Self(value) }

    pub fn value(self) -> u64 { self.0 }

    pub fn next(self) -> Self { Self(self.0 + 1) }
}

impl fmt::Display for GenerationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

// ── Task identity ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Thumbnails,
    Waveform,
}

impl TaskKind {
    pub fn label(self) -> &'static str {
        match self {
            TaskKind::Thumbnails => "thumbnails",
            TaskKind::Waveform   => "waveform",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Running)
    }
}

// ── Request parameters ────────────────────────────────────────────────────────

/// Sub-range of a source, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end:   f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self { Self { start, end } }

    pub fn len(&self) -> f64 { self.end - self.start }

    /// Resolve an optional requested range against a source duration.
    /// Returns `None` when nothing positive-length remains.
    pub fn resolve(requested: Option<TimeRange>, duration: f64) -> Option<TimeRange> {
        if !(duration > 0.0) { return None; }
        let r = requested.unwrap_or(TimeRange::new(0.0, duration));
        let start = r.start.clamp(0.0, duration);
        let end   = r.end.clamp(0.0, duration);
        (end > start).then_some(TimeRange { start, end })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThumbnailParams {
    pub count:      usize,
    /// Thumbnails are downsampled to at most this many pixels wide.
    pub width_hint: u32,
    /// Thumbnails per progress batch.
    pub batch_size: usize,
    pub range:      Option<TimeRange>,
}

impl ThumbnailParams {
    /// How many thumbnails fill a strip `strip_px` wide: one per
    /// `STRIP_PX_PER_THUMBNAIL`, never fewer than `MIN_STRIP_THUMBNAILS`.
    pub fn count_for_strip(strip_px: u32) -> usize {
        ((strip_px / STRIP_PX_PER_THUMBNAIL) as usize).clamp(MIN_STRIP_THUMBNAILS, MAX_THUMBNAILS)
    }

    /// Count clamped to `1..=MAX_THUMBNAILS`.
    pub fn effective_count(&self) -> usize {
        self.count.clamp(1, MAX_THUMBNAILS)
    }

    /// Boundary-inclusive, evenly spaced sample times across `range`.
    ///
    /// ```
    /// use scrubcut_core::generation::{ThumbnailParams, TimeRange};
    /// let p = ThumbnailParams { count: 5, width_hint: 64, batch_size: 2, range: None };
    /// assert_eq!(p.timestamps(TimeRange::new(0.0, 10.0)), vec![0.0, 2.5, 5.0, 7.5, 10.0]);
    /// ```
    pub fn timestamps(&self, range: TimeRange) -> Vec<f64> {
        let n = self.effective_count();
        if n == 1 { return vec![range.start]; }
        let step = range.len() / (n - 1) as f64;
        (0..n)
            .map(|i| if i == n - 1 { range.end } else { range.start + step * i as f64 })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WaveformParams {
    pub points_per_second: u32,
    /// Seconds of audio decoded per lock acquisition.
    pub chunk_secs:        f64,
    pub range:             Option<TimeRange>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GenerationParams {
    Thumbnails(ThumbnailParams),
    Waveform(WaveformParams),
}

impl GenerationParams {
    pub fn kind(&self) -> TaskKind {
        match self {
            GenerationParams::Thumbnails(_) => TaskKind::Thumbnails,
            GenerationParams::Waveform(_)   => TaskKind::Waveform,
        }
    }

    pub fn range(&self) -> Option<TimeRange> {
        match self {
            GenerationParams::Thumbnails(p) => p.range,
            GenerationParams::Waveform(p)   => p.range,
        }
    }

    pub fn with_range(mut self, range: Option<TimeRange>) -> Self {
        match &mut self {
            GenerationParams::Thumbnails(p) => p.range = range,
            GenerationParams::Waveform(p)   => p.range = range,
        }
        self
    }
}

// ── Published events ──────────────────────────────────────────────────────────

/// What the supervisor forwards to subscribers. Only ever carries the current
/// token of its (handle, kind) slot; stale and cancelled results never appear.
#[derive(Clone, Debug)]
pub enum GenerationEvent {
    ThumbnailsProgress {
        handle: HandleId,
        token:  GenerationToken,
        batch:  Arc<Vec<Thumbnail>>,
    },
    ThumbnailsComplete {
        handle:     HandleId,
        token:      GenerationToken,
        params:     ThumbnailParams,
        thumbnails: Arc<Vec<Thumbnail>>,
    },
    ThumbnailsFailed {
        handle: HandleId,
        token:  GenerationToken,
        error:  GenerationError,
    },
    WaveformProgress {
        handle: HandleId,
        token:  GenerationToken,
        chunk:  Arc<WaveformChunk>,
    },
    WaveformComplete {
        handle:   HandleId,
        token:    GenerationToken,
        params:   WaveformParams,
        waveform: Arc<Waveform>,
    },
    WaveformFailed {
        handle: HandleId,
        token:  GenerationToken,
        error:  GenerationError,
    },
}

/// A (handle, kind) slot started or stopped having a live task. Published on
/// its own stream so result subscribers keep seeing results only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusyChange {
    pub handle: HandleId,
    pub kind:   TaskKind,
    pub busy:   bool,
}

impl GenerationEvent {
    pub fn handle(&self) -> HandleId {
        match self {
            GenerationEvent::ThumbnailsProgress { handle, .. }
            | GenerationEvent::ThumbnailsComplete { handle, .. }
            | GenerationEvent::ThumbnailsFailed { handle, .. }
            | GenerationEvent::WaveformProgress { handle, .. }
            | GenerationEvent::WaveformComplete { handle, .. }
            | GenerationEvent::WaveformFailed { handle, .. } => *handle,
        }
    }

    pub fn token(&self) -> GenerationToken {
        match self {
            GenerationEvent::ThumbnailsProgress { token, .. }
            | GenerationEvent::ThumbnailsComplete { token, .. }
            | GenerationEvent::ThumbnailsFailed { token, .. }
            | GenerationEvent::WaveformProgress { token, .. }
            | GenerationEvent::WaveformComplete { token, .. }
            | GenerationEvent::WaveformFailed { token, .. } => *token,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            GenerationEvent::ThumbnailsProgress { .. }
            | GenerationEvent::ThumbnailsComplete { .. }
            | GenerationEvent::ThumbnailsFailed { .. } => TaskKind::Thumbnails,
            _ => TaskKind::Waveform,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            GenerationEvent::ThumbnailsProgress { .. } | GenerationEvent::WaveformProgress { .. }
        )
    }
}
