// crates/scrubcut-media/src/handle.rs
//
// DecodeHandle: the only legal path to frames and audio of one open source.
//
// Every accessor takes the source lock for exactly one read and releases it
// on every exit path (the guard drops at the end of the call, success or
// error). Nothing is ever held across reads, so a background task and the
// playback scheduler interleave at unit granularity and neither can starve
// the other for more than one decode.
//
// The handle also carries the generation counter for its source. Only the
// task supervisor advances it (crate-private); anyone may read it.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use scrubcut_core::media_types::{AudioSamples, Frame, MediaInfo};
use scrubcut_core::{DecodeError, GenerationToken, HandleId, OpenError};

use crate::source::MediaSource;

struct Inner {
    id:         HandleId,
    info:       MediaInfo,
    /// `None` once closed.
    source:     Mutex<Option<Box<dyn MediaSource>>>,
    generation: AtomicU64,
}

/// Cheap to clone; all clones refer to the same source and lock.
#[derive(Clone)]
pub struct DecodeHandle {
    inner: Arc<Inner>,
}

impl DecodeHandle {
    /// Wrap an already-open source.
    pub fn open(source: impl MediaSource + 'static) -> Self {
        let info = source.info().clone();
        let id   = Uuid::new_v4();
        log::debug!(
            "[handle] {id} opened: {:.2}s @ {:.2} fps, {}x{}, audio={}",
            info.duration, info.fps, info.width, info.height, info.has_audio
        );
        Self {
            inner: Arc::new(Inner {
                id,
                info,
                source:     Mutex::new(Some(Box::new(source))),
                generation: AtomicU64::new(GenerationToken::INITIAL.value()),
            }),
        }
    }

    /// Open a media file with the ffmpeg backend. `audio_rate` is the mono
    /// rate audio is resampled to for analysis.
    pub fn open_path(path: &Path, audio_rate: u32) -> Result<Self, OpenError> {
        if !path.exists() {
            return Err(OpenError::NotFound(path.to_path_buf()));
        }
        Self::open_backend(path, audio_rate)
    }

    #[cfg(feature = "backend-ffmpeg")]
    fn open_backend(path: &Path, audio_rate: u32) -> Result<Self, OpenError> {
        let source = crate::ffmpeg_source::FfmpegSource::open(path, audio_rate)?;
        Ok(Self::open(source))
    }

    #[cfg(not(feature = "backend-ffmpeg"))]
    fn open_backend(path: &Path, _audio_rate: u32) -> Result<Self, OpenError> {
        log::warn!("[handle] cannot open {}: built without backend-ffmpeg", path.display());
        Err(OpenError::BackendUnavailable(
            "built without the `backend-ffmpeg` feature".into(),
        ))
    }

    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    pub fn info(&self) -> &MediaInfo {
        &self.inner.info
    }

    pub fn duration(&self) -> f64 {
        self.inner.info.duration
    }

    pub fn read_frame(&self, t: f64) -> Result<Frame, DecodeError> {
        let mut guard = self.inner.source.lock();
        let source = guard.as_mut().ok_or(DecodeError::Closed)?;
        source.read_frame(t)
    }

    pub fn read_audio_range(&self, t0: f64, t1: f64) -> Result<AudioSamples, DecodeError> {
        let mut guard = self.inner.source.lock();
        let source = guard.as_mut().ok_or(DecodeError::Closed)?;
        source.read_audio(t0, t1)
    }

    /// Release the underlying decoder. Waits for an in-flight read to finish;
    /// later reads from any clone fail with `DecodeError::Closed`.
    pub fn close(&self) {
        let released = self.inner.source.lock().take();
        if released.is_some() {
            log::debug!("[handle] {} closed", self.inner.id);
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.source.lock().is_some()
    }

    /// Token of the most recent generation request against this handle.
    pub fn current_generation(&self) -> GenerationToken {
        GenerationToken::new(self.inner.generation.load(Ordering::Acquire))
    }

    pub(crate) fn advance_generation(&self) -> GenerationToken {
        let prev = self.inner.generation.fetch_add(1, Ordering::AcqRel);
        GenerationToken::new(prev).next()
    }

    pub fn same_source(&self, other: &DecodeHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for DecodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeHandle")
            .field("id", &self.inner.id)
            .field("duration", &self.inner.info.duration)
            .field("generation", &self.current_generation())
            .finish()
    }
}
