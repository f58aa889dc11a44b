// crates/scrubcut-core/src/playback_types.rs
//
// Transport state and the events a playback driver publishes.

use std::fmt;
use std::sync::Arc;

use crate::media_types::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    Stopped,
    Paused,
    Playing,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transport::Stopped => "stopped",
            Transport::Paused  => "paused",
            Transport::Playing => "playing",
        })
    }
}

/// Snapshot of the driver's state. Observers get copies, never references.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackState {
    /// Seconds, always within `[0, duration]`.
    pub position:  f64,
    pub transport: Transport,
    /// Zero until a source is loaded.
    pub duration:  f64,
    pub fps:       f64,
    pub looping:   bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            position:  0.0,
            transport: Transport::Stopped,
            duration:  0.0,
            fps:       0.0,
            looping:   false,
        }
    }
}

impl PlaybackState {
    pub fn clamp(&self, t: f64) -> f64 {
        if t.is_nan() { return 0.0; }
        t.clamp(0.0, self.duration.max(0.0))
    }

    pub fn is_playing(&self) -> bool {
        self.transport == Transport::Playing
    }
}

#[derive(Clone, Debug)]
pub enum PlaybackEvent {
    FrameReady { frame: Arc<Frame>, timestamp: f64 },
    PositionChanged(f64),
    StateChanged(Transport),
    ClipLoaded { duration: f64 },
    /// A decode failed; position was held and playback paused.
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_stopped_and_empty() {
        let s = PlaybackState::default();
        assert_eq!(s.transport, Transport::Stopped);
        assert_eq!(s.clamp(3.0), 0.0);
    }

    #[test]
    fn clamp_uses_duration() {
        let s = PlaybackState { duration: 10.0, ..Default::default() };
        assert_eq!(s.clamp(-5.0), 0.0);
        assert_eq!(s.clamp(999.0), 10.0);
    }

    #[test]
    fn transport_labels() {
        assert_eq!(Transport::Playing.to_string(), "playing");
        assert_eq!(Transport::Stopped.to_string(), "stopped");
    }
}
