// crates/scrubcut-media/src/synthetic.rs
//
// Generated media source: no files, no ffmpeg.
//
// Video: a gradient whose red channel encodes the timestamp (0 at the start,
// 255 at the end), green ramps left→right, blue ramps top→bottom.
// Audio: a 220 Hz sine whose amplitude rises linearly from 0.1 to 1.0 across
// the duration, so a correct envelope is monotonically increasing.
//
// Knobs for exercising the core: a per-read delay (simulates slow decodes)
// and a timestamp at which reads fail with `DecodeError::Corrupt`.

use std::f64::consts::TAU;
use std::thread;
use std::time::Duration;

use scrubcut_core::media_types::{AudioSamples, Frame, MediaInfo};
use scrubcut_core::DecodeError;

use crate::source::{check_range, MediaSource};

const TONE_HZ: f64 = 220.0;

#[derive(Clone, Debug)]
pub struct SyntheticSource {
    info:       MediaInfo,
    read_delay: Duration,
    fail_at:    Option<f64>,
}

impl SyntheticSource {
    /// 30 fps, 160×90, 8 kHz mono audio.
    pub fn new(duration: f64) -> Self {
        Self {
            info: MediaInfo {
                path:        None,
                duration:    duration.max(0.0),
                fps:         30.0,
                sample_rate: 8000,
                width:       160,
                height:      90,
                has_audio:   true,
            },
            read_delay: Duration::ZERO,
            fail_at:    None,
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.info.fps = fps;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.info.width  = width.max(1);
        self.info.height = height.max(1);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.info.sample_rate = rate.max(1);
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.info.has_audio = false;
        self
    }

    /// Sleep this long inside every read (i.e. while the handle is locked).
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Frame reads within half a frame of `t`, and audio reads whose range
    /// contains `t`, fail as corrupt.
    pub fn failing_at(mut self, t: f64) -> Self {
        self.fail_at = Some(t);
        self
    }

    fn delay(&self) {
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }
    }

    /// Red channel value used for the frame at `t`.
    pub fn marker_for(&self, t: f64) -> u8 {
        if self.info.duration <= 0.0 { return 0; }
        ((t / self.info.duration).clamp(0.0, 1.0) * 255.0).round() as u8
    }

    fn sample_at(&self, t: f64) -> f32 {
        let progress = if self.info.duration > 0.0 { (t / self.info.duration).clamp(0.0, 1.0) } else { 0.0 };
        let amp = 0.1 + 0.9 * progress;
        (amp * (TAU * TONE_HZ * t).sin()) as f32
    }
}

impl MediaSource for SyntheticSource {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn read_frame(&mut self, t: f64) -> Result<Frame, DecodeError> {
        check_range(&self.info, t)?;
        self.delay();
        if let Some(bad) = self.fail_at {
            if (t - bad).abs() <= self.info.frame_interval() * 0.5 {
                return Err(DecodeError::Corrupt { t, msg: "synthetic corruption".into() });
            }
        }

        let t      = self.info.clamp_time(t);
        let (w, h) = (self.info.width, self.info.height);
        let red    = self.marker_for(t);
        let mut data = Vec::with_capacity(w as usize * h as usize * 4);
        for y in 0..h {
            let blue = (y * 255 / h.max(2).saturating_sub(1).max(1)) as u8;
            for x in 0..w {
                let green = (x * 255 / w.max(2).saturating_sub(1).max(1)) as u8;
                data.extend_from_slice(&[red, green, blue, 255]);
            }
        }
        Ok(Frame { timestamp: t, width: w, height: h, data })
    }

    fn read_audio(&mut self, t0: f64, t1: f64) -> Result<AudioSamples, DecodeError> {
        if !self.info.has_audio {
            return Err(DecodeError::NoAudio);
        }
        check_range(&self.info, t0)?;
        check_range(&self.info, t1)?;
        self.delay();
        if let Some(bad) = self.fail_at {
            if bad >= t0 && bad < t1 {
                return Err(DecodeError::Corrupt { t: bad, msg: "synthetic corruption".into() });
            }
        }

        let t0   = self.info.clamp_time(t0);
        let t1   = self.info.clamp_time(t1).max(t0);
        let rate = self.info.sample_rate as f64;
        let n    = ((t1 - t0) * rate).round() as usize;
        let samples = (0..n).map(|k| self.sample_at(t0 + k as f64 / rate)).collect();
        Ok(AudioSamples { start: t0, sample_rate: self.info.sample_rate, samples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_marker_tracks_time() {
        let mut s = SyntheticSource::new(10.0);
        let a = s.read_frame(0.0).unwrap();
        let b = s.read_frame(10.0).unwrap();
        assert_eq!(a.pixel(0, 0)[0], 0);
        assert_eq!(b.pixel(0, 0)[0], 255);
        assert_eq!(a.data.len(), 160 * 90 * 4);
    }

    #[test]
    fn out_of_range_read_fails() {
        let mut s = SyntheticSource::new(2.0);
        assert!(matches!(s.read_frame(5.0), Err(DecodeError::OutOfRange { .. })));
        assert!(matches!(s.read_frame(-1.0), Err(DecodeError::OutOfRange { .. })));
    }

    #[test]
    fn injected_failure() {
        let mut s = SyntheticSource::new(4.0).failing_at(2.0);
        assert!(s.read_frame(1.0).is_ok());
        assert!(matches!(s.read_frame(2.0), Err(DecodeError::Corrupt { .. })));
        assert!(matches!(s.read_audio(1.5, 2.5), Err(DecodeError::Corrupt { .. })));
    }

    #[test]
    fn audio_amplitude_rises() {
        let mut s = SyntheticSource::new(4.0);
        let early = s.read_audio(0.0, 0.5).unwrap();
        let late  = s.read_audio(3.5, 4.0).unwrap();
        assert_eq!(early.samples.len(), 4000);
        let peak = |v: &[f32]| v.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak(&late.samples) > peak(&early.samples) * 2.0);
    }

    #[test]
    fn silent_source_reports_no_audio() {
        let mut s = SyntheticSource::new(1.0).without_audio();
        assert_eq!(s.read_audio(0.0, 0.5), Err(DecodeError::NoAudio));
    }
}
