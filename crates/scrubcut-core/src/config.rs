// crates/scrubcut-core/src/config.rs
//
// Tunables for generation and playback. Loaded from a JSON file by front
// ends; every field has a default so partial files are fine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::generation::{ThumbnailParams, WaveformParams};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubConfig {
    pub generation: GenerationConfig,
    pub playback:   PlaybackConfig,
}

impl ScrubConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub thumbnail_count:            usize,
    /// Maximum thumbnail width in pixels.
    pub thumbnail_width:            u32,
    /// Thumbnails per progress batch.
    pub thumbnail_batch:            usize,
    pub waveform_points_per_second: u32,
    pub waveform_chunk_secs:        f64,
    /// Mono sample rate the decoder resamples audio to for analysis.
    pub audio_analysis_rate:        u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            thumbnail_count:            8,
            thumbnail_width:            160,
            thumbnail_batch:            4,
            waveform_points_per_second: 50,
            waveform_chunk_secs:        1.0,
            audio_analysis_rate:        8000,
        }
    }
}

impl GenerationConfig {
    pub fn thumbnail_params(&self) -> ThumbnailParams {
        ThumbnailParams {
            count:      self.thumbnail_count,
            width_hint: self.thumbnail_width,
            batch_size: self.thumbnail_batch.max(1),
            range:      None,
        }
    }

    pub fn waveform_params(&self) -> WaveformParams {
        WaveformParams {
            points_per_second: self.waveform_points_per_second.max(1),
            chunk_secs:        if self.waveform_chunk_secs > 0.0 { self.waveform_chunk_secs } else { 1.0 },
            range:             None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Wrap to 0 at end of media instead of stopping.
    pub looping:      bool,
    /// Drop frames to keep pace with the wall clock when decoding lags.
    pub frame_skip:   bool,
    /// Used when a source reports no frame rate.
    pub fallback_fps: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { looping: false, frame_skip: true, fallback_fps: 24.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ScrubConfig =
            serde_json::from_str(r#"{ "generation": { "thumbnail_count": 5 } }"#).unwrap();
        assert_eq!(cfg.generation.thumbnail_count, 5);
        assert_eq!(cfg.generation.thumbnail_width, 160);
        assert_eq!(cfg.playback, PlaybackConfig::default());
    }

    #[test]
    fn save_then_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrubcut.json");
        let mut cfg = ScrubConfig::default();
        cfg.playback.looping = true;
        cfg.generation.waveform_chunk_secs = 0.5;
        cfg.save(&path).unwrap();
        assert_eq!(ScrubConfig::load(&path).unwrap(), cfg);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ScrubConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn degenerate_values_are_sanitised_into_params() {
        let cfg = GenerationConfig {
            thumbnail_batch: 0,
            waveform_points_per_second: 0,
            waveform_chunk_secs: -1.0,
            ..Default::default()
        };
        assert_eq!(cfg.thumbnail_params().batch_size, 1);
        let w = cfg.waveform_params();
        assert_eq!(w.points_per_second, 1);
        assert_eq!(w.chunk_secs, 1.0);
    }
}
