// crates/scrubcut-core/src/clip.rs
//
// Clip descriptor handed to the media core by the project model.
// Serializable via serde so the project layer can persist it as-is; the core
// only reads the source path and the in/out points.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::generation::{GenerationParams, TimeRange};

pub const CLIP_DESCRIPTOR_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipDescriptor {
    #[serde(default = "Uuid::new_v4")]
    pub id:        Uuid,
    pub path:      PathBuf,
    /// Seconds into the source where the clip begins.
    #[serde(default)]
    pub in_point:  Option<f64>,
    #[serde(default)]
    pub out_point: Option<f64>,
    #[serde(default)]
    pub mute:      bool,
    #[serde(default = "default_version")]
    pub version:   u32,
}

fn default_version() -> u32 { CLIP_DESCRIPTOR_VERSION }

impl ClipDescriptor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            id:        Uuid::new_v4(),
            path:      path.into(),
            in_point:  None,
            out_point: None,
            mute:      false,
            version:   CLIP_DESCRIPTOR_VERSION,
        }
    }

    /// The trimmed range, if either end is set. An unset end means
    /// "start of source" or "end of source" and is resolved later.
    pub fn range(&self) -> Option<TimeRange> {
        match (self.in_point, self.out_point) {
            (None, None) => None,
            (a, b)       => Some(TimeRange::new(a.unwrap_or(0.0), b.unwrap_or(f64::MAX))),
        }
    }

    pub fn duration_range(&self) -> Option<f64> {
        match (self.in_point, self.out_point) {
            (Some(a), Some(b)) => Some((b - a).max(0.0)),
            _                  => None,
        }
    }

    /// Thumbnail params plus waveform params (skipped for muted clips),
    /// bounded to this clip's in/out points.
    pub fn generation_params(&self, cfg: &GenerationConfig) -> Vec<GenerationParams> {
        let range = self.range();
        let mut out = vec![GenerationParams::Thumbnails(cfg.thumbnail_params()).with_range(range)];
        if !self.mute {
            out.push(GenerationParams::Waveform(cfg.waveform_params()).with_range(range));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::TaskKind;

    #[test]
    fn range_from_points() {
        let mut c = ClipDescriptor::new("a.mp4");
        assert_eq!(c.range(), None);
        c.in_point = Some(2.0);
        assert_eq!(c.range(), Some(TimeRange::new(2.0, f64::MAX)));
        c.out_point = Some(5.0);
        assert_eq!(c.range(), Some(TimeRange::new(2.0, 5.0)));
        assert_eq!(c.duration_range(), Some(3.0));
    }

    #[test]
    fn muted_clip_skips_waveform() {
        let mut c = ClipDescriptor::new("a.mp4");
        let cfg = GenerationConfig::default();
        assert_eq!(c.generation_params(&cfg).len(), 2);
        c.mute = true;
        let params = c.generation_params(&cfg);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].kind(), TaskKind::Thumbnails);
    }

    #[test]
    fn deserializes_minimal_json() {
        let c: ClipDescriptor = serde_json::from_str(r#"{ "path": "b.mov", "in_point": 1.5 }"#).unwrap();
        assert_eq!(c.path, PathBuf::from("b.mov"));
        assert_eq!(c.in_point, Some(1.5));
        assert_eq!(c.version, CLIP_DESCRIPTOR_VERSION);
        assert!(!c.mute);
    }
}
