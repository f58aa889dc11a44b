// crates/scrubcut-media/src/helpers/mod.rs
//
// Decode-cursor internals. Not re-exported from lib.rs.

// Only the FFmpeg cursors consult the policy outside of its tests.
#[cfg_attr(not(feature = "backend-ffmpeg"), allow(dead_code))]
pub mod reseek;
#[cfg(feature = "backend-ffmpeg")]
pub mod seek;
