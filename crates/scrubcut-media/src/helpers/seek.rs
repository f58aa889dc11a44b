// crates/scrubcut-media/src/helpers/seek.rs
//
// Keyframe-aligned seek shared by the video and audio cursors.
//
// Failure is soft: the caller keeps decoding from wherever the demuxer is and
// its PTS filter discards anything before the target.

use ffmpeg_the_third as ffmpeg;

/// Seek `ictx` to the keyframe at or before `target_secs`.
///
/// Backward (`..=ts`) so the target frame is always decodable: a forward seek
/// would land on the next keyframe and lose every frame in between.
/// A target of 0 skips the seek entirely; `max_ts = 0` on a freshly opened
/// context returns EPERM on some platforms. Only call it with 0 on a context
/// nothing has been read from: a used one has to be reopened to get back to
/// the start (see `reseek::Reseek::Rewind`).
///
/// Returns `false` (after logging) if the demuxer refused.
pub fn seek_to_secs(
    ictx:        &mut ffmpeg::format::context::Input,
    target_secs: f64,
    label:       &str,
) -> bool {
    if target_secs <= 0.0 {
        return true;
    }

    let seek_ts = (target_secs * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
    match ictx.seek(seek_ts, ..=seek_ts) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("[ffmpeg] {label} seek to {target_secs:.3}s failed: {e}; decoding from current position");
            false
        }
    }
}
