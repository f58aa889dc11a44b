// crates/scrubcut-media/src/helpers/reseek.rs
//
// Whether a decode cursor can keep reading from where its demuxer is, or has
// to move it first. Pure integer logic so it is testable without FFmpeg.
//
// Positions are in whatever unit the cursor counts in (stream PTS for video,
// analysis-rate samples for audio).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reseek {
    /// Keep decoding forward from the current demuxer position.
    Continue,
    /// Keyframe-aligned backward seek to a target above 0.
    Seek,
    /// Back to the very start of a demuxer that has already been read.
    /// A seek to 0 is unreliable there, so the input is reopened.
    Rewind,
}

/// `fresh` is true only for a demuxer nothing has been read from yet, which
/// already sits at the start. `last` is the position the previous read left
/// the cursor at, `None` when unknown (after a seek, or before any read).
/// Targets in `last - behind ..= last + ahead` continue.
pub fn reseek_needed(fresh: bool, last: Option<i64>, target: i64, behind: i64, ahead: i64) -> Reseek {
    match last {
        Some(last) if target >= last - behind && target <= last + ahead => Reseek::Continue,
        _ if target > 0 => Reseek::Seek,
        _ if fresh      => Reseek::Continue,
        _               => Reseek::Rewind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_forward_step_continues() {
        assert_eq!(reseek_needed(false, Some(100), 100, 0, 50), Reseek::Continue);
        assert_eq!(reseek_needed(false, Some(100), 150, 0, 50), Reseek::Continue);
    }

    #[test]
    fn large_jump_or_backward_seeks() {
        assert_eq!(reseek_needed(false, Some(100), 151, 0, 50), Reseek::Seek);
        assert_eq!(reseek_needed(false, Some(100), 99, 0, 50), Reseek::Seek);
        assert_eq!(reseek_needed(false, None, 40, 0, 50), Reseek::Seek);
    }

    #[test]
    fn backward_to_zero_on_a_used_demuxer_rewinds() {
        // End of a thumbnail strip, then a fresh request starting at 0.
        assert_eq!(reseek_needed(false, Some(9_000), 0, 0, 50), Reseek::Rewind);
        // A seek left the position unknown.
        assert_eq!(reseek_needed(false, None, 0, 0, 50), Reseek::Rewind);
    }

    #[test]
    fn zero_on_a_fresh_demuxer_reads_in_place() {
        assert_eq!(reseek_needed(true, None, 0, 0, 50), Reseek::Continue);
        assert_eq!(reseek_needed(true, None, 10, 0, 50), Reseek::Seek);
    }

    #[test]
    fn audio_slack_tolerates_rounding_both_ways() {
        assert_eq!(reseek_needed(false, Some(8_000), 7_998, 2, 2), Reseek::Continue);
        assert_eq!(reseek_needed(false, Some(8_000), 8_002, 2, 2), Reseek::Continue);
        assert_eq!(reseek_needed(false, Some(8_000), 8_003, 2, 2), Reseek::Seek);
        assert_eq!(reseek_needed(false, Some(8_000), 0, 2, 2), Reseek::Rewind);
    }
}
