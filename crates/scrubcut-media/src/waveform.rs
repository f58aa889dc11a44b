// crates/scrubcut-media/src/waveform.rs
//
// Waveform envelope generation.
//
// Decodes the requested range in bounded chunks (one lock acquisition per
// chunk), reduces each chunk to RMS points at `points_per_second`, and
// reports every chunk as it lands. The final envelope is normalised to the
// loudest point and shaped with a 0.85 gamma so quiet passages stay visible.

use scrubcut_core::generation::{TimeRange, WaveformParams};
use scrubcut_core::media_types::{Waveform, WaveformChunk};
use scrubcut_core::{GenerationError, TaskKind};

use crate::task::{BackgroundJob, TaskContext, TaskOutcome, TaskOutput, TaskProgress};

const ENVELOPE_GAMMA: f32 = 0.85;

pub struct WaveformJob {
    params: WaveformParams,
}

impl WaveformJob {
    pub fn new(params: WaveformParams) -> Self {
        Self { params }
    }
}

impl BackgroundJob for WaveformJob {
    fn kind(&self) -> TaskKind {
        TaskKind::Waveform
    }

    fn run(self: Box<Self>, ctx: &TaskContext) -> TaskOutcome {
        let info = ctx.handle().info();
        if !info.has_audio {
            return TaskOutcome::Failed(GenerationError::NoAudio);
        }
        let Some(range) = TimeRange::resolve(self.params.range, info.duration) else {
            return TaskOutcome::Failed(GenerationError::EmptyRange);
        };

        let pps              = self.params.points_per_second.max(1);
        let total_points     = ((range.len() * pps as f64).ceil() as usize).max(1);
        let points_per_chunk = ((self.params.chunk_secs * pps as f64).round() as usize).max(1);
        let mut rms_all      = Vec::with_capacity(total_points);
        let mut offset       = 0usize;

        while offset < total_points {
            if ctx.is_cancelled() { return TaskOutcome::Cancelled; }

            let n  = points_per_chunk.min(total_points - offset);
            let t0 = range.start + offset as f64 / pps as f64;
            let t1 = (range.start + (offset + n) as f64 / pps as f64).min(range.end);

            let audio = match ctx.handle().read_audio_range(t0, t1) {
                Ok(a)  => a,
                Err(e) => {
                    log::warn!("[waveform] decode {t0:.3}..{t1:.3}s failed ({}): {e}", ctx.token());
                    return TaskOutcome::Failed(e.into());
                }
            };

            let points = rms_points(&audio.samples, n);
            ctx.progress(TaskProgress::Waveform(WaveformChunk { offset, points: points.clone() }));
            rms_all.extend(points);
            offset += n;
        }

        log::debug!("[waveform] {} points ({})", rms_all.len(), ctx.token());
        TaskOutcome::Completed(TaskOutput::Waveform(Waveform {
            start:             range.start,
            points_per_second: pps,
            envelope:          normalise(&rms_all),
        }))
    }
}

/// Split `samples` into `n` near-equal buckets and take the RMS of each.
/// Empty buckets (fewer samples than points) read as silence.
pub fn rms_points(samples: &[f32], n: usize) -> Vec<f32> {
    let len = samples.len();
    (0..n)
        .map(|i| {
            let s = i * len / n;
            let e = (i + 1) * len / n;
            if e <= s { return 0.0; }
            let seg = &samples[s..e];
            let mean_sq = seg.iter().map(|v| v * v).sum::<f32>() / seg.len() as f32;
            mean_sq.sqrt()
        })
        .collect()
}

/// Scale to the loudest point, then apply the display gamma.
pub fn normalise(rms: &[f32]) -> Vec<f32> {
    let peak = rms.iter().copied().fold(0.0f32, f32::max);
    let peak = if peak > 0.0 { peak } else { 1.0 };
    rms.iter().map(|v| (v / peak).powf(ENVELOPE_GAMMA)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    use scrubcut_core::GenerationToken;

    use crate::handle::DecodeHandle;
    use crate::synthetic::SyntheticSource;
    use crate::task::{spawn, TaskMessageBody};

    #[test]
    fn rms_of_constant_signal() {
        let pts = rms_points(&[0.5; 100], 4);
        assert_eq!(pts.len(), 4);
        assert!(pts.iter().all(|p| (p - 0.5).abs() < 1e-6));
    }

    #[test]
    fn more_points_than_samples_reads_silence() {
        let pts = rms_points(&[1.0, 1.0], 4);
        assert_eq!(pts, vec![0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn normalise_peaks_at_one() {
        let env = normalise(&[0.0, 0.25, 0.5]);
        assert_eq!(env[0], 0.0);
        assert!((env[2] - 1.0).abs() < 1e-6);
        assert!(env[1] > 0.5, "gamma should lift quiet values");
        assert_eq!(normalise(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn chunks_arrive_in_offset_order_and_envelope_rises() {
        let (tx, rx) = unbounded();
        let h = DecodeHandle::open(SyntheticSource::new(4.0));
        let params = WaveformParams { points_per_second: 10, chunk_secs: 1.0, range: None };
        spawn(Box::new(WaveformJob::new(params)), h, GenerationToken::new(1), tx).unwrap();

        let mut offsets = Vec::new();
        let waveform = loop {
            let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            match msg.body {
                TaskMessageBody::Progress(TaskProgress::Waveform(c)) => offsets.push(c.offset),
                TaskMessageBody::Terminal(TaskOutcome::Completed(TaskOutput::Waveform(w))) => break w,
                other => panic!("unexpected {other:?}"),
            }
        };
        assert_eq!(offsets, vec![0, 10, 20, 30]);
        assert_eq!(waveform.envelope.len(), 40);
        assert!(waveform.envelope[35] > waveform.envelope[2]);
        assert!(waveform.envelope.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn silent_source_fails() {
        let (tx, rx) = unbounded();
        let h = DecodeHandle::open(SyntheticSource::new(2.0).without_audio());
        let params = WaveformParams { points_per_second: 10, chunk_secs: 1.0, range: None };
        spawn(Box::new(WaveformJob::new(params)), h, GenerationToken::new(1), tx).unwrap();
        let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            msg.body,
            TaskMessageBody::Terminal(TaskOutcome::Failed(GenerationError::NoAudio))
        ));
    }
}
