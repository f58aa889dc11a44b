// crates/scrubcut-media/src/thumbnails.rs
//
// Thumbnail strip generation.
//
// Samples N boundary-inclusive, evenly spaced timestamps across the requested
// range, decodes each through the handle (one lock acquisition per frame),
// shrinks it to the width hint outside the lock, and reports batches as they
// fill. Any decode failure aborts the whole strip.

use scrubcut_core::generation::{ThumbnailParams, TimeRange};
use scrubcut_core::helpers::scale::downsample_to_width;
use scrubcut_core::media_types::Thumbnail;
use scrubcut_core::{GenerationError, TaskKind};

use crate::task::{BackgroundJob, TaskContext, TaskOutcome, TaskOutput, TaskProgress};

pub struct ThumbnailJob {
    params: ThumbnailParams,
}

impl ThumbnailJob {
    pub fn new(params: ThumbnailParams) -> Self {
        Self { params }
    }
}

impl BackgroundJob for ThumbnailJob {
    fn kind(&self) -> TaskKind {
        TaskKind::Thumbnails
    }

    fn run(self: Box<Self>, ctx: &TaskContext) -> TaskOutcome {
        let duration = ctx.handle().duration();
        let Some(range) = TimeRange::resolve(self.params.range, duration) else {
            return TaskOutcome::Failed(GenerationError::EmptyRange);
        };

        let times      = self.params.timestamps(range);
        let batch_size = self.params.batch_size.max(1);
        let mut all    = Vec::with_capacity(times.len());
        let mut batch  = Vec::with_capacity(batch_size);

        for (index, timestamp) in times.into_iter().enumerate() {
            if ctx.is_cancelled() { return TaskOutcome::Cancelled; }

            let frame = match ctx.handle().read_frame(timestamp) {
                Ok(f)  => f,
                Err(e) => {
                    log::warn!("[thumbs] decode at {timestamp:.3}s failed ({}): {e}", ctx.token());
                    return TaskOutcome::Failed(e.into());
                }
            };
            if ctx.is_cancelled() { return TaskOutcome::Cancelled; }

            let thumb = Thumbnail {
                index,
                timestamp,
                frame: downsample_to_width(&frame, self.params.width_hint),
            };
            batch.push(thumb.clone());
            all.push(thumb);

            if batch.len() >= batch_size {
                ctx.progress(TaskProgress::Thumbnails(std::mem::take(&mut batch)));
            }
        }
        if !batch.is_empty() {
            ctx.progress(TaskProgress::Thumbnails(batch));
        }

        log::debug!("[thumbs] {} thumbnails ({})", all.len(), ctx.token());
        TaskOutcome::Completed(TaskOutput::Thumbnails(all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    use scrubcut_core::{DecodeError, GenerationToken};

    use crate::handle::DecodeHandle;
    use crate::synthetic::SyntheticSource;
    use crate::task::{spawn, TaskMessage, TaskMessageBody};

    fn params(count: usize, width: u32, batch: usize) -> ThumbnailParams {
        ThumbnailParams { count, width_hint: width, batch_size: batch, range: None }
    }

    fn collect(rx: &crossbeam_channel::Receiver<TaskMessage>) -> (Vec<TaskProgress>, TaskOutcome) {
        let mut progress = Vec::new();
        loop {
            let msg = rx.recv_timeout(Duration::from_secs(5)).expect("task went silent");
            match msg.body {
                TaskMessageBody::Progress(p) => progress.push(p),
                TaskMessageBody::Terminal(o) => return (progress, o),
            }
        }
    }

    #[test]
    fn strip_is_evenly_spaced_and_shrunk() {
        let (tx, rx) = unbounded();
        let h = DecodeHandle::open(SyntheticSource::new(10.0).with_size(320, 180));
        spawn(Box::new(ThumbnailJob::new(params(5, 64, 2))), h, GenerationToken::new(1), tx).unwrap();

        let (progress, outcome) = collect(&rx);
        let TaskOutcome::Completed(TaskOutput::Thumbnails(all)) = outcome else {
            panic!("expected completed thumbnails");
        };
        let times: Vec<f64> = all.iter().map(|t| t.timestamp).collect();
        assert_eq!(times, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
        assert!(all.iter().all(|t| t.frame.width <= 64));

        // Batches of 2, 2, 1 in timestamp order.
        let sizes: Vec<usize> = progress.iter().map(|p| match p {
            TaskProgress::Thumbnails(b) => b.len(),
            _ => 0,
        }).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn range_limits_sampling() {
        let (tx, rx) = unbounded();
        let h = DecodeHandle::open(SyntheticSource::new(10.0));
        let mut p = params(3, 64, 8);
        p.range = Some(TimeRange::new(2.0, 4.0));
        spawn(Box::new(ThumbnailJob::new(p)), h, GenerationToken::new(1), tx).unwrap();
        let (_, outcome) = collect(&rx);
        let TaskOutcome::Completed(TaskOutput::Thumbnails(all)) = outcome else { panic!() };
        assert_eq!(all.iter().map(|t| t.timestamp).collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn mid_strip_failure_aborts() {
        let (tx, rx) = unbounded();
        let h = DecodeHandle::open(SyntheticSource::new(10.0).failing_at(5.0));
        spawn(Box::new(ThumbnailJob::new(params(5, 64, 1))), h, GenerationToken::new(1), tx).unwrap();
        let (progress, outcome) = collect(&rx);
        assert!(matches!(
            outcome,
            TaskOutcome::Failed(GenerationError::Decode(DecodeError::Corrupt { .. }))
        ));
        // Frames at 0.0 and 2.5 made it out; nothing after the failure did.
        assert_eq!(progress.len(), 2);
    }

    #[test]
    fn zero_duration_fails() {
        let (tx, rx) = unbounded();
        let h = DecodeHandle::open(SyntheticSource::new(0.0));
        spawn(Box::new(ThumbnailJob::new(params(5, 64, 1))), h, GenerationToken::new(1), tx).unwrap();
        let (_, outcome) = collect(&rx);
        assert!(matches!(outcome, TaskOutcome::Failed(GenerationError::EmptyRange)));
    }
}
