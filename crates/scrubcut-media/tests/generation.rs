// crates/scrubcut-media/tests/generation.rs
//
// End-to-end generation behaviour: handle exclusion, supersession and
// cancellation through the public API only.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use scrubcut_core::generation::{GenerationEvent, GenerationParams, ThumbnailParams, WaveformParams};
use scrubcut_core::media_types::{AudioSamples, Frame, MediaInfo};
use scrubcut_core::{DecodeError, TaskKind, TaskState};
use scrubcut_media::{DecodeHandle, MediaSource, SyntheticSource, TaskSupervisor};

const WAIT: Duration = Duration::from_secs(10);

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn thumbs(count: usize, width: u32) -> GenerationParams {
    GenerationParams::Thumbnails(ThumbnailParams { count, width_hint: width, batch_size: 2, range: None })
}

// ── Instrumented source ───────────────────────────────────────────────────────

/// Wraps a synthetic source and records whether two reads ever overlapped.
struct Exclusive {
    inner:      SyntheticSource,
    busy:       Arc<AtomicBool>,
    overlapped: Arc<AtomicBool>,
    reads:      Arc<AtomicUsize>,
}

impl Exclusive {
    fn enter(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl MediaSource for Exclusive {
    fn info(&self) -> &MediaInfo {
        self.inner.info()
    }

    fn read_frame(&mut self, t: f64) -> Result<Frame, DecodeError> {
        self.enter();
        thread::sleep(Duration::from_millis(2));
        let r = self.inner.read_frame(t);
        self.leave();
        r
    }

    fn read_audio(&mut self, t0: f64, t1: f64) -> Result<AudioSamples, DecodeError> {
        self.enter();
        thread::sleep(Duration::from_millis(2));
        let r = self.inner.read_audio(t0, t1);
        self.leave();
        r
    }
}

#[test]
fn concurrent_reads_never_interleave() {
    init_logs();
    let overlapped = Arc::new(AtomicBool::new(false));
    let reads      = Arc::new(AtomicUsize::new(0));
    let handle = DecodeHandle::open(Exclusive {
        inner:      SyntheticSource::new(10.0),
        busy:       Arc::new(AtomicBool::new(false)),
        overlapped: Arc::clone(&overlapped),
        reads:      Arc::clone(&reads),
    });

    // A supervisor-driven generation of both kinds...
    let mut sup = TaskSupervisor::new();
    sup.request_all(&handle, [
        thumbs(12, 32),
        GenerationParams::Waveform(WaveformParams { points_per_second: 20, chunk_secs: 0.5, range: None }),
    ]);

    // ...racing two scrubbing threads on clones of the same handle.
    let scrubbers: Vec<_> = (0..2)
        .map(|n| {
            let h = handle.clone();
            thread::spawn(move || {
                for i in 0..20 {
                    let _ = h.read_frame((i * 2 + n) as f64 * 0.25);
                }
            })
        })
        .collect();
    for s in scrubbers {
        s.join().unwrap();
    }
    assert!(sup.wait_idle(WAIT));

    assert!(reads.load(Ordering::SeqCst) >= 40 + 12);
    assert!(!overlapped.load(Ordering::SeqCst), "two reads held the source at once");
}

#[test]
fn second_request_wins_with_its_own_params() {
    init_logs();
    let mut sup = TaskSupervisor::new();
    let events = sup.subscribe();
    let handle = DecodeHandle::open(
        SyntheticSource::new(10.0).with_read_delay(Duration::from_millis(30)),
    );

    let first  = sup.request_generation(&handle, thumbs(5, 64));
    let second = sup.request_generation(&handle, thumbs(3, 48));
    assert!(second > first);
    assert!(sup.wait_idle(WAIT));

    let published: Vec<GenerationEvent> = events.try_iter().collect();
    assert!(published.iter().all(|e| e.token() == second), "stale event leaked");

    let completes: Vec<_> = published
        .iter()
        .filter_map(|e| match e {
            GenerationEvent::ThumbnailsComplete { params, thumbnails, .. } => Some((params, thumbnails)),
            _ => None,
        })
        .collect();
    assert_eq!(completes.len(), 1);
    let (params, strip) = completes[0];
    assert_eq!(params.count, 3);
    assert_eq!(params.width_hint, 48);
    let times: Vec<f64> = strip.iter().map(|t| t.timestamp).collect();
    assert_eq!(times, vec![0.0, 5.0, 10.0]);
    assert!(strip.iter().all(|t| t.frame.width <= 48));
}

#[test]
fn five_thumbnails_over_ten_seconds() {
    init_logs();
    let mut sup = TaskSupervisor::new();
    let events = sup.subscribe();
    let handle = DecodeHandle::open(SyntheticSource::new(10.0).with_size(320, 180));
    let token = sup.request_generation(&handle, thumbs(5, 64));
    assert!(sup.wait_idle(WAIT));

    let mut progressive = Vec::new();
    let mut complete = None;
    for e in events.try_iter() {
        match e {
            GenerationEvent::ThumbnailsProgress { batch, token: t, .. } => {
                assert_eq!(t, token);
                progressive.extend(batch.iter().map(|t| t.timestamp));
            }
            GenerationEvent::ThumbnailsComplete { thumbnails, .. } => complete = Some(thumbnails),
            other => panic!("unexpected event {other:?}"),
        }
    }
    let strip = complete.expect("no completion published");
    let times: Vec<f64> = strip.iter().map(|t| t.timestamp).collect();
    assert_eq!(times, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
    assert_eq!(progressive, times, "partials arrive in timestamp order");
    for t in strip.iter() {
        assert!(t.frame.width <= 64);
        assert_eq!(t.frame.height, 36);
    }
}

#[test]
fn cancel_after_dispatch_is_silent() {
    init_logs();
    let mut sup = TaskSupervisor::new();
    let events = sup.subscribe();
    let handle = DecodeHandle::open(
        SyntheticSource::new(10.0).with_read_delay(Duration::from_millis(50)),
    );

    sup.request_generation(&handle, thumbs(8, 64));
    let id = sup.active(handle.id(), TaskKind::Thumbnails).map(|r| r.id()).unwrap();
    sup.cancel(handle.id(), TaskKind::Thumbnails);

    assert!(sup.wait_idle(WAIT));
    assert_eq!(events.try_iter().count(), 0);
    assert_eq!(sup.task_state(id), Some(TaskState::Cancelled));
}

#[test]
fn closing_the_handle_fails_the_running_task() {
    init_logs();
    let mut sup = TaskSupervisor::new();
    let events = sup.subscribe();
    let handle = DecodeHandle::open(
        SyntheticSource::new(10.0).with_read_delay(Duration::from_millis(40)),
    );

    sup.request_generation(&handle, thumbs(10, 64));
    thread::sleep(Duration::from_millis(60));
    handle.close();
    assert!(sup.wait_idle(WAIT));

    let failed = events
        .try_iter()
        .filter(|e| matches!(e, GenerationEvent::ThumbnailsFailed { .. }))
        .count();
    assert_eq!(failed, 1);
}
