// crates/scrubcut-media/src/playback.rs
//
// PlaybackDriver: transport state machine plus a scheduler thread that turns
// "playing" into one decoded frame per tick.
//
//   stopped --load--> paused --play--> playing --pause--> paused
//      ^                 |                 |
//      +------stop-------+-------stop------+
//
// The driver owns `PlaybackState`; callers and subscribers only ever see
// copies. The scheduler plans a tick under the core lock, releases it, decodes
// through the handle (the only blocking step, bounded by one decode), then
// re-locks to commit. Every transport change or seek bumps `epoch`, so a tick
// whose decode was already in flight when the user paused or seeked is
// dropped at commit instead of overwriting the newer position.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use scrubcut_core::config::PlaybackConfig;
use scrubcut_core::media_types::Frame;
use scrubcut_core::playback_types::{PlaybackEvent, PlaybackState, Transport};
use scrubcut_core::{DecodeError, PlaybackError};

use crate::handle::DecodeHandle;

/// Without frame skipping, playback steps frame by frame until it falls more
/// than this many frames behind the wall clock, then jumps to the wall-clock
/// frame and resyncs the tick clock.
const MAX_LAG_FRAMES: f64 = 2.0;

/// Used when neither the source nor the config has a usable rate.
const DEFAULT_FPS: f64 = 24.0;

/// Float slack when mapping a timestamp back to its frame index.
const INDEX_EPSILON: f64 = 1e-6;

// ── Core state (guarded) ──────────────────────────────────────────────────────

struct Core {
    state:       PlaybackState,
    handle:      Option<DecodeHandle>,
    config:      PlaybackConfig,
    /// Wall-clock instant and media position playback was (re)anchored at.
    anchor:      Option<(Instant, f64)>,
    next_tick:   Instant,
    /// Index of the last frame published, if it is still on screen.
    last_shown:  Option<i64>,
    epoch:       u64,
    shutdown:    bool,
    subscribers: Vec<Sender<PlaybackEvent>>,
}

/// One planned decode, carried across the unlocked section.
struct Tick {
    handle: DecodeHandle,
    index:  i64,
    t:      f64,
    epoch:  u64,
}

impl Core {
    fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.state.fps)
    }

    fn index_of(&self, t: f64) -> i64 {
        (t * self.state.fps + INDEX_EPSILON).floor() as i64
    }

    fn time_of(&self, index: i64) -> f64 {
        self.state.clamp(index as f64 / self.state.fps)
    }

    fn total_frames(&self) -> i64 {
        ((self.state.duration * self.state.fps).round() as i64).max(1)
    }

    fn publish(&mut self, event: PlaybackEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn set_transport(&mut self, transport: Transport) {
        if self.state.transport != transport {
            log::debug!("[playback] {} -> {transport} at {:.3}s", self.state.transport, self.state.position);
            self.state.transport = transport;
            self.publish(PlaybackEvent::StateChanged(transport));
        }
    }

    fn set_position(&mut self, t: f64) {
        self.state.position = t;
        self.publish(PlaybackEvent::PositionChanged(t));
    }

    /// Invalidate any in-flight tick or seek.
    fn bump(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    fn anchor_at(&mut self, now: Instant, t: f64) {
        self.anchor    = Some((now, t));
        self.next_tick = now;
    }

    fn halt(&mut self, transport: Transport, position: f64) {
        self.bump();
        self.anchor     = None;
        self.last_shown = None;
        self.set_transport(transport);
        if self.state.position != position {
            self.set_position(position);
        }
    }

    fn show(&mut self, index: i64, t: f64, frame: Frame) {
        self.last_shown = Some(index);
        self.publish(PlaybackEvent::FrameReady { frame: Arc::new(frame), timestamp: t });
        self.set_position(t);
    }

    /// Decode failure: hold position, report once, pause.
    fn fail(&mut self, t: f64, error: &DecodeError) {
        log::warn!("[playback] decode at {t:.3}s failed: {error}");
        self.bump();
        self.anchor = None;
        self.publish(PlaybackEvent::Error(error.to_string()));
        if self.state.transport == Transport::Playing {
            self.set_transport(Transport::Paused);
        }
    }

    /// Decide what the tick due at `now` should decode. `None` means nothing
    /// to decode (frame already on screen, or end of media handled here).
    fn plan_tick(&mut self, now: Instant) -> Option<Tick> {
        let handle   = self.handle.clone()?;
        let interval = self.interval();

        let target = if self.config.frame_skip {
            let (at, origin) = self.anchor.unwrap_or((now, self.state.position));
            let elapsed      = now.saturating_duration_since(at).as_secs_f64();
            self.index_of(origin + elapsed)
        } else {
            let next = match self.last_shown {
                Some(i) => i + 1,
                None    => self.index_of(self.state.position),
            };
            let wall = self.anchor.map(|(at, origin)| {
                self.index_of(origin + now.saturating_duration_since(at).as_secs_f64())
            });
            match wall {
                Some(w) if (w - next) as f64 > MAX_LAG_FRAMES => {
                    log::trace!("[playback] {} frames behind, jumping to frame {w}", w - next);
                    self.next_tick = now;
                    w
                }
                _ => next,
            }
        };
        self.next_tick += interval;

        if target >= self.total_frames() {
            if self.state.looping {
                log::debug!("[playback] looping to start");
                self.anchor_at(now, 0.0);
                self.next_tick = now + interval;
                self.last_shown = None;
                return Some(Tick { handle, index: 0, t: 0.0, epoch: self.epoch });
            }
            log::debug!("[playback] end of media at {:.3}s", self.state.duration);
            let end = self.state.duration;
            self.halt(Transport::Stopped, end);
            return None;
        }

        if self.last_shown == Some(target) {
            return None;
        }
        Some(Tick { handle, index: target, t: self.time_of(target), epoch: self.epoch })
    }

    fn commit_tick(&mut self, tick: Tick, result: Result<Frame, DecodeError>) {
        if tick.epoch != self.epoch || self.state.transport != Transport::Playing {
            log::trace!("[playback] dropping stale tick at {:.3}s", tick.t);
            return;
        }
        match result {
            Ok(frame)  => self.show(tick.index, tick.t, frame),
            Err(error) => self.fail(tick.t, &error),
        }
    }
}

struct Shared {
    core: Mutex<Core>,
    wake: Condvar,
}

// ── PlaybackDriver ────────────────────────────────────────────────────────────

pub struct PlaybackDriver {
    shared:    Arc<Shared>,
    scheduler: Option<JoinHandle<()>>,
}

impl PlaybackDriver {
    pub fn new(config: PlaybackConfig) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            core: Mutex::new(Core {
                state:       PlaybackState { looping: config.looping, ..Default::default() },
                handle:      None,
                config,
                anchor:      None,
                next_tick:   Instant::now(),
                last_shown:  None,
                epoch:       0,
                shutdown:    false,
                subscribers: Vec::new(),
            }),
            wake: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        let scheduler = thread::Builder::new()
            .name("scrubcut-playback".into())
            .spawn(move || run_scheduler(&worker))?;

        Ok(Self { shared, scheduler: Some(scheduler) })
    }

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = unbounded();
        self.shared.core.lock().subscribers.push(tx);
        rx
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.shared.core.lock().state
    }

    pub fn handle(&self) -> Option<DecodeHandle> {
        self.shared.core.lock().handle.clone()
    }

    /// Stop whatever is playing, switch to `handle` and show its first frame.
    /// Never starts generation; that is the supervisor's job.
    ///
    /// The clip stays loaded even if the first frame fails to decode.
    pub fn load(&self, handle: DecodeHandle) -> Result<(), PlaybackError> {
        {
            let mut core = self.shared.core.lock();
            core.halt(Transport::Stopped, 0.0);

            let info = handle.info();
            let fps  = [info.fps, core.config.fallback_fps]
                .into_iter()
                .find(|f| f.is_finite() && *f > 0.0)
                .unwrap_or(DEFAULT_FPS);
            log::info!("[playback] loaded {} ({:.2}s @ {fps:.2} fps)", handle.id(), info.duration);

            core.state = PlaybackState {
                position:  0.0,
                transport: Transport::Stopped,
                duration:  info.duration.max(0.0),
                fps,
                looping:   core.config.looping,
            };
            core.handle = Some(handle);
            let duration = core.state.duration;
            core.publish(PlaybackEvent::ClipLoaded { duration });
            core.set_transport(Transport::Paused);
        }
        self.shared.wake.notify_all();
        self.seek(0.0).map(|_| ())
    }

    /// Start or resume. From `stopped`, or parked at the end, restarts at 0.
    pub fn play(&self) -> Result<(), PlaybackError> {
        {
            let mut core = self.shared.core.lock();
            if core.handle.is_none() { return Err(PlaybackError::NoSource); }
            if core.state.transport == Transport::Playing { return Ok(()); }

            let restart = core.state.transport == Transport::Stopped
                || core.state.position >= core.state.duration;
            if restart {
                core.last_shown = None;
                if core.state.position != 0.0 {
                    core.set_position(0.0);
                }
            }
            core.bump();
            let origin = core.state.position;
            core.anchor_at(Instant::now(), origin);
            core.set_transport(Transport::Playing);
        }
        self.shared.wake.notify_all();
        Ok(())
    }

    pub fn pause(&self) -> Result<(), PlaybackError> {
        let mut core = self.shared.core.lock();
        if core.handle.is_none() { return Err(PlaybackError::NoSource); }
        match core.state.transport {
            Transport::Stopped => Err(PlaybackError::Stopped),
            Transport::Paused  => Ok(()),
            Transport::Playing => {
                core.bump();
                core.anchor = None;
                core.set_transport(Transport::Paused);
                Ok(())
            }
        }
    }

    /// Stop and rewind to 0.
    pub fn stop(&self) -> Result<(), PlaybackError> {
        let mut core = self.shared.core.lock();
        if core.handle.is_none() { return Err(PlaybackError::NoSource); }
        core.halt(Transport::Stopped, 0.0);
        Ok(())
    }

    /// Move to `t` (clamped to `[0, duration]`) and publish the frame there.
    /// Transport is unchanged. Returns the clamped position.
    pub fn seek(&self, t: f64) -> Result<f64, PlaybackError> {
        let (handle, target, epoch) = {
            let mut core = self.shared.core.lock();
            let handle = core.handle.clone().ok_or(PlaybackError::NoSource)?;
            if core.state.transport == Transport::Stopped {
                return Err(PlaybackError::Stopped);
            }
            let target = core.state.clamp(t);
            (handle, target, core.bump())
        };

        let result = handle.read_frame(target);

        let mut core = self.shared.core.lock();
        if core.epoch != epoch {
            log::trace!("[playback] seek to {target:.3}s superseded");
            return Ok(target);
        }
        core.bump();
        match result {
            Ok(frame) => {
                let index = core.index_of(target);
                if core.state.transport == Transport::Playing {
                    let step = core.interval();
                    core.anchor_at(Instant::now(), target);
                    core.next_tick += step;
                }
                core.show(index, target, frame);
                drop(core);
                self.shared.wake.notify_all();
                Ok(target)
            }
            Err(error) => {
                core.fail(target, &error);
                Err(PlaybackError::Decode(error))
            }
        }
    }

    pub fn set_looping(&self, looping: bool) {
        let mut core = self.shared.core.lock();
        core.config.looping = looping;
        core.state.looping  = looping;
    }

    pub fn set_frame_skip(&self, frame_skip: bool) {
        let mut core = self.shared.core.lock();
        core.config.frame_skip = frame_skip;
        if core.state.transport == Transport::Playing {
            let (position, step) = (core.state.position, core.interval());
            core.anchor_at(Instant::now(), position);
            core.next_tick += step;
        }
    }
}

impl Drop for PlaybackDriver {
    fn drop(&mut self) {
        {
            let mut core = self.shared.core.lock();
            core.shutdown = true;
            core.bump();
        }
        self.shared.wake.notify_all();
        if let Some(t) = self.scheduler.take() {
            let _ = t.join();
        }
    }
}

// ── Scheduler thread ──────────────────────────────────────────────────────────

fn run_scheduler(shared: &Shared) {
    log::debug!("[playback] scheduler started");
    loop {
        let tick = {
            let mut core = shared.core.lock();
            loop {
                if core.shutdown {
                    log::debug!("[playback] scheduler exiting");
                    return;
                }
                if core.state.transport == Transport::Playing {
                    let deadline = core.next_tick;
                    if Instant::now() >= deadline { break; }
                    shared.wake.wait_until(&mut core, deadline);
                } else {
                    shared.wake.wait(&mut core);
                }
            }
            core.plan_tick(Instant::now())
        };

        let Some(tick) = tick else { continue };
        let result = tick.handle.read_frame(tick.t);
        shared.core.lock().commit_tick(tick, result);
    }
}
