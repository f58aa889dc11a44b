// crates/scrubcut-media/src/supervisor.rs
//
// TaskSupervisor: one live background task per (handle, kind), and nothing
// stale ever reaches a subscriber.
//
// Ownership model:
//   The supervisor is a plain `&mut self` object living on the UI/event
//   thread. It is the single writer of the task table and the only caller of
//   `DecodeHandle::advance_generation`. Workers never touch the table; they
//   talk to it through one shared channel, which the owner drains with
//   `pump()` (the same "ingest results once per frame" loop an editor UI runs).
//
// Staleness:
//   Every message carries (task id, token). A message is forwarded only if
//   its task still occupies its slot and the token matches the slot's token.
//   Superseded tasks are moved to `retired` with their cancel flag set; when
//   their terminal message finally arrives they are logged as cancelled and
//   dropped, whatever they claim to have produced. Ordering between tokens is
//   therefore enforced by the filter, not by timing.
//
// Busy:
//   A slot going from empty to live, or back, is announced on a separate
//   `BusyChange` stream. Superseding a live task keeps the slot busy and
//   announces nothing.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use scrubcut_core::generation::{BusyChange, GenerationEvent, GenerationParams};
use scrubcut_core::{GenerationError, GenerationToken, HandleId, TaskId, TaskKind, TaskState};

use crate::handle::DecodeHandle;
use crate::task::{
    self, outcome_label, TaskHandle, TaskMessage, TaskMessageBody, TaskOutcome, TaskOutput,
    TaskProgress,
};

/// How many terminal states are remembered for `task_state` lookups.
const TERMINAL_LOG_LEN: usize = 64;

type SlotKey = (HandleId, TaskKind);

/// Supervisor's bookkeeping for one dispatched task.
#[derive(Debug)]
pub struct TaskRecord {
    pub handle: HandleId,
    pub params: GenerationParams,
    pub state:  TaskState,
    task:       TaskHandle,
}

impl TaskRecord {
    pub fn id(&self) -> TaskId { self.task.id }
    pub fn kind(&self) -> TaskKind { self.task.kind }
    pub fn token(&self) -> GenerationToken { self.task.token }
}

pub struct TaskSupervisor {
    tx:           Sender<TaskMessage>,
    rx:           Receiver<TaskMessage>,
    /// Live (running, current-token) tasks.
    slots:        HashMap<SlotKey, TaskRecord>,
    /// Superseded or cancelled tasks whose terminal message is still pending.
    retired:      HashMap<TaskId, TaskRecord>,
    terminal_log: VecDeque<(TaskId, TaskState)>,
    subscribers:  Vec<Sender<GenerationEvent>>,
    busy_subs:    Vec<Sender<BusyChange>>,
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskSupervisor {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            slots:        HashMap::new(),
            retired:      HashMap::new(),
            terminal_log: VecDeque::with_capacity(TERMINAL_LOG_LEN),
            subscribers:  Vec::new(),
            busy_subs:    Vec::new(),
        }
    }

    /// New event stream. Every subscriber sees every published event.
    pub fn subscribe(&mut self) -> Receiver<GenerationEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Stream of busy/idle transitions per (handle, kind), for spinners.
    pub fn subscribe_busy(&mut self) -> Receiver<BusyChange> {
        let (tx, rx) = unbounded();
        self.busy_subs.push(tx);
        rx
    }

    // ── Requests ──────────────────────────────────────────────────────────────

    /// Start a new generation of one kind, superseding any task of that kind
    /// on `handle`. Returns the token the new task was issued.
    pub fn request_generation(&mut self, handle: &DecodeHandle, params: GenerationParams) -> GenerationToken {
        self.request_all(handle, [params])
    }

    /// Start several kinds under one token (e.g. reload invalidates both
    /// thumbnails and waveform). Kinds stay independent failure domains.
    pub fn request_all(
        &mut self,
        handle: &DecodeHandle,
        params: impl IntoIterator<Item = GenerationParams>,
    ) -> GenerationToken {
        let token = handle.advance_generation();
        for p in params {
            self.dispatch(handle, token, p);
        }
        token
    }

    fn dispatch(&mut self, handle: &DecodeHandle, token: GenerationToken, params: GenerationParams) {
        let kind = params.kind();
        let key  = (handle.id(), kind);
        let was_busy = self.retire(key, "superseded");

        match task::spawn(task::job_for(params.clone()), handle.clone(), token, self.tx.clone()) {
            Ok(task) => {
                log::debug!("[supervisor] {kind} {} dispatched for {} ({token})", task.id, handle.id());
                self.slots.insert(key, TaskRecord {
                    handle: handle.id(),
                    params,
                    state:  TaskState::Running,
                    task,
                });
                if !was_busy { self.announce(key, true); }
            }
            Err(error) => {
                log::error!("[supervisor] {kind} dispatch failed ({token}): {error}");
                self.publish(failed_event(kind, handle.id(), token, error));
                if was_busy { self.announce(key, false); }
            }
        }
    }

    /// Move the live task in `key` (if any) to `retired` and flag it.
    /// Never blocks on the worker. Returns whether the slot was occupied.
    fn retire(&mut self, key: SlotKey, why: &str) -> bool {
        let Some(mut old) = self.slots.remove(&key) else { return false };
        old.task.cancel();
        old.state = TaskState::Cancelled;
        log::debug!("[supervisor] {} {} {why} ({})", old.kind(), old.id(), old.token());
        self.retired.insert(old.id(), old);
        true
    }

    /// Cancel the running task of `kind` on `handle`. Its results, if any
    /// still arrive, are discarded.
    pub fn cancel(&mut self, handle: HandleId, kind: TaskKind) {
        if self.retire((handle, kind), "cancelled") {
            self.announce((handle, kind), false);
        }
    }

    /// Cancel everything for a handle that is being closed or replaced.
    pub fn release(&mut self, handle: HandleId) {
        self.cancel(handle, TaskKind::Thumbnails);
        self.cancel(handle, TaskKind::Waveform);
    }

    /// Cancel every live task.
    pub fn shutdown(&mut self) {
        let keys: Vec<SlotKey> = self.slots.keys().copied().collect();
        for key in keys {
            if self.retire(key, "shut down") {
                self.announce(key, false);
            }
        }
    }

    // ── Message routing ───────────────────────────────────────────────────────

    /// Drain pending worker messages without blocking. Returns how many were
    /// processed.
    pub fn pump(&mut self) -> usize {
        let mut n = 0;
        while let Ok(msg) = self.rx.try_recv() {
            self.route(msg);
            n += 1;
        }
        n
    }

    /// Wait up to `timeout` for at least one message, then drain.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => {
                self.route(msg);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Pump until no task (live or retired) is outstanding or `timeout`
    /// elapses. Returns `true` when idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_idle() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.pump_timeout(deadline - now);
        }
        true
    }

    fn route(&mut self, msg: TaskMessage) {
        match msg.body {
            TaskMessageBody::Progress(p) => self.on_task_progress(msg.task_id, msg.token, p),
            TaskMessageBody::Terminal(o) => self.on_task_terminal(msg.task_id, msg.token, o),
        }
    }

    fn current_slot(&self, task_id: TaskId, token: GenerationToken) -> Option<SlotKey> {
        self.slots
            .iter()
            .find(|(_, r)| r.id() == task_id && r.token() == token)
            .map(|(k, _)| *k)
    }

    /// Forward a partial result if it belongs to a current task.
    pub fn on_task_progress(&mut self, task_id: TaskId, token: GenerationToken, progress: TaskProgress) {
        let Some((handle, _)) = self.current_slot(task_id, token) else {
            log::trace!("[supervisor] dropping stale progress from {task_id} ({token})");
            return;
        };
        let event = match progress {
            TaskProgress::Thumbnails(batch) => GenerationEvent::ThumbnailsProgress {
                handle, token, batch: Arc::new(batch),
            },
            TaskProgress::Waveform(chunk) => GenerationEvent::WaveformProgress {
                handle, token, chunk: Arc::new(chunk),
            },
        };
        self.publish(event);
    }

    /// Settle a task. Current tasks publish completion or failure (once);
    /// cancelled and superseded tasks are settled silently.
    pub fn on_task_terminal(&mut self, task_id: TaskId, token: GenerationToken, outcome: TaskOutcome) {
        if let Some(key) = self.current_slot(task_id, token) {
            let Some(record) = self.slots.remove(&key) else { return };
            let (handle, kind) = key;
            let state = match outcome {
                TaskOutcome::Completed(output) => {
                    self.publish(complete_event(handle, token, &record.params, output));
                    TaskState::Completed
                }
                TaskOutcome::Cancelled => TaskState::Cancelled,
                TaskOutcome::Failed(error) => {
                    log::warn!("[supervisor] {kind} {task_id} failed ({token}): {error}");
                    self.publish(failed_event(kind, handle, token, error));
                    TaskState::Failed
                }
            };
            log::debug!("[supervisor] {kind} {task_id} settled as {state:?} ({token})");
            self.log_terminal(task_id, state);
            self.announce(key, false);
            return;
        }

        if let Some(record) = self.retired.remove(&task_id) {
            log::debug!(
                "[supervisor] discarding {} from retired {} {task_id} ({token})",
                outcome_label(&outcome), record.kind(),
            );
            self.log_terminal(task_id, TaskState::Cancelled);
            return;
        }

        log::trace!("[supervisor] terminal from unknown task {task_id} ({token})");
    }

    fn log_terminal(&mut self, task_id: TaskId, state: TaskState) {
        if self.terminal_log.len() == TERMINAL_LOG_LEN {
            self.terminal_log.pop_front();
        }
        self.terminal_log.push_back((task_id, state));
    }

    fn publish(&mut self, event: GenerationEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn announce(&mut self, (handle, kind): SlotKey, busy: bool) {
        let change = BusyChange { handle, kind, busy };
        self.busy_subs.retain(|tx| tx.send(change).is_ok());
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    /// State of a task the supervisor has dispatched, while it is live,
    /// retired, or among the most recent settled tasks.
    pub fn task_state(&self, task_id: TaskId) -> Option<TaskState> {
        if self.slots.values().any(|r| r.id() == task_id) {
            return Some(TaskState::Running);
        }
        if let Some(r) = self.retired.get(&task_id) {
            return Some(r.state);
        }
        self.terminal_log.iter().rev().find(|(id, _)| *id == task_id).map(|(_, s)| *s)
    }

    /// The live task of `kind` on `handle`, if one is running.
    pub fn active(&self, handle: HandleId, kind: TaskKind) -> Option<&TaskRecord> {
        self.slots.get(&(handle, kind))
    }

    /// Live plus retired-but-unsettled tasks.
    pub fn in_flight(&self) -> usize {
        self.slots.len() + self.retired.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }
}

impl Drop for TaskSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn complete_event(
    handle: HandleId,
    token:  GenerationToken,
    params: &GenerationParams,
    output: TaskOutput,
) -> GenerationEvent {
    match (output, params) {
        (TaskOutput::Thumbnails(thumbnails), GenerationParams::Thumbnails(p)) => {
            GenerationEvent::ThumbnailsComplete {
                handle, token, params: p.clone(), thumbnails: Arc::new(thumbnails),
            }
        }
        (TaskOutput::Waveform(waveform), GenerationParams::Waveform(p)) => {
            GenerationEvent::WaveformComplete {
                handle, token, params: p.clone(), waveform: Arc::new(waveform),
            }
        }
        (output, params) => {
            // Jobs are built from their params, so this is a programming error.
            log::error!("[supervisor] output/params kind mismatch: {:?}", params.kind());
            let kind = match output {
                TaskOutput::Thumbnails(_) => TaskKind::Thumbnails,
                TaskOutput::Waveform(_)   => TaskKind::Waveform,
            };
            failed_event(kind, handle, token, GenerationError::Spawn("output kind mismatch".into()))
        }
    }
}

fn failed_event(kind: TaskKind, handle: HandleId, token: GenerationToken, error: GenerationError) -> GenerationEvent {
    match kind {
        TaskKind::Thumbnails => GenerationEvent::ThumbnailsFailed { handle, token, error },
        TaskKind::Waveform   => GenerationEvent::WaveformFailed { handle, token, error },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use scrubcut_core::generation::{ThumbnailParams, WaveformParams};
    use scrubcut_core::media_types::{Frame, Thumbnail};

    use crate::synthetic::SyntheticSource;

    const WAIT: Duration = Duration::from_secs(10);

    fn thumbs(count: usize) -> GenerationParams {
        GenerationParams::Thumbnails(ThumbnailParams { count, width_hint: 32, batch_size: 2, range: None })
    }

    fn wave() -> GenerationParams {
        GenerationParams::Waveform(WaveformParams { points_per_second: 10, chunk_secs: 0.5, range: None })
    }

    fn fake_strip(n: usize) -> TaskOutcome {
        let thumbs = (0..n)
            .map(|i| Thumbnail {
                index: i,
                timestamp: i as f64,
                frame: Frame { timestamp: i as f64, width: 1, height: 1, data: vec![0; 4] },
            })
            .collect();
        TaskOutcome::Completed(TaskOutput::Thumbnails(thumbs))
    }

    fn slow_handle() -> DecodeHandle {
        DecodeHandle::open(SyntheticSource::new(10.0).with_read_delay(Duration::from_millis(200)))
    }

    #[test]
    fn only_last_token_publishes_regardless_of_completion_order() {
        let mut sup = TaskSupervisor::new();
        let events = sup.subscribe();
        let h = slow_handle();

        let t1 = sup.request_generation(&h, thumbs(3));
        let id1 = sup.active(h.id(), TaskKind::Thumbnails).unwrap().id();
        let t2 = sup.request_generation(&h, thumbs(3));
        let id2 = sup.active(h.id(), TaskKind::Thumbnails).unwrap().id();
        let t3 = sup.request_generation(&h, thumbs(3));
        let id3 = sup.active(h.id(), TaskKind::Thumbnails).unwrap().id();
        assert!(t1 < t2 && t2 < t3);

        // Settle out of order, 1 last, all claiming success.
        sup.on_task_terminal(id3, t3, fake_strip(3));
        sup.on_task_terminal(id2, t2, fake_strip(3));
        sup.on_task_progress(id1, t1, TaskProgress::Thumbnails(Vec::new()));
        sup.on_task_terminal(id1, t1, fake_strip(3));

        let published: Vec<GenerationEvent> = events.try_iter().collect();
        assert_eq!(published.len(), 1);
        assert!(matches!(published[0], GenerationEvent::ThumbnailsComplete { token, .. } if token == t3));
        assert_eq!(sup.task_state(id1), Some(TaskState::Cancelled));
        assert_eq!(sup.task_state(id2), Some(TaskState::Cancelled));
        assert_eq!(sup.task_state(id3), Some(TaskState::Completed));
    }

    #[test]
    fn cancel_right_after_dispatch_publishes_nothing() {
        let mut sup = TaskSupervisor::new();
        let events = sup.subscribe();
        let h = slow_handle();

        sup.request_generation(&h, thumbs(5));
        let id = sup.active(h.id(), TaskKind::Thumbnails).unwrap().id();
        sup.cancel(h.id(), TaskKind::Thumbnails);

        assert!(sup.wait_idle(WAIT));
        assert_eq!(events.try_iter().count(), 0);
        assert_eq!(sup.task_state(id), Some(TaskState::Cancelled));
    }

    #[test]
    fn kinds_share_a_token_but_not_a_failure_domain() {
        let mut sup = TaskSupervisor::new();
        let events = sup.subscribe();
        let h = DecodeHandle::open(SyntheticSource::new(2.0).without_audio());

        let token = sup.request_all(&h, [thumbs(2), wave()]);
        assert!(sup.wait_idle(WAIT));

        let published: Vec<GenerationEvent> = events.try_iter().collect();
        assert!(published.iter().all(|e| e.token() == token));
        assert!(published.iter().any(|e| matches!(e, GenerationEvent::ThumbnailsComplete { .. })));
        let failures: Vec<_> = published
            .iter()
            .filter(|e| matches!(e, GenerationEvent::WaveformFailed { error: GenerationError::NoAudio, .. }))
            .collect();
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn requesting_one_kind_leaves_the_other_running() {
        let mut sup = TaskSupervisor::new();
        let events = sup.subscribe();
        let h = DecodeHandle::open(SyntheticSource::new(2.0));

        let t_wave  = sup.request_generation(&h, wave());
        let t_thumb = sup.request_generation(&h, thumbs(2));
        assert!(t_thumb > t_wave);
        assert!(sup.wait_idle(WAIT));

        let published: Vec<GenerationEvent> = events.try_iter().collect();
        assert!(published.iter().any(|e| matches!(e, GenerationEvent::WaveformComplete { token, .. } if *token == t_wave)));
        assert!(published.iter().any(|e| matches!(e, GenerationEvent::ThumbnailsComplete { token, .. } if *token == t_thumb)));
    }

    #[test]
    fn failure_is_published_once_and_not_retried() {
        let mut sup = TaskSupervisor::new();
        let events = sup.subscribe();
        let h = DecodeHandle::open(SyntheticSource::new(4.0).failing_at(2.0));

        let token = sup.request_generation(&h, thumbs(3));
        assert!(sup.wait_idle(WAIT));

        let published: Vec<GenerationEvent> = events.try_iter().collect();
        let failed = published.iter().filter(|e| matches!(e, GenerationEvent::ThumbnailsFailed { .. })).count();
        assert_eq!(failed, 1);
        assert!(published.iter().all(|e| e.token() == token));
        assert!(!published.iter().any(|e| matches!(e, GenerationEvent::ThumbnailsComplete { .. })));
        assert!(sup.active(h.id(), TaskKind::Thumbnails).is_none());
    }

    #[test]
    fn release_cancels_every_kind_for_a_handle() {
        let mut sup = TaskSupervisor::new();
        let events = sup.subscribe();
        let h = slow_handle();

        sup.request_all(&h, [thumbs(4), wave()]);
        assert_eq!(sup.in_flight(), 2);
        sup.release(h.id());
        assert!(sup.active(h.id(), TaskKind::Thumbnails).is_none());
        assert!(sup.active(h.id(), TaskKind::Waveform).is_none());

        assert!(sup.wait_idle(WAIT));
        assert_eq!(events.try_iter().count(), 0);
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let mut sup = TaskSupervisor::new();
        let keep = sup.subscribe();
        drop(sup.subscribe());
        let h = DecodeHandle::open(SyntheticSource::new(1.0));
        sup.request_generation(&h, thumbs(1));
        assert!(sup.wait_idle(WAIT));
        assert_eq!(sup.subscribers.len(), 1);
        assert!(keep.try_iter().count() > 0);
    }

    fn busy_flags(rx: &Receiver<BusyChange>) -> Vec<(TaskKind, bool)> {
        rx.try_iter().map(|c| (c.kind, c.busy)).collect()
    }

    #[test]
    fn superseding_keeps_the_slot_busy() {
        let mut sup = TaskSupervisor::new();
        let busy = sup.subscribe_busy();
        let h = DecodeHandle::open(SyntheticSource::new(4.0).with_read_delay(Duration::from_millis(20)));

        sup.request_generation(&h, thumbs(4));
        sup.request_generation(&h, thumbs(3));
        assert_eq!(busy_flags(&busy), vec![(TaskKind::Thumbnails, true)]);

        assert!(sup.wait_idle(WAIT));
        assert_eq!(busy_flags(&busy), vec![(TaskKind::Thumbnails, false)]);
    }

    #[test]
    fn busy_clears_on_cancel_and_failure() {
        let mut sup = TaskSupervisor::new();
        let busy = sup.subscribe_busy();

        let slow = slow_handle();
        sup.request_generation(&slow, thumbs(4));
        sup.cancel(slow.id(), TaskKind::Thumbnails);
        assert_eq!(busy_flags(&busy), vec![(TaskKind::Thumbnails, true), (TaskKind::Thumbnails, false)]);

        let silent = DecodeHandle::open(SyntheticSource::new(2.0).without_audio());
        sup.request_generation(&silent, wave());
        assert!(sup.wait_idle(WAIT));
        let changes: Vec<BusyChange> = busy.try_iter().collect();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.handle == silent.id() && c.kind == TaskKind::Waveform));
        assert!(changes[0].busy && !changes[1].busy);
    }
}
