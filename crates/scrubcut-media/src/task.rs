// crates/scrubcut-media/src/task.rs
//
// Background task plumbing: cancel flags, the message protocol between
// worker threads and the supervisor, and the spawn wrapper.
//
// A task is a `BackgroundJob` run on its own thread. It reads through a
// cloned `DecodeHandle`, checks its cancel flag after every unit of work,
// and reports progress + exactly one terminal message over the supervisor's
// channel. Every message carries the task id and the generation token the
// task was issued, so the supervisor can drop anything stale.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;
use uuid::Uuid;

use scrubcut_core::generation::GenerationParams;
use scrubcut_core::media_types::{Thumbnail, Waveform, WaveformChunk};
use scrubcut_core::{GenerationError, GenerationToken, HandleId, TaskId, TaskKind};

use crate::handle::DecodeHandle;
use crate::thumbnails::ThumbnailJob;
use crate::waveform::WaveformJob;

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Cooperative cancel flag. Setting it never blocks and never waits for the
/// worker; the worker notices at its next unit boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub enum TaskProgress {
    Thumbnails(Vec<Thumbnail>),
    Waveform(WaveformChunk),
}

#[derive(Clone, Debug)]
pub enum TaskOutput {
    Thumbnails(Vec<Thumbnail>),
    Waveform(Waveform),
}

#[derive(Clone, Debug)]
pub enum TaskOutcome {
    Completed(TaskOutput),
    /// The cancel flag was observed. Expected, not an error.
    Cancelled,
    Failed(GenerationError),
}

#[derive(Clone, Debug)]
pub enum TaskMessageBody {
    Progress(TaskProgress),
    Terminal(TaskOutcome),
}

#[derive(Clone, Debug)]
pub struct TaskMessage {
    pub task_id: TaskId,
    pub handle:  HandleId,
    pub token:   GenerationToken,
    pub body:    TaskMessageBody,
}

// ── Job trait ─────────────────────────────────────────────────────────────────

/// One unit-by-unit generation job.
///
/// Implementations must hold the decode lock for at most one unit (one
/// `DecodeHandle` call) at a time and return `TaskOutcome::Cancelled` as soon
/// as `ctx.is_cancelled()` is seen between units.
pub trait BackgroundJob: Send + 'static {
    fn kind(&self) -> TaskKind;

    fn run(self: Box<Self>, ctx: &TaskContext) -> TaskOutcome;
}

/// Build the job that services `params`.
pub fn job_for(params: GenerationParams) -> Box<dyn BackgroundJob> {
    match params {
        GenerationParams::Thumbnails(p) => Box::new(ThumbnailJob::new(p)),
        GenerationParams::Waveform(p)   => Box::new(WaveformJob::new(p)),
    }
}

/// What a running job sees.
pub struct TaskContext {
    task_id: TaskId,
    token:   GenerationToken,
    handle:  DecodeHandle,
    cancel:  CancelFlag,
    tx:      Sender<TaskMessage>,
}

impl TaskContext {
    pub fn handle(&self) -> &DecodeHandle {
        &self.handle
    }

    pub fn token(&self) -> GenerationToken {
        self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Report a partial result. A gone supervisor is not the worker's problem.
    pub fn progress(&self, progress: TaskProgress) {
        self.send(TaskMessageBody::Progress(progress));
    }

    fn send(&self, body: TaskMessageBody) {
        let _ = self.tx.send(TaskMessage {
            task_id: self.task_id,
            handle:  self.handle.id(),
            token:   self.token,
            body,
        });
    }
}

// ── Spawning ──────────────────────────────────────────────────────────────────

/// Supervisor-side view of a dispatched task.
#[derive(Debug)]
pub struct TaskHandle {
    pub id:    TaskId,
    pub kind:  TaskKind,
    pub token: GenerationToken,
    cancel:    CancelFlag,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Run `job` on a new named thread. The thread is detached: cancellation is
/// cooperative and nobody ever joins a worker.
pub fn spawn(
    job:    Box<dyn BackgroundJob>,
    handle: DecodeHandle,
    token:  GenerationToken,
    tx:     Sender<TaskMessage>,
) -> Result<TaskHandle, GenerationError> {
    let id     = Uuid::new_v4();
    let kind   = job.kind();
    let cancel = CancelFlag::new();
    let ctx    = TaskContext { task_id: id, token, handle, cancel: cancel.clone(), tx };

    thread::Builder::new()
        .name(format!("scrubcut-{kind}"))
        .spawn(move || {
            // RAII terminal guard: if the job panics the supervisor still
            // hears a terminal message instead of waiting on a dead slot.
            struct TerminalGuard<'a> { ctx: &'a TaskContext, sent: bool }
            impl Drop for TerminalGuard<'_> {
                fn drop(&mut self) {
                    if !self.sent {
                        self.ctx.send(TaskMessageBody::Terminal(TaskOutcome::Failed(
                            GenerationError::Spawn("worker panicked".into()),
                        )));
                    }
                }
            }
            let mut guard = TerminalGuard { ctx: &ctx, sent: false };

            log::debug!("[task] {kind} {id} started ({token})");
            let outcome = if ctx.is_cancelled() { TaskOutcome::Cancelled } else { job.run(&ctx) };
            log::debug!("[task] {kind} {id} finished ({token}): {}", outcome_label(&outcome));
            ctx.send(TaskMessageBody::Terminal(outcome));
            guard.sent = true;
        })
        .map_err(|e| GenerationError::Spawn(e.to_string()))?;

    Ok(TaskHandle { id, kind, token, cancel })
}

pub(crate) fn outcome_label(outcome: &TaskOutcome) -> &'static str {
    match outcome {
        TaskOutcome::Completed(_) => "completed",
        TaskOutcome::Cancelled    => "cancelled",
        TaskOutcome::Failed(_)    => "failed",
    }
}
