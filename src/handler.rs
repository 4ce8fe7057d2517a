//! The abstract I/O handler (C3): owns the task queue and dirty-file set,
//! defines flush levels, access modes, and dispatch to a backend adapter.
//! Spec §4.2. An `AbstractIOHandler<B: BackendAdapter>` owns a task queue
//! and dispatches tasks to a backend adapter one at a time, in FIFO
//! submission order (spec §4.2 "Ordering guarantees").

use std::collections::VecDeque;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::task::IOTask;

/// `params.level`, spec §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum FlushLevel {
    /// Executes metadata-structural tasks only.
    SkeletonOnly,
    CreateOrOpenFiles,
    InternalFlush,
    /// Additionally forces data to be pushed through the engine.
    #[default]
    UserFlush,
}

/// `params.flushTarget`, spec §4.2, passed through to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTarget {
    Buffer,
    Disk,
    NewStep,
}

impl Default for FlushTarget {
    fn default() -> Self {
        FlushTarget::Buffer
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushParams {
    pub level: FlushLevel,
    pub flush_target: FlushTarget,
}

impl FlushParams {
    pub fn new(level: FlushLevel, flush_target: FlushTarget) -> Self {
        FlushParams {
            level,
            flush_target,
        }
    }

    pub fn level(&self) -> FlushLevel {
        self.level
    }
}

/// Spec §4.2 `access`: governs which operations are admissible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadRandomAccess,
    ReadLinear,
    ReadWrite,
    Create,
    Append,
}

impl Access {
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Access::ReadOnly | Access::ReadRandomAccess | Access::ReadLinear
        )
    }

    pub fn allows_write(self) -> bool {
        !self.is_read_only()
    }
}

/// The per-backend implementation of the task set (spec §6.1). One impl per
/// storage engine.
pub trait BackendAdapter {
    /// Name used in error messages (`OperationUnsupportedInBackend`).
    fn name(&self) -> &'static str;

    /// Executes one task. Called once per queued task, in FIFO order,
    /// during [`AbstractIOHandler::flush`].
    fn dispatch(&mut self, task: &IOTask, level: FlushLevel, target: FlushTarget) -> Result<()>;
}

/// Owns the FIFO task queue and dispatches to a [`BackendAdapter`]. Spec
/// §4.2 / §5 "single-threaded cooperative": not re-entrant, and the only
/// concurrency this type itself is aware of is that a backend's own flush
/// may talk to MPI collectively -- something `AbstractIOHandler` neither
/// participates in nor needs to know about.
pub struct AbstractIOHandler<B: BackendAdapter> {
    queue: VecDeque<IOTask>,
    access: Access,
    backend: B,
}

impl<B: BackendAdapter> AbstractIOHandler<B> {
    pub fn new(access: Access, backend: B) -> Self {
        AbstractIOHandler {
            queue: VecDeque::new(),
            access,
            backend,
        }
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Appends a task to the FIFO; does not execute it. Spec §4.2
    /// `enqueue`. Write-side tasks fail fast under a read-only access mode
    /// rather than being silently queued and failing later at flush time.
    pub fn enqueue(&mut self, task: IOTask) -> Result<()> {
        if self.access.is_read_only() && task.is_write_operation() {
            return Err(Error::wrong_api_usage(format!(
                "cannot enqueue a write operation under read-only access mode {:?}",
                self.access
            )));
        }
        debug!("enqueue {task:?}");
        self.queue.push_back(task);
        Ok(())
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Drains the FIFO by dispatching each task to the backend adapter in
    /// FIFO order, honoring `params.level` (spec §4.2 `flush`).
    ///
    /// On the first backend error, draining stops and the error propagates;
    /// tasks not yet dispatched remain queued (spec §4.2 "Failure
    /// semantics" -- the backend adapter itself is responsible for keeping
    /// any of *its own* in-flight buffered actions alive until the next
    /// synchronization point, see `backend::adios2::buffered_action`).
    pub fn flush(&mut self, params: FlushParams) -> Result<()> {
        let level = params.level();
        while let Some(task) = self.queue.front() {
            if level == FlushLevel::SkeletonOnly && !task.is_skeleton_only() {
                break;
            }
            let task = self.queue.pop_front().expect("front just checked Some");
            if let Err(err) = self.backend.dispatch(&task, level, params.flush_target) {
                warn!(
                    "flush failed on task for writable {:?}, {} task(s) remain queued: {err}",
                    task.writable(),
                    self.queue.len()
                );
                self.queue.push_front(task);
                return Err(err);
            }
        }
        Ok(())
    }
}
