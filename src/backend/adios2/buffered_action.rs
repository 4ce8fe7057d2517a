//! Deferred-action buffering: the three in-flight queues a per-file adapter
//! state keeps between a task's enqueue and the point its bytes actually
//! cross the FFI boundary (`PerformPuts`/`PerformGets`/`EndStep`/`Close`),
//! plus the error-preservation-on-failure semantics of spec §4.2/§4.4.6.
//!
//! Three queues, spec §4.4.5/§9 "Deferred lifetime of task buffers": the
//! pending queue (regular `Put`/`Get`), the unique-pointer-put queue (puts
//! whose buffer the adapter itself now owns, drained just before
//! `EndStep`/`Close`/`PerformDataWrite`), and the already-enqueued queue
//! (buffers already handed to ADIOS2's `Put`, preserved across a failed
//! flush so a retry does not double-submit or drop them).

use crate::backend::adios2::sys::ffi;
use crate::datatype::Datatype;
use crate::error::{Error, Result};
use crate::task::WriteBuffer;

/// A `Put`/`Get` whose bytes have been handed to `mod.rs`'s `dispatch` but
/// not yet submitted across the FFI boundary, because the engine batches
/// regular (non-unique-buffer) puts until the next sync point (spec §5
/// "Backend-internal asynchrony").
pub enum BufferedAction {
    Put(BufferedPut),
    Get(BufferedGet),
    /// A put whose `WriteBuffer::Unique` bytes this adapter now owns
    /// outright (spec §4.2.5); kept separate from `Put` because these must
    /// additionally be dropped (freeing the boxed slice) once ADIOS2 has
    /// copied them, whereas a `Shared` buffer's lifetime is the caller's
    /// responsibility.
    UniquePtrPut(BufferedUniquePtrPut),
}

pub struct BufferedPut {
    pub variable_name: String,
    pub datatype: Datatype,
    pub start: Vec<u64>,
    pub count: Vec<u64>,
    pub data: WriteBuffer,
}

pub struct BufferedGet {
    pub variable_name: String,
    pub datatype: Datatype,
    pub start: Vec<u64>,
    pub count: Vec<u64>,
    pub buffer: crate::task::ReadBuffer,
}

pub struct BufferedUniquePtrPut {
    pub variable_name: String,
    pub datatype: Datatype,
    pub start: Vec<u64>,
    pub count: Vec<u64>,
    pub data: Box<[u8]>,
}

fn dtype_name(dt: Datatype) -> &'static str {
    super::datatype_name(dt)
}

impl BufferedAction {
    /// Submits this action's bytes across the FFI boundary as a deferred
    /// `Put`/`Get`. Does not call `PerformPuts`/`PerformGets`; the caller
    /// batches many of these before syncing (spec §5).
    pub fn submit(
        &self,
        engine: std::pin::Pin<&mut ffi::Adios2Engine>,
        io: std::pin::Pin<&mut ffi::Adios2Io>,
    ) -> Result<()> {
        match self {
            BufferedAction::Put(p) => {
                let bytes = p.data.as_shared_slice().ok_or_else(|| {
                    Error::internal("BufferedPut carries a Unique buffer; use BufferedUniquePtrPut instead")
                })?;
                ffi::engine_put_deferred(
                    engine,
                    io,
                    &p.variable_name,
                    dtype_name(p.datatype),
                    &p.start,
                    &p.count,
                    bytes,
                )
                .map_err(|e| Error::internal(format!("ADIOS2 Put (deferred) failed: {e}")))
            }
            BufferedAction::Get(g) => {
                let mut buf = g.buffer.borrow_mut();
                let needed = crate::datatype::size_of(g.datatype)
                    * g.count.iter().product::<u64>() as usize;
                if buf.len() != needed {
                    buf.resize(needed, 0);
                }
                ffi::engine_get_deferred(
                    engine,
                    io,
                    &g.variable_name,
                    dtype_name(g.datatype),
                    &g.start,
                    &g.count,
                    &mut buf,
                )
                .map_err(|e| Error::internal(format!("ADIOS2 Get (deferred) failed: {e}")))
            }
            BufferedAction::UniquePtrPut(p) => ffi::engine_put_deferred(
                engine,
                io,
                &p.variable_name,
                dtype_name(p.datatype),
                &p.start,
                &p.count,
                &p.data,
            )
            .map_err(|e| Error::internal(format!("ADIOS2 Put (deferred) failed: {e}"))),
        }
    }
}

/// The three queues `ADIOS2File` keeps between enqueue and sync, plus the
/// already-enqueued holdover used to survive a failed flush (spec §4.2
/// "on flush failure the queued task is restored, and the backend's own
/// in-flight buffers must not be lost either").
#[derive(Default)]
pub struct DeferredQueue {
    pending: Vec<BufferedAction>,
    /// Actions that were already handed to ADIOS2's `Put`/`Get` in a prior
    /// `PerformPuts`/`PerformGets` call, kept alive only so their backing
    /// `WriteBuffer`/`ReadBuffer` stays live until the engine has actually
    /// consumed them (ADIOS2 does not copy eagerly for deferred mode).
    already_enqueued: Vec<BufferedAction>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        DeferredQueue { pending: Vec::new(), already_enqueued: Vec::new() }
    }

    pub fn push(&mut self, action: BufferedAction) {
        self.pending.push(action);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Submits every pending action, then calls `sync` (`PerformPuts` or
    /// `PerformGets`). On success, moves the submitted actions out of
    /// `already_enqueued` (their buffers may now be dropped). On failure,
    /// per spec §4.2, the actions already submitted to ADIOS2 must still be
    /// kept alive -- ADIOS2 itself may retry them on the next sync point --
    /// so they move into `already_enqueued` rather than being dropped, and
    /// the ones not yet submitted are restored to `pending` for the caller
    /// to retry.
    pub fn flush(
        &mut self,
        mut engine: std::pin::Pin<&mut ffi::Adios2Engine>,
        mut io: std::pin::Pin<&mut ffi::Adios2Io>,
        sync: impl FnOnce(std::pin::Pin<&mut ffi::Adios2Engine>) -> Result<()>,
    ) -> Result<()> {
        let actions = std::mem::take(&mut self.pending);
        let mut submitted = Vec::with_capacity(actions.len());
        for action in actions {
            match action.submit(engine.as_mut(), io.as_mut()) {
                Ok(()) => submitted.push(action),
                Err(e) => {
                    self.already_enqueued.append(&mut submitted);
                    return Err(e);
                }
            }
        }
        match sync(engine) {
            Ok(()) => {
                self.already_enqueued.clear();
                Ok(())
            }
            Err(e) => {
                self.already_enqueued.append(&mut submitted);
                Err(e)
            }
        }
    }
}
