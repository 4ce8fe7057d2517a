//! Deferred I/O core for openPMD.
//!
//! This crate implements the frontend/backend boundary described by the
//! openPMD core design: a closed set of [`task::IOTask`]s, an
//! [`handler::AbstractIOHandler`] that queues and flushes them, and a
//! [`handler::BackendAdapter`] per storage engine (JSON always available,
//! HDF5 and ADIOS2 behind their respective cargo features) that translates
//! those tasks into concrete storage-engine calls.
//!
//! The object model above this core (Series/Iteration/Mesh/Record/...) is
//! out of scope; this crate only implements the I/O core it is built on.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod backend;
pub mod chunk;
pub mod config;
pub mod datatype;
pub mod error;
pub mod file_handle;
pub mod handler;
pub mod task;
pub mod writable;

pub use crate::error::{Error, Result};
pub use crate::handler::{AbstractIOHandler, Access, BackendAdapter, FlushLevel, FlushParams, FlushTarget};
pub use crate::task::IOTask;
