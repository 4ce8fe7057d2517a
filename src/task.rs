//! The I/O task taxonomy (C2): a tagged union with one variant per operation
//! in spec §6.1, each carrying a typed parameter block, modeled as a tagged
//! variant rather than virtual dispatch (spec §9). This module is that
//! variant plus the small payload types every variant needs.

use std::cell::RefCell;
use std::rc::Rc;

use crate::chunk::{Dataset, Extent, Offset, WrittenChunkInfo};
use crate::datatype::Datatype;
use crate::writable::Writable;

/// A raw, backend-agnostic buffer of encoded attribute/dataset bytes.
/// `Shared` buffers are owned by the caller and must stay live until the
/// task is flushed (spec §3 "I/O task" invariant); `Unique` buffers are
/// handed to the adapter, which owns their lifetime from here on (spec §4.3
/// `writeDataset`, §9 "Deferred lifetime of task buffers").
#[derive(Debug, Clone)]
pub enum WriteBuffer {
    Shared(Rc<[u8]>),
    Unique(Rc<RefCell<Option<Box<[u8]>>>>),
}

impl WriteBuffer {
    pub fn shared(bytes: Vec<u8>) -> Self {
        WriteBuffer::Shared(Rc::from(bytes.into_boxed_slice()))
    }

    pub fn unique(bytes: Vec<u8>) -> Self {
        WriteBuffer::Unique(Rc::new(RefCell::new(Some(bytes.into_boxed_slice()))))
    }

    pub fn as_shared_slice(&self) -> Option<&[u8]> {
        match self {
            WriteBuffer::Shared(b) => Some(b),
            WriteBuffer::Unique(_) => None,
        }
    }

    /// Takes ownership of a `Unique` buffer's bytes, leaving it empty.
    /// Called when the adapter drains `m_uniquePtrPuts` just before
    /// `EndStep`/`Close`/`PerformDataWrite` (spec §4.2.5).
    pub fn take_unique(&self) -> Option<Box<[u8]>> {
        match self {
            WriteBuffer::Shared(_) => None,
            WriteBuffer::Unique(cell) => cell.borrow_mut().take(),
        }
    }
}

/// A caller-supplied output buffer for a deferred get (spec §4.3
/// `readDataset`). Shared so the backend can fill it in after the task has
/// been enqueued and possibly moved.
pub type ReadBuffer = Rc<RefCell<Vec<u8>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceMode {
    Begin,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceStatus {
    Ok,
    Over,
    RandomAccess,
}

/// A tagged union over the closed datatype set, spec §3 "Attribute value".
#[derive(Debug, Clone)]
pub enum AttributeValue {
    Char(i8),
    UChar(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    UShort(u16),
    UInt(u32),
    ULong(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
    VecInt(Vec<i32>),
    VecLong(Vec<i64>),
    VecFloat(Vec<f32>),
    VecDouble(Vec<f64>),
    VecString(Vec<String>),
    Complex(f64, f64),
    /// `array<double, 7>`, only ever used for `unitDimension`.
    ArrDbl7([f64; 7]),
}

impl AttributeValue {
    pub fn datatype(&self) -> Datatype {
        match self {
            AttributeValue::Char(_) => Datatype::Char,
            AttributeValue::UChar(_) => Datatype::UChar,
            AttributeValue::Short(_) => Datatype::Short,
            AttributeValue::Int(_) => Datatype::Int,
            AttributeValue::Long(_) => Datatype::Long,
            AttributeValue::UShort(_) => Datatype::UShort,
            AttributeValue::UInt(_) => Datatype::UInt,
            AttributeValue::ULong(_) => Datatype::ULong,
            AttributeValue::Float(_) => Datatype::Float,
            AttributeValue::Double(_) => Datatype::Double,
            AttributeValue::Bool(_) => Datatype::Bool,
            AttributeValue::String(_) => Datatype::String,
            AttributeValue::VecInt(_) => Datatype::VecInt,
            AttributeValue::VecLong(_) => Datatype::VecLong,
            AttributeValue::VecFloat(_) => Datatype::VecFloat,
            AttributeValue::VecDouble(_) => Datatype::VecDouble,
            AttributeValue::VecString(_) => Datatype::VecString,
            AttributeValue::Complex(_, _) => Datatype::CDouble,
            AttributeValue::ArrDbl7(_) => Datatype::ArrDbl7,
        }
    }
}

macro_rules! param_structs {
    ($($(#[$meta:meta])* $name:ident { $($field:ident: $ty:ty,)* })*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone)]
            pub struct $name {
                pub writable: Writable,
                $(pub $field: $ty,)*
            }
        )*
    };
}

param_structs! {
    /// `CREATE_FILE`: creates `name`, sets the writable's file position to root.
    CreateFile { name: String, }
    /// `CHECK_FILE`: existence check, collective-OR under MPI.
    CheckFile { name: String, result: Rc<RefCell<Option<bool>>>, }
    /// `OPEN_FILE`: opens `name`; reports whether the file could be parsed
    /// up front or must be parsed per-step.
    OpenFile { name: String, parse_preference: Rc<RefCell<Option<ParsePreference>>>, }
    /// `CLOSE_FILE`: drains late puts, ends any open step, closes the engine.
    CloseFile {}
    /// `DELETE_FILE`: closes then removes `name`.
    DeleteFile { name: String, }
    /// `CREATE_PATH`: materializes a group; marks it active under the group table.
    CreatePath { path: String, }
    /// `OPEN_PATH`: sets the writable's file position to an existing group.
    OpenPath { path: String, }
    /// `CLOSE_PATH`: in streaming mode, may drop attributes scoped to this path.
    ClosePath {}
    /// `DELETE_PATH`: removes a group. HDF5 only.
    DeletePath { path: String, }
    /// `CREATE_DATASET`: defines a variable with operators and shape.
    CreateDataset { name: String, dataset: Dataset, }
    /// `EXTEND_DATASET`: resizes a chunked/resizable variable.
    ExtendDataset { new_extent: Extent, }
    /// `OPEN_DATASET`: discovers a variable's datatype and shape.
    OpenDataset { name: String, result: Rc<RefCell<Option<Dataset>>>, }
    /// `DELETE_DATASET`: removes a variable. Unsupported in ADIOS2.
    DeleteDataset {}
    /// `WRITE_DATASET`: enqueues a deferred put.
    WriteDataset { offset: Offset, extent: Extent, datatype: Datatype, data: WriteBuffer, }
    /// `READ_DATASET`: enqueues a deferred get into `buffer`.
    ReadDataset { offset: Offset, extent: Extent, datatype: Datatype, buffer: ReadBuffer, }
    /// `GET_BUFFER_VIEW`: span-based zero-copy put/update.
    GetBufferView {
        offset: Offset,
        extent: Extent,
        datatype: Datatype,
        update: bool,
        view_index: Option<u64>,
        result: Rc<RefCell<Option<BufferViewResult>>>,
    }
    /// `WRITE_ATT`: defines or modifies an attribute.
    WriteAttribute { name: String, value: AttributeValue, changes_over_steps: bool, }
    /// `READ_ATT`: reads an attribute by name.
    ReadAttribute { name: String, result: Rc<RefCell<Option<AttributeValue>>>, }
    /// `DELETE_ATT`: removes an attribute. HDF5 only.
    DeleteAttribute { name: String, }
    /// `LIST_PATHS`: lists child groups.
    ListPaths { result: Rc<RefCell<Vec<String>>>, }
    /// `LIST_DATASETS`: lists child datasets.
    ListDatasets { result: Rc<RefCell<Vec<String>>>, }
    /// `LIST_ATTS`: lists attributes at a node.
    ListAttributes { result: Rc<RefCell<Vec<String>>>, }
    /// `ADVANCE`: begins or ends a step.
    Advance { mode: AdvanceMode, result: Rc<RefCell<Option<AdvanceStatus>>>, }
    /// `AVAILABLE_CHUNKS`: reports the chunk inventory of a dataset.
    AvailableChunks { result: Rc<RefCell<Vec<WrittenChunkInfo>>>, }
    /// `TOUCH`: marks the writable's file dirty without any other effect.
    Touch {}
    /// `DEREGISTER`: drops the writable from the backend's maps.
    Deregister {}
}

/// Whether an opened file can be parsed in its entirety before any step is
/// read, or must be parsed incrementally as steps arrive (spec §4.4.3 /
/// glossary "Parse preference").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePreference {
    UpFront,
    PerStep,
}

/// Result of `GET_BUFFER_VIEW`: either a backend-owned span the frontend can
/// write into directly, or a signal to fall back to a copy.
#[derive(Debug, Clone)]
pub enum BufferViewResult {
    Span { view_index: u64, base_ptr: usize },
    BackendDoesNotManageBuffer,
}

/// A value of the tagged union `Op(params)`, spec §6.1. Each variant
/// references a [`Writable`] by (cheap, `Rc`-backed) value; spec §3's "I/O
/// task" invariant that the referenced writable remain live until flush or
/// discard is automatically satisfied since `Writable` is reference-counted
/// rather than a raw pointer.
#[derive(Debug, Clone)]
pub enum IOTask {
    CreateFile(CreateFile),
    CheckFile(CheckFile),
    OpenFile(OpenFile),
    CloseFile(CloseFile),
    DeleteFile(DeleteFile),
    CreatePath(CreatePath),
    OpenPath(OpenPath),
    ClosePath(ClosePath),
    DeletePath(DeletePath),
    CreateDataset(CreateDataset),
    ExtendDataset(ExtendDataset),
    OpenDataset(OpenDataset),
    DeleteDataset(DeleteDataset),
    WriteDataset(WriteDataset),
    ReadDataset(ReadDataset),
    GetBufferView(GetBufferView),
    WriteAttribute(WriteAttribute),
    ReadAttribute(ReadAttribute),
    DeleteAttribute(DeleteAttribute),
    ListPaths(ListPaths),
    ListDatasets(ListDatasets),
    ListAttributes(ListAttributes),
    Advance(Advance),
    AvailableChunks(AvailableChunks),
    Touch(Touch),
    Deregister(Deregister),
}

impl IOTask {
    /// The writable this task targets.
    pub fn writable(&self) -> &Writable {
        match self {
            IOTask::CreateFile(p) => &p.writable,
            IOTask::CheckFile(p) => &p.writable,
            IOTask::OpenFile(p) => &p.writable,
            IOTask::CloseFile(p) => &p.writable,
            IOTask::DeleteFile(p) => &p.writable,
            IOTask::CreatePath(p) => &p.writable,
            IOTask::OpenPath(p) => &p.writable,
            IOTask::ClosePath(p) => &p.writable,
            IOTask::DeletePath(p) => &p.writable,
            IOTask::CreateDataset(p) => &p.writable,
            IOTask::ExtendDataset(p) => &p.writable,
            IOTask::OpenDataset(p) => &p.writable,
            IOTask::DeleteDataset(p) => &p.writable,
            IOTask::WriteDataset(p) => &p.writable,
            IOTask::ReadDataset(p) => &p.writable,
            IOTask::GetBufferView(p) => &p.writable,
            IOTask::WriteAttribute(p) => &p.writable,
            IOTask::ReadAttribute(p) => &p.writable,
            IOTask::DeleteAttribute(p) => &p.writable,
            IOTask::ListPaths(p) => &p.writable,
            IOTask::ListDatasets(p) => &p.writable,
            IOTask::ListAttributes(p) => &p.writable,
            IOTask::Advance(p) => &p.writable,
            IOTask::AvailableChunks(p) => &p.writable,
            IOTask::Touch(p) => &p.writable,
            IOTask::Deregister(p) => &p.writable,
        }
    }

    /// Whether this task is purely metadata-structural (no engine data
    /// transfer), used by `FlushLevel::SkeletonOnly` (spec §4.2).
    pub fn is_skeleton_only(&self) -> bool {
        !matches!(
            self,
            IOTask::WriteDataset(_) | IOTask::ReadDataset(_) | IOTask::GetBufferView(_)
        )
    }

    /// Whether this task can run against a read-only handler (spec §4.2
    /// "write-side operations fail fast in read-only modes").
    pub fn is_write_operation(&self) -> bool {
        matches!(
            self,
            IOTask::CreateFile(_)
                | IOTask::DeleteFile(_)
                | IOTask::CreatePath(_)
                | IOTask::DeletePath(_)
                | IOTask::CreateDataset(_)
                | IOTask::ExtendDataset(_)
                | IOTask::DeleteDataset(_)
                | IOTask::WriteDataset(_)
                | IOTask::WriteAttribute(_)
                | IOTask::DeleteAttribute(_)
        )
    }
}
