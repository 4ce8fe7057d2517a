//! Spec property 5: a write issued between `ADVANCE(Begin)` and
//! `ADVANCE(End)` is not visible to a read until `ADVANCE(End)` commits it.

use std::cell::RefCell;
use std::rc::Rc;

use openpmd_io_core::backend::json::JsonBackendAdapter;
use openpmd_io_core::chunk::{Dataset, Extent, Offset};
use openpmd_io_core::datatype::Datatype;
use openpmd_io_core::task::{
    Advance, AdvanceMode, AdvanceStatus, CreateDataset, CreateFile, IOTask, ReadDataset,
    WriteBuffer, WriteDataset,
};
use openpmd_io_core::writable::Writable;
use openpmd_io_core::{AbstractIOHandler, Access, FlushLevel, FlushParams, FlushTarget};

#[test]
fn write_inside_a_step_is_invisible_until_the_step_ends() {
    let dir = tempfile::tempdir().unwrap();
    let root = Writable::root();
    let mut handler = AbstractIOHandler::new(
        Access::Create,
        JsonBackendAdapter::new(dir.path().to_str().unwrap(), Access::Create, 0),
    );
    let flush_now = || FlushParams::new(FlushLevel::UserFlush, FlushTarget::Buffer);

    handler
        .enqueue(IOTask::CreateFile(CreateFile {
            writable: root.clone(),
            name: "step.json".to_string(),
        }))
        .unwrap();
    handler
        .enqueue(IOTask::CreateDataset(CreateDataset {
            writable: root.clone(),
            name: "E_x".to_string(),
            dataset: Dataset::new(Datatype::Int, Extent::from_slice(&[1])),
        }))
        .unwrap();
    handler.flush(flush_now()).unwrap();

    let begin_result = Rc::new(RefCell::new(None));
    handler
        .enqueue(IOTask::Advance(Advance {
            writable: root.clone(),
            mode: AdvanceMode::Begin,
            result: begin_result.clone(),
        }))
        .unwrap();
    handler
        .enqueue(IOTask::WriteDataset(WriteDataset {
            writable: root.clone(),
            offset: Offset::from_slice(&[0]),
            extent: Extent::from_slice(&[1]),
            datatype: Datatype::Int,
            data: WriteBuffer::shared(42i32.to_le_bytes().to_vec()),
        }))
        .unwrap();
    handler.flush(flush_now()).unwrap();
    assert_eq!(*begin_result.borrow(), Some(AdvanceStatus::Ok));

    let mid_step_read = Rc::new(RefCell::new(Vec::new()));
    handler
        .enqueue(IOTask::ReadDataset(ReadDataset {
            writable: root.clone(),
            offset: Offset::from_slice(&[0]),
            extent: Extent::from_slice(&[1]),
            datatype: Datatype::Int,
            buffer: mid_step_read.clone(),
        }))
        .unwrap();
    handler.flush(flush_now()).unwrap();
    assert_eq!(
        i32::from_le_bytes(mid_step_read.borrow()[..4].try_into().unwrap()),
        0,
        "the write is staged, not yet committed"
    );

    let end_result = Rc::new(RefCell::new(None));
    handler
        .enqueue(IOTask::Advance(Advance {
            writable: root.clone(),
            mode: AdvanceMode::End,
            result: end_result,
        }))
        .unwrap();
    handler.flush(flush_now()).unwrap();

    let after_step_read = Rc::new(RefCell::new(Vec::new()));
    handler
        .enqueue(IOTask::ReadDataset(ReadDataset {
            writable: root,
            offset: Offset::from_slice(&[0]),
            extent: Extent::from_slice(&[1]),
            datatype: Datatype::Int,
            buffer: after_step_read.clone(),
        }))
        .unwrap();
    handler.flush(flush_now()).unwrap();
    assert_eq!(
        i32::from_le_bytes(after_step_read.borrow()[..4].try_into().unwrap()),
        42,
        "the write became visible once the step committed"
    );
}
