//! Spec property 4: flushing an empty queue is a no-op, and calling
//! `flush` twice in a row with no intervening enqueue has the same effect
//! as calling it once.

use openpmd_io_core::backend::json::JsonBackendAdapter;
use openpmd_io_core::task::{CreateFile, IOTask, WriteAttribute};
use openpmd_io_core::task::AttributeValue;
use openpmd_io_core::writable::Writable;
use openpmd_io_core::{AbstractIOHandler, Access, FlushLevel, FlushParams, FlushTarget};

#[test]
fn second_flush_with_nothing_queued_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let root = Writable::root();
    let mut handler = AbstractIOHandler::new(
        Access::Create,
        JsonBackendAdapter::new(dir.path().to_str().unwrap(), Access::Create, 0),
    );

    handler
        .enqueue(IOTask::CreateFile(CreateFile {
            writable: root.clone(),
            name: "idem.json".to_string(),
        }))
        .unwrap();
    handler
        .enqueue(IOTask::WriteAttribute(WriteAttribute {
            writable: root,
            name: "iterationEncoding".to_string(),
            value: AttributeValue::String("fileBased".to_string()),
            changes_over_steps: false,
        }))
        .unwrap();

    assert_eq!(handler.queue_len(), 2);
    handler
        .flush(FlushParams::new(FlushLevel::UserFlush, FlushTarget::Buffer))
        .unwrap();
    assert_eq!(handler.queue_len(), 0);

    // Nothing was enqueued since the first flush; a second flush must
    // neither error nor change any observable state.
    handler
        .flush(FlushParams::new(FlushLevel::UserFlush, FlushTarget::Buffer))
        .unwrap();
    assert_eq!(handler.queue_len(), 0);
}

#[test]
fn skeleton_only_flush_leaves_data_tasks_queued_until_a_later_user_flush() {
    let dir = tempfile::tempdir().unwrap();
    let root = Writable::root();
    let mut handler = AbstractIOHandler::new(
        Access::Create,
        JsonBackendAdapter::new(dir.path().to_str().unwrap(), Access::Create, 0),
    );

    handler
        .enqueue(IOTask::CreateFile(CreateFile {
            writable: root.clone(),
            name: "skel.json".to_string(),
        }))
        .unwrap();
    handler
        .enqueue(IOTask::WriteDataset(openpmd_io_core::task::WriteDataset {
            writable: root,
            offset: openpmd_io_core::chunk::Offset::from_slice(&[0]),
            extent: openpmd_io_core::chunk::Extent::from_slice(&[1]),
            datatype: openpmd_io_core::datatype::Datatype::Int,
            data: openpmd_io_core::task::WriteBuffer::shared(vec![0u8; 4]),
        }))
        .unwrap();

    handler
        .flush(FlushParams::new(FlushLevel::SkeletonOnly, FlushTarget::Buffer))
        .unwrap();
    assert_eq!(handler.queue_len(), 1, "the data write is not skeleton-only work");

    handler
        .flush(FlushParams::new(FlushLevel::UserFlush, FlushTarget::Buffer))
        .unwrap();
    assert_eq!(handler.queue_len(), 0);
}
