//! Spec property 3: a joined-dimension dataset's global shape is the sum of
//! per-writer contributions, concatenated in submission order, and only
//! visible to a reader once the step that wrote them commits.

use std::cell::RefCell;
use std::rc::Rc;

use openpmd_io_core::backend::json::JsonBackendAdapter;
use openpmd_io_core::chunk::{assemble_joined_extent, Dataset, Extent, Offset};
use openpmd_io_core::datatype::Datatype;
use openpmd_io_core::task::{
    Advance, AdvanceMode, CloseFile, CreateDataset, CreateFile, IOTask, OpenDataset, ReadDataset,
    WriteBuffer, WriteDataset,
};
use openpmd_io_core::writable::Writable;
use openpmd_io_core::{AbstractIOHandler, Access, FlushLevel, FlushParams, FlushTarget};

#[test]
fn per_writer_contributions_concatenate_in_submission_order() {
    let dir = tempfile::tempdir().unwrap();
    let root = Writable::root();
    let mut handler = AbstractIOHandler::new(
        Access::Create,
        JsonBackendAdapter::new(dir.path().to_str().unwrap(), Access::Create, 0),
    );

    handler
        .enqueue(IOTask::CreateFile(CreateFile {
            writable: root.clone(),
            name: "joined.json".to_string(),
        }))
        .unwrap();
    handler
        .enqueue(IOTask::CreateDataset(CreateDataset {
            writable: root.clone(),
            name: "numParticles".to_string(),
            dataset: Dataset::new(Datatype::Int, Extent::from_slice(&[0]))
                .with_joined_dimension(0)
                .unwrap(),
        }))
        .unwrap();

    let per_writer: [Vec<i32>; 3] = [vec![1, 2], vec![3, 4, 5], vec![6]];
    for contribution in &per_writer {
        let bytes: Vec<u8> = contribution.iter().flat_map(|v| v.to_le_bytes()).collect();
        handler
            .enqueue(IOTask::WriteDataset(WriteDataset {
                writable: root.clone(),
                offset: Offset::from_slice(&[openpmd_io_core::chunk::JOINED_DIMENSION]),
                extent: Extent::from_slice(&[contribution.len() as u64]),
                datatype: Datatype::Int,
                data: WriteBuffer::shared(bytes),
            }))
            .unwrap();
    }

    let advance_result = Rc::new(RefCell::new(None));
    handler
        .enqueue(IOTask::Advance(Advance {
            writable: root.clone(),
            mode: AdvanceMode::End,
            result: advance_result,
        }))
        .unwrap();
    handler
        .enqueue(IOTask::CloseFile(CloseFile { writable: root.clone() }))
        .unwrap();
    handler
        .flush(FlushParams::new(FlushLevel::UserFlush, FlushTarget::Buffer))
        .unwrap();

    let expected_len: u64 = per_writer.iter().map(|v| v.len() as u64).sum();
    assert_eq!(
        expected_len,
        assemble_joined_extent(&per_writer.iter().map(|v| v.len() as u64).collect::<Vec<_>>())
    );

    let root = Writable::root();
    let mut reader = AbstractIOHandler::new(
        Access::ReadOnly,
        JsonBackendAdapter::new(dir.path().to_str().unwrap(), Access::ReadOnly, 0),
    );
    reader
        .enqueue(IOTask::OpenFile(openpmd_io_core::task::OpenFile {
            writable: root.clone(),
            name: "joined.json".to_string(),
            parse_preference: Rc::new(RefCell::new(None)),
        }))
        .unwrap();
    let opened = Rc::new(RefCell::new(None));
    reader
        .enqueue(IOTask::OpenDataset(OpenDataset {
            writable: root.clone(),
            name: "numParticles".to_string(),
            result: opened.clone(),
        }))
        .unwrap();
    reader
        .flush(FlushParams::new(FlushLevel::UserFlush, FlushTarget::Buffer))
        .unwrap();
    let dataset = opened.borrow_mut().take().unwrap();
    assert_eq!(dataset.extent[0], expected_len);

    let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    reader
        .enqueue(IOTask::ReadDataset(ReadDataset {
            writable: root,
            offset: Offset::from_slice(&[0]),
            extent: Extent::from_slice(&[expected_len]),
            datatype: Datatype::Int,
            buffer: buffer.clone(),
        }))
        .unwrap();
    reader
        .flush(FlushParams::new(FlushLevel::UserFlush, FlushTarget::Buffer))
        .unwrap();

    let raw = buffer.borrow();
    let values: Vec<i32> = raw
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    let expected: Vec<i32> = per_writer.into_iter().flatten().collect();
    assert_eq!(values, expected);
}
