//! Spec property 2: chunk coverage. A dataset written by several disjoint
//! ranks reports exactly that many chunks after close, each fitting within
//! the dataset's shape.

use std::cell::RefCell;
use std::rc::Rc;

use openpmd_io_core::backend::json::JsonBackendAdapter;
use openpmd_io_core::chunk::{Dataset, Extent, Offset};
use openpmd_io_core::datatype::Datatype;
use openpmd_io_core::task::{AvailableChunks, CloseFile, CreateDataset, CreateFile, IOTask, WriteBuffer, WriteDataset};
use openpmd_io_core::writable::Writable;
use openpmd_io_core::{AbstractIOHandler, Access, FlushLevel, FlushParams, FlushTarget};

#[test]
fn uneven_ranks_cover_a_dataset_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let root = Writable::root();
    let mut handler = AbstractIOHandler::new(
        Access::Create,
        JsonBackendAdapter::new(dir.path().to_str().unwrap(), Access::Create, 0),
    );

    handler
        .enqueue(IOTask::CreateFile(CreateFile { writable: root.clone(), name: "cov.json".to_string() }))
        .unwrap();
    let shape = [10u64];
    handler
        .enqueue(IOTask::CreateDataset(CreateDataset {
            writable: root.clone(),
            name: "positions".to_string(),
            dataset: Dataset::new(Datatype::Float, Extent::from_slice(&shape)),
        }))
        .unwrap();

    let ranks: [(u64, u64); 3] = [(0, 3), (3, 5), (8, 2)];
    for (offset, extent) in ranks {
        let bytes = vec![0u8; extent as usize * 4];
        handler
            .enqueue(IOTask::WriteDataset(WriteDataset {
                writable: root.clone(),
                offset: Offset::from_slice(&[offset]),
                extent: Extent::from_slice(&[extent]),
                datatype: Datatype::Float,
                data: WriteBuffer::shared(bytes),
            }))
            .unwrap();
    }

    let chunks = Rc::new(RefCell::new(Vec::new()));
    handler
        .enqueue(IOTask::AvailableChunks(AvailableChunks { writable: root.clone(), result: chunks.clone() }))
        .unwrap();
    handler
        .enqueue(IOTask::CloseFile(CloseFile { writable: root }))
        .unwrap();
    handler.flush(FlushParams::new(FlushLevel::UserFlush, FlushTarget::Buffer)).unwrap();

    let reported = chunks.borrow();
    assert_eq!(reported.len(), ranks.len());
    for chunk in reported.iter() {
        assert!(chunk.fits_within(&shape));
    }
    let total: u64 = ranks.iter().map(|(_, e)| *e).sum();
    assert_eq!(total, shape[0]);
}
