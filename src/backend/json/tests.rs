//! Exercises the JSON backend adapter end to end through
//! [`AbstractIOHandler`], rather than unit-testing `layout`/`document` in
//! isolation: this is the backend the rest of the crate's test suite relies
//! on as a dependency-free stand-in for ADIOS2/HDF5 (SPEC_FULL.md §C.4), so
//! it needs the same task-level coverage those backends get in `tests/`.

use std::cell::RefCell;
use std::rc::Rc;

use tempfile::tempdir;

use crate::chunk::{Dataset, Extent, Offset};
use crate::datatype::Datatype;
use crate::error::Error;
use crate::handler::{AbstractIOHandler, Access, FlushLevel, FlushParams, FlushTarget};
use crate::task::{
    AttributeValue, CloseFile, CreateDataset, CreateFile, IOTask, OpenDataset, OpenFile,
    ReadAttribute, WriteAttribute, WriteBuffer, WriteDataset,
};
use crate::writable::Writable;

use super::JsonBackendAdapter;

fn user_flush() -> FlushParams {
    FlushParams::new(FlushLevel::UserFlush, FlushTarget::Buffer)
}

fn writer(dir: &std::path::Path) -> AbstractIOHandler<JsonBackendAdapter> {
    AbstractIOHandler::new(
        Access::Create,
        JsonBackendAdapter::new(dir.to_str().unwrap(), Access::Create, 0),
    )
}

fn reader(dir: &std::path::Path) -> AbstractIOHandler<JsonBackendAdapter> {
    AbstractIOHandler::new(
        Access::ReadOnly,
        JsonBackendAdapter::new(dir.to_str().unwrap(), Access::ReadOnly, 0),
    )
}

#[test]
fn attribute_round_trip_through_close_and_reopen() {
    let dir = tempdir().unwrap();
    let root = Writable::root();

    let mut handler = writer(dir.path());
    handler
        .enqueue(IOTask::CreateFile(CreateFile {
            writable: root.clone(),
            name: "run.json".to_string(),
        }))
        .unwrap();
    handler
        .enqueue(IOTask::WriteAttribute(WriteAttribute {
            writable: root.clone(),
            name: "author".to_string(),
            value: AttributeValue::String("x".to_string()),
            changes_over_steps: false,
        }))
        .unwrap();
    handler
        .enqueue(IOTask::WriteAttribute(WriteAttribute {
            writable: root.clone(),
            name: "unitDimension".to_string(),
            value: AttributeValue::ArrDbl7([1.0, 1.0, -3.0, -1.0, 0.0, 0.0, 0.0]),
            changes_over_steps: false,
        }))
        .unwrap();
    handler
        .enqueue(IOTask::CloseFile(CloseFile {
            writable: root.clone(),
        }))
        .unwrap();
    handler.flush(user_flush()).unwrap();

    let root2 = Writable::root();
    let mut reader_handler = reader(dir.path());
    let parse_pref = Rc::new(RefCell::new(None));
    reader_handler
        .enqueue(IOTask::OpenFile(OpenFile {
            writable: root2.clone(),
            name: "run.json".to_string(),
            parse_preference: parse_pref,
        }))
        .unwrap();
    let author = Rc::new(RefCell::new(None));
    reader_handler
        .enqueue(IOTask::ReadAttribute(ReadAttribute {
            writable: root2.clone(),
            name: "author".to_string(),
            result: author.clone(),
        }))
        .unwrap();
    let unit_dim = Rc::new(RefCell::new(None));
    reader_handler
        .enqueue(IOTask::ReadAttribute(ReadAttribute {
            writable: root2.clone(),
            name: "unitDimension".to_string(),
            result: unit_dim.clone(),
        }))
        .unwrap();
    reader_handler.flush(user_flush()).unwrap();

    match author.borrow().as_ref().unwrap() {
        AttributeValue::String(s) => assert_eq!(s, "x"),
        other => panic!("unexpected attribute value: {other:?}"),
    }
    match unit_dim.borrow().as_ref().unwrap() {
        AttributeValue::ArrDbl7(v) => assert_eq!(*v, [1.0, 1.0, -3.0, -1.0, 0.0, 0.0, 0.0]),
        other => panic!("unexpected attribute value: {other:?}"),
    }
}

#[test]
fn write_attribute_on_read_only_handler_is_rejected_at_enqueue() {
    let dir = tempdir().unwrap();
    let root = Writable::root();
    let mut handler = writer(dir.path());
    handler
        .enqueue(IOTask::CreateFile(CreateFile {
            writable: root.clone(),
            name: "out.json".to_string(),
        }))
        .unwrap();
    handler
        .enqueue(IOTask::CloseFile(CloseFile {
            writable: root.clone(),
        }))
        .unwrap();
    handler.flush(user_flush()).unwrap();

    let root2 = Writable::root();
    let mut reader_handler = reader(dir.path());
    let parse_pref = Rc::new(RefCell::new(None));
    reader_handler
        .enqueue(IOTask::OpenFile(OpenFile {
            writable: root2.clone(),
            name: "out.json".to_string(),
            parse_preference: parse_pref,
        }))
        .unwrap();
    reader_handler.flush(user_flush()).unwrap();

    let err = reader_handler.enqueue(IOTask::WriteAttribute(WriteAttribute {
        writable: root2.clone(),
        name: "author".to_string(),
        value: AttributeValue::String("x".to_string()),
        changes_over_steps: false,
    }));
    assert!(matches!(err, Err(Error::WrongAPIUsage { .. })));
}

#[test]
fn reading_nonexistent_attribute_raises_read_error_not_found() {
    let dir = tempdir().unwrap();
    let root = Writable::root();
    let mut handler = writer(dir.path());
    handler
        .enqueue(IOTask::CreateFile(CreateFile {
            writable: root.clone(),
            name: "empty.json".to_string(),
        }))
        .unwrap();
    let result = Rc::new(RefCell::new(None));
    handler
        .enqueue(IOTask::ReadAttribute(ReadAttribute {
            writable: root.clone(),
            name: "nonexistent".to_string(),
            result,
        }))
        .unwrap();
    let err = handler.flush(user_flush()).unwrap_err();
    assert!(matches!(err, Error::NoSuchAttribute { name } if name == "nonexistent"));
}

#[test]
fn chunk_coverage_reports_every_disjoint_write() {
    // The JSON adapter tracks one document path per `WritableId`; a single
    // file/dataset session therefore walks the tree with one cursor
    // `Writable`, same as `attribute_round_trip_through_close_and_reopen`
    // above, rather than allocating a distinct node per group/dataset.
    let dir = tempdir().unwrap();
    let root = Writable::root();

    let mut handler = writer(dir.path());
    handler
        .enqueue(IOTask::CreateFile(CreateFile {
            writable: root.clone(),
            name: "chunks.json".to_string(),
        }))
        .unwrap();
    handler
        .enqueue(IOTask::CreateDataset(CreateDataset {
            writable: root.clone(),
            name: "E_x".to_string(),
            dataset: Dataset::new(Datatype::Double, Extent::from_slice(&[8])),
        }))
        .unwrap();

    let ranks: [(u64, u64); 4] = [(0, 2), (2, 2), (4, 2), (6, 2)];
    for (offset, extent) in ranks {
        let bytes: Vec<u8> = vec![0u8; extent as usize * 8];
        handler
            .enqueue(IOTask::WriteDataset(WriteDataset {
                writable: root.clone(),
                offset: Offset::from_slice(&[offset]),
                extent: Extent::from_slice(&[extent]),
                datatype: Datatype::Double,
                data: WriteBuffer::shared(bytes),
            }))
            .unwrap();
    }

    let chunks = Rc::new(RefCell::new(Vec::new()));
    handler
        .enqueue(IOTask::AvailableChunks(crate::task::AvailableChunks {
            writable: root.clone(),
            result: chunks.clone(),
        }))
        .unwrap();
    handler
        .enqueue(IOTask::CloseFile(CloseFile {
            writable: root.clone(),
        }))
        .unwrap();
    handler.flush(user_flush()).unwrap();

    let shape = [8u64];
    let reported = chunks.borrow();
    assert_eq!(reported.len(), ranks.len());
    for chunk in reported.iter() {
        assert!(chunk.fits_within(&shape));
    }
}

#[test]
fn discovered_shape_matches_what_was_created() {
    let dir = tempdir().unwrap();
    let root = Writable::root();

    let mut handler = writer(dir.path());
    handler
        .enqueue(IOTask::CreateFile(CreateFile {
            writable: root.clone(),
            name: "ds.json".to_string(),
        }))
        .unwrap();
    handler
        .enqueue(IOTask::CreateDataset(CreateDataset {
            writable: root.clone(),
            name: "id".to_string(),
            dataset: Dataset::new(Datatype::ULong, Extent::from_slice(&[12])),
        }))
        .unwrap();
    let discovered = Rc::new(RefCell::new(None));
    handler
        .enqueue(IOTask::OpenDataset(OpenDataset {
            writable: root.clone(),
            name: "id".to_string(),
            result: discovered.clone(),
        }))
        .unwrap();
    handler
        .enqueue(IOTask::CloseFile(CloseFile {
            writable: root.clone(),
        }))
        .unwrap();
    handler.flush(user_flush()).unwrap();

    let discovered = discovered.borrow();
    let discovered = discovered.as_ref().unwrap();
    assert_eq!(discovered.datatype, Datatype::ULong);
    assert_eq!(&discovered.extent[..], &[12]);
}
