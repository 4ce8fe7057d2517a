//! Spec property 1: write-then-read round trip. Attributes of every
//! supported datatype family (including the boolean and `ArrDbl7` special
//! cases) survive a close-then-reopen cycle unchanged.

use std::cell::RefCell;
use std::rc::Rc;

use openpmd_io_core::backend::json::JsonBackendAdapter;
use openpmd_io_core::task::{AttributeValue, CloseFile, CreateFile, IOTask, OpenFile, ReadAttribute, WriteAttribute};
use openpmd_io_core::writable::Writable;
use openpmd_io_core::{AbstractIOHandler, Access, FlushLevel, FlushParams, FlushTarget};

fn flush_all() -> FlushParams {
    FlushParams::new(FlushLevel::UserFlush, FlushTarget::Buffer)
}

fn write_attr(dir: &std::path::Path, file: &str, name: &str, value: AttributeValue) {
    let root = Writable::root();
    let mut handler = AbstractIOHandler::new(
        Access::Create,
        JsonBackendAdapter::new(dir.to_str().unwrap(), Access::Create, 0),
    );
    handler
        .enqueue(IOTask::CreateFile(CreateFile { writable: root.clone(), name: file.to_string() }))
        .unwrap();
    handler
        .enqueue(IOTask::WriteAttribute(WriteAttribute {
            writable: root.clone(),
            name: name.to_string(),
            value,
            changes_over_steps: false,
        }))
        .unwrap();
    handler
        .enqueue(IOTask::CloseFile(CloseFile { writable: root }))
        .unwrap();
    handler.flush(flush_all()).unwrap();
}

fn read_attr(dir: &std::path::Path, file: &str, name: &str) -> AttributeValue {
    let root = Writable::root();
    let mut handler = AbstractIOHandler::new(
        Access::ReadOnly,
        JsonBackendAdapter::new(dir.to_str().unwrap(), Access::ReadOnly, 0),
    );
    let parse_pref = Rc::new(RefCell::new(None));
    handler
        .enqueue(IOTask::OpenFile(OpenFile { writable: root.clone(), name: file.to_string(), parse_preference: parse_pref }))
        .unwrap();
    let result = Rc::new(RefCell::new(None));
    handler
        .enqueue(IOTask::ReadAttribute(ReadAttribute { writable: root, name: name.to_string(), result: result.clone() }))
        .unwrap();
    handler.flush(flush_all()).unwrap();
    result.borrow_mut().take().unwrap()
}

#[test]
fn string_attribute_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    write_attr(dir.path(), "a.json", "software", AttributeValue::String("openpmd-io-core".to_string()));
    match read_attr(dir.path(), "a.json", "software") {
        AttributeValue::String(s) => assert_eq!(s, "openpmd-io-core"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn boolean_attribute_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    write_attr(dir.path(), "b.json", "isPeriodic", AttributeValue::Bool(true));
    match read_attr(dir.path(), "b.json", "isPeriodic") {
        AttributeValue::Bool(b) => assert!(b),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn unit_dimension_array_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let dims = [1.0, 1.0, -3.0, -1.0, 0.0, 0.0, 0.0];
    write_attr(dir.path(), "c.json", "unitDimension", AttributeValue::ArrDbl7(dims));
    match read_attr(dir.path(), "c.json", "unitDimension") {
        AttributeValue::ArrDbl7(v) => assert_eq!(v, dims),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn vector_of_doubles_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let values = vec![1.5, 2.5, 3.5];
    write_attr(dir.path(), "d.json", "gridSpacing", AttributeValue::VecDouble(values.clone()));
    match read_attr(dir.path(), "d.json", "gridSpacing") {
        AttributeValue::VecDouble(v) => assert_eq!(v, values),
        other => panic!("unexpected: {other:?}"),
    }
}
