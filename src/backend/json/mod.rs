//! The JSON dump backend adapter: a synchronous, dependency-free backend
//! that serializes the writable graph to one JSON document per file,
//! treated as a peer container format of `.h5`/`.bp`/`.sst`/`.ssc` by
//! `backend::determine_format`. It exists here mainly so this crate's test
//! suite can exercise step/attribute/chunk semantics without linking HDF5
//! or ADIOS2.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use log::debug;

use crate::backend::path_position::PathPosition;
use crate::error::{AffectedObject, Error, ReadReason, Result};
use crate::handler::{Access, BackendAdapter, FlushLevel, FlushTarget};
use crate::task::{AdvanceMode, AdvanceStatus, BufferViewResult, IOTask, ParsePreference};
use crate::writable::{CommonFileState, Writable, WritableId};

mod document;
mod layout;

pub use document::{JsonDataset, JsonDocument, JsonGroup};

struct OpenFile {
    doc: JsonGroup,
    in_step: bool,
}

/// Synchronous backend adapter for the JSON dump format. Every task maps
/// directly to an in-memory tree mutation; there is no deferred queue of
/// its own (unlike ADIOS2's buffered actions), matching the plainer
/// "direct library call" shape of the HDF5 adapter -- the JSON backend is
/// simpler still, since it has no on-disk chunking or type-mapping
/// concerns either.
pub struct JsonBackendAdapter {
    files: CommonFileState<PathPosition>,
    open: BTreeMap<String, OpenFile>,
    paths: BTreeMap<WritableId, String>,
    writer_rank: u32,
    access: Access,
}

impl JsonBackendAdapter {
    pub fn new(directory: impl Into<String>, access: Access, writer_rank: u32) -> Self {
        JsonBackendAdapter {
            files: CommonFileState::new(directory),
            open: BTreeMap::new(),
            paths: BTreeMap::new(),
            writer_rank,
            access,
        }
    }

    fn full_path(&self, file_name: &str) -> PathBuf {
        PathBuf::from(self.files.full_path_str(file_name))
    }

    fn remember_path(&mut self, writable: &Writable, path: &str) {
        self.paths.insert(writable.id(), path.to_string());
    }

    fn path_of(&self, writable: &Writable) -> Result<String> {
        self.paths
            .get(&writable.id())
            .cloned()
            .ok_or_else(|| Error::internal("writable has no known JSON document path"))
    }

    fn file_name_of(&self, writable: &Writable) -> Result<String> {
        self.files
            .file_of(writable)
            .map(|f| f.name().to_string())
            .ok_or_else(|| Error::internal("writable is not associated with an open file"))
    }

    fn doc_mut(&mut self, file_name: &str) -> Result<&mut OpenFile> {
        self.open
            .get_mut(file_name)
            .ok_or_else(|| Error::internal(format!("file {file_name} is not open")))
    }

    fn doc(&self, file_name: &str) -> Result<&OpenFile> {
        self.open
            .get(file_name)
            .ok_or_else(|| Error::internal(format!("file {file_name} is not open")))
    }
}

impl BackendAdapter for JsonBackendAdapter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn dispatch(&mut self, task: &IOTask, _level: FlushLevel, _target: FlushTarget) -> Result<()> {
        debug!("json backend dispatch: {task:?}");
        match task {
            IOTask::CreateFile(p) => {
                let (file, _newly) = self.files.possibly_existing(&p.name);
                file.invalidate();
                let (file, _) = self.files.possibly_existing(&p.name);
                self.files.associate(&p.writable, file.clone());
                self.open.insert(
                    file.name().to_string(),
                    OpenFile {
                        doc: JsonGroup::default(),
                        in_step: false,
                    },
                );
                self.remember_path(&p.writable, "");
                p.writable.mark_written();
                Ok(())
            }
            IOTask::CheckFile(p) => {
                let exists = self.full_path(&p.name).is_file();
                *p.result.borrow_mut() = Some(exists);
                Ok(())
            }
            IOTask::OpenFile(p) => {
                let full = self.full_path(&p.name);
                let bytes = fs::read(&full)
                    .map_err(|_| Error::read(AffectedObject::File, &p.name, ReadReason::NotFound))?;
                let doc: JsonGroup = serde_json::from_slice(&bytes).map_err(|_| {
                    Error::read(AffectedObject::File, &p.name, ReadReason::UnexpectedContent)
                })?;
                let (file, _) = self.files.possibly_existing(&p.name);
                self.files.associate(&p.writable, file.clone());
                self.open.insert(
                    file.name().to_string(),
                    OpenFile {
                        doc,
                        in_step: false,
                    },
                );
                self.remember_path(&p.writable, "");
                p.writable.mark_written();
                *p.parse_preference.borrow_mut() = Some(ParsePreference::UpFront);
                Ok(())
            }
            IOTask::CloseFile(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                if let Some(of) = self.open.remove(&file_name) {
                    let full = self.full_path(&file_name);
                    let text = serde_json::to_vec_pretty(&of.doc)
                        .map_err(|e| Error::internal(format!("failed to serialize JSON: {e}")))?;
                    fs::write(&full, text)
                        .map_err(|e| Error::internal(format!("failed to write {full:?}: {e}")))?;
                }
                Ok(())
            }
            IOTask::DeleteFile(p) => {
                let file_name = self
                    .file_name_of(&p.writable)
                    .unwrap_or_else(|_| p.name.clone());
                self.open.remove(&file_name);
                let full = self.full_path(&file_name);
                let _ = fs::remove_file(full);
                if let Some(f) = self.files.file_of(&p.writable) {
                    f.invalidate();
                }
                Ok(())
            }
            IOTask::CreatePath(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let of = self.doc_mut(&file_name)?;
                layout::ensure_group(&mut of.doc, &p.path);
                self.remember_path(&p.writable, &p.path);
                p.writable.mark_written();
                Ok(())
            }
            IOTask::OpenPath(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let of = self.doc(&file_name)?;
                if layout::find_group(&of.doc, &p.path).is_none() {
                    return Err(Error::read(AffectedObject::Path, &p.path, ReadReason::NotFound));
                }
                self.remember_path(&p.writable, &p.path);
                Ok(())
            }
            IOTask::ClosePath(_) => Ok(()),
            IOTask::DeletePath(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let of = self.doc_mut(&file_name)?;
                layout::remove_group(&mut of.doc, &p.path);
                Ok(())
            }
            IOTask::CreateDataset(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let of = self.doc_mut(&file_name)?;
                layout::define_dataset(&mut of.doc, &path, &p.name, &p.dataset)?;
                self.remember_path(&p.writable, &layout::join(&path, &p.name));
                p.writable.mark_written();
                Ok(())
            }
            IOTask::ExtendDataset(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let of = self.doc_mut(&file_name)?;
                let ds = layout::find_dataset_mut(&mut of.doc, &path)
                    .ok_or_else(|| Error::internal("extendDataset on unknown dataset"))?;
                ds.extend(&p.new_extent)
            }
            IOTask::OpenDataset(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let of = self.doc(&file_name)?;
                let full_path = layout::join(&path, &p.name);
                let ds = layout::find_dataset(&of.doc, &full_path).ok_or_else(|| {
                    Error::read(AffectedObject::Dataset, &p.name, ReadReason::NotFound)
                })?;
                *p.result.borrow_mut() = Some(ds.to_dataset());
                self.remember_path(&p.writable, &full_path);
                Ok(())
            }
            IOTask::DeleteDataset(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let of = self.doc_mut(&file_name)?;
                layout::remove_dataset(&mut of.doc, &path);
                Ok(())
            }
            IOTask::WriteDataset(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let writer_rank = self.writer_rank;
                let of = self.doc_mut(&file_name)?;
                let ds = layout::find_dataset_mut(&mut of.doc, &path)
                    .ok_or_else(|| Error::internal("writeDataset on unknown dataset"))?;
                let bytes = p
                    .data
                    .as_shared_slice()
                    .map(|s| s.to_vec())
                    .or_else(|| p.data.take_unique().map(|b| b.into_vec()))
                    .ok_or_else(|| Error::internal("write buffer already consumed"))?;
                ds.write_region(&p.offset, &p.extent, p.datatype, &bytes, writer_rank)
            }
            IOTask::ReadDataset(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let of = self.doc(&file_name)?;
                let ds = layout::find_dataset(&of.doc, &path).ok_or_else(|| {
                    Error::read(AffectedObject::Dataset, &path, ReadReason::NotFound)
                })?;
                let bytes = ds.read_region(&p.offset, &p.extent, p.datatype)?;
                *p.buffer.borrow_mut() = bytes;
                Ok(())
            }
            IOTask::GetBufferView(p) => {
                // The JSON backend never manages the buffer itself; the
                // frontend always falls back to a copy.
                *p.result.borrow_mut() = Some(BufferViewResult::BackendDoesNotManageBuffer);
                Ok(())
            }
            IOTask::WriteAttribute(p) => {
                if self.access.is_read_only() {
                    return Err(Error::wrong_api_usage(
                        "cannot write attributes under a read-only access mode",
                    ));
                }
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let of = self.doc_mut(&file_name)?;
                layout::write_attribute(&mut of.doc, &path, &p.name, p.value.clone())
            }
            IOTask::ReadAttribute(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let of = self.doc(&file_name)?;
                let value = layout::read_attribute(&of.doc, &path, &p.name)
                    .ok_or_else(|| Error::NoSuchAttribute { name: p.name.clone() })?;
                *p.result.borrow_mut() = Some(value);
                Ok(())
            }
            IOTask::DeleteAttribute(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let of = self.doc_mut(&file_name)?;
                layout::delete_attribute(&mut of.doc, &path, &p.name);
                Ok(())
            }
            IOTask::ListPaths(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let of = self.doc(&file_name)?;
                *p.result.borrow_mut() = layout::list_paths(&of.doc, &path);
                Ok(())
            }
            IOTask::ListDatasets(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let of = self.doc(&file_name)?;
                *p.result.borrow_mut() = layout::list_datasets(&of.doc, &path);
                Ok(())
            }
            IOTask::ListAttributes(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let of = self.doc(&file_name)?;
                *p.result.borrow_mut() = layout::list_attributes(&of.doc, &path);
                Ok(())
            }
            IOTask::Advance(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let of = self.doc_mut(&file_name)?;
                let status = match p.mode {
                    AdvanceMode::Begin => {
                        of.in_step = true;
                        AdvanceStatus::Ok
                    }
                    AdvanceMode::End => {
                        of.in_step = false;
                        layout::commit_step(&mut of.doc);
                        AdvanceStatus::Ok
                    }
                };
                *p.result.borrow_mut() = Some(status);
                Ok(())
            }
            IOTask::AvailableChunks(p) => {
                let file_name = self.file_name_of(&p.writable)?;
                let path = self.path_of(&p.writable)?;
                let of = self.doc(&file_name)?;
                let ds = layout::find_dataset(&of.doc, &path).ok_or_else(|| {
                    Error::read(AffectedObject::Dataset, &path, ReadReason::NotFound)
                })?;
                *p.result.borrow_mut() = ds.chunks.clone();
                Ok(())
            }
            IOTask::Touch(p) => {
                if let Some(f) = self.files.file_of(&p.writable) {
                    self.files.mark_dirty(f);
                }
                Ok(())
            }
            IOTask::Deregister(p) => {
                self.files.deregister(&p.writable);
                self.paths.remove(&p.writable.id());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests;
