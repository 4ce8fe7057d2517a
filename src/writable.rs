//! The writable graph (C1): a tree of named nodes anchored to backend-opaque
//! file positions, plus the backend-templated `setAndGetFilePosition` /
//! `filePositionToString` / `refreshFileFromParent` operations shared by
//! every backend adapter.
//!
//! Generic over the backend's concrete file-position value type, per spec §9
//! ("the 'common implementation' layer becomes a set of free functions
//! parametric over the file-position value type"), which is what
//! [`CommonFileState`] is below.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::file_handle::InvalidatableFile;

/// A backend's concrete file-position representation. Implemented once per
/// backend (ADIOS2: path + group-or-dataset tag; HDF5: a path string).
pub trait FilePosition: fmt::Debug + 'static {
    /// Canonical string form: slashes normalized, no trailing slash except
    /// at root (spec §4.1 `filePositionToString`).
    fn to_canonical_string(&self) -> String;

    /// Builds a new file position for a child reached by appending
    /// `segment` to `self` (spec §4.1's `extendFilePosition`).
    fn extended(&self, segment: &str) -> Self
    where
        Self: Sized;

    /// The position a freshly-created root node starts with.
    fn root() -> Self
    where
        Self: Sized;
}

struct WritableInner {
    parent: Option<Writable>,
    /// Segments identifying this node within its parent, e.g.
    /// `["meshes", "E", "x"]` for a mesh record component.
    key: Vec<String>,
    file_position: RefCell<Option<Rc<dyn Any>>>,
    written: Cell<bool>,
    dirty: Cell<bool>,
}

/// A node in the frontend's object tree, anchored to a backend file
/// position. Spec §3 "Writable". Cheap to clone: it is a reference-counted
/// handle, and clones alias the same node (needed so parent/child edges and
/// the backend's `Writable * -> file` maps share identity).
#[derive(Clone)]
pub struct Writable {
    inner: Rc<WritableInner>,
}

impl Writable {
    /// Creates the root node of a graph. Spec §3 invariant: "the root node
    /// has no parent".
    pub fn root() -> Self {
        Writable {
            inner: Rc::new(WritableInner {
                parent: None,
                key: Vec::new(),
                file_position: RefCell::new(None),
                written: Cell::new(false),
                dirty: Cell::new(false),
            }),
        }
    }

    /// Creates a child node reached from `self` by `key`.
    pub fn child(&self, key: Vec<String>) -> Self {
        Writable {
            inner: Rc::new(WritableInner {
                parent: Some(self.clone()),
                key,
                file_position: RefCell::new(None),
                written: Cell::new(false),
                dirty: Cell::new(false),
            }),
        }
    }

    pub fn parent(&self) -> Option<&Writable> {
        self.inner.parent.as_ref()
    }

    pub fn key(&self) -> &[String] {
        &self.inner.key
    }

    pub fn written(&self) -> bool {
        self.inner.written.get()
    }

    pub fn mark_written(&self) {
        self.inner.written.set(true);
    }

    pub fn dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn mark_dirty(&self) {
        self.inner.dirty.set(true);
    }

    pub fn clear_dirty(&self) {
        self.inner.dirty.set(false);
    }

    /// Identity key suitable for use as a hash-map key, standing in for a
    /// raw pointer identity in a safe-Rust map keyed by node.
    pub fn id(&self) -> WritableId {
        WritableId(Rc::as_ptr(&self.inner) as *const () as usize)
    }

    /// Walks the ancestor chain from `self` up to (and including) the root.
    pub fn ancestors(&self) -> impl Iterator<Item = Writable> + '_ {
        let mut cur = Some(self.clone());
        std::iter::from_fn(move || {
            let this = cur.take()?;
            cur = this.parent().cloned();
            Some(this)
        })
    }

    fn is_rooted(&self) -> bool {
        self.ancestors().last().map(|r| r.parent().is_none()) == Some(true)
    }
}

impl fmt::Debug for Writable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writable")
            .field("key", &self.inner.key)
            .field("written", &self.written())
            .field("dirty", &self.dirty())
            .finish()
    }
}

/// Opaque, hashable, copyable identity for a [`Writable`], usable as a map
/// key without holding a raw pointer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct WritableId(usize);

/// The backend-templated common implementation shared by every
/// `AbstractIOHandlerImpl`, generic over the backend's concrete
/// [`FilePosition`] type. Owns the writable-to-file map and the dirty-file
/// set (spec §3 "Per-file backend state" / §4.2's dirty set), and
/// implements `setAndGetFilePosition` / `refreshFileFromParent` /
/// `filePositionToString` from spec §4.1.
pub struct CommonFileState<P: FilePosition> {
    files: HashMap<WritableId, InvalidatableFile>,
    dirty: std::collections::HashSet<InvalidatableFile>,
    directory: String,
    _marker: std::marker::PhantomData<P>,
}

impl<P: FilePosition> CommonFileState<P> {
    pub fn new(directory: impl Into<String>) -> Self {
        CommonFileState {
            files: HashMap::new(),
            dirty: std::collections::HashSet::new(),
            directory: directory.into(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Finds an existing valid [`InvalidatableFile`] for `name`, or
    /// allocates a fresh one. Mirrors `getPossiblyExisting`: a linear scan
    /// for an alias sharing the name and still valid.
    pub fn possibly_existing(&self, name: &str) -> (InvalidatableFile, bool) {
        if let Some(existing) = self
            .files
            .values()
            .find(|f| f.name() == name && f.valid())
        {
            (existing.clone(), false)
        } else {
            (InvalidatableFile::new(name), true)
        }
    }

    pub fn associate(&mut self, writable: &Writable, file: InvalidatableFile) {
        self.files.insert(writable.id(), file);
    }

    pub fn file_of(&self, writable: &Writable) -> Option<InvalidatableFile> {
        self.files.get(&writable.id()).cloned()
    }

    pub fn mark_dirty(&mut self, file: InvalidatableFile) {
        self.dirty.insert(file);
    }

    pub fn take_dirty(&mut self) -> std::collections::HashSet<InvalidatableFile> {
        std::mem::take(&mut self.dirty)
    }

    pub fn is_dirty(&self, file: &InvalidatableFile) -> bool {
        self.dirty.contains(file)
    }

    /// Deregisters a writable from the backend's maps, spec §6.1
    /// `DEREGISTER`.
    pub fn deregister(&mut self, writable: &Writable) {
        self.files.remove(&writable.id());
    }

    pub fn full_path(&self, file: &InvalidatableFile) -> String {
        self.full_path_str(file.name())
    }

    pub fn full_path_str(&self, file_name: &str) -> String {
        if self.directory.ends_with('/') {
            format!("{}{file_name}", self.directory)
        } else {
            format!("{}/{file_name}", self.directory)
        }
    }

    /// Spec §4.1 `refreshFileFromParent`: resolves the owning file,
    /// optionally preferring the parent's file (used when switching
    /// iteration groups).
    pub fn refresh_file_from_parent(
        &mut self,
        writable: &Writable,
        prefer_parent_file: bool,
    ) -> Result<InvalidatableFile> {
        let from_parent = |state: &mut Self| -> Result<InvalidatableFile> {
            let parent = writable.parent().ok_or_else(|| {
                Error::internal("refreshFileFromParent called with preferParentFile but no parent")
            })?;
            let file = state.file_of(parent).ok_or_else(|| {
                Error::internal("parent writable has no associated file")
            })?;
            state.associate(writable, file.clone());
            Ok(file)
        };

        if prefer_parent_file && writable.parent().is_some() {
            from_parent(self)
        } else if let Some(file) = self.file_of(writable) {
            Ok(file)
        } else if writable.parent().is_some() {
            from_parent(self)
        } else {
            Err(Error::internal(
                "Root object must be opened explicitly.",
            ))
        }
    }

    /// Spec §4.1 `setAndGetFilePosition`: synthesizes the file position from
    /// the parent chain the first time, optionally writing it back onto the
    /// writable.
    pub fn set_and_get_file_position(&self, writable: &Writable, write: bool) -> Result<Rc<P>> {
        if !writable.is_rooted() {
            return Err(Error::internal(
                "attempted to obtain a file position for a node whose parent chain is not rooted",
            ));
        }
        let existing = writable.inner.file_position.borrow().clone();
        let resolved: Rc<dyn Any> = if let Some(p) = existing {
            p
        } else if let Some(parent) = writable.parent() {
            let parent_pos = parent.inner.file_position.borrow().clone();
            match parent_pos {
                Some(p) => p,
                None => Rc::new(P::root()) as Rc<dyn Any>,
            }
        } else {
            Rc::new(P::root()) as Rc<dyn Any>
        };

        if write {
            *writable.inner.file_position.borrow_mut() = Some(resolved.clone());
        }

        resolved
            .downcast::<P>()
            .map_err(|_| Error::internal("file position type mismatch between backends"))
    }

    /// Spec §4.1 `setAndGetFilePosition(w, extend)`: extends the writable's
    /// current position with a new path segment and writes the result back.
    pub fn extend_file_position(&self, writable: &Writable, extend: &str) -> Result<Rc<P>> {
        let extend = if let Some(stripped) = extend.strip_prefix('/') {
            stripped.to_string()
        } else {
            extend.to_string()
        };
        let old = self.set_and_get_file_position(writable, false)?;
        let new_pos = Rc::new(old.extended(&extend));
        *writable.inner.file_position.borrow_mut() = Some(new_pos.clone() as Rc<dyn Any>);
        Ok(new_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestPosition(String);

    impl FilePosition for TestPosition {
        fn to_canonical_string(&self) -> String {
            let trimmed = self.0.trim_end_matches('/');
            if trimmed.is_empty() {
                "/".to_string()
            } else {
                trimmed.to_string()
            }
        }

        fn extended(&self, segment: &str) -> Self {
            if self.0.ends_with('/') {
                TestPosition(format!("{}{segment}", self.0))
            } else {
                TestPosition(format!("{}/{segment}", self.0))
            }
        }

        fn root() -> Self {
            TestPosition(String::new())
        }
    }

    #[test]
    fn root_has_no_parent_and_is_rooted() {
        let root = Writable::root();
        assert!(root.parent().is_none());
        assert!(root.is_rooted());
    }

    #[test]
    fn set_and_get_file_position_synthesizes_from_parent() {
        let state = CommonFileState::<TestPosition>::new("/tmp");
        let root = Writable::root();
        let pos = state.set_and_get_file_position(&root, true).unwrap();
        assert_eq!(pos.to_canonical_string(), "/");

        let child = root.child(vec!["meshes".into()]);
        let extended = state.extend_file_position(&child, "meshes").unwrap();
        assert_eq!(extended.to_canonical_string(), "/meshes");
    }

    #[test]
    fn deregister_removes_from_map() {
        let mut state = CommonFileState::<TestPosition>::new("/tmp");
        let root = Writable::root();
        let (file, created) = state.possibly_existing("a.json");
        assert!(created);
        state.associate(&root, file.clone());
        assert!(state.file_of(&root).is_some());
        state.deregister(&root);
        assert!(state.file_of(&root).is_none());
    }
}
