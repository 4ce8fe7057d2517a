//! `InvalidatableFile`: a shared, invalidatable wrapper around a filename.
//! Invariant: for any valid filename, at most one such wrapper is known
//! within a single backend adapter at a time; cloning aliases the same
//! underlying state rather than copying it, so invalidating one clone
//! invalidates every alias.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

struct FileState {
    name: String,
    valid: Cell<bool>,
}

/// A shared handle to a backend-open file. Cloning an `InvalidatableFile`
/// aliases the same underlying state; invalidating one clone invalidates
/// every alias.
#[derive(Clone)]
pub struct InvalidatableFile {
    state: Rc<FileState>,
}

impl InvalidatableFile {
    pub fn new(name: impl Into<String>) -> Self {
        InvalidatableFile {
            state: Rc::new(FileState {
                name: name.into(),
                valid: Cell::new(true),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn valid(&self) -> bool {
        self.state.valid.get()
    }

    /// Marks every alias of this file as invalid. Called on delete, or on
    /// CREATE-over-existing (spec §3 "File handle" lifetime).
    pub fn invalidate(&self) {
        self.state.valid.set(false);
    }

    /// Pointer-identity equality: a stricter check than [`PartialEq`], which
    /// compares by filename instead (see its doc comment).
    pub fn same_instance(&self, other: &InvalidatableFile) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl PartialEq for InvalidatableFile {
    /// Equality by filename rather than pointer identity: callers need to
    /// find an *existing* handle for a filename before creating a new one,
    /// and pointer identity can never match a not-yet-constructed handle.
    /// Pointer identity is available separately as
    /// [`InvalidatableFile::same_instance`].
    fn eq(&self, other: &Self) -> bool {
        self.state.name == other.state.name
    }
}
impl Eq for InvalidatableFile {}

impl std::hash::Hash for InvalidatableFile {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.state.name.hash(state);
    }
}

impl fmt::Debug for InvalidatableFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidatableFile")
            .field("name", &self.state.name)
            .field("valid", &self.valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidating_one_alias_invalidates_all() {
        let a = InvalidatableFile::new("run.bp5");
        let b = a.clone();
        assert!(a.valid() && b.valid());
        a.invalidate();
        assert!(!a.valid());
        assert!(!b.valid());
    }

    #[test]
    fn equality_is_by_name_not_instance() {
        let a = InvalidatableFile::new("run.bp5");
        let c = InvalidatableFile::new("run.bp5");
        assert_eq!(a, c);
        assert!(!a.same_instance(&c));
    }
}
