//! Group table encoding, spec §4.4.4.
//!
//! When `Schema::GroupTable` is in effect, every group written to during a
//! step is marked active by writing a companion attribute
//! `__openPMD_internal/activeTable/<path> = <step number>`, so a reader can
//! discover which iterations/records exist by listing attributes instead of
//! replaying every step.

use std::collections::HashSet;

use crate::writable::{Writable, WritableId};

/// Attribute name prefix under which the group table lives.
pub const ACTIVE_TABLE_PREFIX: &str = "__openPMD_internal/activeTable";

/// Builds the companion attribute name recording that `location` (a
/// canonical, leading-slash path) was written to at `step`.
pub fn active_table_attribute_name(location: &str) -> String {
    format!("{ACTIVE_TABLE_PREFIX}{location}")
}

/// Walks from `writable` up to the root, returning every ancestor (writable,
/// canonical path) pair not already recorded in `already_marked` this step.
/// Mirrors `markActive`'s ancestor walk: marking a leaf active implicitly
/// marks every containing group active too, since a reader descending the
/// group table must find every intermediate path present.
pub fn ancestors_to_mark<'a>(
    writable: &'a Writable,
    resolve_path: impl Fn(&Writable) -> String + 'a,
    already_marked: &'a HashSet<WritableId>,
) -> impl Iterator<Item = (Writable, String)> + 'a {
    writable
        .ancestors()
        .filter(move |w| !already_marked.contains(&w.id()))
        .map(move |w| {
            let path = resolve_path(&w);
            (w, path)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_name_is_prefixed_with_location() {
        assert_eq!(
            active_table_attribute_name("/meshes/E"),
            "__openPMD_internal/activeTable/meshes/E"
        );
    }

    #[test]
    fn ancestors_to_mark_skips_already_marked() {
        let root = Writable::root();
        let child = root.child(vec!["meshes".into()]);
        let grandchild = child.child(vec!["E".into()]);

        let mut marked = HashSet::new();
        marked.insert(root.id());

        let resolve = |_w: &Writable| "/whatever".to_string();
        let remaining: Vec<_> = ancestors_to_mark(&grandchild, resolve, &marked).collect();
        assert_eq!(remaining.len(), 2);
    }
}
