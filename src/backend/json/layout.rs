//! Path-string navigation over a [`JsonGroup`] tree: the JSON backend's
//! analogue of HDF5's path-based group/dataset lookup, operating on plain
//! `/`-separated strings rather than a library handle.

use crate::chunk::Dataset;
use crate::error::{Error, Result};
use crate::task::AttributeValue;

use super::document::{JsonAttribute, JsonDataset, JsonGroup};

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Joins a parent path and a child name into a full path string.
pub fn join(path: &str, name: &str) -> String {
    if path.is_empty() || path == "/" {
        format!("/{name}")
    } else {
        format!("{}/{name}", path.trim_end_matches('/'))
    }
}

pub fn ensure_group(root: &mut JsonGroup, path: &str) {
    let mut cur = root;
    for seg in segments(path) {
        cur = cur.groups.entry(seg.to_string()).or_insert_with(JsonGroup::default);
    }
}

pub fn find_group<'a>(root: &'a JsonGroup, path: &str) -> Option<&'a JsonGroup> {
    let mut cur = root;
    for seg in segments(path) {
        cur = cur.groups.get(seg)?;
    }
    Some(cur)
}

fn find_group_mut<'a>(root: &'a mut JsonGroup, path: &str) -> Option<&'a mut JsonGroup> {
    let mut cur = root;
    for seg in segments(path) {
        cur = cur.groups.get_mut(seg)?;
    }
    Some(cur)
}

pub fn remove_group(root: &mut JsonGroup, path: &str) {
    let segs = segments(path);
    let Some((last, parent_segs)) = segs.split_last() else {
        return;
    };
    if let Some(parent) = find_group_mut(root, &parent_segs.join("/")) {
        parent.groups.remove(*last);
    }
}

/// `CREATE_DATASET`: defines a new variable, or (if one already exists at
/// this path, matching a rewrite of the same name within the same step)
/// updates its shape in place without re-adding operators.
pub fn define_dataset(
    root: &mut JsonGroup,
    parent_path: &str,
    name: &str,
    dataset: &Dataset,
) -> Result<()> {
    ensure_group(root, parent_path);
    let group = find_group_mut(root, parent_path).expect("ensure_group just created this path");
    match group.datasets.get_mut(name) {
        Some(existing) => existing.update_extent_in_place(&dataset.extent),
        None => {
            group.datasets.insert(
                name.to_string(),
                JsonDataset::new(dataset.datatype, dataset.extent.to_vec(), dataset.joined_dimension),
            );
        }
    }
    Ok(())
}

pub fn find_dataset<'a>(root: &'a JsonGroup, path: &str) -> Option<&'a JsonDataset> {
    let segs = segments(path);
    let (last, parent_segs) = segs.split_last()?;
    let parent = find_group(root, &parent_segs.join("/"))?;
    parent.datasets.get(*last)
}

pub fn find_dataset_mut<'a>(root: &'a mut JsonGroup, path: &str) -> Option<&'a mut JsonDataset> {
    let segs = segments(path);
    let (last, parent_segs) = segs.split_last()?;
    let parent = find_group_mut(root, &parent_segs.join("/"))?;
    parent.datasets.get_mut(*last)
}

pub fn remove_dataset(root: &mut JsonGroup, path: &str) {
    let segs = segments(path);
    let Some((last, parent_segs)) = segs.split_last() else {
        return;
    };
    if let Some(parent) = find_group_mut(root, &parent_segs.join("/")) {
        parent.datasets.remove(*last);
    }
}

/// Writes (or overwrites) an attribute at a group or dataset node.
pub fn write_attribute(
    root: &mut JsonGroup,
    path: &str,
    name: &str,
    value: AttributeValue,
) -> Result<()> {
    let attr = JsonAttribute::from_value(&value);
    if let Some(group) = find_group_mut(root, path) {
        group.attributes.insert(name.to_string(), attr);
        return Ok(());
    }
    if let Some(ds) = find_dataset_mut(root, path) {
        ds.attributes.insert(name.to_string(), attr);
        return Ok(());
    }
    Err(Error::internal(format!(
        "writeAttribute on unknown node at path {path:?}"
    )))
}

pub fn read_attribute(root: &JsonGroup, path: &str, name: &str) -> Option<AttributeValue> {
    if let Some(group) = find_group(root, path) {
        if let Some(attr) = group.attributes.get(name) {
            return attr.to_attribute_value().ok();
        }
    }
    if let Some(ds) = find_dataset(root, path) {
        if let Some(attr) = ds.attributes.get(name) {
            return attr.to_attribute_value().ok();
        }
    }
    None
}

pub fn delete_attribute(root: &mut JsonGroup, path: &str, name: &str) {
    if let Some(group) = find_group_mut(root, path) {
        group.attributes.remove(name);
        return;
    }
    if let Some(ds) = find_dataset_mut(root, path) {
        ds.attributes.remove(name);
    }
}

pub fn list_paths(root: &JsonGroup, path: &str) -> Vec<String> {
    find_group(root, path)
        .map(|g| g.groups.keys().cloned().collect())
        .unwrap_or_default()
}

pub fn list_datasets(root: &JsonGroup, path: &str) -> Vec<String> {
    find_group(root, path)
        .map(|g| g.datasets.keys().cloned().collect())
        .unwrap_or_default()
}

pub fn list_attributes(root: &JsonGroup, path: &str) -> Vec<String> {
    if let Some(group) = find_group(root, path) {
        return group.attributes.keys().cloned().collect();
    }
    if let Some(ds) = find_dataset(root, path) {
        return ds.attributes.keys().cloned().collect();
    }
    Vec::new()
}

/// `ADVANCE(End)`: commits every dataset's staged writes, recursively.
pub fn commit_step(root: &mut JsonGroup) {
    for ds in root.datasets.values_mut() {
        ds.commit();
    }
    for group in root.groups.values_mut() {
        commit_step(group);
    }
}
