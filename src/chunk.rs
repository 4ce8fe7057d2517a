//! Chunk/dataset model (C6): `Offset`/`Extent`, `Dataset` descriptors, joined
//! dimensions, and written-chunk inventories. Backend-independent; spec §4.3
//! / §4.6.

use crate::datatype::Datatype;
use crate::error::{Error, Result};
use serde_json::Value as JsonValue;
use smallvec::SmallVec;

/// Most datasets in particle-mesh output are 1-3 dimensional; inline a small
/// number of dimensions before spilling to the heap.
pub type Offset = SmallVec<[u64; 4]>;
/// See [`Offset`].
pub type Extent = SmallVec<[u64; 4]>;

/// Sentinel value for a joined-dimension's offset. A joined dimension's
/// per-writer offset is not meaningful; only `extent[i]` (the writer's
/// contribution count) matters, per spec §3 "Chunk selection".
pub const JOINED_DIMENSION: u64 = u64::MAX;

/// A compressor/transform attached to a variable, plus its string-keyed
/// parameter dictionary (spec §4.3 `createDataset`, §6.3
/// `adios2.dataset.operators`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetOperator {
    pub kind: String,
    pub parameters: Vec<(String, String)>,
}

impl DatasetOperator {
    /// Validates that `parameters` came from a JSON object of only string
    /// values, per SPEC_FULL.md §C.3: a malformed operator parameter
    /// dictionary is a configuration error, not a panic.
    pub fn from_json(kind: String, parameters: &JsonValue) -> Result<Self> {
        let object = parameters.as_object().ok_or_else(|| {
            Error::config_schema(
                &["adios2", "dataset", "operators", "parameters"],
                "operator parameters must be a JSON object",
            )
        })?;
        let mut out = Vec::with_capacity(object.len());
        for (k, v) in object {
            let s = v.as_str().ok_or_else(|| {
                Error::config_schema(
                    &["adios2", "dataset", "operators", "parameters", k.as_str()],
                    "operator parameter values must be strings",
                )
            })?;
            out.push((k.clone(), s.to_string()));
        }
        Ok(DatasetOperator {
            kind,
            parameters: out,
        })
    }
}

/// `{ datatype, extent, options }`, spec §3 "Dataset descriptor".
#[derive(Debug, Clone)]
pub struct Dataset {
    pub datatype: Datatype,
    pub extent: Extent,
    /// Index of the joined dimension, if any. ADIOS2-only; at most one.
    pub joined_dimension: Option<usize>,
    pub operators: Vec<DatasetOperator>,
    /// Free-form backend options (e.g. `hdf5.dataset.chunks`), carried
    /// through from the JSON/TOML config tree rather than re-parsed here.
    pub options: JsonValue,
}

impl Dataset {
    pub fn new(datatype: Datatype, extent: Extent) -> Self {
        Dataset {
            datatype,
            extent,
            joined_dimension: None,
            operators: Vec::new(),
            options: JsonValue::Null,
        }
    }

    /// Marks dimension `index` as joined. Spec §3 invariant: at most one
    /// joined dimension, and only meaningful in write mode (enforced by the
    /// caller, since this type has no notion of access mode).
    pub fn with_joined_dimension(mut self, index: usize) -> Result<Self> {
        if self.joined_dimension.is_some() {
            return Err(Error::internal(
                "a Dataset may declare at most one joined dimension",
            ));
        }
        if index >= self.extent.len() {
            return Err(Error::internal(format!(
                "joined dimension index {index} out of bounds for extent of rank {}",
                self.extent.len()
            )));
        }
        self.joined_dimension = Some(index);
        Ok(self)
    }

    pub fn rank(&self) -> usize {
        self.extent.len()
    }

    /// Validates a chunk selection against the dataset's current shape, spec
    /// §3 "Chunk selection" invariant: for non-joined dimensions,
    /// `offset[i] + extent[i] <= shape[i]`; a joined dimension's offset is
    /// ignored.
    pub fn validate_selection(&self, offset: &[u64], extent: &[u64]) -> Result<()> {
        if offset.len() != self.rank() || extent.len() != self.rank() {
            return Err(Error::wrong_api_usage(format!(
                "selection rank {}/{} does not match dataset rank {}",
                offset.len(),
                extent.len(),
                self.rank()
            )));
        }
        for i in 0..self.rank() {
            if self.joined_dimension == Some(i) {
                continue;
            }
            let end = offset[i].checked_add(extent[i]).ok_or_else(|| {
                Error::wrong_api_usage(format!("offset+extent overflows in dimension {i}"))
            })?;
            if end > self.extent[i] {
                return Err(Error::wrong_api_usage(format!(
                    "selection [{}, {}) exceeds shape {} in dimension {i}",
                    offset[i], end, self.extent[i]
                )));
            }
        }
        Ok(())
    }

    /// Resizes the dataset. Spec §4.3 `extendDataset`: legal only for
    /// chunked (resizable) datasets, componentwise non-decreasing.
    pub fn extend(&mut self, new_extent: &[u64], resizable: bool) -> Result<()> {
        if !resizable {
            return Err(Error::unsupported(
                "dataset",
                "extendDataset called on a non-chunked (non-resizable) variable",
            ));
        }
        if new_extent.len() != self.rank() {
            return Err(Error::wrong_api_usage(
                "extendDataset rank mismatch with existing dataset",
            ));
        }
        for i in 0..self.rank() {
            if new_extent[i] < self.extent[i] {
                return Err(Error::wrong_api_usage(format!(
                    "extendDataset would shrink dimension {i}: {} -> {}",
                    self.extent[i], new_extent[i]
                )));
            }
        }
        self.extent = Extent::from_slice(new_extent);
        Ok(())
    }

    /// Idempotent shape update used by `createDataset` when a variable
    /// already exists in the current step (spec §4.3: "the shape is updated
    /// rather than re-defined, and operators are not re-added").
    pub fn update_shape_idempotent(&mut self, new_extent: &[u64]) {
        self.extent = Extent::from_slice(new_extent);
    }
}

/// `Offset + Extent + writer-rank`, spec §4.6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenChunkInfo {
    pub offset: Offset,
    pub extent: Extent,
    pub source_id: u32,
}

impl WrittenChunkInfo {
    pub fn new(offset: Offset, extent: Extent, source_id: u32) -> Self {
        WrittenChunkInfo {
            offset,
            extent,
            source_id,
        }
    }

    /// Property 2 check: `(offset+extent) <= shape` componentwise.
    pub fn fits_within(&self, shape: &[u64]) -> bool {
        if self.offset.len() != shape.len() || self.extent.len() != shape.len() {
            return false;
        }
        self.offset
            .iter()
            .zip(self.extent.iter())
            .zip(shape.iter())
            .all(|((&o, &e), &s)| o.saturating_add(e) <= s)
    }
}

/// Assembles the global shape of a joined dimension as the sum of per-rank
/// contributions, in submission order (spec §4.3 "Joined-dimension datasets
/// assemble the global shape as the sum of per-rank `count`s in submission
/// order"; property 3).
pub fn assemble_joined_extent(per_writer_counts: &[u64]) -> u64 {
    per_writer_counts.iter().sum()
}

/// Computes the per-writer offset a joined dimension's contiguous
/// concatenation implies (spec §8 S4: "reader sees shape with contiguous
/// concatenation in rank order"). `writer_index` is the writer's position in
/// submission order.
pub fn joined_offset_for_writer(per_writer_counts: &[u64], writer_index: usize) -> u64 {
    per_writer_counts[..writer_index].iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_selection_rejects_out_of_bounds() {
        let ds = Dataset::new(Datatype::Double, Extent::from_slice(&[4]));
        assert!(ds.validate_selection(&[0], &[4]).is_ok());
        assert!(ds.validate_selection(&[1], &[4]).is_err());
    }

    #[test]
    fn joined_dimension_offset_ignored() {
        let mut ds = Dataset::new(Datatype::Double, Extent::from_slice(&[17]))
            .with_joined_dimension(0)
            .unwrap();
        ds.extent = Extent::from_slice(&[17]);
        assert!(ds.validate_selection(&[999], &[5]).is_ok());
    }

    #[test]
    fn assemble_joined_extent_sums_in_order() {
        let counts = [5u64, 3, 7, 2];
        assert_eq!(assemble_joined_extent(&counts), 17);
        assert_eq!(joined_offset_for_writer(&counts, 0), 0);
        assert_eq!(joined_offset_for_writer(&counts, 2), 8);
    }

    #[test]
    fn extend_dataset_requires_resizable_and_grows() {
        let mut ds = Dataset::new(Datatype::Int, Extent::from_slice(&[2, 2]));
        assert!(ds.extend(&[3, 2], false).is_err());
        ds.extend(&[3, 2], true).unwrap();
        assert_eq!(&ds.extent[..], &[3, 2]);
        assert!(ds.extend(&[2, 2], true).is_err());
    }
}
