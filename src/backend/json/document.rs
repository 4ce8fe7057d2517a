//! The in-memory tree a JSON dump file serializes to: nested groups, each
//! with attributes and datasets, datasets carrying committed and
//! in-progress ("staging") byte payloads so that a reader only observes
//! data written before the most recent `ADVANCE(End)`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chunk::{Dataset, Extent, Offset, WrittenChunkInfo};
use crate::datatype::{self, Datatype};
use crate::error::{Error, Result};
use crate::task::AttributeValue;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonGroup {
    #[serde(default)]
    pub attributes: BTreeMap<String, JsonAttribute>,
    #[serde(default)]
    pub groups: BTreeMap<String, JsonGroup>,
    #[serde(default)]
    pub datasets: BTreeMap<String, JsonDataset>,
}

/// The full in-memory representation of one JSON dump file.
pub type JsonDocument = JsonGroup;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonAttribute {
    pub datatype: Datatype,
    pub value: serde_json::Value,
}

impl JsonAttribute {
    pub fn from_value(value: &AttributeValue) -> Self {
        JsonAttribute {
            datatype: value.datatype(),
            value: attribute_to_json(value),
        }
    }

    pub fn to_attribute_value(&self) -> Result<AttributeValue> {
        json_to_attribute(self.datatype, &self.value)
    }
}

fn attribute_to_json(value: &AttributeValue) -> serde_json::Value {
    use serde_json::json;
    match value {
        AttributeValue::Char(v) => json!(*v),
        AttributeValue::UChar(v) => json!(*v),
        AttributeValue::Short(v) => json!(*v),
        AttributeValue::Int(v) => json!(*v),
        AttributeValue::Long(v) => json!(*v),
        AttributeValue::UShort(v) => json!(*v),
        AttributeValue::UInt(v) => json!(*v),
        AttributeValue::ULong(v) => json!(*v),
        AttributeValue::Float(v) => json!(*v),
        AttributeValue::Double(v) => json!(*v),
        AttributeValue::Bool(v) => json!(*v),
        AttributeValue::String(v) => json!(v),
        AttributeValue::VecInt(v) => json!(v),
        AttributeValue::VecLong(v) => json!(v),
        AttributeValue::VecFloat(v) => json!(v),
        AttributeValue::VecDouble(v) => json!(v),
        AttributeValue::VecString(v) => json!(v),
        AttributeValue::Complex(re, im) => json!([re, im]),
        AttributeValue::ArrDbl7(v) => json!(v.to_vec()),
    }
}

fn json_to_attribute(datatype: Datatype, value: &serde_json::Value) -> Result<AttributeValue> {
    let bad =
        || Error::internal(format!("stored attribute does not match its datatype {datatype:?}"));
    Ok(match datatype {
        Datatype::Char => AttributeValue::Char(value.as_i64().ok_or_else(bad)? as i8),
        Datatype::UChar => AttributeValue::UChar(value.as_u64().ok_or_else(bad)? as u8),
        Datatype::Short => AttributeValue::Short(value.as_i64().ok_or_else(bad)? as i16),
        Datatype::Int => AttributeValue::Int(value.as_i64().ok_or_else(bad)? as i32),
        Datatype::Long => AttributeValue::Long(value.as_i64().ok_or_else(bad)?),
        Datatype::UShort => AttributeValue::UShort(value.as_u64().ok_or_else(bad)? as u16),
        Datatype::UInt => AttributeValue::UInt(value.as_u64().ok_or_else(bad)? as u32),
        Datatype::ULong => AttributeValue::ULong(value.as_u64().ok_or_else(bad)?),
        Datatype::Float => AttributeValue::Float(value.as_f64().ok_or_else(bad)? as f32),
        Datatype::Double => AttributeValue::Double(value.as_f64().ok_or_else(bad)?),
        Datatype::Bool => AttributeValue::Bool(value.as_bool().ok_or_else(bad)?),
        Datatype::String => AttributeValue::String(value.as_str().ok_or_else(bad)?.to_string()),
        Datatype::VecInt => {
            AttributeValue::VecInt(serde_json::from_value(value.clone()).map_err(|_| bad())?)
        }
        Datatype::VecLong => {
            AttributeValue::VecLong(serde_json::from_value(value.clone()).map_err(|_| bad())?)
        }
        Datatype::VecFloat => {
            AttributeValue::VecFloat(serde_json::from_value(value.clone()).map_err(|_| bad())?)
        }
        Datatype::VecDouble => {
            AttributeValue::VecDouble(serde_json::from_value(value.clone()).map_err(|_| bad())?)
        }
        Datatype::VecString => {
            AttributeValue::VecString(serde_json::from_value(value.clone()).map_err(|_| bad())?)
        }
        Datatype::CDouble => {
            let pair: (f64, f64) = serde_json::from_value(value.clone()).map_err(|_| bad())?;
            AttributeValue::Complex(pair.0, pair.1)
        }
        Datatype::ArrDbl7 => {
            let v: Vec<f64> = serde_json::from_value(value.clone()).map_err(|_| bad())?;
            let arr: [f64; 7] = v.try_into().map_err(|_| bad())?;
            AttributeValue::ArrDbl7(arr)
        }
        other => {
            return Err(Error::internal(format!(
                "unsupported stored attribute datatype {other:?}"
            )))
        }
    })
}

/// A single dataset: its shape, committed bytes, and (while a step is
/// still open) staged bytes not yet visible to a reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDataset {
    pub datatype: Datatype,
    pub extent: Vec<u64>,
    #[serde(default)]
    pub joined_dimension: Option<usize>,
    #[serde(default)]
    pub attributes: BTreeMap<String, JsonAttribute>,
    /// Bytes visible to a reader: data committed at the last step
    /// boundary, or written immediately for files with no step structure.
    #[serde(default)]
    pub committed: Vec<u8>,
    /// Bytes written during the still-open step, not yet committed.
    #[serde(skip)]
    staging: Option<Vec<u8>>,
    /// Per-writer contributions along a joined dimension, queued until the
    /// step commits (joined dimension must be axis 0 in this backend).
    #[serde(skip)]
    joined_staging: Vec<(Extent, Vec<u8>)>,
    #[serde(skip)]
    pub chunks: Vec<WrittenChunkInfo>,
}

impl JsonDataset {
    pub fn new(datatype: Datatype, extent: Vec<u64>, joined_dimension: Option<usize>) -> Self {
        let committed = if joined_dimension.is_some() {
            Vec::new()
        } else {
            let len = extent.iter().product::<u64>() as usize * datatype::size_of(datatype);
            vec![0u8; len]
        };
        JsonDataset {
            datatype,
            extent,
            joined_dimension,
            attributes: BTreeMap::new(),
            committed,
            staging: None,
            joined_staging: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn to_dataset(&self) -> Dataset {
        let mut ds = Dataset::new(self.datatype, Extent::from_slice(&self.extent));
        if let Some(j) = self.joined_dimension {
            ds = ds
                .with_joined_dimension(j)
                .expect("stored joined dimension index was valid when written");
        }
        ds
    }

    fn byte_len(&self) -> usize {
        self.extent.iter().product::<u64>() as usize * datatype::size_of(self.datatype)
    }

    fn row_major_strides(&self) -> Vec<u64> {
        let mut strides = vec![1u64; self.extent.len()];
        for i in (0..self.extent.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.extent[i + 1];
        }
        strides
    }

    /// `CREATE_DATASET` on a name that already exists within the same
    /// step: the shape is updated in place rather than the dataset being
    /// re-created, and operators are left untouched.
    pub fn update_extent_in_place(&mut self, new_extent: &[u64]) {
        self.extent = new_extent.to_vec();
        let wanted = self.byte_len();
        if self.committed.len() != wanted {
            self.committed.resize(wanted, 0);
        }
        if let Some(staging) = self.staging.as_mut() {
            if staging.len() != wanted {
                staging.resize(wanted, 0);
            }
        }
    }

    /// Resizes a non-joined, chunked dataset (`EXTEND_DATASET`).
    pub fn extend(&mut self, new_extent: &Extent) -> Result<()> {
        if self.joined_dimension.is_some() {
            return Err(Error::unsupported(
                "json",
                "extendDataset is not meaningful for a joined-dimension dataset",
            ));
        }
        let mut check = Dataset::new(self.datatype, Extent::from_slice(&self.extent));
        check.extend(new_extent, true)?;
        self.extent = new_extent.to_vec();
        let wanted = self.byte_len();
        if self.committed.len() < wanted {
            self.committed.resize(wanted, 0);
        }
        if let Some(staging) = self.staging.as_mut() {
            if staging.len() < wanted {
                staging.resize(wanted, 0);
            }
        }
        Ok(())
    }

    /// `WRITE_DATASET`: stages `bytes` at `offset`/`extent` against the
    /// current committed shape, leaving `committed` untouched until the
    /// step commits.
    pub fn write_region(
        &mut self,
        offset: &Offset,
        extent: &Extent,
        datatype: Datatype,
        bytes: &[u8],
        writer_rank: u32,
    ) -> Result<()> {
        if datatype != self.datatype {
            return Err(Error::wrong_api_usage(format!(
                "writeDataset datatype {datatype:?} does not match dataset datatype {:?}",
                self.datatype
            )));
        }
        let elem_size = datatype::size_of(self.datatype);
        let expected_elems: u64 = extent.iter().product();
        if bytes.len() as u64 != expected_elems * elem_size as u64 {
            return Err(Error::wrong_api_usage(
                "writeDataset buffer length does not match offset/extent/datatype",
            ));
        }

        if let Some(j) = self.joined_dimension {
            if j != 0 {
                return Err(Error::unsupported(
                    "json",
                    "a joined dimension must be the outermost axis in this backend",
                ));
            }
            self.joined_staging.push((extent.clone(), bytes.to_vec()));
            self.chunks
                .push(WrittenChunkInfo::new(offset.clone(), extent.clone(), writer_rank));
            return Ok(());
        }

        let shape = Dataset::new(self.datatype, Extent::from_slice(&self.extent));
        shape.validate_selection(offset, extent)?;

        if self.staging.is_none() {
            self.staging = Some(self.committed.clone());
        }
        let staging = self.staging.as_mut().expect("just initialized above");
        let strides = self.row_major_strides();
        copy_region(staging, bytes, offset, extent, &strides, elem_size);
        self.chunks
            .push(WrittenChunkInfo::new(offset.clone(), extent.clone(), writer_rank));
        Ok(())
    }

    /// `READ_DATASET`: reads from `committed` only -- staged-but-uncommitted
    /// writes from the same writer within an open step are not visible to
    /// its own reads; write-then-read-back within one still-open step is not
    /// a supported pattern (spec §5 "writes become visible ... only at
    /// `EndStep`").
    pub fn read_region(&self, offset: &Offset, extent: &Extent, datatype: Datatype) -> Result<Vec<u8>> {
        if datatype != self.datatype {
            return Err(Error::wrong_api_usage("readDataset datatype mismatch"));
        }
        let shape = Dataset::new(self.datatype, Extent::from_slice(&self.extent));
        shape.validate_selection(offset, extent)?;
        let elem_size = datatype::size_of(self.datatype);
        let strides = self.row_major_strides();
        let mut out = vec![0u8; extent.iter().product::<u64>() as usize * elem_size];
        copy_region_out(&self.committed, &mut out, offset, extent, &strides, elem_size);
        Ok(out)
    }

    /// Commits staged bytes into `committed`, making them visible to a
    /// reader (`ADVANCE(End)`, spec-shaped step-boundary semantics).
    pub fn commit(&mut self) {
        if let Some(staging) = self.staging.take() {
            self.committed = staging;
        }
        let joined = std::mem::take(&mut self.joined_staging);
        if !joined.is_empty() {
            let mut total = 0u64;
            for (extent, bytes) in joined {
                total += extent.first().copied().unwrap_or(0);
                self.committed.extend_from_slice(&bytes);
            }
            if let Some(first) = self.extent.first_mut() {
                *first += total;
            }
        }
    }
}

fn for_each_multi_index(extent: &[u64], mut f: impl FnMut(&[u64])) {
    let rank = extent.len();
    if rank == 0 {
        f(&[]);
        return;
    }
    if extent.iter().any(|&e| e == 0) {
        return;
    }
    let mut idx = vec![0u64; rank];
    loop {
        f(&idx);
        let mut d = rank - 1;
        loop {
            idx[d] += 1;
            if idx[d] < extent[d] {
                break;
            }
            idx[d] = 0;
            if d == 0 {
                return;
            }
            d -= 1;
        }
    }
}

fn copy_region(
    dst: &mut [u8],
    src: &[u8],
    offset: &[u64],
    extent: &[u64],
    strides: &[u64],
    elem_size: usize,
) {
    let mut src_pos = 0usize;
    for_each_multi_index(extent, |idx| {
        let mut dst_elem = 0u64;
        for d in 0..idx.len() {
            dst_elem += (offset[d] + idx[d]) * strides[d];
        }
        let dst_byte = dst_elem as usize * elem_size;
        dst[dst_byte..dst_byte + elem_size].copy_from_slice(&src[src_pos..src_pos + elem_size]);
        src_pos += elem_size;
    });
}

fn copy_region_out(
    src: &[u8],
    dst: &mut [u8],
    offset: &[u64],
    extent: &[u64],
    strides: &[u64],
    elem_size: usize,
) {
    let mut dst_pos = 0usize;
    for_each_multi_index(extent, |idx| {
        let mut src_elem = 0u64;
        for d in 0..idx.len() {
            src_elem += (offset[d] + idx[d]) * strides[d];
        }
        let src_byte = src_elem as usize * elem_size;
        dst[dst_pos..dst_pos + elem_size].copy_from_slice(&src[src_byte..src_byte + elem_size]);
        dst_pos += elem_size;
    });
}
