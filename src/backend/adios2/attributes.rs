//! Attribute layout, spec §4.4.6 / §4.4.4.
//!
//! ADIOS2 has no native boolean or group-table type, so both are encoded as
//! companion attributes next to the "real" one: a boolean value is stored as
//! a `uint8_t` plus a marker attribute recording that it should be read back
//! as `bool`, and a group's liveness is recorded under an `activeTable/`
//! marker (`group_table.rs`). Both companion names are built by the same
//! macro, mirroring how `datatype.rs` generates one enum arm per datatype
//! from a single table -- here it is one name-builder function per
//! companion kind from a single `(ident, prefix)` pair, using `paste` to
//! assemble the function name the way `datatype.rs`'s doc comment promises.

use std::pin::Pin;

use paste::paste;

use crate::backend::adios2::sys::ffi;
use crate::config::AttributeWritingRanks;
use crate::datatype::{bytes_as_native_slice, native_slice_as_bytes, Datatype};
use crate::error::{Error, Result};
use crate::task::AttributeValue;

macro_rules! companion_name_builder {
    ($ident:ident => $prefix:literal) => {
        paste! {
            #[doc = concat!("Companion attribute name under `", $prefix, "`.")]
            pub fn [<$ident _attribute_name>](name: &str) -> String {
                format!(concat!($prefix, "{}"), name)
            }
        }
    };
}

companion_name_builder!(is_boolean => "__openPMD_internal/is_boolean/");

/// Whether rank `rank` (spec §6.3 `adios2.attribute_writing_ranks`) may
/// write attributes at all. Checked before every `WRITE_ATT` dispatch so a
/// non-designated rank silently skips the write rather than erroring --
/// under MPI every rank still enqueues the same attribute write, but only
/// the designated one(s) must actually call `DefineAttribute` to avoid a
/// collective deadlock on ranks that disagree about which rank writes.
pub fn may_write_attributes(ranks: &AttributeWritingRanks, rank: i64) -> bool {
    ranks.allows(rank)
}

fn datatype_to_bytes(value: &AttributeValue) -> (Datatype, Vec<u8>, Option<usize>) {
    match value {
        AttributeValue::Char(v) => (Datatype::Char, native_slice_as_bytes(std::slice::from_ref(v)).to_vec(), None),
        AttributeValue::UChar(v) => (Datatype::UChar, native_slice_as_bytes(std::slice::from_ref(v)).to_vec(), None),
        AttributeValue::Short(v) => (Datatype::Short, native_slice_as_bytes(std::slice::from_ref(v)).to_vec(), None),
        AttributeValue::Int(v) => (Datatype::Int, native_slice_as_bytes(std::slice::from_ref(v)).to_vec(), None),
        AttributeValue::Long(v) => (Datatype::Long, native_slice_as_bytes(std::slice::from_ref(v)).to_vec(), None),
        AttributeValue::UShort(v) => (Datatype::UShort, native_slice_as_bytes(std::slice::from_ref(v)).to_vec(), None),
        AttributeValue::UInt(v) => (Datatype::UInt, native_slice_as_bytes(std::slice::from_ref(v)).to_vec(), None),
        AttributeValue::ULong(v) => (Datatype::ULong, native_slice_as_bytes(std::slice::from_ref(v)).to_vec(), None),
        AttributeValue::Float(v) => (Datatype::Float, native_slice_as_bytes(std::slice::from_ref(v)).to_vec(), None),
        AttributeValue::Double(v) => (Datatype::Double, native_slice_as_bytes(std::slice::from_ref(v)).to_vec(), None),
        AttributeValue::Bool(v) => (Datatype::UChar, vec![if *v { 1 } else { 0 }], None),
        AttributeValue::VecInt(v) => (Datatype::VecInt, native_slice_as_bytes(v).to_vec(), Some(v.len())),
        AttributeValue::VecLong(v) => (Datatype::VecLong, native_slice_as_bytes(v).to_vec(), Some(v.len())),
        AttributeValue::VecFloat(v) => (Datatype::VecFloat, native_slice_as_bytes(v).to_vec(), Some(v.len())),
        AttributeValue::VecDouble(v) => (Datatype::VecDouble, native_slice_as_bytes(v).to_vec(), Some(v.len())),
        AttributeValue::Complex(re, im) => {
            (Datatype::CDouble, native_slice_as_bytes(&[*re, *im]).to_vec(), None)
        }
        AttributeValue::ArrDbl7(arr) => (Datatype::ArrDbl7, native_slice_as_bytes(arr).to_vec(), Some(arr.len())),
        AttributeValue::String(_) | AttributeValue::VecString(_) => {
            unreachable!("string attributes go through the dedicated string path")
        }
    }
}

/// Writes `value` under `name`, including the `is_boolean` companion marker
/// when `value` is a [`AttributeValue::Bool`]. `allow_modification` mirrors
/// `adios2.modifiable_attributes` (spec §6.3): ADIOS2 errors on redefining
/// an attribute unless this is set.
pub fn write_attribute(
    mut io: Pin<&mut ffi::Adios2Io>,
    name: &str,
    value: &AttributeValue,
    allow_modification: bool,
) -> Result<()> {
    match value {
        AttributeValue::String(s) => {
            ffi::io_define_attribute_string(io.as_mut(), name, s, allow_modification)
                .map_err(|e| Error::internal(format!("ADIOS2 DefineAttribute<string> failed: {e}")))?;
        }
        AttributeValue::VecString(items) => {
            ffi::io_define_attribute_string_array(io.as_mut(), name, items.clone(), allow_modification)
                .map_err(|e| Error::internal(format!("ADIOS2 DefineAttribute<string[]> failed: {e}")))?;
        }
        _ => {
            let (dtype, bytes, count) = datatype_to_bytes(value);
            let dtype_tag = super::datatype_name(dtype)?;
            if let Some(_n) = count {
                ffi::io_define_attribute_array(io.as_mut(), name, dtype_tag, &bytes, allow_modification)
                    .map_err(|e| Error::internal(format!("ADIOS2 DefineAttribute (array) failed: {e}")))?;
            } else {
                ffi::io_define_attribute_scalar(io.as_mut(), name, dtype_tag, &bytes, allow_modification)
                    .map_err(|e| Error::internal(format!("ADIOS2 DefineAttribute (scalar) failed: {e}")))?;
            }
        }
    }
    if matches!(value, AttributeValue::Bool(_)) {
        let marker_name = is_boolean_attribute_name(name);
        ffi::io_define_attribute_scalar(io, &marker_name, "uint8_t", &[1u8], true)
            .map_err(|e| Error::internal(format!("ADIOS2 DefineAttribute (is_boolean marker) failed: {e}")))?;
    }
    Ok(())
}

/// Reads the attribute at `name` back into an [`AttributeValue`], consulting
/// the `is_boolean` companion marker to distinguish a stored boolean from a
/// plain `uint8_t`.
pub fn read_attribute(mut io: Pin<&mut ffi::Adios2Io>, name: &str) -> Result<AttributeValue> {
    let ty = ffi::io_read_attribute_type(io.as_mut(), name).map_err(|_| {
        Error::read(crate::error::AffectedObject::Attribute, name, crate::error::ReadReason::NotFound)
    })?;

    if ty == "string" {
        let s = ffi::io_read_attribute_string(io.as_mut(), name)
            .map_err(|e| Error::internal(format!("ADIOS2 read string attribute failed: {e}")))?;
        return Ok(AttributeValue::String(s));
    }

    let marker = is_boolean_attribute_name(name);
    let is_bool = ffi::io_read_attribute_bytes(io.as_mut(), &marker).is_ok();

    let bytes = ffi::io_read_attribute_bytes(io.as_mut(), name)
        .map_err(|e| Error::internal(format!("ADIOS2 read attribute bytes failed: {e}")))?;

    value_from_bytes(&ty, &bytes, is_bool)
}

/// Decodes a raw attribute buffer back into an [`AttributeValue`]. ADIOS2's
/// `InquireAttribute` does not distinguish "scalar" from "single-element
/// array" in the type tag it reports, so element count -- and therefore
/// scalar-vs-vector shape -- is recovered from `bytes.len()` alone, the way
/// `read_attribute` already recovers boolean-ness from the `is_boolean`
/// companion rather than from the ADIOS2 type tag.
fn value_from_bytes(adios_type: &str, bytes: &[u8], is_bool: bool) -> Result<AttributeValue> {
    macro_rules! scalar {
        ($t:ty) => {{
            let slice: &[$t] = unsafe { bytes_as_native_slice(bytes) };
            slice.first().copied().ok_or_else(|| Error::internal("empty attribute buffer"))?
        }};
    }
    macro_rules! vector {
        ($t:ty) => {{
            let slice: &[$t] = unsafe { bytes_as_native_slice(bytes) };
            slice.to_vec()
        }};
    }
    let is_scalar = |width: usize| bytes.len() == width;
    Ok(match adios_type {
        "int8_t" => AttributeValue::Char(scalar!(i8)),
        "uint8_t" if is_bool => AttributeValue::Bool(scalar!(u8) != 0),
        "uint8_t" => AttributeValue::UChar(scalar!(u8)),
        "int16_t" => AttributeValue::Short(scalar!(i16)),
        "uint16_t" => AttributeValue::UShort(scalar!(u16)),
        "int32_t" if is_scalar(std::mem::size_of::<i32>()) => AttributeValue::Int(scalar!(i32)),
        "int32_t" => AttributeValue::VecInt(vector!(i32)),
        "uint32_t" => AttributeValue::UInt(scalar!(u32)),
        "int64_t" if is_scalar(std::mem::size_of::<i64>()) => AttributeValue::Long(scalar!(i64)),
        "int64_t" => AttributeValue::VecLong(vector!(i64)),
        "uint64_t" => AttributeValue::ULong(scalar!(u64)),
        "float" if is_scalar(std::mem::size_of::<f32>()) => AttributeValue::Float(scalar!(f32)),
        "float" => AttributeValue::VecFloat(vector!(f32)),
        // `unitDimension` (ARR_DBL_7) is the only 7-element double attribute
        // this crate ever writes, so a 7-wide double buffer unambiguously
        // came from an ArrDbl7, not a VecDouble that happens to hold 7
        // elements (spec §6.2).
        "double" if bytes.len() == 7 * std::mem::size_of::<f64>() => {
            let slice: &[f64] = unsafe { bytes_as_native_slice(bytes) };
            let arr: [f64; 7] =
                slice.try_into().map_err(|_| Error::internal("malformed ArrDbl7 attribute buffer"))?;
            AttributeValue::ArrDbl7(arr)
        }
        "double" if is_scalar(std::mem::size_of::<f64>()) => AttributeValue::Double(scalar!(f64)),
        "double" => AttributeValue::VecDouble(vector!(f64)),
        other => {
            return Err(Error::unsupported(
                "adios2",
                format!("cannot decode attribute of ADIOS2 type {other} back into an openPMD datatype"),
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_boolean_marker_name_is_prefixed() {
        assert_eq!(
            is_boolean_attribute_name("isPeriodic"),
            "__openPMD_internal/is_boolean/isPeriodic"
        );
    }

    #[test]
    fn may_write_attributes_respects_configured_ranks() {
        assert!(may_write_attributes(&AttributeWritingRanks::All, 3));
        assert!(may_write_attributes(&AttributeWritingRanks::One(0), 0));
        assert!(!may_write_attributes(&AttributeWritingRanks::One(0), 1));
    }

    #[test]
    fn arr_dbl7_round_trips_as_a_seven_element_array_not_a_scalar() {
        let value = AttributeValue::ArrDbl7([1.0, 1.0, -3.0, -1.0, 0.0, 0.0, 0.0]);
        let (dtype, bytes, count) = datatype_to_bytes(&value);
        assert_eq!(dtype, Datatype::ArrDbl7);
        assert_eq!(count, Some(7));
        assert_eq!(bytes.len(), 7 * std::mem::size_of::<f64>());

        match value_from_bytes("double", &bytes, false).unwrap() {
            AttributeValue::ArrDbl7(v) => assert_eq!(v, [1.0, 1.0, -3.0, -1.0, 0.0, 0.0, 0.0]),
            other => panic!("expected ArrDbl7, got {other:?}"),
        }
    }

    #[test]
    fn plain_double_scalar_is_not_mistaken_for_arr_dbl7() {
        let (dtype, bytes, count) = datatype_to_bytes(&AttributeValue::Double(42.0));
        assert_eq!(dtype, Datatype::Double);
        assert_eq!(count, None);

        match value_from_bytes("double", &bytes, false).unwrap() {
            AttributeValue::Double(v) => assert_eq!(v, 42.0),
            other => panic!("expected Double, got {other:?}"),
        }
    }

    #[test]
    fn double_vector_of_other_lengths_decodes_as_vec_double() {
        let (_, bytes, _) = datatype_to_bytes(&AttributeValue::VecDouble(vec![1.0, 2.0, 3.0]));
        match value_from_bytes("double", &bytes, false).unwrap() {
            AttributeValue::VecDouble(v) => assert_eq!(v, vec![1.0, 2.0, 3.0]),
            other => panic!("expected VecDouble, got {other:?}"),
        }
    }
}
