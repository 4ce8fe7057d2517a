//! `Datatype <-> hdf5::Datatype` mapping (spec §4.5 "Type mapping").
//!
//! The HDF5 crate's typed API (`Dataset::write_raw::<T>`,
//! `Attribute::read_scalar::<T>`, ...) wants a concrete `T: H5Type` at every
//! call site, so dispatch on the runtime [`Datatype`] enum is done with
//! `with_datatype_args!` for the plain scalar widths and two small
//! hand-written compound structs for the complex-number widths, plus an
//! `{r,i}` compound type and a `{TRUE,FALSE}` boolean enum (h5py-compatible,
//! spec §4.5).

use hdf5::types::{FixedAscii, FloatSize, IntSize, TypeDescriptor, VarLenUnicode};
use hdf5::H5Type;

use crate::datatype::Datatype;
use crate::error::{Error, Result};

/// h5py-compatible boolean representation: an enum over `i8` with exactly
/// the two named members, spec §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, H5Type)]
#[repr(i8)]
pub enum H5Bool {
    False = 0,
    True = 1,
}

impl From<bool> for H5Bool {
    fn from(b: bool) -> Self {
        if b { H5Bool::True } else { H5Bool::False }
    }
}

impl From<H5Bool> for bool {
    fn from(b: H5Bool) -> Self {
        matches!(b, H5Bool::True)
    }
}

/// `{r, i}` compound type for `CFLOAT`, spec §4.5 "compound types `{r,i}`
/// for each complex width".
#[derive(Debug, Clone, Copy, PartialEq, H5Type)]
#[repr(C)]
pub struct H5Complex32 {
    pub r: f32,
    pub i: f32,
}

/// `{r, i}` compound type for `CDOUBLE`/`CLONGDOUBLE` (HDF5 has no native
/// `long double`, so both widths share the `f64` pair).
#[derive(Debug, Clone, Copy, PartialEq, H5Type)]
#[repr(C)]
pub struct H5Complex64 {
    pub r: f64,
    pub i: f64,
}

/// Legacy libSplash triple, recognized on read per spec §4.5 "Attribute
/// reads" but never written by this adapter.
#[derive(Debug, Clone, Copy, PartialEq, H5Type)]
#[repr(C)]
pub struct H5Vec3Double {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Maximum length used for the variable-length string types this adapter
/// writes; `VarLenUnicode` has no fixed bound, but fixed-length reads of
/// legacy files use this as a generous upper bound.
pub const MAX_FIXED_STRING_LEN: usize = 1024;

/// One `hdf5::Datatype` byte-descriptor per scalar openPMD [`Datatype`],
/// used to size raw buffers and validate a discovered on-disk type against
/// what the frontend expects to read.
pub fn hdf5_byte_width(dt: Datatype) -> Result<usize> {
    Ok(match dt {
        Datatype::Char | Datatype::SChar | Datatype::UChar => 1,
        Datatype::Short | Datatype::UShort => 2,
        Datatype::Int | Datatype::UInt | Datatype::Float => 4,
        Datatype::Long
        | Datatype::LongLong
        | Datatype::ULong
        | Datatype::ULongLong
        | Datatype::Double
        | Datatype::LongDouble => 8,
        Datatype::CFloat => std::mem::size_of::<H5Complex32>(),
        Datatype::CDouble | Datatype::CLongDouble => std::mem::size_of::<H5Complex64>(),
        Datatype::Bool => 1,
        other => {
            return Err(Error::unsupported(
                "hdf5",
                format!("{other:?} has no fixed scalar byte width"),
            ))
        }
    })
}

/// Returns a `VarLenUnicode` built from `s`, the representation this
/// adapter uses for openPMD string attributes/datasets (spec §4.5
/// "variable-length strings").
pub fn to_varlen_unicode(s: &str) -> Result<VarLenUnicode> {
    s.parse()
        .map_err(|_| Error::unsupported("hdf5", "string is not valid for a VarLenUnicode value"))
}

/// Truncating fixed-ASCII conversion, used only when reading a legacy file
/// that stored fixed-length strings instead of `VarLenUnicode` (spec §4.5).
pub fn fixed_ascii_to_string<const N: usize>(value: &FixedAscii<N>) -> String {
    value.as_str().to_string()
}

/// The on-disk `hdf5::types::TypeDescriptor` for a dataset of element type
/// `dt`, used by `createDataset`/`openDataset` to build and recognize
/// datasets without pinning a concrete Rust type at the call site (the
/// element type is only known at runtime). `Vec*` variants describe the
/// *element* type; the array-ness itself is carried by the dataspace shape,
/// not by this descriptor, per spec §4.5 "Type mapping".
pub fn type_descriptor(dt: Datatype) -> Result<TypeDescriptor> {
    use Datatype::*;
    Ok(match dt {
        Char | SChar | VecChar => TypeDescriptor::Integer(IntSize::U1),
        UChar | VecUChar => TypeDescriptor::Unsigned(IntSize::U1),
        Short | VecShort => TypeDescriptor::Integer(IntSize::U2),
        UShort | VecUShort => TypeDescriptor::Unsigned(IntSize::U2),
        Int | VecInt => TypeDescriptor::Integer(IntSize::U4),
        UInt | VecUInt => TypeDescriptor::Unsigned(IntSize::U4),
        Long | LongLong | VecLong | VecLongLong => TypeDescriptor::Integer(IntSize::U8),
        ULong | ULongLong | VecULong | VecULongLong => TypeDescriptor::Unsigned(IntSize::U8),
        Float | VecFloat => TypeDescriptor::Float(FloatSize::U4),
        Double | LongDouble | VecDouble | VecLongDouble => TypeDescriptor::Float(FloatSize::U8),
        Bool => H5Bool::type_descriptor(),
        CFloat | VecCFloat => H5Complex32::type_descriptor(),
        CDouble | CLongDouble | VecCDouble | VecCLongDouble => H5Complex64::type_descriptor(),
        ArrDbl7 => TypeDescriptor::FixedArray(Box::new(TypeDescriptor::Float(FloatSize::U8)), 7),
        String | VecString => TypeDescriptor::VarLenUnicode,
        Undefined => {
            return Err(Error::internal(
                "type_descriptor called on Datatype::Undefined",
            ))
        }
    })
}
