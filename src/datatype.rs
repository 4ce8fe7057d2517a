//! The closed openPMD datatype enumeration (spec §6.2) and the compile-time
//! dispatch visitor used to turn a runtime `Datatype` value into a call on a
//! generic function monomorphized for the matching Rust type: one table of
//! `(Variant, RustType)` pairs driving both the enum and the dispatch macro
//! (spec §9's "compile-time visitor generated from the closed datatype
//! enum"). `paste` itself is not needed by the macro below (variant names
//! are written out, not pasted together), but is used by
//! `backend/adios2/attributes.rs` to generate the `is_boolean/<name>` and
//! `activeTable/<path>` companion-attribute name builders.

use serde::{Deserialize, Serialize};

/// Declares the closed set of datatype variants and, for each, the Rust type
/// a generic dispatch should be instantiated with. Several variants (e.g.
/// `Char`/`SChar`, `Long`/`LongLong`) share a Rust representation on this
/// platform; that is fine for the `with_datatype!` match arms below but
/// means only one variant per distinct Rust type may carry a [`NativeType`]
/// impl (see the explicit impls after the macro invocation).
macro_rules! datatypes {
    ($($variant:ident => $ty:ty;)*) => {
        /// Closed datatype enumeration, spec §6.2.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[non_exhaustive]
        pub enum Datatype {
            $($variant,)*
            /// `array<double, 7>`, used only for the `unitDimension` attribute.
            ArrDbl7,
            /// A boolean scalar. Represented as `u8` + a companion marker
            /// attribute in ADIOS2, and as a `{TRUE,FALSE}` enum in HDF5.
            Bool,
            /// Meta-value: "no datatype known yet".
            Undefined,
        }

        /// Runs `$visitor` as if it were a generic function instantiated for
        /// the Rust type matching `$dt`, i.e. the compile-time visitor from
        /// spec §9 ("datatype dispatch as a compile-time visitor generated
        /// from the closed datatype enum"). `$visitor` must be the path of a
        /// generic function taking one type parameter; see
        /// `datatype::size_of` below for a worked example.
        #[macro_export]
        macro_rules! with_datatype {
            ($dt:expr, $visitor:ident) => {
                match $dt {
                    $($crate::datatype::Datatype::$variant => $visitor::<$ty>(),)*
                    $crate::datatype::Datatype::ArrDbl7 => $visitor::<[f64; 7]>(),
                    $crate::datatype::Datatype::Bool => $visitor::<bool>(),
                    $crate::datatype::Datatype::Undefined => {
                        panic!("with_datatype! called on Datatype::Undefined")
                    }
                }
            };
        }

        /// Same dispatch as [`with_datatype!`], but forwards extra arguments
        /// to `$visitor` alongside the type parameter. Used by the HDF5 and
        /// ADIOS2 adapters, whose per-type dataset/attribute calls need a
        /// handle and a byte buffer in addition to the element type.
        #[macro_export]
        macro_rules! with_datatype_args {
            ($dt:expr, $visitor:ident, $($arg:expr),* $(,)?) => {
                match $dt {
                    $($crate::datatype::Datatype::$variant => $visitor::<$ty>($($arg),*),)*
                    $crate::datatype::Datatype::ArrDbl7 => $visitor::<[f64; 7]>($($arg),*),
                    $crate::datatype::Datatype::Bool => $visitor::<bool>($($arg),*),
                    $crate::datatype::Datatype::Undefined => {
                        panic!("with_datatype_args! called on Datatype::Undefined")
                    }
                }
            };
        }
    };
}

mod private {
    pub trait Sealed {}
}

/// Implemented for every Rust type that can appear as the payload of an
/// [`crate::task::AttributeValue`] or a dataset element type. Sealed: the
/// datatype set is closed per spec §6.2.
pub trait NativeType: private::Sealed {
    const DATATYPE: Datatype;
}

macro_rules! native_type {
    ($variant:ident, $ty:ty) => {
        impl private::Sealed for $ty {}
        impl NativeType for $ty {
            const DATATYPE: Datatype = Datatype::$variant;
        }
    };
}

datatypes! {
    Char => i8;
    SChar => i8;
    UChar => u8;
    Short => i16;
    Int => i32;
    Long => i64;
    LongLong => i64;
    UShort => u16;
    UInt => u32;
    ULong => u64;
    ULongLong => u64;
    Float => f32;
    Double => f64;
    LongDouble => f64;
    CFloat => (f32, f32);
    CDouble => (f64, f64);
    CLongDouble => (f64, f64);
    String => String;
    VecChar => Vec<i8>;
    VecUChar => Vec<u8>;
    VecShort => Vec<i16>;
    VecInt => Vec<i32>;
    VecLong => Vec<i64>;
    VecLongLong => Vec<i64>;
    VecUShort => Vec<u16>;
    VecUInt => Vec<u32>;
    VecULong => Vec<u64>;
    VecULongLong => Vec<u64>;
    VecFloat => Vec<f32>;
    VecDouble => Vec<f64>;
    VecLongDouble => Vec<f64>;
    VecCFloat => Vec<(f32, f32)>;
    VecCDouble => Vec<(f64, f64)>;
    VecCLongDouble => Vec<(f64, f64)>;
    VecString => Vec<String>;
}

// One NativeType impl per distinct Rust type; the remaining variants that
// alias the same Rust type (SChar/Char, LongLong/Long, ULongLong/ULong,
// LongDouble/Double, CLongDouble/CDouble and their vector forms) are still
// reachable through `with_datatype!`, just not through `T::DATATYPE`.
native_type!(Char, i8);
native_type!(UChar, u8);
native_type!(Short, i16);
native_type!(Int, i32);
native_type!(Long, i64);
native_type!(UShort, u16);
native_type!(UInt, u32);
native_type!(ULong, u64);
native_type!(Float, f32);
native_type!(Double, f64);
native_type!(CFloat, (f32, f32));
native_type!(CDouble, (f64, f64));
native_type!(String, String);
native_type!(VecChar, Vec<i8>);
native_type!(VecUChar, Vec<u8>);
native_type!(VecShort, Vec<i16>);
native_type!(VecInt, Vec<i32>);
native_type!(VecLong, Vec<i64>);
native_type!(VecUShort, Vec<u16>);
native_type!(VecUInt, Vec<u32>);
native_type!(VecULong, Vec<u64>);
native_type!(VecFloat, Vec<f32>);
native_type!(VecDouble, Vec<f64>);
native_type!(VecCFloat, Vec<(f32, f32)>);
native_type!(VecCDouble, Vec<(f64, f64)>);
native_type!(VecString, Vec<String>);

impl Datatype {
    /// Whether `self` is one of the `Vec*` variants.
    pub fn is_vector(self) -> bool {
        matches!(
            self,
            Datatype::VecChar
                | Datatype::VecUChar
                | Datatype::VecShort
                | Datatype::VecInt
                | Datatype::VecLong
                | Datatype::VecLongLong
                | Datatype::VecUShort
                | Datatype::VecUInt
                | Datatype::VecULong
                | Datatype::VecULongLong
                | Datatype::VecFloat
                | Datatype::VecDouble
                | Datatype::VecLongDouble
                | Datatype::VecCFloat
                | Datatype::VecCDouble
                | Datatype::VecCLongDouble
                | Datatype::VecString
        )
    }

    /// Whether `self` is one of the complex-number variants (scalar or vector).
    pub fn is_complex(self) -> bool {
        matches!(
            self,
            Datatype::CFloat
                | Datatype::CDouble
                | Datatype::CLongDouble
                | Datatype::VecCFloat
                | Datatype::VecCDouble
                | Datatype::VecCLongDouble
        )
    }
}

fn size_of_impl<T>() -> usize {
    std::mem::size_of::<T>()
}

/// Byte width of one element of `dt`, used by backends sizing raw buffers.
pub fn size_of(dt: Datatype) -> usize {
    with_datatype!(dt, size_of_impl)
}

/// Reinterprets a native-layout byte buffer as a slice of `T`, used by the
/// HDF5 and ADIOS2 adapters to hand the raw bytes carried by a
/// [`crate::task::WriteBuffer`]/[`crate::task::ReadBuffer`] to a library
/// call expecting a typed slice. Every dataset byte buffer in this core is
/// produced by copying the native in-memory representation of its element
/// type (spec §3 "I/O task"), so this is a reinterpretation, not a
/// conversion.
///
/// # Safety
/// `bytes` must hold a whole number of `T`s, laid out and aligned as `T`'s
/// native representation. Both backend adapters satisfy this by sizing
/// every buffer from [`size_of`] before filling it.
pub unsafe fn bytes_as_native_slice<T>(bytes: &[u8]) -> &[T] {
    debug_assert_eq!(bytes.len() % std::mem::size_of::<T>(), 0);
    debug_assert_eq!(bytes.as_ptr() as usize % std::mem::align_of::<T>(), 0);
    std::slice::from_raw_parts(bytes.as_ptr() as *const T, bytes.len() / std::mem::size_of::<T>())
}

/// The inverse of [`bytes_as_native_slice`]: views a typed slice as raw
/// native-layout bytes, used when a library call hands back a typed buffer
/// that must be stored as a [`crate::task::ReadBuffer`].
pub fn native_slice_as_bytes<T>(values: &[T]) -> &[u8] {
    // SAFETY: any `T` may be viewed as bytes; the resulting slice borrows
    // from `values` and cannot outlive it.
    unsafe {
        std::slice::from_raw_parts(values.as_ptr() as *const u8, std::mem::size_of_val(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_of_matches_native_layout() {
        assert_eq!(size_of(Datatype::Double), 8);
        assert_eq!(size_of(Datatype::Int), 4);
        assert_eq!(size_of(Datatype::Bool), 1);
        assert_eq!(size_of(Datatype::ArrDbl7), 56);
    }

    #[test]
    fn native_type_round_trips_for_unaliased_variants() {
        assert_eq!(f64::DATATYPE, Datatype::Double);
        assert_eq!(i32::DATATYPE, Datatype::Int);
        assert_eq!(Vec::<f64>::DATATYPE, Datatype::VecDouble);
    }

    #[test]
    fn byte_slice_round_trips_through_native_view() {
        let values = [1.0f64, 2.0, 3.0, 4.0];
        let bytes = native_slice_as_bytes(&values);
        let back: &[f64] = unsafe { bytes_as_native_slice(bytes) };
        assert_eq!(back, &values);
    }
}
