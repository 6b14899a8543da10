//! Core types shared across every layer: node identity, element types,
//! and the reserved hidden-name vocabulary.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum length of a node name or label, in bytes
pub const NAME_LENGTH: usize = 32;

/// Maximum payload rank
pub const MAX_DIMENSIONS: usize = 12;

// =============================================================================
// Reserved (hidden) child names
// =============================================================================
//
// User names are trimmed of leading whitespace, so a user-supplied name can
// never begin with the prefix and collisions are impossible.

/// Prefix marking a child name as internal bookkeeping
pub const HIDDEN_PREFIX: char = ' ';

/// Payload dataset of a node
pub const D_DATA: &str = " data";
/// Literal target path text of a link node
pub const D_PATH: &str = " path";
/// Literal target file text of a cross-file link node
pub const D_FILE: &str = " file";
/// The engine-level link entry of a link node
pub const D_LINK: &str = " link";
/// Native byte-order string on the root
pub const D_FORMAT: &str = " format";
/// Version marker on the root (unified storage-order convention)
pub const D_VERSION: &str = " version";
/// Version marker written by the legacy flat format (untransposed storage)
pub const D_OLDVERS: &str = " oldversion";

// =============================================================================
// Attribute names
// =============================================================================

pub const A_NAME: &str = "name";
pub const A_LABEL: &str = "label";
pub const A_TYPE: &str = "type";
pub const A_ORDER: &str = "order";
pub const A_FLAGS: &str = "flags";

/// Bit 0 of the node flags: payload indexed with the legacy convention
pub const FLAG_LEGACY_INDEXING: i32 = 1;

// =============================================================================
// Node identity
// =============================================================================

/// Opaque 64-bit node handle: file serial in the high half, object index in
/// the low half. Round-trips exactly through [`NodeId::to_bits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn new(serial: u32, obj: u32) -> Self {
        NodeId(((serial as u64) << 32) | obj as u64)
    }

    pub(crate) fn serial(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub(crate) fn obj(self) -> u32 {
        self.0 as u32
    }

    /// Raw bit pattern, for callers that must squeeze the handle through a
    /// 64-bit numeric parameter slot
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from [`NodeId::to_bits`] output
    pub fn from_bits(bits: u64) -> Self {
        NodeId(bits)
    }
}

// =============================================================================
// Element types
// =============================================================================

/// Element type of a node, named by its traditional two-character code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// "MT" - no data
    Empty,
    /// "LK" - link node
    Link,
    /// "B1" - unsigned byte / boolean
    B1,
    /// "C1" - character
    C1,
    /// "I4" - 32-bit signed integer
    I4,
    /// "I8" - 64-bit signed integer
    I8,
    /// "U4" - 32-bit unsigned integer
    U4,
    /// "U8" - 64-bit unsigned integer
    U8,
    /// "R4" - 32-bit IEEE float
    R4,
    /// "R8" - 64-bit IEEE float
    R8,
}

impl DataType {
    /// Parse a two-character code, case-insensitively.
    ///
    /// Unrecognized codes (including the unsupported complex types X4/X8)
    /// are a hard error.
    pub fn from_code(code: &str) -> Result<Self> {
        match code.to_ascii_uppercase().as_str() {
            "MT" => Ok(DataType::Empty),
            "LK" => Ok(DataType::Link),
            "B1" => Ok(DataType::B1),
            "C1" => Ok(DataType::C1),
            "I4" => Ok(DataType::I4),
            "I8" => Ok(DataType::I8),
            "U4" => Ok(DataType::U4),
            "U8" => Ok(DataType::U8),
            "R4" => Ok(DataType::R4),
            "R8" => Ok(DataType::R8),
            _ => Err(Error::InvalidDataType(code.to_string())),
        }
    }

    /// The two-character code
    pub fn code(self) -> &'static str {
        match self {
            DataType::Empty => "MT",
            DataType::Link => "LK",
            DataType::B1 => "B1",
            DataType::C1 => "C1",
            DataType::I4 => "I4",
            DataType::I8 => "I8",
            DataType::U4 => "U4",
            DataType::U8 => "U8",
            DataType::R4 => "R4",
            DataType::R8 => "R8",
        }
    }

    /// Size of one element in bytes; 0 for the typeless codes
    pub fn element_size(self) -> usize {
        match self {
            DataType::Empty | DataType::Link => 0,
            DataType::B1 | DataType::C1 => 1,
            DataType::I4 | DataType::U4 | DataType::R4 => 4,
            DataType::I8 | DataType::U8 | DataType::R8 => 8,
        }
    }

    /// Whether the code names an actual element type (not MT/LK)
    pub fn is_data(self) -> bool {
        self.element_size() > 0
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Scalar element trait
// =============================================================================

/// An intermediate value wide enough to hold any supported element losslessly
#[derive(Debug, Clone, Copy)]
pub enum Value {
    I(i64),
    U(u64),
    F(f64),
}

/// A Rust element type with a fixed on-disk encoding and a data-type code.
///
/// Conversion between differing element types goes through [`Value`] with
/// `as`-cast semantics, matching the engine's on-the-fly coercion.
pub trait Scalar: Copy + Default + 'static {
    /// The two-character code this type stores as
    const DATA_TYPE: DataType;

    /// Append the little-endian encoding of `self`
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode from exactly `element_size` little-endian bytes
    fn read_le(bytes: &[u8]) -> Self;

    /// Widen losslessly
    fn to_value(self) -> Value;

    /// Narrow with `as`-cast semantics
    fn from_value(v: Value) -> Self;
}

macro_rules! impl_scalar_int {
    ($t:ty, $dt:expr, $variant:ident, $wide:ty) => {
        impl Scalar for $t {
            const DATA_TYPE: DataType = $dt;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }

            fn to_value(self) -> Value {
                Value::$variant(self as $wide)
            }

            fn from_value(v: Value) -> Self {
                match v {
                    Value::I(x) => x as $t,
                    Value::U(x) => x as $t,
                    Value::F(x) => x as $t,
                }
            }
        }
    };
}

impl_scalar_int!(u8, DataType::B1, U, u64);
impl_scalar_int!(i8, DataType::C1, I, i64);
impl_scalar_int!(i32, DataType::I4, I, i64);
impl_scalar_int!(i64, DataType::I8, I, i64);
impl_scalar_int!(u32, DataType::U4, U, u64);
impl_scalar_int!(u64, DataType::U8, U, u64);

macro_rules! impl_scalar_float {
    ($t:ty, $dt:expr) => {
        impl Scalar for $t {
            const DATA_TYPE: DataType = $dt;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }

            fn to_value(self) -> Value {
                Value::F(self as f64)
            }

            fn from_value(v: Value) -> Self {
                match v {
                    Value::I(x) => x as $t,
                    Value::U(x) => x as $t,
                    Value::F(x) => x as $t,
                }
            }
        }
    };
}

impl_scalar_float!(f32, DataType::R4);
impl_scalar_float!(f64, DataType::R8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in ["MT", "LK", "B1", "C1", "I4", "I8", "U4", "U8", "R4", "R8"] {
            let dt = DataType::from_code(code).unwrap();
            assert_eq!(dt.code(), code);
        }
        assert!(DataType::from_code("X4").is_err());
        assert!(DataType::from_code("zz").is_err());
        assert_eq!(DataType::from_code("r8").unwrap(), DataType::R8);
    }

    #[test]
    fn node_id_bits() {
        let id = NodeId::new(7, 42);
        assert_eq!(NodeId::from_bits(id.to_bits()), id);
        assert_eq!(id.serial(), 7);
        assert_eq!(id.obj(), 42);
    }

    #[test]
    fn scalar_coercion() {
        assert_eq!(i32::from_value(3.7f64.to_value()), 3);
        assert_eq!(f64::from_value(5i64.to_value()), 5.0);
        assert_eq!(u8::from_value(300i32.to_value()), 44);
    }
}
