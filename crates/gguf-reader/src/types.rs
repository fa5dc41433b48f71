//! GGUF format types and constants.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Magic bytes `GGUF` as they appear at offset 0.
pub const GGUF_MAGIC: [u8; 4] = *b"GGUF";

/// The only GGUF version this reader accepts.
pub const GGUF_VERSION: u32 = 3;

/// Size of the fixed header prefix (magic, version, two counts).
pub const GGUF_HEADER_SIZE: u64 = 24;

/// Alignment of the tensor data region when the file does not override it.
pub const GGUF_DEFAULT_ALIGNMENT: u64 = 32;

/// Metadata key that overrides the data-region alignment.
pub const GGUF_ALIGNMENT_KEY: &str = "general.alignment";

/// In-process tag announcing the start of an array. Never valid on disk.
pub const GGUF_TYPE_ARRAY_START: u32 = 100;

/// In-process tag announcing the end of an array. Never valid on disk.
pub const GGUF_TYPE_ARRAY_END: u32 = 101;

//  Value type tag

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum GGUFValueType {
    Uint8 = 0,
    Int8 = 1,
    Uint16 = 2,
    Int16 = 3,
    Uint32 = 4,
    Int32 = 5,
    Float32 = 6,
    Bool = 7,
    String = 8,
    Array = 9,
    Uint64 = 10,
    Int64 = 11,
    Float64 = 12,
}

impl TryFrom<u32> for GGUFValueType {
    type Error = u32;

    /// Map an on-disk tag to a value type. The synthetic array tags and
    /// anything outside `0..=12` are rejected with the offending tag.
    fn try_from(tag: u32) -> std::result::Result<Self, u32> {
        Ok(match tag {
            0 => Self::Uint8,
            1 => Self::Int8,
            2 => Self::Uint16,
            3 => Self::Int16,
            4 => Self::Uint32,
            5 => Self::Int32,
            6 => Self::Float32,
            7 => Self::Bool,
            8 => Self::String,
            9 => Self::Array,
            10 => Self::Uint64,
            11 => Self::Int64,
            12 => Self::Float64,
            _ => return Err(tag),
        })
    }
}

impl GGUFValueType {
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Canonical lower-case name, e.g. `"uint32"`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Int8 => "int8",
            Self::Uint16 => "uint16",
            Self::Int16 => "int16",
            Self::Uint32 => "uint32",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Array => "array",
            Self::Uint64 => "uint64",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Uint8
                | Self::Int8
                | Self::Uint16
                | Self::Int16
                | Self::Uint32
                | Self::Int32
                | Self::Uint64
                | Self::Int64
        )
    }

    /// Payload size for fixed-width types; `None` for strings and arrays.
    pub fn fixed_size(self) -> Option<u64> {
        match self {
            Self::Uint8 | Self::Int8 | Self::Bool => Some(1),
            Self::Uint16 | Self::Int16 => Some(2),
            Self::Uint32 | Self::Int32 | Self::Float32 => Some(4),
            Self::Uint64 | Self::Int64 | Self::Float64 => Some(8),
            Self::String | Self::Array => None,
        }
    }

    /// Smallest number of bytes a value of this type can occupy on disk.
    pub(crate) fn min_encoded_size(self) -> u64 {
        match self {
            // u64 length, empty body
            Self::String => 8,
            // u32 element type + u64 count, no elements
            Self::Array => 12,
            other => other.fixed_size().unwrap_or(1),
        }
    }
}

impl fmt::Display for GGUFValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//  Tensor type tag

/// Element representation of a tensor. Tags 4 and 5 belonged to formats
/// that were withdrawn and are rejected.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum TensorType {
    F32 = 0,
    F16 = 1,
    Q4_0 = 2,
    Q4_1 = 3,
    Q5_0 = 6,
    Q5_1 = 7,
    Q8_0 = 8,
    Q8_1 = 9,
    Q2_K = 10,
    Q3_K = 11,
    Q4_K = 12,
    Q5_K = 13,
    Q6_K = 14,
    Q8_K = 15,
    I8 = 16,
    I16 = 17,
    I32 = 18,
}

impl TryFrom<u32> for TensorType {
    type Error = u32;

    fn try_from(tag: u32) -> std::result::Result<Self, u32> {
        Ok(match tag {
            0 => Self::F32,
            1 => Self::F16,
            2 => Self::Q4_0,
            3 => Self::Q4_1,
            6 => Self::Q5_0,
            7 => Self::Q5_1,
            8 => Self::Q8_0,
            9 => Self::Q8_1,
            10 => Self::Q2_K,
            11 => Self::Q3_K,
            12 => Self::Q4_K,
            13 => Self::Q5_K,
            14 => Self::Q6_K,
            15 => Self::Q8_K,
            16 => Self::I8,
            17 => Self::I16,
            18 => Self::I32,
            _ => return Err(tag),
        })
    }
}

impl TensorType {
    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::F32 => "F32",
            Self::F16 => "F16",
            Self::Q4_0 => "Q4_0",
            Self::Q4_1 => "Q4_1",
            Self::Q5_0 => "Q5_0",
            Self::Q5_1 => "Q5_1",
            Self::Q8_0 => "Q8_0",
            Self::Q8_1 => "Q8_1",
            Self::Q2_K => "Q2_K",
            Self::Q3_K => "Q3_K",
            Self::Q4_K => "Q4_K",
            Self::Q5_K => "Q5_K",
            Self::Q6_K => "Q6_K",
            Self::Q8_K => "Q8_K",
            Self::I8 => "I8",
            Self::I16 => "I16",
            Self::I32 => "I32",
        }
    }

    /// Number of elements per block, or 1 for dense types.
    pub fn block_size(self) -> u64 {
        match self {
            Self::F32 | Self::F16 | Self::I8 | Self::I16 | Self::I32 => 1,
            Self::Q4_0 | Self::Q4_1 | Self::Q5_0 | Self::Q5_1 | Self::Q8_0 | Self::Q8_1 => 32,
            Self::Q2_K | Self::Q3_K | Self::Q4_K | Self::Q5_K | Self::Q6_K | Self::Q8_K => 256,
        }
    }

    /// Bytes occupied by one block.
    pub fn block_bytes(self) -> u64 {
        match self {
            Self::F32 | Self::I32 => 4,
            Self::F16 | Self::I16 => 2,
            Self::I8 => 1,
            Self::Q4_0 => 18,
            Self::Q4_1 => 20,
            Self::Q5_0 => 22,
            Self::Q5_1 => 24,
            Self::Q8_0 => 34,
            Self::Q8_1 => 36,
            Self::Q2_K => 84,
            Self::Q3_K => 110,
            Self::Q4_K => 144,
            Self::Q5_K => 176,
            Self::Q6_K => 210,
            Self::Q8_K => 292,
        }
    }

    pub fn is_quantized(self) -> bool {
        self.block_size() > 1
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//  Header

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GGUFHeader {
    pub version: u32,
    pub tensor_count: u64,
    pub metadata_kv_count: u64,
}

/// Where the tensor data region starts, known once the directory is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLayout {
    pub header: GGUFHeader,
    pub alignment: u64,
    /// Absolute offset of the tensor data region; tensor offsets are
    /// relative to it.
    pub data_offset: u64,
}

impl DataLayout {
    /// Absolute file offset of a tensor given its directory offset.
    pub fn absolute_offset(&self, tensor_offset: u64) -> Option<u64> {
        self.data_offset.checked_add(tensor_offset)
    }
}

//  Borrowed string

/// A length-prefixed GGUF string borrowed from the byte source.
///
/// The reader does not validate UTF-8; consumers decide how strict to be.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GGUFString<'a> {
    bytes: &'a [u8],
}

impl<'a> GGUFString<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_str(&self) -> Option<&'a str> {
        std::str::from_utf8(self.bytes).ok()
    }

    pub fn to_string_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.bytes)
    }
}

impl PartialEq<str> for GGUFString<'_> {
    fn eq(&self, other: &str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<&str> for GGUFString<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl fmt::Debug for GGUFString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

impl fmt::Display for GGUFString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

//  Primitive (leaf) value

/// A decoded leaf value. Strings borrow the byte source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveValue<'a> {
    Uint8(u8),
    Int8(i8),
    Uint16(u16),
    Int16(i16),
    Uint32(u32),
    Int32(i32),
    Float32(f32),
    Bool(bool),
    String(GGUFString<'a>),
    Uint64(u64),
    Int64(i64),
    Float64(f64),
}

impl PrimitiveValue<'_> {
    pub fn value_type(&self) -> GGUFValueType {
        match self {
            Self::Uint8(_) => GGUFValueType::Uint8,
            Self::Int8(_) => GGUFValueType::Int8,
            Self::Uint16(_) => GGUFValueType::Uint16,
            Self::Int16(_) => GGUFValueType::Int16,
            Self::Uint32(_) => GGUFValueType::Uint32,
            Self::Int32(_) => GGUFValueType::Int32,
            Self::Float32(_) => GGUFValueType::Float32,
            Self::Bool(_) => GGUFValueType::Bool,
            Self::String(_) => GGUFValueType::String,
            Self::Uint64(_) => GGUFValueType::Uint64,
            Self::Int64(_) => GGUFValueType::Int64,
            Self::Float64(_) => GGUFValueType::Float64,
        }
    }

    /// Widen any integer variant; `None` for floats, bools and strings.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Uint8(v) => Some(v.into()),
            Self::Int8(v) => Some(v.into()),
            Self::Uint16(v) => Some(v.into()),
            Self::Int16(v) => Some(v.into()),
            Self::Uint32(v) => Some(v.into()),
            Self::Int32(v) => Some(v.into()),
            Self::Uint64(v) => Some(v.into()),
            Self::Int64(v) => Some(v.into()),
            _ => None,
        }
    }

    pub fn to_owned_value(&self) -> GGUFValue {
        match *self {
            Self::Uint8(v) => GGUFValue::Uint8(v),
            Self::Int8(v) => GGUFValue::Int8(v),
            Self::Uint16(v) => GGUFValue::Uint16(v),
            Self::Int16(v) => GGUFValue::Int16(v),
            Self::Uint32(v) => GGUFValue::Uint32(v),
            Self::Int32(v) => GGUFValue::Int32(v),
            Self::Float32(v) => GGUFValue::Float32(v),
            Self::Bool(v) => GGUFValue::Bool(v),
            Self::String(s) => GGUFValue::String(s.to_string_lossy().into_owned()),
            Self::Uint64(v) => GGUFValue::Uint64(v),
            Self::Int64(v) => GGUFValue::Int64(v),
            Self::Float64(v) => GGUFValue::Float64(v),
        }
    }
}

//  Owned value tree

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GGUFArray {
    pub element_type: GGUFValueType,
    pub values: Vec<GGUFValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GGUFValue {
    Uint8(u8),
    Int8(i8),
    Uint16(u16),
    Int16(i16),
    Uint32(u32),
    Int32(i32),
    Float32(f32),
    Bool(bool),
    String(String),
    Array(GGUFArray),
    Uint64(u64),
    Int64(i64),
    Float64(f64),
}

impl GGUFValue {
    pub fn value_type(&self) -> GGUFValueType {
        match self {
            Self::Uint8(_) => GGUFValueType::Uint8,
            Self::Int8(_) => GGUFValueType::Int8,
            Self::Uint16(_) => GGUFValueType::Uint16,
            Self::Int16(_) => GGUFValueType::Int16,
            Self::Uint32(_) => GGUFValueType::Uint32,
            Self::Int32(_) => GGUFValueType::Int32,
            Self::Float32(_) => GGUFValueType::Float32,
            Self::Bool(_) => GGUFValueType::Bool,
            Self::String(_) => GGUFValueType::String,
            Self::Array(_) => GGUFValueType::Array,
            Self::Uint64(_) => GGUFValueType::Uint64,
            Self::Int64(_) => GGUFValueType::Int64,
            Self::Float64(_) => GGUFValueType::Float64,
        }
    }

    /// Any integer that fits in `u32`.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|v| u32::try_from(v).ok())
    }

    /// Any integer that fits in `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Uint64(v) => Some(*v),
            other => other.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    /// Any integer that fits in `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Uint8(v) => Some(v.into()),
            Self::Int8(v) => Some(v.into()),
            Self::Uint16(v) => Some(v.into()),
            Self::Int16(v) => Some(v.into()),
            Self::Uint32(v) => Some(v.into()),
            Self::Int32(v) => Some(v.into()),
            Self::Uint64(v) => i64::try_from(v).ok(),
            Self::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float32(v) => Some(*v),
            Self::Float64(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&GGUFArray> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }
}

//  Metadata KV

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GGUFMetadataKV {
    pub key: String,
    pub value_type: GGUFValueType,
    pub value: GGUFValue,
}

//  Tensor descriptors

/// A tensor directory entry as seen during traversal. The name borrows the
/// byte source; `dims` is decode scratch owned by the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo<'a> {
    pub name: GGUFString<'a>,
    pub dims: Vec<u64>,
    pub tensor_type: TensorType,
    /// Offset relative to the start of the tensor data region.
    pub offset: u64,
}

impl TensorInfo<'_> {
    pub fn element_count(&self) -> Option<u64> {
        element_count(&self.dims)
    }

    pub fn byte_len(&self) -> Option<u64> {
        tensor_byte_len(self.tensor_type, &self.dims)
    }

    pub fn to_owned_info(&self) -> GGUFTensorInfo {
        GGUFTensorInfo {
            name: self.name.to_string_lossy().into_owned(),
            dims: self.dims.clone(),
            tensor_type: self.tensor_type,
            offset: self.offset,
        }
    }
}

/// Owned copy of a [`TensorInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GGUFTensorInfo {
    pub name: String,
    pub dims: Vec<u64>,
    pub tensor_type: TensorType,
    pub offset: u64,
}

impl GGUFTensorInfo {
    pub fn element_count(&self) -> Option<u64> {
        element_count(&self.dims)
    }

    pub fn byte_len(&self) -> Option<u64> {
        tensor_byte_len(self.tensor_type, &self.dims)
    }
}

fn element_count(dims: &[u64]) -> Option<u64> {
    dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d))
}

/// Size of a tensor's payload: whole blocks covering every element.
fn tensor_byte_len(tensor_type: TensorType, dims: &[u64]) -> Option<u64> {
    element_count(dims)?
        .div_ceil(tensor_type.block_size())
        .checked_mul(tensor_type.block_bytes())
}
