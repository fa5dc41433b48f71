//! Primitive decoding at absolute offsets.
//!
//! Every decoder returns the value together with the number of bytes it
//! consumed. Short reads surface as `Truncated` at the offset of the read
//! that could not be satisfied.

use crate::error::{GGUFError, Result};
use crate::source::ByteSource;
use crate::types::{GGUFString, GGUFValueType, PrimitiveValue};

pub struct Decoder<'s, S: ?Sized> {
    source: &'s S,
}

impl<S: ?Sized> Clone for Decoder<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for Decoder<'_, S> {}

impl<'s, S: ByteSource + ?Sized> Decoder<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &'s S {
        self.source
    }

    /// Bytes left between `offset` and the end of the source.
    pub fn remaining(&self, offset: u64) -> u64 {
        self.source.size().saturating_sub(offset)
    }

    /// Borrow `len` bytes, reporting a short source as truncation.
    pub fn bytes(&self, offset: u64, len: u64) -> Result<&'s [u8]> {
        self.source.read_at(offset, len).map_err(|e| match e {
            GGUFError::OutOfBounds { .. } => GGUFError::Truncated {
                offset,
                needed: len,
            },
            other => other,
        })
    }

    fn array<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        let bytes = self.bytes(offset, N as u64)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&self, offset: u64) -> Result<u8> {
        Ok(self.array::<1>(offset)?[0])
    }

    pub fn read_u32(&self, offset: u64) -> Result<u32> {
        self.array(offset).map(u32::from_le_bytes)
    }

    pub fn read_u64(&self, offset: u64) -> Result<u64> {
        self.array(offset).map(u64::from_le_bytes)
    }

    pub fn read_bool(&self, offset: u64) -> Result<bool> {
        match self.read_u8(offset)? {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(GGUFError::InvalidBool { byte, offset }),
        }
    }

    /// Read a value-type tag, rejecting anything outside `0..=12`.
    pub fn read_value_type(&self, offset: u64) -> Result<GGUFValueType> {
        let tag = self.read_u32(offset)?;
        GGUFValueType::try_from(tag).map_err(|tag| GGUFError::InvalidValueType { tag, offset })
    }

    /// Read a length-prefixed string; the body borrows the source.
    pub fn read_string(&self, offset: u64) -> Result<(GGUFString<'s>, u64)> {
        let len = self.read_u64(offset)?;
        let body = offset + 8;
        if len > self.remaining(body) {
            return Err(GGUFError::Truncated {
                offset: body,
                needed: len,
            });
        }
        let bytes = self.bytes(body, len)?;
        Ok((GGUFString::new(bytes), 8 + len))
    }

    /// Decode one leaf value of type `value_type` at `offset`.
    ///
    /// Arrays are not leaves; asking for one yields `InvalidValueType`.
    pub fn decode_primitive(
        &self,
        offset: u64,
        value_type: GGUFValueType,
    ) -> Result<(PrimitiveValue<'s>, u64)> {
        let value = match value_type {
            GGUFValueType::Uint8 => PrimitiveValue::Uint8(self.read_u8(offset)?),
            GGUFValueType::Int8 => PrimitiveValue::Int8(i8::from_le_bytes(self.array(offset)?)),
            GGUFValueType::Uint16 => PrimitiveValue::Uint16(u16::from_le_bytes(self.array(offset)?)),
            GGUFValueType::Int16 => PrimitiveValue::Int16(i16::from_le_bytes(self.array(offset)?)),
            GGUFValueType::Uint32 => PrimitiveValue::Uint32(self.read_u32(offset)?),
            GGUFValueType::Int32 => PrimitiveValue::Int32(i32::from_le_bytes(self.array(offset)?)),
            GGUFValueType::Float32 => {
                PrimitiveValue::Float32(f32::from_le_bytes(self.array(offset)?))
            }
            GGUFValueType::Bool => PrimitiveValue::Bool(self.read_bool(offset)?),
            GGUFValueType::String => {
                let (s, consumed) = self.read_string(offset)?;
                return Ok((PrimitiveValue::String(s), consumed));
            }
            GGUFValueType::Uint64 => PrimitiveValue::Uint64(self.read_u64(offset)?),
            GGUFValueType::Int64 => PrimitiveValue::Int64(i64::from_le_bytes(self.array(offset)?)),
            GGUFValueType::Float64 => {
                PrimitiveValue::Float64(f64::from_le_bytes(self.array(offset)?))
            }
            GGUFValueType::Array => {
                return Err(GGUFError::InvalidValueType {
                    tag: value_type.tag(),
                    offset,
                });
            }
        };
        // Every non-string leaf is fixed width.
        let consumed = value_type.fixed_size().unwrap_or(0);
        Ok((value, consumed))
    }
}
