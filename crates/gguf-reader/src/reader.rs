//! Traversal driver: header, metadata section, tensor directory, and the
//! location of the tensor data region.

use tracing::{debug, trace, warn};

use crate::decode::Decoder;
use crate::error::{GGUFError, Result};
use crate::header::read_header;
use crate::options::ReaderOptions;
use crate::source::ByteSource;
use crate::types::{DataLayout, GGUF_ALIGNMENT_KEY, GGUFHeader, TensorInfo, TensorType};
use crate::visitor::Visitor;
use crate::walker::{ValueWalker, proceed};

/// Smallest metadata entry: empty key, tag, one-byte value.
const MIN_KV_SIZE: u64 = 8 + 4 + 1;

/// Smallest tensor descriptor: empty name, zero dims, type, offset.
const MIN_TENSOR_INFO_SIZE: u64 = 8 + 4 + 4 + 8;

/// Streams the contents of a GGUF byte source into a [`Visitor`].
///
/// The reader holds no state between traversals; `visit` may be called
/// repeatedly and several readers may share one source.
pub struct GGUFReader<'s, S: ?Sized> {
    source: &'s S,
    options: ReaderOptions,
}

impl<'s, S: ByteSource + ?Sized> GGUFReader<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Self::with_options(source, ReaderOptions::default())
    }

    pub fn with_options(source: &'s S, options: ReaderOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn source(&self) -> &'s S {
        self.source
    }

    /// Read only the header.
    pub fn read_header(&self) -> Result<GGUFHeader> {
        read_header(&Decoder::new(self.source)).map(|(header, _)| header)
    }

    /// Walk the whole file, delivering events to `visitor`.
    ///
    /// On failure the visitor receives `on_error` (except for aborts it
    /// requested) and the error is returned; events already delivered are
    /// not retracted.
    pub fn visit<V: Visitor<'s> + ?Sized>(&self, visitor: &mut V) -> Result<DataLayout> {
        match self.traverse(visitor) {
            Ok(layout) => {
                visitor.on_done(&layout);
                Ok(layout)
            }
            Err(err) => {
                if !matches!(err, GGUFError::Aborted { .. }) {
                    debug!(error = %err, "GGUF traversal failed");
                    visitor.on_error(&err);
                }
                Err(err)
            }
        }
    }

    fn traverse<V: Visitor<'s> + ?Sized>(&self, visitor: &mut V) -> Result<DataLayout> {
        let decoder = Decoder::new(self.source);
        let (header, pos) = read_header(&decoder)?;
        proceed(visitor.on_header(&header), pos)?;

        let (pos, alignment) = self.read_metadata(decoder, pos, header.metadata_kv_count, visitor)?;
        debug!(offset = pos, alignment, "metadata section done");

        let (pos, extents) = self.read_tensor_directory(decoder, pos, header.tensor_count, visitor)?;
        let data_offset = align_offset(pos, alignment).ok_or(GGUFError::OutOfBounds {
            offset: pos,
            len: alignment,
            size: self.source.size(),
        })?;
        debug!(directory_end = pos, data_offset, "tensor directory done");

        if header.tensor_count > 0 {
            check_payloads(self.source.size(), data_offset, &extents)?;
        }

        Ok(DataLayout {
            header,
            alignment,
            data_offset,
        })
    }

    /// Walk `count` metadata entries starting at `pos`. Returns the offset
    /// past the section and the data-region alignment it declares.
    fn read_metadata<V: Visitor<'s> + ?Sized>(
        &self,
        decoder: Decoder<'s, S>,
        mut pos: u64,
        count: u64,
        visitor: &mut V,
    ) -> Result<(u64, u64)> {
        check_count(&decoder, pos, count, MIN_KV_SIZE)?;

        let walker = ValueWalker::new(decoder, self.options.effective_max_depth());
        let mut alignment = self.options.effective_default_alignment();

        for index in 0..count {
            let (key, consumed) = decoder.read_string(pos)?;
            pos += consumed;
            let value_type = decoder.read_value_type(pos)?;
            pos += 4;
            trace!(index, key = %key, %value_type, "metadata entry");
            proceed(visitor.on_key(key, value_type), pos)?;

            if key == GGUF_ALIGNMENT_KEY && value_type.is_integer() {
                let (value, _) = decoder.decode_primitive(pos, value_type)?;
                match value.as_i128().and_then(|v| u64::try_from(v).ok()) {
                    Some(v) if v > 0 => alignment = v,
                    _ => warn!(?value, "ignoring unusable {GGUF_ALIGNMENT_KEY}"),
                }
            }
            pos = walker.walk(pos, value_type, visitor)?;
        }
        Ok((pos, alignment))
    }

    /// Walk `count` tensor descriptors. Returns the offset past the
    /// directory and each tensor's `(offset, byte_len)` in the data region.
    fn read_tensor_directory<V: Visitor<'s> + ?Sized>(
        &self,
        decoder: Decoder<'s, S>,
        mut pos: u64,
        count: u64,
        visitor: &mut V,
    ) -> Result<(u64, Vec<(u64, Option<u64>)>)> {
        check_count(&decoder, pos, count, MIN_TENSOR_INFO_SIZE)?;

        // `count` was checked against the bytes left, so this stays bounded.
        let mut extents = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
        for _ in 0..count {
            let (name, consumed) = decoder.read_string(pos)?;
            pos += consumed;

            let n_dims = decoder.read_u32(pos)?;
            if n_dims > self.options.max_dims {
                return Err(GGUFError::TooManyDims {
                    n_dims,
                    max: self.options.max_dims,
                    offset: pos,
                });
            }
            pos += 4;

            let dims_len = u64::from(n_dims) * 8;
            if dims_len > decoder.remaining(pos) {
                return Err(GGUFError::Truncated {
                    offset: pos,
                    needed: dims_len,
                });
            }
            let mut dims = Vec::with_capacity(n_dims as usize);
            for _ in 0..n_dims {
                dims.push(decoder.read_u64(pos)?);
                pos += 8;
            }

            let tag = decoder.read_u32(pos)?;
            let tensor_type = TensorType::try_from(tag)
                .map_err(|tag| GGUFError::InvalidTensorType { tag, offset: pos })?;
            pos += 4;

            let offset = decoder.read_u64(pos)?;
            pos += 8;

            let info = TensorInfo {
                name,
                dims,
                tensor_type,
                offset,
            };
            trace!(name = %info.name, dims = ?info.dims, %tensor_type, offset, "tensor");
            proceed(visitor.on_tensor(&info), pos)?;
            extents.push((offset, info.byte_len()));
        }
        Ok((pos, extents))
    }
}

/// Fail fast when `count` entries of at least `min_size` bytes cannot fit
/// in what is left of the source.
fn check_count<S: ByteSource + ?Sized>(
    decoder: &Decoder<'_, S>,
    pos: u64,
    count: u64,
    min_size: u64,
) -> Result<()> {
    let remaining = decoder.remaining(pos);
    match count.checked_mul(min_size) {
        Some(needed) if needed <= remaining => Ok(()),
        needed => Err(GGUFError::Truncated {
            offset: pos,
            needed: needed.unwrap_or(u64::MAX),
        }),
    }
}

/// Fail with `Truncated` at the first missing byte when the alignment
/// padding or any declared tensor payload runs past the end of the source.
fn check_payloads(size: u64, data_offset: u64, extents: &[(u64, Option<u64>)]) -> Result<()> {
    if data_offset > size {
        return Err(GGUFError::Truncated {
            offset: size,
            needed: data_offset - size,
        });
    }
    for &(offset, byte_len) in extents {
        let end = byte_len
            .and_then(|len| data_offset.checked_add(offset)?.checked_add(len))
            .unwrap_or(u64::MAX);
        if end > size {
            return Err(GGUFError::Truncated {
                offset: size,
                needed: end - size,
            });
        }
    }
    Ok(())
}

/// Round `offset` up to the next multiple of `alignment` (> 0).
pub fn align_offset(offset: u64, alignment: u64) -> Option<u64> {
    offset.checked_next_multiple_of(alignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_rounding() {
        assert_eq!(align_offset(24, 32), Some(32));
        assert_eq!(align_offset(32, 32), Some(32));
        assert_eq!(align_offset(33, 32), Some(64));
        assert_eq!(align_offset(10, 1), Some(10));
        assert_eq!(align_offset(7, 3), Some(9));
        assert_eq!(align_offset(u64::MAX, 2), None);
    }

    #[test]
    fn header_only_file() {
        let mut bytes = b"GGUF".to_vec();
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);

        let reader = GGUFReader::new(bytes.as_slice());
        assert_eq!(reader.read_header().unwrap().tensor_count, 0);
        let layout = reader.visit(&mut ()).unwrap();
        assert_eq!(layout.alignment, 32);
        assert_eq!(layout.data_offset, 32);
    }

    #[test]
    fn impossible_counts_are_truncated() {
        let mut bytes = b"GGUF".to_vec();
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());

        let err = GGUFReader::new(bytes.as_slice()).visit(&mut ()).unwrap_err();
        assert!(matches!(err, GGUFError::Truncated { offset: 24, needed: u64::MAX }));
    }

    fn one_tensor_header() -> Vec<u8> {
        let mut bytes = b"GGUF".to_vec();
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.push(b'w');
        bytes
    }

    #[test]
    fn huge_rank_is_truncated_before_allocating() {
        let mut bytes = one_tensor_header();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.resize(48, 0);

        let opts = ReaderOptions::default().with_max_dims(u32::MAX);
        let err = GGUFReader::with_options(bytes.as_slice(), opts)
            .visit(&mut ())
            .unwrap_err();
        assert!(matches!(
            err,
            GGUFError::Truncated {
                offset: 37,
                needed
            } if needed == u64::from(u32::MAX) * 8
        ));
    }

    #[test]
    fn tensor_payload_must_fit() {
        // One F32 tensor of 2 elements; directory ends at 61, data at 64.
        let mut bytes = one_tensor_header();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&2u64.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        assert_eq!(bytes.len(), 61);
        bytes.resize(72, 0);

        let layout = GGUFReader::new(bytes.as_slice()).visit(&mut ()).unwrap();
        assert_eq!(layout.data_offset, 64);

        for cut in [61, 63, 64, 70, 71] {
            let err = GGUFReader::new(&bytes[..cut]).visit(&mut ()).unwrap_err();
            assert!(
                matches!(err, GGUFError::Truncated { offset, .. } if offset == cut as u64),
                "cut at {cut}: {err}"
            );
        }
    }

    #[test]
    fn payload_extents_overflowing_are_truncated() {
        assert!(check_payloads(100, 32, &[(0, Some(68))]).is_ok());
        assert!(check_payloads(100, 32, &[(u64::MAX, Some(1))]).is_err());
        assert!(check_payloads(100, 32, &[(0, None)]).is_err());
        let err = check_payloads(16, 32, &[]).unwrap_err();
        assert!(matches!(err, GGUFError::Truncated { offset: 16, needed: 16 }));
    }
}
