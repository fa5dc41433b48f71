use tracing::debug;

use crate::decode::Decoder;
use crate::error::{GGUFError, Result};
use crate::source::ByteSource;
use crate::types::{GGUF_HEADER_SIZE, GGUF_MAGIC, GGUF_VERSION, GGUFHeader};

/// Read and validate the fixed 24-byte header at offset 0.
///
/// Returns the header and the offset of the first metadata entry.
pub fn read_header<S: ByteSource + ?Sized>(decoder: &Decoder<'_, S>) -> Result<(GGUFHeader, u64)> {
    let magic = decoder.bytes(0, 4)?;
    if magic != GGUF_MAGIC {
        let mut found = [0u8; 4];
        found.copy_from_slice(magic);
        return Err(GGUFError::BadMagic { found, offset: 0 });
    }

    let version = decoder.read_u32(4)?;
    if version != GGUF_VERSION {
        return Err(GGUFError::UnsupportedVersion { version, offset: 4 });
    }

    let header = GGUFHeader {
        version,
        tensor_count: decoder.read_u64(8)?,
        metadata_kv_count: decoder.read_u64(16)?,
    };
    debug!(
        tensors = header.tensor_count,
        metadata = header.metadata_kv_count,
        "read GGUF header"
    );
    Ok((header, GGUF_HEADER_SIZE))
}
