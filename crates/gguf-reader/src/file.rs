//! Owned view of a GGUF file, built by collecting a traversal.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use crate::error::{GGUFError, Result};
use crate::options::ReaderOptions;
use crate::reader::GGUFReader;
use crate::source::ByteSource;
use crate::types::*;
use crate::visitor::Visitor;

/// Header, metadata and tensor directory of a file, copied out of the
/// byte source. Tensor payloads stay in the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GGUFFile {
    pub header: GGUFHeader,
    pub metadata: Vec<GGUFMetadataKV>,
    pub tensors: Vec<GGUFTensorInfo>,
    pub layout: DataLayout,
}

impl GGUFFile {
    pub fn parse<S: ByteSource + ?Sized>(source: &S, options: ReaderOptions) -> Result<Self> {
        let mut collector = Collector::default();
        let layout = GGUFReader::with_options(source, options).visit(&mut collector)?;
        Ok(Self {
            header: layout.header,
            metadata: collector.metadata,
            tensors: collector.tensors,
            layout,
        })
    }

    /// First metadata value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&GGUFValue> {
        self.metadata.iter().find(|kv| kv.key == key).map(|kv| &kv.value)
    }

    pub fn tensor(&self, name: &str) -> Option<&GGUFTensorInfo> {
        self.tensors.iter().find(|t| t.name == name)
    }

    /// Borrow a tensor's payload from the source it was parsed from.
    pub fn tensor_data<'s, S: ByteSource + ?Sized>(
        &self,
        source: &'s S,
        info: &GGUFTensorInfo,
    ) -> Result<&'s [u8]> {
        let size = source.size();
        let overflow = || GGUFError::OutOfBounds {
            offset: self.layout.data_offset,
            len: info.offset,
            size,
        };
        let start = self.layout.absolute_offset(info.offset).ok_or_else(overflow)?;
        let len = info.byte_len().ok_or_else(overflow)?;
        source.read_at(start, len)
    }
}

/// Rebuilds owned values from the event stream.
#[derive(Default)]
struct Collector {
    metadata: Vec<GGUFMetadataKV>,
    tensors: Vec<GGUFTensorInfo>,
    pending: Option<(String, GGUFValueType)>,
    open_arrays: Vec<GGUFArray>,
}

impl Collector {
    fn push(&mut self, value: GGUFValue) {
        if let Some(array) = self.open_arrays.last_mut() {
            array.values.push(value);
        } else if let Some((key, value_type)) = self.pending.take() {
            self.metadata.push(GGUFMetadataKV {
                key,
                value_type,
                value,
            });
        }
    }
}

impl<'a> Visitor<'a> for Collector {
    fn on_key(&mut self, key: GGUFString<'a>, value_type: GGUFValueType) -> ControlFlow<()> {
        self.pending = Some((key.to_string_lossy().into_owned(), value_type));
        ControlFlow::Continue(())
    }

    fn on_primitive(&mut self, value: PrimitiveValue<'a>) -> ControlFlow<()> {
        self.push(value.to_owned_value());
        ControlFlow::Continue(())
    }

    fn on_array_start(&mut self, element_type: GGUFValueType, len: u64) -> ControlFlow<()> {
        // The walker has already checked `len` against the bytes left, but
        // cap the up-front reservation anyway.
        let capacity = usize::try_from(len.min(1024)).unwrap_or(0);
        self.open_arrays.push(GGUFArray {
            element_type,
            values: Vec::with_capacity(capacity),
        });
        ControlFlow::Continue(())
    }

    fn on_array_end(&mut self) -> ControlFlow<()> {
        if let Some(array) = self.open_arrays.pop() {
            self.push(GGUFValue::Array(array));
        }
        ControlFlow::Continue(())
    }

    fn on_tensor(&mut self, tensor: &TensorInfo<'a>) -> ControlFlow<()> {
        self.tensors.push(tensor.to_owned_info());
        ControlFlow::Continue(())
    }
}
