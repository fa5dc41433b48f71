//! Streaming reader for GGUF model containers.
//!
//! The reader walks a random-access [`ByteSource`] (an in-memory buffer or
//! a memory-mapped file) and reports what it finds to a [`Visitor`]:
//!
//! * the 24-byte header,
//! * every metadata entry as a key followed by its typed value, with
//!   arrays bracketed by start/end events and nested to any depth,
//! * every tensor descriptor (name, shape, element type, data offset),
//! * finally the aligned start of the tensor data region.
//!
//! Strings handed to the visitor borrow the byte source; nothing is copied
//! unless the visitor copies it. [`GGUFFile`] is a ready-made visitor that
//! collects everything into owned values.

pub mod decode;
pub mod error;
pub mod file;
pub mod header;
pub mod options;
pub mod reader;
pub mod source;
pub mod summary;
pub mod types;
pub mod visitor;
pub mod walker;

pub use error::{ErrorKind, GGUFError, Result};
pub use file::GGUFFile;
pub use options::ReaderOptions;
pub use reader::{GGUFReader, align_offset};
pub use source::{ByteSource, MappedFile};
pub use summary::{ModelSummary, QuickScanResult, file_type_name, quick_scan};
pub use types::{
    DataLayout, GGUF_ALIGNMENT_KEY, GGUF_DEFAULT_ALIGNMENT, GGUF_MAGIC, GGUF_TYPE_ARRAY_END,
    GGUF_TYPE_ARRAY_START, GGUF_VERSION, GGUFArray, GGUFHeader, GGUFMetadataKV, GGUFString,
    GGUFTensorInfo, GGUFValue, GGUFValueType, PrimitiveValue, TensorInfo, TensorType,
};
pub use visitor::Visitor;
