//! Quick summary of the well-known `general.*` / `<arch>.*` keys.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::file::GGUFFile;
use crate::options::ReaderOptions;
use crate::source::{ByteSource, MappedFile};
use crate::types::GGUFHeader;

/// Headline facts about a model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub header: GGUFHeader,
    pub architecture: Option<String>,
    pub name: Option<String>,
    pub file_type: Option<u32>,
    pub file_type_name: Option<String>,
    pub context_length: Option<u32>,
    pub embedding_length: Option<u32>,
    pub chat_template: Option<String>,
    pub alignment: u64,
    pub data_offset: u64,
}

impl ModelSummary {
    pub fn from_file(file: &GGUFFile) -> Self {
        let string = |key: &str| file.get(key).and_then(|v| v.as_str()).map(String::from);

        let architecture = string("general.architecture");
        let file_type = file.get("general.file_type").and_then(|v| v.as_u32());

        // Per-architecture keys are only meaningful when the architecture is known.
        let arch_u32 = |suffix: &str| {
            let arch = architecture.as_deref()?;
            file.get(&format!("{arch}.{suffix}")).and_then(|v| v.as_u32())
        };

        Self {
            header: file.header,
            name: string("general.name"),
            file_type,
            file_type_name: file_type.map(file_type_name).map(String::from),
            context_length: arch_u32("context_length"),
            embedding_length: arch_u32("embedding_length"),
            chat_template: string("tokenizer.chat_template"),
            alignment: file.layout.alignment,
            data_offset: file.layout.data_offset,
            architecture,
        }
    }
}

/// Outcome of [`quick_scan`] on a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickScanResult {
    pub file_path: PathBuf,
    pub file_size: u64,
    pub summary: ModelSummary,
    pub tensor_bytes: u64,
}

/// Map `path`, read its header, metadata and directory, and summarise it.
pub fn quick_scan(path: &Path) -> Result<QuickScanResult> {
    let source = MappedFile::open(path)?;
    let file = GGUFFile::parse(&source, ReaderOptions::default())?;
    let summary = ModelSummary::from_file(&file);
    let tensor_bytes = file
        .tensors
        .iter()
        .filter_map(|t| t.byte_len())
        .fold(0u64, u64::saturating_add);

    debug!(
        path = %path.display(),
        architecture = ?summary.architecture,
        name = ?summary.name,
        tensors = file.tensors.len(),
        "quick scan complete"
    );

    Ok(QuickScanResult {
        file_path: path.to_path_buf(),
        file_size: source.size(),
        summary,
        tensor_bytes,
    })
}

/// Map a `general.file_type` value to a short quantisation name.
pub fn file_type_name(ft: u32) -> &'static str {
    match ft {
        0 => "F32",
        1 => "F16",
        2 => "Q4_0",
        3 => "Q4_1",
        7 => "Q8_0",
        8 => "Q5_0",
        9 => "Q5_1",
        10 => "Q2_K",
        11 => "Q3_K_S",
        12 => "Q3_K_M",
        13 => "Q3_K_L",
        14 => "Q4_K_S",
        15 => "Q4_K_M",
        16 => "Q5_K_S",
        17 => "Q5_K_M",
        18 => "Q6_K",
        19 => "IQ2_XXS",
        20 => "IQ2_XS",
        21 => "Q2_K_S",
        22 => "IQ3_XS",
        23 => "IQ3_XXS",
        24 => "IQ1_S",
        25 => "IQ4_NL",
        26 => "IQ3_S",
        27 => "IQ3_M",
        28 => "IQ2_S",
        29 => "IQ2_M",
        30 => "IQ4_XS",
        31 => "IQ1_M",
        32 => "BF16",
        _ => "Unknown",
    }
}
