//! Reader configuration.

use serde::{Deserialize, Serialize};

use crate::types::GGUF_DEFAULT_ALIGNMENT;

/// Nesting depth every reader must accept, whatever the configuration says.
pub const MIN_ARRAY_DEPTH: usize = 16;

/// Limits and defaults applied while reading a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// Largest accepted tensor rank.
    #[serde(default = "default_max_dims")]
    pub max_dims: u32,
    /// Largest accepted array nesting depth. Values below 16 are raised to 16.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Data-region alignment used when `general.alignment` is absent.
    #[serde(default = "default_alignment")]
    pub default_alignment: u64,
}

fn default_max_dims() -> u32 {
    4
}
fn default_max_depth() -> usize {
    64
}
fn default_alignment() -> u64 {
    GGUF_DEFAULT_ALIGNMENT
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_dims: default_max_dims(),
            max_depth: default_max_depth(),
            default_alignment: default_alignment(),
        }
    }
}

impl ReaderOptions {
    /// Parse options from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn with_max_dims(mut self, max_dims: u32) -> Self {
        self.max_dims = max_dims;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_default_alignment(mut self, alignment: u64) -> Self {
        self.default_alignment = alignment;
        self
    }

    pub(crate) fn effective_max_depth(&self) -> usize {
        self.max_depth.max(MIN_ARRAY_DEPTH)
    }

    pub(crate) fn effective_default_alignment(&self) -> u64 {
        if self.default_alignment == 0 {
            GGUF_DEFAULT_ALIGNMENT
        } else {
            self.default_alignment
        }
    }
}
