//! Storage footprint of the ellpack-block representation against the dense matrix.
//!
//! Every dense element takes one 32-bit word. The compressed matrix keeps its values as words
//! and adds 2 bits of position metadata per kept entry, packed 16 to a word.

use serde::{Deserialize, Serialize};

pub const WORD_BITS: u64 = 32;
pub const METADATA_BITS_PER_ENTRY: u64 = 2;

/// the storage of one matrix before and after compression, in words
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageCost {
    pub original_words: u64,
    pub compressed_words: f64,
    pub metadata_words: f64,
}

impl StorageCost {
    pub fn is_beneficial(&self) -> bool {
        self.compressed_words < self.original_words as f64
    }

    /// compressed size over dense size
    pub fn ratio(&self) -> f64 {
        if self.original_words == 0 {
            return 0.;
        }
        self.compressed_words / self.original_words as f64
    }
}

/// estimate the storage of a `rows x cols` matrix compressed to `compressed_rows x compressed_cols`
///
/// ```
/// use nm_sweep::sparsity::estimate;
/// let cost = estimate(100, 100, 50, 100);
/// assert_eq!(cost.original_words, 10000);
/// assert_eq!(cost.metadata_words, 312.5);
/// assert_eq!(cost.compressed_words, 5312.5);
/// assert!(cost.is_beneficial());
/// ```
pub fn estimate(rows: u64, cols: u64, compressed_rows: u64, compressed_cols: u64) -> StorageCost {
    let original_words = rows * cols;
    let entries = compressed_rows * compressed_cols;
    let metadata_words = (entries * METADATA_BITS_PER_ENTRY) as f64 / WORD_BITS as f64;
    StorageCost {
        original_words,
        compressed_words: entries as f64 + metadata_words,
        metadata_words,
    }
}
