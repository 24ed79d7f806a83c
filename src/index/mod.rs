//! In-memory indexes consulted before the metadata store.

pub mod bloom;
pub mod trie;

pub use bloom::BloomFilter;
pub use trie::PrefixIndex;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Invalid index size: {0}")]
    InvalidSize(&'static str),
    #[error("Index allocation failed")]
    ResourceExhausted,
}
