//! Knowledge store: classified, embedded items keyed by `(source, source_id)`.
//!
//! - [`store`]: synchronous write path (hash lookup, insert/update in one transaction)
//! - [`search`]: exact cosine nearest-neighbor search over stored embeddings
//! - [`service`]: async [`service::KnowledgeStore`] that wires in embedding and classification
//! - [`stats`]: counts by source and category

pub mod search;
pub mod service;
pub mod stats;
pub mod store;
pub mod types;

use sha2::{Digest, Sha256};

/// View an f32 embedding as raw bytes, the layout sqlite-vec reads.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}

/// Decode a stored embedding BLOB. Trailing bytes that don't fill an f32 are dropped.
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(std::mem::size_of::<f32>())
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Canonical digest of item content: `sha256:<hex>` over the raw UTF-8 bytes.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
