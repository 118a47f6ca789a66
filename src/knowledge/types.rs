//! Knowledge item records.

use serde::{Deserialize, Serialize};

use crate::classify::{MemoryClassification, Metadata};

/// A stored item, matching the `knowledge_items` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// UUID v7 primary key.
    pub id: String,
    /// Knowledge source the item was synced from (e.g. `"vault"`, `"jira"`).
    pub source: String,
    /// Identifier of the item inside its source. Unique per source.
    pub source_id: String,
    pub path: String,
    pub content: String,
    /// `sha256:<hex>` digest of `content`.
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub classification: Option<MemoryClassification>,
    pub metadata: Metadata,
    /// RFC 3339 timestamps.
    pub created_at: String,
    pub updated_at: String,
}

/// An item as handed over by a source, before hashing, embedding, and classification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub source: String,
    pub source_id: String,
    pub path: String,
    pub content: String,
    pub metadata: Metadata,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// Content hash matched the stored row; nothing was recomputed or written.
    Unchanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpsertResult {
    pub id: String,
    pub outcome: UpsertOutcome,
}
