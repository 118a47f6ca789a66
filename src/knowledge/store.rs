//! Write path: revision lookup, insert or in-place update, source removal.
//!
//! [`write_item`] is the single writer. It runs inside one transaction per
//! item: look up the existing row for `(source, source_id)`, then insert a new
//! row or update the existing one while keeping its id, rowid, and
//! `created_at`.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use super::types::{KnowledgeItem, NewItem, UpsertOutcome, UpsertResult};
use crate::classify::{Category, MemoryClassification, Metadata};

/// Metadata keys that change without the note changing (a touched file).
const VOLATILE_METADATA: &[&str] = &["modified_at"];

/// What the store last recorded for one `(source, source_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRevision {
    pub id: String,
    pub content_hash: String,
    pub metadata: Metadata,
    /// Model that produced the stored vector; `None` when nothing is embedded.
    pub embedding_model: Option<String>,
}

impl StoredRevision {
    /// Whether writing `content_hash` and `metadata` embedded with `model`
    /// would leave the row as it is.
    pub fn is_current(&self, content_hash: &str, metadata: &Metadata, model: &str) -> bool {
        self.content_hash == content_hash
            && self.embedding_model.as_deref() == Some(model)
            && stable_metadata(&self.metadata) == stable_metadata(metadata)
    }
}

fn stable_metadata(metadata: &Metadata) -> Metadata {
    let mut stable = metadata.clone();
    for key in VOLATILE_METADATA {
        stable.remove(*key);
    }
    stable
}

/// The stored revision of `(source, source_id)`, if the item exists.
pub fn find_revision(
    conn: &Connection,
    source: &str,
    source_id: &str,
) -> Result<Option<StoredRevision>> {
    let found = conn
        .query_row(
            "SELECT id, content_hash, metadata, embedding_model FROM knowledge_items \
             WHERE source = ?1 AND source_id = ?2",
            params![source, source_id],
            |row| {
                let metadata: Option<String> = row.get(2)?;
                Ok(StoredRevision {
                    id: row.get(0)?,
                    content_hash: row.get(1)?,
                    metadata: metadata
                        .and_then(|s| serde_json::from_str(&s).ok())
                        .unwrap_or_default(),
                    embedding_model: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(found)
}

/// Insert or update one item. Callers decide beforehand whether the content
/// changed; this always writes.
pub fn write_item(
    conn: &mut Connection,
    item: &NewItem,
    content_hash: &str,
    embedding: Option<&[f32]>,
    embedding_model: Option<&str>,
    classification: Option<&MemoryClassification>,
) -> Result<UpsertResult> {
    let tx = conn.transaction()?;

    let existing = find_id(&tx, &item.source, &item.source_id)?;
    let now = chrono::Utc::now().to_rfc3339();
    let embedding_bytes = embedding.map(super::embedding_to_bytes);
    let category = classification.map(|c| c.primary.as_str());
    let classification_json = classification.map(serde_json::to_string).transpose()?;
    let metadata_json = serde_json::to_string(&item.metadata)?;

    let result = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE knowledge_items SET path = ?1, content = ?2, content_hash = ?3, \
                 embedding = ?4, embedding_model = ?5, category = ?6, classification = ?7, \
                 metadata = ?8, updated_at = ?9 \
                 WHERE id = ?10",
                params![
                    item.path,
                    item.content,
                    content_hash,
                    embedding_bytes,
                    embedding_model,
                    category,
                    classification_json,
                    metadata_json,
                    now,
                    id,
                ],
            )?;
            UpsertResult {
                id,
                outcome: UpsertOutcome::Updated,
            }
        }
        None => {
            let id = uuid::Uuid::now_v7().to_string();
            tx.execute(
                "INSERT INTO knowledge_items (id, source, source_id, path, content, content_hash, \
                 embedding, embedding_model, category, classification, metadata, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                params![
                    id,
                    item.source,
                    item.source_id,
                    item.path,
                    item.content,
                    content_hash,
                    embedding_bytes,
                    embedding_model,
                    category,
                    classification_json,
                    metadata_json,
                    now,
                ],
            )?;
            UpsertResult {
                id,
                outcome: UpsertOutcome::Created,
            }
        }
    };

    tx.commit()?;
    Ok(result)
}

fn find_id(tx: &Transaction, source: &str, source_id: &str) -> Result<Option<String>> {
    let id = tx
        .query_row(
            "SELECT id FROM knowledge_items WHERE source = ?1 AND source_id = ?2",
            params![source, source_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Fetch one item with its embedding and classification.
pub fn get_item(conn: &Connection, source: &str, source_id: &str) -> Result<Option<KnowledgeItem>> {
    let item = conn
        .query_row(
            "SELECT id, source, source_id, path, content, content_hash, embedding, \
             classification, metadata, created_at, updated_at \
             FROM knowledge_items WHERE source = ?1 AND source_id = ?2",
            params![source, source_id],
            item_from_row,
        )
        .optional()?;
    Ok(item)
}

/// Number of embedded items, optionally restricted to one category.
pub fn count_embedded(conn: &Connection, category: Option<Category>) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM knowledge_items \
         WHERE embedding IS NOT NULL AND (?1 IS NULL OR category = ?1)",
        params![category.map(|c| c.as_str())],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

/// Embedded items whose vector came from a model other than `model`.
pub fn count_stale_embeddings(conn: &Connection, model: &str) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM knowledge_items \
         WHERE embedding IS NOT NULL AND (embedding_model IS NULL OR embedding_model != ?1)",
        params![model],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

/// Delete every item of `source`. Returns how many rows went away.
pub fn remove_source(conn: &Connection, source: &str) -> Result<usize> {
    let removed = conn.execute("DELETE FROM knowledge_items WHERE source = ?1", params![source])?;
    tracing::info!(source, removed, "source removed");
    Ok(removed)
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<KnowledgeItem> {
    let embedding: Option<Vec<u8>> = row.get(6)?;
    let classification: Option<String> = row.get(7)?;
    let metadata: Option<String> = row.get(8)?;
    Ok(KnowledgeItem {
        id: row.get(0)?,
        source: row.get(1)?,
        source_id: row.get(2)?,
        path: row.get(3)?,
        content: row.get(4)?,
        content_hash: row.get(5)?,
        embedding: embedding.map(|b| super::bytes_to_embedding(&b)),
        classification: classification.and_then(|s| serde_json::from_str(&s).ok()),
        metadata: metadata
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
