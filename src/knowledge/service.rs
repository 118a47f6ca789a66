//! Async facade over the knowledge store.
//!
//! [`KnowledgeStore`] owns the shared connection and the injected
//! collaborators (embedding provider and ensemble classifier). It never talks
//! to an AI service itself; everything model-shaped comes in through those two
//! handles. Database work runs on the blocking pool behind a mutex, one
//! transaction per item.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::search::{similarity_search, SearchHit, SearchOptions, SimilarityQuery};
use super::stats::{knowledge_stats, KnowledgeStats};
use super::types::{KnowledgeItem, NewItem, UpsertOutcome, UpsertResult};
use super::{content_hash, store};
use crate::classify::ensemble::EnsembleClassifier;
use crate::classify::Category;
use crate::config::EmbeddingConfig;
use crate::embedding::{embed_with_deadline, EmbeddingProvider};
use crate::retry::RetryPolicy;

#[derive(Clone)]
pub struct KnowledgeStore {
    db: Arc<Mutex<Connection>>,
    embedding: Arc<dyn EmbeddingProvider>,
    classifier: Arc<EnsembleClassifier>,
    embedding_model: String,
    embed_timeout: Duration,
    retry: RetryPolicy,
    db_path: Option<PathBuf>,
}

impl KnowledgeStore {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        embedding: Arc<dyn EmbeddingProvider>,
        classifier: Arc<EnsembleClassifier>,
    ) -> Self {
        Self {
            db,
            embedding,
            classifier,
            embedding_model: EmbeddingConfig::default().model,
            embed_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            db_path: None,
        }
    }

    /// Model id recorded next to every vector this store writes. Rows embedded
    /// by another model are re-embedded on their next upsert.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Per-attempt deadline for one embedding call.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// On-disk location, used for size reporting in [`Self::stats`].
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    pub fn db(&self) -> &Arc<Mutex<Connection>> {
        &self.db
    }

    pub fn classifier(&self) -> &EnsembleClassifier {
        &self.classifier
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Insert or update an item.
    ///
    /// An item whose content hash, metadata (ignoring `modified_at`) and
    /// embedding model all match the stored row short-circuits: nothing is
    /// embedded, classified, or written, and `updated_at` stays put. Embedding
    /// failures (after retries) are returned and leave the store untouched.
    pub async fn upsert(&self, item: NewItem) -> Result<UpsertResult> {
        let hash = content_hash(&item.content);

        let (source, source_id) = (item.source.clone(), item.source_id.clone());
        let existing = self
            .with_conn(move |conn| store::find_revision(conn, &source, &source_id))
            .await?;
        if let Some(stored) = existing {
            if stored.is_current(&hash, &item.metadata, &self.embedding_model) {
                tracing::debug!(source = %item.source, source_id = %item.source_id, "item unchanged, skipping");
                return Ok(UpsertResult {
                    id: stored.id,
                    outcome: UpsertOutcome::Unchanged,
                });
            }
        }

        let embedding = embed_with_deadline(&self.embedding, &item.content, self.embed_timeout, &self.retry)
            .await
            .with_context(|| format!("embedding {}/{}", item.source, item.source_id))?;

        let mut classify_metadata = item.metadata.clone();
        classify_metadata
            .entry("source")
            .or_insert_with(|| serde_json::Value::String(item.source.clone()));
        classify_metadata
            .entry("path")
            .or_insert_with(|| serde_json::Value::String(item.path.clone()));
        let classification = self
            .classifier
            .classify(&item.content, Some(&classify_metadata))
            .await;

        let model = self.embedding_model.clone();
        let result = self
            .with_conn(move |conn| {
                store::write_item(
                    conn,
                    &item,
                    &hash,
                    Some(&embedding),
                    Some(&model),
                    Some(&classification),
                )
            })
            .await?;

        tracing::info!(id = %result.id, outcome = ?result.outcome, "item upserted");
        Ok(result)
    }

    /// Embed `text` with the store's deadline and retry policy.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = embed_with_deadline(&self.embedding, text, self.embed_timeout, &self.retry)
            .await
            .context("embedding query")?;
        Ok(embedding)
    }

    /// Embed `text` and return the nearest stored items.
    pub async fn search(&self, text: &str, options: SearchOptions) -> Result<Vec<SearchHit>> {
        let embedding = self.embed_query(text).await?;
        self.search_by_embedding(options.into_query(embedding)).await
    }

    pub async fn search_by_embedding(&self, query: SimilarityQuery) -> Result<Vec<SearchHit>> {
        self.with_conn(move |conn| similarity_search(conn, &query))
            .await
    }

    pub async fn get_item(&self, source: &str, source_id: &str) -> Result<Option<KnowledgeItem>> {
        let (source, source_id) = (source.to_string(), source_id.to_string());
        self.with_conn(move |conn| store::get_item(conn, &source, &source_id))
            .await
    }

    pub async fn remove_source(&self, source: &str) -> Result<usize> {
        let source = source.to_string();
        self.with_conn(move |conn| store::remove_source(conn, &source))
            .await
    }

    /// Embedded items, optionally of one category.
    pub async fn count_embedded(&self, category: Option<Category>) -> Result<u64> {
        self.with_conn(move |conn| store::count_embedded(conn, category))
            .await
    }

    pub async fn stats(&self) -> Result<KnowledgeStats> {
        let db_path = self.db_path.clone();
        self.with_conn(move |conn| knowledge_stats(conn, db_path.as_deref().map(Path::new)))
            .await
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            f(&mut conn)
        })
        .await
        .context("db task failed")?
    }
}
