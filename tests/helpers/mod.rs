#![allow(dead_code)]

use rusqlite::Connection;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sift::classify::ensemble::EnsembleClassifier;
use sift::classify::Metadata;
use sift::config::ClassificationWeights;
use sift::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use sift::knowledge::service::KnowledgeStore;
use sift::knowledge::types::NewItem;
use sift::retry::RetryPolicy;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    sift::db::open_memory_database().unwrap()
}

/// Unit vector along dimension `seed`. Distinct seeds are orthogonal.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[seed % EMBEDDING_DIM] = 1.0;
    v
}

/// Unit vector at cosine distance `d` from `test_embedding(0)`.
pub fn embedding_at_distance(d: f32) -> Vec<f32> {
    let cos = 1.0 - d;
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[0] = cos;
    v[1] = (1.0 - cos * cos).sqrt();
    v
}

/// Deterministic provider: maps text to the axis of its first byte and
/// counts calls.
#[derive(Default)]
pub struct AxisProvider {
    pub calls: AtomicU32,
}

impl AxisProvider {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for AxisProvider {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(test_embedding(text.bytes().next().unwrap_or(0) as usize))
    }
}

/// A knowledge store over an in-memory DB with the [`AxisProvider`] and the
/// default ensemble.
pub fn test_store() -> (KnowledgeStore, Arc<AxisProvider>) {
    let provider = Arc::new(AxisProvider::default());
    let store = KnowledgeStore::new(
        Arc::new(Mutex::new(test_db())),
        provider.clone(),
        Arc::new(EnsembleClassifier::new(ClassificationWeights::default())),
    )
    .with_retry_policy(RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        factor: 1.0,
    });
    (store, provider)
}

pub fn new_item(source: &str, source_id: &str, content: &str) -> NewItem {
    NewItem {
        source: source.into(),
        source_id: source_id.into(),
        path: source_id.into(),
        content: content.into(),
        metadata: Metadata::new(),
    }
}
