use anyhow::{ensure, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::classify::Category;
use crate::embedding::EMBEDDING_DIM;

/// A nearest-neighbor query over stored embeddings.
#[derive(Debug, Clone)]
pub struct SimilarityQuery {
    pub embedding: Vec<f32>,
    pub limit: usize,
    pub source: Option<String>,
    pub category: Option<Category>,
    /// Strict upper bound on cosine distance: only `distance < max_distance` passes.
    pub max_distance: Option<f64>,
}

impl SimilarityQuery {
    pub fn new(embedding: Vec<f32>, limit: usize) -> Self {
        Self {
            embedding,
            limit,
            source: None,
            category: None,
            max_distance: None,
        }
    }
}

/// Filters for a text search. The query text is embedded by the caller.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: usize,
    pub source: Option<String>,
    pub category: Option<Category>,
    pub max_distance: Option<f64>,
}

impl SearchOptions {
    pub fn limit(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn into_query(self, embedding: Vec<f32>) -> SimilarityQuery {
        SimilarityQuery {
            embedding,
            limit: self.limit,
            source: self.source,
            category: self.category,
            max_distance: self.max_distance,
        }
    }
}

/// One search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub source: String,
    pub source_id: String,
    pub path: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub distance: f64,
    pub updated_at: String,
}

/// Exact cosine search: the `limit` closest embedded items, ascending by
/// distance, ties broken by insertion order.
///
/// Rows whose distance is undefined (a zero-norm vector on either side) are
/// left out.
pub fn similarity_search(conn: &Connection, query: &SimilarityQuery) -> Result<Vec<SearchHit>> {
    ensure!(
        query.embedding.len() == EMBEDDING_DIM,
        "query embedding has {} dimensions, expected {EMBEDDING_DIM}",
        query.embedding.len()
    );
    if query.limit == 0 {
        return Ok(Vec::new());
    }

    let embedding_bytes = super::embedding_to_bytes(&query.embedding);
    let category = query.category.map(|c| c.as_str());

    let mut stmt = conn.prepare(
        "SELECT id, source, source_id, path, content, category, distance, updated_at FROM ( \
             SELECT rowid AS seq, id, source, source_id, path, content, category, updated_at, \
                    vec_distance_cosine(embedding, ?1) AS distance \
             FROM knowledge_items \
             WHERE embedding IS NOT NULL \
               AND (?2 IS NULL OR source = ?2) \
               AND (?3 IS NULL OR category = ?3) \
         ) \
         WHERE distance IS NOT NULL \
           AND (?4 IS NULL OR distance < ?4) \
         ORDER BY distance, seq \
         LIMIT ?5",
    )?;

    let rows = stmt.query_map(
        params![
            embedding_bytes,
            query.source,
            category,
            query.max_distance,
            query.limit as i64,
        ],
        |row| {
            Ok(SearchHit {
                id: row.get(0)?,
                source: row.get(1)?,
                source_id: row.get(2)?,
                path: row.get(3)?,
                content: row.get(4)?,
                category: row.get(5)?,
                distance: row.get(6)?,
                updated_at: row.get(7)?,
            })
        },
    )?;

    let hits = rows.collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(hits = hits.len(), limit = query.limit, "similarity search");
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MemoryClassification;
    use crate::knowledge::content_hash;
    use crate::knowledge::store::write_item;
    use crate::knowledge::types::NewItem;

    fn test_db() -> Connection {
        crate::db::open_memory_database().unwrap()
    }

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[i] = 1.0;
        v
    }

    /// Unit vector at cosine distance `d` from `axis(0)`.
    fn at_distance(d: f32) -> Vec<f32> {
        let cos = 1.0 - d;
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[0] = cos;
        v[1] = (1.0 - cos * cos).sqrt();
        v
    }

    fn insert(conn: &mut Connection, source: &str, source_id: &str, embedding: Option<Vec<f32>>) {
        insert_with(conn, source, source_id, embedding, None);
    }

    fn insert_with(
        conn: &mut Connection,
        source: &str,
        source_id: &str,
        embedding: Option<Vec<f32>>,
        category: Option<Category>,
    ) {
        let item = NewItem {
            source: source.into(),
            source_id: source_id.into(),
            path: source_id.into(),
            content: format!("content of {source_id}"),
            metadata: Default::default(),
        };
        let classification =
            category.map(|c| MemoryClassification::new(c, "ensemble", 0.8, Default::default()));
        write_item(
            conn,
            &item,
            &content_hash(&item.content),
            embedding.as_deref(),
            embedding.as_ref().map(|_| "all-MiniLM-L6-v2"),
            classification.as_ref(),
        )
        .unwrap();
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.source_id.as_str()).collect()
    }

    #[test]
    fn returns_nearest_in_ascending_distance() {
        let mut conn = test_db();
        insert(&mut conn, "vault", "d10", Some(at_distance(0.1)));
        insert(&mut conn, "vault", "d30", Some(at_distance(0.3)));
        insert(&mut conn, "vault", "d05", Some(at_distance(0.05)));

        let hits = similarity_search(&conn, &SimilarityQuery::new(axis(0), 2)).unwrap();
        assert_eq!(ids(&hits), vec!["d05", "d10"]);
        assert!((hits[0].distance - 0.05).abs() < 1e-4);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn threshold_is_strict() {
        let mut conn = test_db();
        insert(&mut conn, "vault", "same", Some(axis(0)));
        insert(&mut conn, "vault", "orthogonal", Some(axis(7)));

        let mut query = SimilarityQuery::new(axis(0), 10);
        query.max_distance = Some(1.0);
        let hits = similarity_search(&conn, &query).unwrap();
        assert_eq!(ids(&hits), vec!["same"]);

        query.max_distance = Some(0.0);
        assert!(similarity_search(&conn, &query).unwrap().is_empty());
    }

    #[test]
    fn items_without_embedding_are_skipped() {
        let mut conn = test_db();
        insert(&mut conn, "vault", "bare", None);
        insert(&mut conn, "vault", "embedded", Some(axis(3)));

        let hits = similarity_search(&conn, &SimilarityQuery::new(axis(0), 10)).unwrap();
        assert_eq!(ids(&hits), vec!["embedded"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut conn = test_db();
        insert(&mut conn, "vault", "first", Some(axis(5)));
        insert(&mut conn, "vault", "second", Some(axis(6)));
        insert(&mut conn, "vault", "third", Some(axis(4)));

        let hits = similarity_search(&conn, &SimilarityQuery::new(axis(0), 10)).unwrap();
        assert_eq!(ids(&hits), vec!["first", "second", "third"]);
    }

    #[test]
    fn filters_by_source_and_category() {
        let mut conn = test_db();
        insert_with(&mut conn, "vault", "a", Some(axis(0)), Some(Category::Task));
        insert_with(&mut conn, "jira", "b", Some(axis(0)), Some(Category::Task));
        insert_with(&mut conn, "vault", "c", Some(axis(0)), Some(Category::Code));

        let mut query = SimilarityQuery::new(axis(0), 10);
        query.source = Some("vault".into());
        assert_eq!(ids(&similarity_search(&conn, &query).unwrap()), vec!["a", "c"]);

        query.category = Some(Category::Task);
        assert_eq!(ids(&similarity_search(&conn, &query).unwrap()), vec!["a"]);

        query.source = None;
        assert_eq!(ids(&similarity_search(&conn, &query).unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn zero_limit_and_bad_dimensions() {
        let mut conn = test_db();
        insert(&mut conn, "vault", "a", Some(axis(0)));

        assert!(similarity_search(&conn, &SimilarityQuery::new(axis(0), 0))
            .unwrap()
            .is_empty());
        assert!(similarity_search(&conn, &SimilarityQuery::new(vec![1.0; 3], 5)).is_err());
    }

    #[test]
    fn zero_norm_row_is_left_out() {
        let mut conn = test_db();
        insert(&mut conn, "vault", "unit", Some(axis(0)));
        insert(&mut conn, "vault", "degenerate", Some(vec![0.0; EMBEDDING_DIM]));

        let hits = similarity_search(&conn, &SimilarityQuery::new(axis(0), 10)).unwrap();
        assert_eq!(ids(&hits), vec!["unit"]);
    }
}
