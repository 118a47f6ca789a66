use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::classify::Category;

/// Response from knowledge_stats.
#[derive(Debug, Serialize)]
pub struct KnowledgeStats {
    pub total_items: u64,
    pub embedded_items: u64,
    pub by_source: HashMap<String, u64>,
    pub by_category: HashMap<String, u64>,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_update: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_update: Option<String>,
}

/// Compute knowledge store statistics.
///
/// `db_path` is used for the file size; pass None for in-memory databases.
pub fn knowledge_stats(conn: &Connection, db_path: Option<&Path>) -> Result<KnowledgeStats> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM knowledge_items", [], |row| row.get(0))?;
    let embedded: i64 = conn.query_row(
        "SELECT COUNT(*) FROM knowledge_items WHERE embedding IS NOT NULL",
        [],
        |row| row.get(0),
    )?;

    let by_source = group_counts(conn, "SELECT source, COUNT(*) FROM knowledge_items GROUP BY source")?;

    // Every known category is reported, zero or not. Unclassified rows count separately.
    let mut by_category: HashMap<String, u64> = Category::KNOWN
        .iter()
        .map(|c| (c.as_str().to_string(), 0))
        .collect();
    by_category.extend(group_counts(
        conn,
        "SELECT COALESCE(category, 'unclassified'), COUNT(*) FROM knowledge_items GROUP BY 1",
    )?);

    let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(updated_at), MAX(updated_at) FROM knowledge_items",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(KnowledgeStats {
        total_items: total as u64,
        embedded_items: embedded as u64,
        by_source,
        by_category,
        db_size_bytes,
        oldest_update: oldest,
        newest_update: newest,
    })
}

fn group_counts(conn: &Connection, sql: &str) -> Result<HashMap<String, u64>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().map(|(k, n)| (k, n as u64)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MemoryClassification;
    use crate::knowledge::content_hash;
    use crate::knowledge::store::write_item;
    use crate::knowledge::types::NewItem;

    fn insert(conn: &mut Connection, source: &str, id: &str, category: Option<Category>, embedded: bool) {
        let item = NewItem {
            source: source.into(),
            source_id: id.into(),
            path: id.into(),
            content: id.into(),
            metadata: Default::default(),
        };
        let embedding = embedded.then(|| vec![0.1f32; 384]);
        let classification =
            category.map(|c| MemoryClassification::new(c, "ensemble", 0.7, Default::default()));
        write_item(
            conn,
            &item,
            &content_hash(id),
            embedding.as_deref(),
            embedded.then_some("all-MiniLM-L6-v2"),
            classification.as_ref(),
        )
        .unwrap();
    }

    #[test]
    fn empty_store() {
        let conn = crate::db::open_memory_database().unwrap();
        let stats = knowledge_stats(&conn, None).unwrap();
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.embedded_items, 0);
        assert!(stats.by_source.is_empty());
        assert_eq!(stats.by_category.len(), Category::KNOWN.len());
        assert!(stats.by_category.values().all(|n| *n == 0));
        assert!(stats.oldest_update.is_none());
    }

    #[test]
    fn counts_by_source_and_category() {
        let mut conn = crate::db::open_memory_database().unwrap();
        insert(&mut conn, "vault", "a", Some(Category::Task), true);
        insert(&mut conn, "vault", "b", Some(Category::Task), true);
        insert(&mut conn, "jira", "c", Some(Category::Code), false);
        insert(&mut conn, "jira", "d", None, false);

        let stats = knowledge_stats(&conn, None).unwrap();
        assert_eq!(stats.total_items, 4);
        assert_eq!(stats.embedded_items, 2);
        assert_eq!(stats.by_source["vault"], 2);
        assert_eq!(stats.by_source["jira"], 2);
        assert_eq!(stats.by_category["task"], 2);
        assert_eq!(stats.by_category["code"], 1);
        assert_eq!(stats.by_category["meeting"], 0);
        assert_eq!(stats.by_category["unclassified"], 1);
        assert!(stats.oldest_update.is_some());
        assert!(stats.oldest_update <= stats.newest_update);
    }
}
