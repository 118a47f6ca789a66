mod helpers;

use helpers::{embedding_at_distance, new_item, test_embedding, test_store};
use sift::classify::Category;
use sift::knowledge::search::SimilarityQuery;
use sift::knowledge::types::UpsertOutcome;

#[tokio::test]
async fn reupserting_identical_content_is_a_no_op() {
    let (store, provider) = test_store();

    let first = store
        .upsert(new_item("vault", "standup.md", "Standup meeting. Agenda: release. Attendees: Ana"))
        .await
        .unwrap();
    assert_eq!(first.outcome, UpsertOutcome::Created);
    let before = store.get_item("vault", "standup.md").await.unwrap().unwrap();

    for _ in 0..3 {
        let again = store
            .upsert(new_item("vault", "standup.md", "Standup meeting. Agenda: release. Attendees: Ana"))
            .await
            .unwrap();
        assert_eq!(again.outcome, UpsertOutcome::Unchanged);
        assert_eq!(again.id, first.id);
    }

    let after = store.get_item("vault", "standup.md").await.unwrap().unwrap();
    assert_eq!(provider.calls(), 1);
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.content_hash, before.content_hash);
}

#[tokio::test]
async fn upsert_stores_classification_and_embedding() {
    let (store, _) = test_store();
    store
        .upsert(new_item(
            "vault",
            "todo.md",
            "- [ ] renew passport\n- [ ] buy tickets\n- [x] pick dates\n",
        ))
        .await
        .unwrap();

    let item = store.get_item("vault", "todo.md").await.unwrap().unwrap();
    let classification = item.classification.unwrap();
    assert_eq!(classification.primary, Category::Task);
    assert_eq!(classification.secondary.as_deref(), Some("ensemble"));
    assert!((0.0..=1.0).contains(&classification.confidence));
    assert_eq!(item.embedding.map(|e| e.len()), Some(384));
    assert!(item.content_hash.starts_with("sha256:"));
}

#[tokio::test]
async fn similarity_search_orders_and_limits() {
    let (store, _) = test_store();
    let db = store.db().clone();
    {
        let mut conn = db.lock().unwrap();
        for (id, d) in [("d10", 0.1f32), ("d30", 0.3), ("d05", 0.05)] {
            sift::knowledge::store::write_item(
                &mut conn,
                &new_item("vault", id, id),
                &sift::knowledge::content_hash(id),
                Some(&embedding_at_distance(d)),
                Some("all-MiniLM-L6-v2"),
                None,
            )
            .unwrap();
        }
    }

    let hits = store
        .search_by_embedding(SimilarityQuery::new(test_embedding(0), 2))
        .await
        .unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.source_id.as_str()).collect();
    assert_eq!(ids, vec!["d05", "d10"]);

    let mut bounded = SimilarityQuery::new(test_embedding(0), 10);
    bounded.max_distance = Some(0.2);
    let hits = store.search_by_embedding(bounded).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.distance < 0.2));
}

#[tokio::test]
async fn sources_are_isolated() {
    let (store, _) = test_store();
    store.upsert(new_item("vault", "a.md", "alpha")).await.unwrap();
    let other = store.upsert(new_item("jira", "a.md", "alpha")).await.unwrap();
    assert_eq!(other.outcome, UpsertOutcome::Created);

    assert_eq!(store.remove_source("jira").await.unwrap(), 1);
    assert!(store.get_item("vault", "a.md").await.unwrap().is_some());
    assert!(store.get_item("jira", "a.md").await.unwrap().is_none());
}
