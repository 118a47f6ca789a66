mod helpers;

use sift::db;
use sift::db::migrations::{
    get_embedding_model, get_schema_version, record_embedding_model, run_migrations,
    CURRENT_SCHEMA_VERSION,
};

#[test]
fn fresh_db_is_at_current_version() {
    let conn = helpers::test_db();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn migrations_are_idempotent() {
    let conn = helpers::test_db();
    run_migrations(&conn).unwrap();
    run_migrations(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn embedding_model_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sift.db");
    {
        let conn = db::open_database(&path).unwrap();
        assert!(get_embedding_model(&conn).unwrap().is_none());
        record_embedding_model(&conn, "all-MiniLM-L6-v2").unwrap();
    }
    let conn = db::open_database(&path).unwrap();
    assert_eq!(
        get_embedding_model(&conn).unwrap(),
        Some("all-MiniLM-L6-v2".to_string())
    );
    assert_eq!(
        record_embedding_model(&conn, "bge-small-en").unwrap(),
        Some("all-MiniLM-L6-v2".to_string())
    );
}

#[test]
fn database_from_newer_build_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sift.db");
    {
        let conn = db::open_database(&path).unwrap();
        conn.execute(
            "UPDATE schema_meta SET value = '99' WHERE key = 'schema_version'",
            [],
        )
        .unwrap();
    }
    assert!(db::open_database(&path).is_err());
}
