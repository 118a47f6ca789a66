//! Schema versioning and `schema_meta` bookkeeping.
//!
//! `init_schema` creates the version 1 layout. Later layouts are reached by
//! appending a step to [`MIGRATIONS`]; a database written by a newer binary is
//! refused rather than opened with a schema this one does not know.

use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension};

type Migration = fn(&Connection) -> rusqlite::Result<()>;

/// Forward steps. Entry `i` moves the schema from version `i + 1` to `i + 2`.
const MIGRATIONS: &[Migration] = &[];

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1 + MIGRATIONS.len() as u32;

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

/// Bring the schema up to [`CURRENT_SCHEMA_VERSION`], one transaction per step.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;
    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "database schema is version {version}, this build understands up to {CURRENT_SCHEMA_VERSION}"
        );
    }

    for (step, migrate) in MIGRATIONS.iter().enumerate().skip(version.saturating_sub(1) as usize) {
        let next = step as u32 + 2;
        tracing::info!(to = next, "running migration");
        conn.execute_batch("BEGIN")?;
        let applied = migrate(conn).and_then(|()| {
            conn.execute(
                "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
                [next.to_string()],
            )
            .map(|_| ())
        });
        match applied {
            Ok(()) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                conn.execute_batch("ROLLBACK")?;
                return Err(e.into());
            }
        }
    }
    Ok(())
}

/// Model id the stored vectors are meant to come from, if one was recorded.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        params![model],
    )?;
    Ok(())
}

/// Record `model` as the active embedding model. Returns the previously
/// recorded id when it differs.
pub fn record_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<Option<String>> {
    let previous = get_embedding_model(conn)?;
    if previous.as_deref() == Some(model) {
        return Ok(None);
    }
    set_embedding_model(conn, model)?;
    Ok(previous)
}
