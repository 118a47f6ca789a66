//! Knowledge sources feeding the store.
//!
//! A sync is triggered with a source id and a config map. The only source
//! kind shipped is a markdown vault, selected by the `path` key.

pub mod markdown;
pub mod vault;

use anyhow::{Context, Result};

use crate::classify::Metadata;
use crate::config::expand_tilde;
use crate::knowledge::service::KnowledgeStore;
use vault::SyncReport;

/// Sync `source_id` using `config`. `config.path` names the vault directory.
pub async fn sync_source(
    store: &KnowledgeStore,
    source_id: &str,
    config: &Metadata,
) -> Result<SyncReport> {
    anyhow::ensure!(!source_id.trim().is_empty(), "source id must not be empty");
    let path = config
        .get("path")
        .and_then(|v| v.as_str())
        .context("source config needs a string `path`")?;
    vault::sync_vault(store, source_id, &expand_tilde(path)).await
}
