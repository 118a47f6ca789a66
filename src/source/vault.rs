//! Markdown vault source: every `*.md` file under a directory.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::markdown;
use crate::classify::Metadata;
use crate::knowledge::service::KnowledgeStore;
use crate::knowledge::types::{NewItem, UpsertOutcome};

/// Per-run counters.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub scanned: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Sync the vault at `root` into the store under `source`.
///
/// Items are keyed by their path relative to `root`, with forward slashes.
/// A file that can't be read or stored is logged and counted as failed; the
/// run carries on.
pub async fn sync_vault(store: &KnowledgeStore, source: &str, root: &Path) -> Result<SyncReport> {
    anyhow::ensure!(root.is_dir(), "vault path is not a directory: {}", root.display());

    let walk_root = root.to_path_buf();
    let (files, walk_errors) = tokio::task::spawn_blocking(move || collect_markdown(&walk_root))
        .await
        .context("vault walk task failed")?;

    let mut report = SyncReport {
        failed: walk_errors,
        ..Default::default()
    };

    for path in files {
        report.scanned += 1;
        match sync_file(store, source, root, &path).await {
            Ok(UpsertOutcome::Created) => report.created += 1,
            Ok(UpsertOutcome::Updated) => report.updated += 1,
            Ok(UpsertOutcome::Unchanged) => report.unchanged += 1,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "failed to sync note");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        source,
        scanned = report.scanned,
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        failed = report.failed,
        "vault sync complete"
    );
    Ok(report)
}

async fn sync_file(
    store: &KnowledgeStore,
    source: &str,
    root: &Path,
    path: &Path,
) -> Result<UpsertOutcome> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let modified_at = tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .ok()
        .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());

    let source_id = relative_id(root, path);
    let note = markdown::parse(&raw, path);

    let mut metadata = Metadata::new();
    metadata.insert("source".into(), source.into());
    metadata.insert("path".into(), source_id.clone().into());
    metadata.insert("title".into(), note.title.into());
    metadata.insert("tags".into(), note.tags.into());
    metadata.insert("wiki_links".into(), note.wiki_links.into());
    metadata.insert("frontmatter".into(), note.frontmatter.into());
    if let Some(modified_at) = modified_at {
        metadata.insert("modified_at".into(), modified_at.into());
    }

    let result = store
        .upsert(NewItem {
            source: source.to_string(),
            source_id: source_id.clone(),
            path: source_id,
            content: note.content,
            metadata,
        })
        .await?;
    Ok(result.outcome)
}

/// Markdown files under `root` in file-name order, skipping hidden entries.
/// Also returns how many entries could not be read.
fn collect_markdown(root: &Path) -> (Vec<PathBuf>, usize) {
    let mut files = Vec::new();
    let mut errors = 0;
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        match entry {
            Ok(e) if e.file_type().is_file() && is_markdown(e.path()) => {
                files.push(e.into_path())
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable vault entry");
                errors += 1;
            }
        }
    }
    (files, errors)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

/// `path` relative to `root`, joined with `/` regardless of platform.
fn relative_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_ids_use_forward_slashes() {
        let root = Path::new("/vault");
        let path = Path::new("/vault").join("projects").join("alpha.md");
        assert_eq!(relative_id(root, &path), "projects/alpha.md");
    }

    #[test]
    fn collects_markdown_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::create_dir_all(root.join(".obsidian")).unwrap();
        std::fs::write(root.join("b.md"), "b").unwrap();
        std::fs::write(root.join("a.MD"), "a").unwrap();
        std::fs::write(root.join("sub/c.md"), "c").unwrap();
        std::fs::write(root.join(".obsidian/workspace.md"), "x").unwrap();
        std::fs::write(root.join(".hidden.md"), "x").unwrap();
        std::fs::write(root.join("readme.txt"), "x").unwrap();

        let (files, errors) = collect_markdown(root);
        let ids: Vec<String> = files.iter().map(|p| relative_id(root, p)).collect();
        assert_eq!(ids, vec!["a.MD", "b.md", "sub/c.md"]);
        assert_eq!(errors, 0);
    }
}
