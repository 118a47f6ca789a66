use anyhow::Result;
use std::path::Path;

use crate::server::setup_shared_state;
use sift::config::SiftConfig;

/// Sync a markdown vault from the terminal.
pub async fn sync(config: SiftConfig, path: &Path, source: &str) -> Result<()> {
    let state = setup_shared_state(config)?;
    let report = sift::source::vault::sync_vault(&state.store, source, path).await?;

    println!("Synced {} into source '{source}'", path.display());
    println!("  Scanned:    {}", report.scanned);
    println!("  Created:    {}", report.created);
    println!("  Updated:    {}", report.updated);
    println!("  Unchanged:  {}", report.unchanged);
    println!("  Failed:     {}", report.failed);
    if report.failed > 0 {
        println!("Some notes failed; see the log for details.");
    }
    Ok(())
}

/// Drop every stored item of `source`.
pub async fn remove(config: SiftConfig, source: &str) -> Result<()> {
    let state = setup_shared_state(config)?;
    let removed = state.store.remove_source(source).await?;
    println!("Removed {removed} items from source '{source}'");
    Ok(())
}
