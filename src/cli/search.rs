use anyhow::Result;

use crate::server::setup_shared_state;
use sift::config::SiftConfig;
use sift::knowledge::search::SearchOptions;

/// Run a semantic search from the terminal.
pub async fn search(
    config: SiftConfig,
    query: &str,
    limit: Option<usize>,
    source: Option<String>,
    threshold: Option<f64>,
) -> Result<()> {
    let options = SearchOptions {
        limit: limit.unwrap_or(config.retrieval.default_limit),
        source,
        category: None,
        max_distance: threshold.or(config.retrieval.distance_threshold),
    };
    let state = setup_shared_state(config)?;

    let hits = state.store.search(query, options).await?;

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", hits.len());

    for (i, hit) in hits.iter().enumerate() {
        let preview: String = hit.content.chars().take(120).collect();
        let ellipsis = if hit.content.chars().count() > 120 { "..." } else { "" };

        println!(
            "  {}. [{}] {}:{} (distance: {:.4})",
            i + 1,
            hit.category.as_deref().unwrap_or("unclassified"),
            hit.source,
            hit.path,
            hit.distance,
        );
        println!("     {}{}", preview.replace('\n', " "), ellipsis);
        println!();
    }

    Ok(())
}
