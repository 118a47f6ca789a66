use anyhow::Result;

use sift::classify::Category;
use sift::config::SiftConfig;

/// Display knowledge store statistics in the terminal.
pub fn stats(config: &SiftConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = sift::db::open_database(&db_path)?;

    let stats = sift::knowledge::stats::knowledge_stats(&conn, Some(&db_path))?;

    println!("Knowledge Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total items:         {}", stats.total_items);
    println!("  Embedded:            {}", stats.embedded_items);
    println!();

    println!("By Source:");
    let mut sources: Vec<_> = stats.by_source.iter().collect();
    sources.sort();
    for (source, count) in sources {
        println!("  {:<16} {}", source, count);
    }
    println!();

    println!("By Category:");
    for category in Category::KNOWN {
        let count = stats.by_category.get(category.as_str()).copied().unwrap_or(0);
        println!("  {:<16} {}", category.as_str(), count);
    }
    if let Some(unclassified) = stats.by_category.get("unclassified") {
        println!("  {:<16} {}", "unclassified", unclassified);
    }
    println!();

    println!("Database size:         {} bytes", stats.db_size_bytes);
    if let Some(ref oldest) = stats.oldest_update {
        println!("Oldest update:         {oldest}");
    }
    if let Some(ref newest) = stats.newest_update {
        println!("Newest update:         {newest}");
    }

    Ok(())
}
