//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use sift::config::SiftConfig;
use sift::db;
use sift::embedding::local::model_files;
use sift::knowledge::store::count_stale_embeddings;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &SiftConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let (model_path, tokenizer_path) = model_files(&config.embedding);

    println!("sift Health Report");
    println!("==================");
    println!();
    println!("Model files:");
    println!("  model.onnx:      {}", presence(model_path.exists()));
    println!("  tokenizer.json:  {}", presence(tokenizer_path.exists()));
    if !model_path.exists() || !tokenizer_path.exists() {
        println!("  Run `sift model download` to fetch them.");
    }
    println!();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `sift sync <vault>` or `sift serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    let conn = db::open_database(&db_path)
        .context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn)
        .context("failed to run health check")?;

    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!("  Stored:          {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {}", config.embedding.model);
    let stale = count_stale_embeddings(&conn, &config.embedding.model)?;
    if stale > 0 {
        println!("  Stale vectors:   {stale} (re-embedded on the next sync of their source)");
    } else {
        println!("  Status:          OK (all vectors from the configured model)");
    }
    println!();
    println!("Row counts:");
    println!("  Items:           {}", report.item_count);
    println!("  Embedded:        {}", report.embedded_count);
    println!("  Chat messages:   {}", report.message_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or delete the database and sync your sources again.");
    }

    Ok(())
}

fn presence(found: bool) -> &'static str {
    if found {
        "found"
    } else {
        "missing"
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
