use anyhow::{Context, Result};
use std::path::Path;

use sift::classify::ensemble::EnsembleClassifier;
use sift::classify::Metadata;
use sift::config::SiftConfig;
use sift::source::markdown;

/// Classify one file without storing it. Needs no embedding model.
pub async fn classify(config: &SiftConfig, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let note = markdown::parse(&raw, path);

    let mut metadata = Metadata::new();
    metadata.insert("path".into(), path.to_string_lossy().into_owned().into());
    metadata.insert("tags".into(), note.tags.clone().into());
    if let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) {
        let modified = chrono::DateTime::<chrono::Utc>::from(modified).to_rfc3339();
        metadata.insert("modified_at".into(), modified.into());
    }

    let classifier = EnsembleClassifier::new(config.classification.clone());
    let result = classifier.classify(&note.content, Some(&metadata)).await;

    println!("{}", path.display());
    println!("  Title:       {}", note.title);
    println!("  Category:    {}", result.primary);
    println!("  Confidence:  {:.3}", result.confidence);
    println!("  Stage:       {}", result.secondary.as_deref().unwrap_or("-"));
    println!();
    println!("{}", serde_json::to_string_pretty(&result.attributes)?);
    Ok(())
}
