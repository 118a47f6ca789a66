//! Weighted-vote ensemble over the classification strategies.
//!
//! Strategies run concurrently on the blocking pool. Their outputs are grouped
//! by category and each group scores `Σ confidence × weight(strategy)`, so a
//! category several strategies agree on beats one proposed by a single
//! strategy. Exact ties go to the category seen first.

use std::sync::Arc;

use super::context::ContextStrategy;
use super::semantic::SemanticStrategy;
use super::structural::StructuralStrategy;
use super::{round3, Category, ClassificationStrategy, MemoryClassification, Metadata, StrategyKind};
use crate::config::ClassificationWeights;

const STAGE: &str = "ensemble";

pub struct EnsembleClassifier {
    strategies: Vec<Arc<dyn ClassificationStrategy>>,
    weights: ClassificationWeights,
}

impl EnsembleClassifier {
    /// The standard semantic, structural, context line-up.
    pub fn new(weights: ClassificationWeights) -> Self {
        Self::with_strategies(
            vec![
                Arc::new(SemanticStrategy::new()) as Arc<dyn ClassificationStrategy>,
                Arc::new(StructuralStrategy::new()),
                Arc::new(ContextStrategy::new()),
            ],
            weights,
        )
    }

    pub fn with_strategies(
        strategies: Vec<Arc<dyn ClassificationStrategy>>,
        weights: ClassificationWeights,
    ) -> Self {
        Self { strategies, weights }
    }

    pub fn weights(&self) -> &ClassificationWeights {
        &self.weights
    }

    /// Classify one note.
    ///
    /// With the ensemble disabled only the semantic strategy runs and its
    /// output is returned untouched.
    pub async fn classify(&self, content: &str, metadata: Option<&Metadata>) -> MemoryClassification {
        if !self.weights.ensemble_enabled {
            return match self
                .strategies
                .iter()
                .find(|s| s.kind() == StrategyKind::Semantic)
            {
                Some(semantic) => semantic.classify(content, metadata),
                None => MemoryClassification::unknown(StrategyKind::Semantic.as_str()),
            };
        }

        let content: Arc<str> = Arc::from(content);
        let metadata: Option<Arc<Metadata>> = metadata.map(|m| Arc::new(m.clone()));

        let tasks = self.strategies.iter().map(|strategy| {
            let strategy = Arc::clone(strategy);
            let content = Arc::clone(&content);
            let metadata = metadata.clone();
            let kind = strategy.kind();
            let handle = tokio::task::spawn_blocking(move || {
                strategy.classify(&content, metadata.as_deref())
            });
            async move {
                match handle.await {
                    Ok(result) => (kind, result),
                    Err(e) => {
                        tracing::warn!(strategy = %kind, error = %e, "classification strategy failed");
                        (kind, MemoryClassification::unknown(kind.as_str()))
                    }
                }
            }
        });

        let outputs = futures::future::join_all(tasks).await;
        combine(&outputs, &self.weights)
    }
}

/// Merge strategy outputs by weighted vote. Pure and deterministic: the same
/// outputs in the same order always give the same result.
pub fn combine(
    outputs: &[(StrategyKind, MemoryClassification)],
    weights: &ClassificationWeights,
) -> MemoryClassification {
    // (category, weighted sum, index of the strongest contributor, its contribution)
    let mut groups: Vec<(Category, f64, usize, f64)> = Vec::new();

    for (idx, (kind, result)) in outputs.iter().enumerate() {
        if result.is_unknown() {
            continue;
        }
        let contribution = result.confidence * weight_for(*kind, weights);
        match groups.iter_mut().find(|g| g.0 == result.primary) {
            Some(group) => {
                group.1 += contribution;
                if contribution > group.3 {
                    group.2 = idx;
                    group.3 = contribution;
                }
            }
            None => groups.push((result.primary, contribution, idx, contribution)),
        }
    }

    let mut winner: Option<&(Category, f64, usize, f64)> = None;
    for group in &groups {
        match winner {
            Some(best) if group.1 <= best.1 => {}
            _ => winner = Some(group),
        }
    }

    let Some(&(category, sum, lead_idx, _)) = winner else {
        return insufficient();
    };

    let score = sum.min(1.0);
    if !(score >= weights.minimum_confidence) || score <= 0.0 {
        tracing::debug!(category = %category, score, floor = weights.minimum_confidence, "ensemble below confidence floor");
        return insufficient();
    }

    let mut attributes = outputs[lead_idx].1.attributes.clone();
    attributes.insert("ensembleScore".into(), serde_json::json!(round3(score)));
    attributes.insert("candidateCount".into(), serde_json::json!(groups.len()));
    attributes.insert(
        "weights".into(),
        serde_json::json!({
            "semantic": weights.semantic,
            "structural": weights.structural,
            "context": weights.context,
        }),
    );
    attributes.insert(
        "votes".into(),
        serde_json::Value::Object(
            outputs
                .iter()
                .map(|(kind, r)| {
                    (
                        kind.as_str().to_string(),
                        serde_json::json!({"primary": r.primary, "confidence": round3(r.confidence)}),
                    )
                })
                .collect(),
        ),
    );

    MemoryClassification::new(category, STAGE, score, attributes)
}

fn weight_for(kind: StrategyKind, weights: &ClassificationWeights) -> f64 {
    let w = match kind {
        StrategyKind::Semantic => weights.semantic,
        StrategyKind::Structural => weights.structural,
        StrategyKind::Context => weights.context,
    };
    if w.is_finite() {
        w.max(0.0)
    } else {
        0.0
    }
}

fn insufficient() -> MemoryClassification {
    let mut attributes = serde_json::Map::new();
    attributes.insert("reason".into(), serde_json::json!("insufficient_confidence"));
    MemoryClassification::new(Category::Unknown, STAGE, 0.0, attributes)
}
