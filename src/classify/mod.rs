//! Memory classification: three independent strategies and their ensemble.
//!
//! Each strategy maps `(content, metadata)` to a [`MemoryClassification`]. The
//! [`ensemble::EnsembleClassifier`] runs them side by side and merges the
//! results by weighted voting.
//!
//! | Strategy | Looks at | Signal |
//! |----------|----------|--------|
//! | [`semantic::SemanticStrategy`] | content | keyword signatures per category |
//! | [`structural::StructuralStrategy`] | content | headings, checkboxes, fences, links, size |
//! | [`context::ContextStrategy`] | metadata | path patterns, tags, recency, source |

pub mod context;
pub mod ensemble;
pub mod semantic;
pub mod structural;

use serde::{Deserialize, Serialize};

/// Free-form metadata attached to an item (path, tags, source, timestamps, ...).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The semantic category a note is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Meeting,
    Task,
    Code,
    Documentation,
    Note,
    Journal,
    Reference,
    Unknown,
}

impl Category {
    /// Every category that can win a classification, in table order.
    pub const KNOWN: [Category; 7] = [
        Self::Meeting,
        Self::Task,
        Self::Code,
        Self::Documentation,
        Self::Note,
        Self::Journal,
        Self::Reference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meeting => "meeting",
            Self::Task => "task",
            Self::Code => "code",
            Self::Documentation => "documentation",
            Self::Note => "note",
            Self::Journal => "journal",
            Self::Reference => "reference",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meeting" => Ok(Self::Meeting),
            "task" => Ok(Self::Task),
            "code" => Ok(Self::Code),
            "documentation" => Ok(Self::Documentation),
            "note" => Ok(Self::Note),
            "journal" => Ok(Self::Journal),
            "reference" => Ok(Self::Reference),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("unknown category: {s}")),
        }
    }
}

/// Identity of a classification strategy. Ensemble weights are keyed on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Semantic,
    Structural,
    Context,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Structural => "structural",
            Self::Context => "context",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one classification. `attributes` is diagnostic only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryClassification {
    pub primary: Category,
    /// Strategy or ensemble stage that produced this result.
    pub secondary: Option<String>,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f64,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl MemoryClassification {
    /// Build a result, clamping confidence into `[0, 1]` (NaN becomes 0).
    pub fn new(
        primary: Category,
        secondary: impl Into<String>,
        confidence: f64,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            primary,
            secondary: Some(secondary.into()),
            confidence,
            attributes,
        }
    }

    /// The zero-confidence "unknown" result produced by `stage`.
    pub fn unknown(stage: impl Into<String>) -> Self {
        Self::new(Category::Unknown, stage, 0.0, serde_json::Map::new())
    }

    pub fn is_unknown(&self) -> bool {
        self.primary == Category::Unknown
    }
}

/// A stateless classifier. Implementations must not panic on empty or odd
/// input; they return [`MemoryClassification::unknown`] instead.
pub trait ClassificationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn classify(&self, content: &str, metadata: Option<&Metadata>) -> MemoryClassification;
}

/// Pick the highest score; ties go to the earlier entry.
pub(crate) fn best_score(scores: &[(Category, f64)]) -> Option<(Category, f64)> {
    let mut best: Option<(Category, f64)> = None;
    for &(category, score) in scores {
        if score <= 0.0 || !score.is_finite() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((category, score)),
        }
    }
    best
}

/// Render per-category scores as a JSON object for `attributes`.
pub(crate) fn scores_json(scores: &[(Category, f64)]) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = scores
        .iter()
        .filter(|(_, s)| *s > 0.0)
        .map(|(c, s)| (c.as_str().to_string(), serde_json::json!(round3(*s))))
        .collect();
    serde_json::Value::Object(map)
}

pub(crate) fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for c in Category::KNOWN {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert!("meetings".parse::<Category>().is_err());
    }

    #[test]
    fn confidence_is_clamped() {
        let hi = MemoryClassification::new(Category::Task, "x", 3.2, Default::default());
        assert_eq!(hi.confidence, 1.0);
        let nan = MemoryClassification::new(Category::Task, "x", f64::NAN, Default::default());
        assert_eq!(nan.confidence, 0.0);
    }

    #[test]
    fn best_score_prefers_first_on_tie() {
        let scores = [
            (Category::Note, 0.4),
            (Category::Task, 0.4),
            (Category::Code, 0.1),
        ];
        assert_eq!(best_score(&scores), Some((Category::Note, 0.4)));
        assert_eq!(best_score(&[(Category::Note, 0.0)]), None);
    }

    #[test]
    fn classification_serializes_category_as_string() {
        let c = MemoryClassification::unknown("context");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["primary"], "unknown");
        assert_eq!(json["secondary"], "context");
    }
}
