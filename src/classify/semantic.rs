//! Lexical topic scoring.
//!
//! Counts how many distinct signature terms of each category occur in the
//! note. Confidence grows with the number of hits and shrinks when other
//! categories are almost as strong.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::{
    best_score, round3, scores_json, Category, ClassificationStrategy, MemoryClassification,
    Metadata, StrategyKind,
};

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z0-9][a-z0-9_'+#-]*").expect("static regex"));

/// Signature terms per category. Multi-word entries match as phrases.
const SIGNATURES: &[(Category, &[&str])] = &[
    (
        Category::Meeting,
        &[
            "meeting", "agenda", "attendees", "minutes", "standup", "stand-up", "retro",
            "retrospective", "discussed", "action items", "next steps", "call", "sync-up",
            "facilitator", "decisions",
        ],
    ),
    (
        Category::Task,
        &[
            "todo", "to do", "task", "tasks", "deadline", "due", "assigned", "priority",
            "blocker", "blocked", "backlog", "ticket", "sprint", "finish", "follow up",
        ],
    ),
    (
        Category::Code,
        &[
            "function", "class", "struct", "impl", "fn", "def", "return", "compile", "compiler",
            "bug", "stack trace", "api", "endpoint", "refactor", "variable", "import", "commit",
            "merge", "rust", "python", "typescript", "sql",
        ],
    ),
    (
        Category::Documentation,
        &[
            "overview", "installation", "usage", "configuration", "guide", "architecture",
            "specification", "requirements", "parameters", "setup", "tutorial",
            "introduction", "how to",
        ],
    ),
    (
        Category::Note,
        &[
            "idea", "ideas", "thought", "thoughts", "note", "notes", "remember", "interesting",
            "maybe", "brainstorm", "draft",
        ],
    ),
    (
        Category::Journal,
        &[
            "today", "yesterday", "feeling", "felt", "grateful", "morning", "evening", "diary",
            "journal", "mood", "weekend",
        ],
    ),
    (
        Category::Reference,
        &[
            "bookmark", "article", "paper", "book", "resource", "resources", "reading",
            "citation", "website", "source", "links",
        ],
    ),
];

/// Hits at which signal strength reaches ~63%.
const HIT_SCALE: f64 = 3.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct SemanticStrategy;

impl SemanticStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl ClassificationStrategy for SemanticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Semantic
    }

    fn classify(&self, content: &str, _metadata: Option<&Metadata>) -> MemoryClassification {
        let text = content.to_lowercase();
        let tokens: HashSet<&str> = WORD.find_iter(&text).map(|m| m.as_str()).collect();
        if tokens.is_empty() {
            return MemoryClassification::unknown(StrategyKind::Semantic.as_str());
        }

        let mut scores = Vec::with_capacity(SIGNATURES.len());
        let mut matched_by_category = Vec::with_capacity(SIGNATURES.len());
        for (category, terms) in SIGNATURES {
            let matched: Vec<&str> = terms
                .iter()
                .copied()
                .filter(|term| term_present(term, &text, &tokens))
                .collect();
            scores.push((*category, matched.len() as f64));
            matched_by_category.push(matched);
        }

        let Some((winner, hits)) = best_score(&scores) else {
            return MemoryClassification::unknown(StrategyKind::Semantic.as_str());
        };

        let total: f64 = scores.iter().map(|(_, s)| s).sum();
        let strength = 1.0 - (-hits / HIT_SCALE).exp();
        let dominance = hits / total;
        let confidence = strength * (0.5 + 0.5 * dominance);

        let matched = scores
            .iter()
            .zip(&matched_by_category)
            .find(|((c, _), _)| *c == winner)
            .map(|(_, m)| m.clone())
            .unwrap_or_default();

        let mut attributes = serde_json::Map::new();
        attributes.insert("scores".into(), scores_json(&scores));
        attributes.insert("matched_terms".into(), serde_json::json!(matched));
        attributes.insert("dominance".into(), serde_json::json!(round3(dominance)));

        MemoryClassification::new(winner, StrategyKind::Semantic.as_str(), confidence, attributes)
    }
}

fn term_present(term: &str, text: &str, tokens: &HashSet<&str>) -> bool {
    if term.contains(' ') {
        text.contains(term)
    } else {
        tokens.contains(term)
    }
}
