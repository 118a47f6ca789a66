//! Metadata-only classification.
//!
//! Four signals accumulate per category, never reading the note body:
//!
//! | Signal | Weight |
//! |--------|--------|
//! | file path regexes | 0.9 × fraction of that category's patterns matched |
//! | tag keywords | 0.8 × fraction of tags that match |
//! | recency (<24h task, <7d note, older documentation) | 0.3 |
//! | source affinity table | 0.5 × affinity |

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    best_score, scores_json, Category, ClassificationStrategy, MemoryClassification, Metadata,
    StrategyKind,
};

const PATH_WEIGHT: f64 = 0.9;
const TAG_WEIGHT: f64 = 0.8;
const TEMPORAL_WEIGHT: f64 = 0.3;
const SOURCE_WEIGHT: f64 = 0.5;

static PATH_PATTERNS: Lazy<Vec<(Category, Vec<Regex>)>> = Lazy::new(|| {
    let table: &[(Category, &[&str])] = &[
        (
            Category::Meeting,
            &[
                r"(?i)(^|/)meetings?/",
                r"(?i)(standup|stand-up|1-on-1|one-on-one|retro|sync)",
                r"(?i)minutes",
            ],
        ),
        (
            Category::Task,
            &[r"(?i)(^|/)(tasks?|todos?)/", r"(?i)todo", r"(?i)(^|/)(projects?|sprints?)/"],
        ),
        (
            Category::Code,
            &[
                r"(?i)(^|/)(src|code|snippets?|dev)/",
                r"(?i)\.(rs|py|js|ts|go|java|sh|sql)(\.md)?$",
                r"(?i)(snippet|gist)",
            ],
        ),
        (
            Category::Documentation,
            &[
                r"(?i)(^|/)(docs?|documentation|wiki|guides?)/",
                r"(?i)readme",
                r"(?i)(guide|howto|how-to|manual)",
            ],
        ),
        (
            Category::Note,
            &[r"(?i)(^|/)(notes?|inbox|ideas?|scratch)/", r"(?i)(idea|scratch|draft)"],
        ),
        (
            Category::Journal,
            &[r"(?i)(^|/)(journal|daily|diary)/", r"(?i)\d{4}-\d{2}-\d{2}\.md$"],
        ),
        (
            Category::Reference,
            &[
                r"(?i)(^|/)(references?|resources|bookmarks|reading|library)/",
                r"(?i)(bookmark|reading-list)",
            ],
        ),
    ];
    table
        .iter()
        .map(|(category, patterns)| {
            let compiled = patterns
                .iter()
                .map(|p| Regex::new(p).expect("static regex"))
                .collect();
            (*category, compiled)
        })
        .collect()
});

const TAG_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Meeting,
        &["meeting", "meetings", "standup", "1on1", "retro", "sync", "minutes"],
    ),
    (
        Category::Task,
        &["task", "tasks", "todo", "action", "project", "sprint", "jira"],
    ),
    (
        Category::Code,
        &["code", "dev", "programming", "rust", "python", "snippet", "bug"],
    ),
    (
        Category::Documentation,
        &["docs", "documentation", "guide", "howto", "wiki", "spec"],
    ),
    (Category::Note, &["note", "notes", "idea", "thought", "inbox", "draft"]),
    (Category::Journal, &["journal", "daily", "diary", "personal"]),
    (
        Category::Reference,
        &["reference", "bookmark", "reading", "resource", "article", "paper"],
    ),
];

const SOURCE_AFFINITY: &[(&str, Category, f64)] = &[
    ("jira", Category::Task, 0.9),
    ("linear", Category::Task, 0.9),
    ("todoist", Category::Task, 0.9),
    ("github", Category::Code, 0.8),
    ("gitlab", Category::Code, 0.8),
    ("confluence", Category::Documentation, 0.8),
    ("notion", Category::Documentation, 0.6),
    ("calendar", Category::Meeting, 0.9),
    ("zoom", Category::Meeting, 0.8),
    ("obsidian", Category::Note, 0.6),
    ("vault", Category::Note, 0.5),
    ("zotero", Category::Reference, 0.9),
    ("pocket", Category::Reference, 0.8),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct ContextStrategy {
    /// Fixed clock for recency; `None` reads the system clock per call.
    now: Option<DateTime<Utc>>,
}

impl ContextStrategy {
    pub fn new() -> Self {
        Self { now: None }
    }

    /// Evaluate recency against a fixed instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Some(now) }
    }
}

impl ClassificationStrategy for ContextStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Context
    }

    fn classify(&self, _content: &str, metadata: Option<&Metadata>) -> MemoryClassification {
        let Some(metadata) = metadata.filter(|m| !m.is_empty()) else {
            return MemoryClassification::unknown(StrategyKind::Context.as_str());
        };

        let mut scores: Vec<(Category, f64)> =
            Category::KNOWN.iter().map(|c| (*c, 0.0)).collect();
        let mut signals = serde_json::Map::new();

        if let Some(path) = metadata.get("path").and_then(|v| v.as_str()) {
            let mut matched = serde_json::Map::new();
            for (category, patterns) in PATH_PATTERNS.iter() {
                let hits = patterns.iter().filter(|re| re.is_match(path)).count();
                if hits > 0 {
                    let fraction = hits as f64 / patterns.len() as f64;
                    add(&mut scores, *category, PATH_WEIGHT * fraction);
                    matched.insert(category.as_str().into(), serde_json::json!(hits));
                }
            }
            if !matched.is_empty() {
                signals.insert("path".into(), serde_json::Value::Object(matched));
            }
        }

        let tags = read_tags(metadata);
        if !tags.is_empty() {
            let mut matched = serde_json::Map::new();
            for (category, keywords) in TAG_KEYWORDS {
                let hits = tags
                    .iter()
                    .filter(|tag| tag_matches(tag, keywords))
                    .count();
                if hits > 0 {
                    add(&mut scores, *category, TAG_WEIGHT * hits as f64 / tags.len() as f64);
                    matched.insert(category.as_str().into(), serde_json::json!(hits));
                }
            }
            if !matched.is_empty() {
                signals.insert("tags".into(), serde_json::Value::Object(matched));
            }
        }

        if let Some(timestamp) = read_timestamp(metadata) {
            let now = self.now.unwrap_or_else(Utc::now);
            let age = now.signed_duration_since(timestamp);
            let (bucket, category) = if age < chrono::Duration::hours(24) {
                ("day", Category::Task)
            } else if age < chrono::Duration::days(7) {
                ("week", Category::Note)
            } else {
                ("older", Category::Documentation)
            };
            add(&mut scores, category, TEMPORAL_WEIGHT);
            signals.insert("recency".into(), serde_json::json!(bucket));
        }

        if let Some(source) = metadata.get("source").and_then(|v| v.as_str()) {
            let source = source.to_lowercase();
            if let Some((_, category, affinity)) =
                SOURCE_AFFINITY.iter().find(|(name, _, _)| *name == source)
            {
                add(&mut scores, *category, SOURCE_WEIGHT * affinity);
                signals.insert("source".into(), serde_json::json!(source));
            }
        }

        let Some((winner, score)) = best_score(&scores) else {
            return MemoryClassification::unknown(StrategyKind::Context.as_str());
        };

        let mut attributes = serde_json::Map::new();
        attributes.insert("scores".into(), scores_json(&scores));
        attributes.insert("signals".into(), serde_json::Value::Object(signals));

        MemoryClassification::new(winner, StrategyKind::Context.as_str(), score.min(1.0), attributes)
    }
}

fn add(scores: &mut [(Category, f64)], category: Category, amount: f64) {
    if let Some(entry) = scores.iter_mut().find(|(c, _)| *c == category) {
        entry.1 += amount;
    }
}

/// Tags may be a JSON array or a comma-separated string.
fn read_tags(metadata: &Metadata) -> Vec<String> {
    let normalize = |t: &str| t.trim().trim_start_matches('#').to_lowercase();
    let tags: Vec<String> = match metadata.get("tags") {
        Some(serde_json::Value::Array(values)) => values
            .iter()
            .filter_map(|v| v.as_str())
            .map(normalize)
            .collect(),
        Some(serde_json::Value::String(s)) => s.split(',').map(normalize).collect(),
        _ => Vec::new(),
    };
    tags.into_iter().filter(|t| !t.is_empty()).collect()
}

/// A nested tag like `work/meeting` matches on its last segment too.
fn tag_matches(tag: &str, keywords: &[&str]) -> bool {
    let leaf = tag.rsplit('/').next().unwrap_or(tag);
    keywords.iter().any(|k| *k == tag || *k == leaf)
}

/// `modified_at`, falling back to `created_at`; RFC 3339 strings or epoch seconds.
fn read_timestamp(metadata: &Metadata) -> Option<DateTime<Utc>> {
    ["modified_at", "created_at"]
        .iter()
        .filter_map(|key| metadata.get(*key))
        .find_map(|value| match value {
            serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            _ => None,
        })
}
