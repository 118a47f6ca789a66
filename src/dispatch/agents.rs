//! Built-in agents answering from the knowledge store.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;

use super::Agent;
use crate::chat::ChatMessage;
use crate::classify::Category;
use crate::knowledge::search::{SearchHit, SearchOptions};
use crate::knowledge::service::KnowledgeStore;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z][a-z0-9_-]*").expect("static regex"));

const TASK_WORDS: &[&str] = &[
    "task", "tasks", "todo", "todos", "deadline", "deadlines", "due", "assigned", "priority",
    "backlog", "sprint", "ticket", "tickets", "remind", "reminder", "overdue", "checklist",
];

const CODE_WORDS: &[&str] = &[
    "code", "function", "functions", "bug", "bugs", "compile", "compiler", "error", "api",
    "snippet", "snippets", "refactor", "implement", "implementation", "class", "struct",
    "script", "rust", "python", "typescript", "sql", "library",
];

const PREVIEW_CHARS: usize = 160;

/// Semantic search over everything embedded.
pub struct KnowledgeSearchAgent {
    store: KnowledgeStore,
    limit: usize,
}

impl KnowledgeSearchAgent {
    pub const NAME: &'static str = "knowledge_search";

    pub fn new(store: KnowledgeStore, limit: usize) -> Self {
        Self { store, limit }
    }
}

#[async_trait]
impl Agent for KnowledgeSearchAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Searches all synced notes and documents for passages related to the question"
    }

    async fn check_availability(&self) -> Result<bool> {
        Ok(self.store.count_embedded(None).await? > 0)
    }

    async fn can_handle(&self, query: &str, _history: Option<&[ChatMessage]>) -> Result<bool> {
        Ok(!query.trim().is_empty())
    }

    async fn respond(&self, query: &str, _history: Option<&[ChatMessage]>) -> Result<String> {
        let hits = self.store.search(query, SearchOptions::limit(self.limit)).await?;
        Ok(render_hits("Related notes", &hits))
    }
}

/// Answers from `task` items.
pub struct TaskAgent {
    store: KnowledgeStore,
    limit: usize,
}

impl TaskAgent {
    pub const NAME: &'static str = "task";

    pub fn new(store: KnowledgeStore, limit: usize) -> Self {
        Self { store, limit }
    }
}

#[async_trait]
impl Agent for TaskAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Finds open tasks, todos, tickets and deadlines"
    }

    async fn check_availability(&self) -> Result<bool> {
        Ok(self.store.count_embedded(Some(Category::Task)).await? > 0)
    }

    async fn can_handle(&self, query: &str, history: Option<&[ChatMessage]>) -> Result<bool> {
        Ok(mentions(query, history, TASK_WORDS))
    }

    async fn respond(&self, query: &str, _history: Option<&[ChatMessage]>) -> Result<String> {
        let options = SearchOptions {
            category: Some(Category::Task),
            ..SearchOptions::limit(self.limit)
        };
        let hits = self.store.search(query, options).await?;
        Ok(render_hits("Matching tasks", &hits))
    }
}

/// Answers from `code` items.
pub struct CodeAgent {
    store: KnowledgeStore,
    limit: usize,
}

impl CodeAgent {
    pub const NAME: &'static str = "code";

    pub fn new(store: KnowledgeStore, limit: usize) -> Self {
        Self { store, limit }
    }
}

#[async_trait]
impl Agent for CodeAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Looks up code snippets, functions, APIs and bug notes"
    }

    async fn check_availability(&self) -> Result<bool> {
        Ok(self.store.count_embedded(Some(Category::Code)).await? > 0)
    }

    async fn can_handle(&self, query: &str, history: Option<&[ChatMessage]>) -> Result<bool> {
        Ok(mentions(query, history, CODE_WORDS))
    }

    async fn respond(&self, query: &str, _history: Option<&[ChatMessage]>) -> Result<String> {
        let options = SearchOptions {
            category: Some(Category::Code),
            ..SearchOptions::limit(self.limit)
        };
        let hits = self.store.search(query, options).await?;
        Ok(render_hits("Matching code notes", &hits))
    }
}

/// Whether the query or the last history message uses any of `vocabulary`.
fn mentions(query: &str, history: Option<&[ChatMessage]>, vocabulary: &[&str]) -> bool {
    let hit = |text: &str| {
        let lower = text.to_lowercase();
        WORD.find_iter(&lower).any(|m| vocabulary.contains(&m.as_str()))
    };
    hit(query) || history.and_then(|h| h.last()).is_some_and(|m| hit(&m.content))
}

fn render_hits(heading: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No matching items found.".to_string();
    }
    let mut out = format!("{heading}:\n");
    for (i, hit) in hits.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} [{}] (distance {:.3})\n   {}",
            i + 1,
            hit.path,
            hit.category.as_deref().unwrap_or("unclassified"),
            hit.distance,
            preview(&hit.content),
        );
    }
    out
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_matches_query_or_last_message() {
        assert!(mentions("what is due this week?", None, TASK_WORDS));
        assert!(!mentions("tell me about cats", None, TASK_WORDS));

        let history = vec![
            ChatMessage::user("show my tickets"),
            ChatMessage::user("the parser bug"),
        ];
        assert!(mentions("and that one?", Some(&history), CODE_WORDS));
        assert!(!mentions("and that one?", Some(&history), TASK_WORDS));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(PREVIEW_CHARS + 10);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("a\n  b"), "a b");
    }

    #[test]
    fn empty_hits_render_placeholder() {
        assert_eq!(render_hits("Related", &[]), "No matching items found.");
    }
}
