use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::chat::ChatMessage;
use crate::error::ExternalError;

/// Picks one agent name from a list of `name: description` lines.
///
/// Implementations may call a model. They answer with free text; the
/// dispatcher decides whether the answer names a real candidate.
#[async_trait]
pub trait AgentMatcher: Send + Sync {
    async fn select_name(
        &self,
        query: &str,
        descriptions: &[String],
        history: Option<&[ChatMessage]>,
    ) -> Result<String, ExternalError>;
}

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]{3,}").expect("static regex"));

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "what", "how", "can",
    "you", "about", "into", "any", "all", "its", "agent",
];

/// Offline matcher: the candidate whose description shares the most words
/// with the query (and the last history message). Answers with an empty name
/// when nothing overlaps.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordMatcher;

#[async_trait]
impl AgentMatcher for KeywordMatcher {
    async fn select_name(
        &self,
        query: &str,
        descriptions: &[String],
        history: Option<&[ChatMessage]>,
    ) -> Result<String, ExternalError> {
        let mut words = tokens(query);
        if let Some(last) = history.and_then(|h| h.last()) {
            words.extend(tokens(&last.content));
        }

        let mut best: Option<(&str, usize)> = None;
        for line in descriptions {
            let (name, description) = line.split_once(':').unwrap_or((line.as_str(), ""));
            let overlap = tokens(description).intersection(&words).count();
            if overlap > 0 && best.map_or(true, |(_, n)| overlap > n) {
                best = Some((name.trim(), overlap));
            }
        }
        Ok(best.map(|(name, _)| name.to_string()).unwrap_or_default())
    }
}

fn tokens(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| !STOPWORDS.contains(w))
        .map(|w| w.trim_end_matches('s').to_string())
        .collect()
}
