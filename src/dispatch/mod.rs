//! Agent dispatch: pick one agent for a chat query.
//!
//! 1. Every agent's availability is probed concurrently. A failing or
//!    panicking probe counts as unavailable.
//! 2. One candidate left: it is selected only if it says it can handle the
//!    query.
//! 3. Several left: the [`AgentMatcher`] names one. Its answer is trusted when
//!    it names a real candidate, otherwise the first candidate is used.
//!
//! | Path | Confidence | Reason |
//! |------|------------|--------|
//! | single candidate | 1.0 | `only available agent that can handle the query` |
//! | matcher named a candidate | 0.9 | `AI selection` |
//! | matcher answer unusable | 0.5 | `Fallback to first available` |
//! | matcher failed | 0.3 | `Error fallback` |

pub mod agents;
pub mod matcher;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::chat::{self, ChatMessage, Role};
use crate::error::ExternalError;
use crate::retry::{with_retry_for, RetryPolicy};
pub use matcher::{AgentMatcher, KeywordMatcher};

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    async fn check_availability(&self) -> Result<bool>;

    async fn can_handle(&self, query: &str, history: Option<&[ChatMessage]>) -> Result<bool>;

    async fn respond(&self, query: &str, history: Option<&[ChatMessage]>) -> Result<String>;
}

/// Outcome of one availability probe.
#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    Available,
    Unavailable,
    Failed(String),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectionReason {
    OnlyCandidate,
    AiSelection,
    FallbackToFirst,
    ErrorFallback,
}

impl SelectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnlyCandidate => "only available agent that can handle the query",
            Self::AiSelection => "AI selection",
            Self::FallbackToFirst => "Fallback to first available",
            Self::ErrorFallback => "Error fallback",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::OnlyCandidate => 1.0,
            Self::AiSelection => 0.9,
            Self::FallbackToFirst => 0.5,
            Self::ErrorFallback => 0.3,
        }
    }
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct AgentSelection {
    pub agent: Arc<dyn Agent>,
    pub confidence: f64,
    pub reason: SelectionReason,
}

impl AgentSelection {
    fn new(agent: Arc<dyn Agent>, reason: SelectionReason) -> Self {
        Self {
            agent,
            confidence: reason.confidence(),
            reason,
        }
    }
}

impl std::fmt::Debug for AgentSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSelection")
            .field("agent", &self.agent.name())
            .field("confidence", &self.confidence)
            .field("reason", &self.reason)
            .finish()
    }
}

/// A routed and answered chat query.
#[derive(Debug, Serialize)]
pub struct ChatReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub response: String,
}

const NO_AGENT_RESPONSE: &str = "No available agent can handle this query.";

pub struct Dispatcher {
    agents: Vec<Arc<dyn Agent>>,
    matcher: Arc<dyn AgentMatcher>,
    matcher_timeout: Duration,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(agents: Vec<Arc<dyn Agent>>, matcher: Arc<dyn AgentMatcher>) -> Self {
        Self {
            agents,
            matcher,
            matcher_timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
        }
    }

    /// Deadline for one matcher attempt.
    pub fn with_matcher_timeout(mut self, timeout: Duration) -> Self {
        self.matcher_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    /// Probe every agent concurrently, in registration order.
    pub async fn availability(&self) -> Vec<Availability> {
        let probes = self.agents.iter().map(|agent| {
            let agent = Arc::clone(agent);
            tokio::spawn(async move { agent.check_availability().await })
        });

        futures::future::join_all(probes)
            .await
            .into_iter()
            .zip(&self.agents)
            .map(|(joined, agent)| match joined {
                Ok(Ok(true)) => Availability::Available,
                Ok(Ok(false)) => Availability::Unavailable,
                Ok(Err(e)) => {
                    tracing::warn!(agent = agent.name(), error = %format!("{e:#}"), "availability check failed");
                    Availability::Failed(format!("{e:#}"))
                }
                Err(e) => {
                    tracing::warn!(agent = agent.name(), error = %e, "availability check aborted");
                    Availability::Failed(e.to_string())
                }
            })
            .collect()
    }

    /// Choose an agent for `query`, or `None` when no candidate fits.
    pub async fn select(
        &self,
        query: &str,
        history: Option<&[ChatMessage]>,
    ) -> Option<AgentSelection> {
        let candidates: Vec<Arc<dyn Agent>> = self
            .availability()
            .await
            .into_iter()
            .zip(&self.agents)
            .filter(|(availability, _)| availability.is_available())
            .map(|(_, agent)| Arc::clone(agent))
            .collect();

        match candidates.as_slice() {
            [] => {
                tracing::info!("no agent available");
                None
            }
            [only] => match only.can_handle(query, history).await {
                Ok(true) => Some(AgentSelection::new(
                    Arc::clone(only),
                    SelectionReason::OnlyCandidate,
                )),
                Ok(false) => {
                    tracing::info!(agent = only.name(), "only available agent declined the query");
                    None
                }
                Err(e) => {
                    tracing::warn!(agent = only.name(), error = %format!("{e:#}"), "applicability check failed");
                    None
                }
            },
            [first, ..] => {
                let descriptions: Vec<String> = candidates
                    .iter()
                    .map(|a| format!("{}: {}", a.name(), a.description()))
                    .collect();

                let selection = match self.ask_matcher(query, &descriptions, history).await {
                    Ok(answer) => match find_by_name(&candidates, &answer) {
                        Some(agent) => AgentSelection::new(agent, SelectionReason::AiSelection),
                        None => {
                            tracing::info!(answer = %answer, "matcher answer names no candidate");
                            AgentSelection::new(Arc::clone(first), SelectionReason::FallbackToFirst)
                        }
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "agent matcher failed");
                        AgentSelection::new(Arc::clone(first), SelectionReason::ErrorFallback)
                    }
                };
                Some(selection)
            }
        }
    }

    async fn ask_matcher(
        &self,
        query: &str,
        descriptions: &[String],
        history: Option<&[ChatMessage]>,
    ) -> Result<String, ExternalError> {
        with_retry_for(&self.retry, ExternalError::is_transient, || async {
            tokio::time::timeout(
                self.matcher_timeout,
                self.matcher.select_name(query, descriptions, history),
            )
            .await
            .map_err(|_| ExternalError::Timeout {
                operation: "agent matcher",
                after: self.matcher_timeout,
            })?
        })
        .await
    }

    /// Answer a chat query within `session_id`: load history, route, respond,
    /// and record both sides of the exchange.
    pub async fn answer(
        &self,
        db: &Arc<Mutex<Connection>>,
        session_id: &str,
        query: &str,
        history_limit: usize,
    ) -> Result<ChatReply> {
        let history = {
            let db = Arc::clone(db);
            let session = session_id.to_string();
            tokio::task::spawn_blocking(move || {
                let conn = db
                    .lock()
                    .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
                chat::load_history(&conn, &session, history_limit)
            })
            .await
            .context("history task failed")??
        };
        let history_ref = (!history.is_empty()).then_some(history.as_slice());

        let reply = match self.select(query, history_ref).await {
            Some(selection) => {
                let response = selection.agent.respond(query, history_ref).await?;
                ChatReply {
                    agent: Some(selection.agent.name().to_string()),
                    confidence: selection.confidence,
                    reason: Some(selection.reason.as_str().to_string()),
                    response,
                }
            }
            None => ChatReply {
                agent: None,
                confidence: 0.0,
                reason: None,
                response: NO_AGENT_RESPONSE.to_string(),
            },
        };

        let db = Arc::clone(db);
        let session = session_id.to_string();
        let (query_text, response, agent) =
            (query.to_string(), reply.response.clone(), reply.agent.clone());
        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            chat::append_message(&conn, &session, Role::User, &query_text, None)?;
            chat::append_message(&conn, &session, Role::Assistant, &response, agent.as_deref())
        })
        .await
        .context("history task failed")??;

        tracing::info!(
            session = session_id,
            agent = reply.agent.as_deref().unwrap_or("none"),
            confidence = reply.confidence,
            "chat query answered"
        );
        Ok(reply)
    }
}

/// Match a free-text answer against candidate names, ignoring case,
/// surrounding whitespace, and quotes or backticks.
fn find_by_name(candidates: &[Arc<dyn Agent>], answer: &str) -> Option<Arc<dyn Agent>> {
    let wanted = answer
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .trim();
    if wanted.is_empty() {
        return None;
    }
    candidates
        .iter()
        .find(|a| a.name().eq_ignore_ascii_case(wanted))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Stub {
        name: &'static str,
        available: Result<bool, &'static str>,
        handles: Result<bool, &'static str>,
    }

    impl Stub {
        fn ready(name: &'static str) -> Arc<dyn Agent> {
            Arc::new(Self {
                name,
                available: Ok(true),
                handles: Ok(true),
            })
        }

        fn with(
            name: &'static str,
            available: Result<bool, &'static str>,
            handles: Result<bool, &'static str>,
        ) -> Arc<dyn Agent> {
            Arc::new(Self {
                name,
                available,
                handles,
            })
        }
    }

    #[async_trait]
    impl Agent for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "stub agent"
        }

        async fn check_availability(&self) -> Result<bool> {
            self.available.map_err(anyhow::Error::msg)
        }

        async fn can_handle(&self, _query: &str, _history: Option<&[ChatMessage]>) -> Result<bool> {
            self.handles.map_err(anyhow::Error::msg)
        }

        async fn respond(&self, query: &str, _history: Option<&[ChatMessage]>) -> Result<String> {
            Ok(format!("{} answered {query}", self.name))
        }
    }

    struct PanicsOnProbe;

    #[async_trait]
    impl Agent for PanicsOnProbe {
        fn name(&self) -> &str {
            "panics"
        }
        fn description(&self) -> &str {
            "always panics"
        }
        async fn check_availability(&self) -> Result<bool> {
            panic!("probe exploded")
        }
        async fn can_handle(&self, _: &str, _: Option<&[ChatMessage]>) -> Result<bool> {
            Ok(true)
        }
        async fn respond(&self, _: &str, _: Option<&[ChatMessage]>) -> Result<String> {
            Ok(String::new())
        }
    }

    /// Answers with a fixed string.
    struct Says(&'static str);

    #[async_trait]
    impl AgentMatcher for Says {
        async fn select_name(
            &self,
            _query: &str,
            _descriptions: &[String],
            _history: Option<&[ChatMessage]>,
        ) -> Result<String, ExternalError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing {
        calls: AtomicU32,
    }

    #[async_trait]
    impl AgentMatcher for Failing {
        async fn select_name(
            &self,
            _query: &str,
            _descriptions: &[String],
            _history: Option<&[ChatMessage]>,
        ) -> Result<String, ExternalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ExternalError::failed("agent matcher", "rate limited"))
        }
    }

    struct Hangs;

    #[async_trait]
    impl AgentMatcher for Hangs {
        async fn select_name(
            &self,
            _query: &str,
            _descriptions: &[String],
            _history: Option<&[ChatMessage]>,
        ) -> Result<String, ExternalError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("alpha".into())
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            factor: 1.0,
        }
    }

    fn dispatcher(agents: Vec<Arc<dyn Agent>>, matcher: impl AgentMatcher + 'static) -> Dispatcher {
        Dispatcher::new(agents, Arc::new(matcher)).with_retry_policy(fast_retry())
    }

    #[tokio::test]
    async fn nothing_available_selects_nothing() {
        let d = dispatcher(
            vec![
                Stub::with("alpha", Ok(false), Ok(true)),
                Stub::with("beta", Err("probe failed"), Ok(true)),
            ],
            Says("alpha"),
        );
        assert!(d.select("hi", None).await.is_none());
    }

    #[tokio::test]
    async fn single_applicable_candidate_is_certain() {
        let d = dispatcher(
            vec![
                Stub::with("alpha", Err("probe failed"), Ok(true)),
                Stub::ready("beta"),
                Stub::with("gamma", Ok(false), Ok(true)),
            ],
            Says("alpha"),
        );
        let selection = d.select("hi", None).await.unwrap();
        assert_eq!(selection.agent.name(), "beta");
        assert_eq!(selection.confidence, 1.0);
        assert_eq!(
            selection.reason.as_str(),
            "only available agent that can handle the query"
        );
    }

    #[tokio::test]
    async fn single_inapplicable_candidate_selects_nothing() {
        let declines = dispatcher(vec![Stub::with("alpha", Ok(true), Ok(false))], Says("alpha"));
        assert!(declines.select("hi", None).await.is_none());

        let errors = dispatcher(vec![Stub::with("alpha", Ok(true), Err("boom"))], Says("alpha"));
        assert!(errors.select("hi", None).await.is_none());
    }

    #[tokio::test]
    async fn matcher_naming_a_candidate_wins() {
        let d = dispatcher(vec![Stub::ready("alpha"), Stub::ready("beta")], Says("beta"));
        let selection = d.select("hi", None).await.unwrap();
        assert_eq!(selection.agent.name(), "beta");
        assert_eq!(selection.confidence, 0.9);
        assert_eq!(selection.reason.as_str(), "AI selection");
    }

    #[tokio::test]
    async fn matcher_answer_is_normalized() {
        let d = dispatcher(vec![Stub::ready("alpha"), Stub::ready("beta")], Says("  `Beta`\n"));
        let selection = d.select("hi", None).await.unwrap();
        assert_eq!(selection.agent.name(), "beta");
        assert_eq!(selection.reason, SelectionReason::AiSelection);
    }

    #[tokio::test]
    async fn unknown_name_falls_back_to_first_available() {
        let d = dispatcher(
            vec![
                Stub::with("alpha", Ok(false), Ok(true)),
                Stub::ready("beta"),
                Stub::ready("gamma"),
            ],
            Says("delta"),
        );
        let selection = d.select("hi", None).await.unwrap();
        assert_eq!(selection.agent.name(), "beta");
        assert_eq!(selection.confidence, 0.5);
        assert_eq!(selection.reason.as_str(), "Fallback to first available");

        let empty = dispatcher(vec![Stub::ready("alpha"), Stub::ready("beta")], Says(""));
        let selection = empty.select("hi", None).await.unwrap();
        assert_eq!(selection.reason, SelectionReason::FallbackToFirst);
    }

    #[tokio::test]
    async fn matcher_failure_is_retried_then_falls_back() {
        let matcher = Arc::new(Failing {
            calls: AtomicU32::new(0),
        });
        let d = Dispatcher::new(vec![Stub::ready("alpha"), Stub::ready("beta")], matcher.clone())
            .with_retry_policy(fast_retry());

        let selection = d.select("hi", None).await.unwrap();
        assert_eq!(selection.agent.name(), "alpha");
        assert_eq!(selection.confidence, 0.3);
        assert_eq!(selection.reason.as_str(), "Error fallback");
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn matcher_timeout_is_an_error() {
        let d = dispatcher(vec![Stub::ready("alpha"), Stub::ready("beta")], Hangs)
            .with_matcher_timeout(Duration::from_secs(2));
        let selection = d.select("hi", None).await.unwrap();
        assert_eq!(selection.reason, SelectionReason::ErrorFallback);
        assert_eq!(selection.agent.name(), "alpha");
    }

    #[tokio::test]
    async fn panicking_probe_counts_as_unavailable() {
        let d = dispatcher(
            vec![Arc::new(PanicsOnProbe) as Arc<dyn Agent>, Stub::ready("beta")],
            Says("panics"),
        );
        let availability = d.availability().await;
        assert!(matches!(availability[0], Availability::Failed(_)));
        assert!(availability[1].is_available());

        let selection = d.select("hi", None).await.unwrap();
        assert_eq!(selection.agent.name(), "beta");
        assert_eq!(selection.reason, SelectionReason::OnlyCandidate);
    }

    #[tokio::test]
    async fn answer_records_both_messages() {
        let db = Arc::new(Mutex::new(crate::db::open_memory_database().unwrap()));
        let d = dispatcher(vec![Stub::ready("alpha")], Says("alpha"));

        let reply = d.answer(&db, "s1", "status?", 10).await.unwrap();
        assert_eq!(reply.agent.as_deref(), Some("alpha"));
        assert_eq!(reply.response, "alpha answered status?");

        let conn = db.lock().unwrap();
        let history = chat::load_history(&conn, "s1", 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].agent.as_deref(), Some("alpha"));
    }

    #[tokio::test]
    async fn answer_without_agent_still_records() {
        let db = Arc::new(Mutex::new(crate::db::open_memory_database().unwrap()));
        let d = dispatcher(vec![Stub::with("alpha", Ok(false), Ok(true))], Says("alpha"));

        let reply = d.answer(&db, "s1", "status?", 10).await.unwrap();
        assert!(reply.agent.is_none());
        assert_eq!(reply.confidence, 0.0);

        let conn = db.lock().unwrap();
        assert_eq!(chat::load_history(&conn, "s1", 10).unwrap().len(), 2);
    }
}
