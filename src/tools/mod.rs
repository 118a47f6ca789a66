pub mod knowledge_stats;
pub mod remove_source;
pub mod route_query;
pub mod search_knowledge;
pub mod sync_source;

use knowledge_stats::KnowledgeStatsParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use remove_source::RemoveSourceParams;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use route_query::RouteQueryParams;
use search_knowledge::SearchKnowledgeParams;
use sync_source::SyncSourceParams;

use crate::server::SharedState;
use sift::classify::Category;
use sift::knowledge::search::SearchOptions;

const MAX_SEARCH_LIMIT: usize = 50;

/// The sift MCP tool handler. Holds shared state (knowledge store, dispatcher,
/// config) and exposes all MCP tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct SiftTools {
    tool_router: ToolRouter<Self>,
    state: SharedState,
}

#[tool_router]
impl SiftTools {
    pub fn new(state: SharedState) -> Self {
        Self {
            tool_router: Self::tool_router(),
            state,
        }
    }

    /// Sync a knowledge source into the store.
    #[tool(description = "Sync a knowledge source. For a markdown vault pass config {\"path\": \"<dir>\"}. Unchanged notes are skipped; new and edited notes are embedded and classified.")]
    async fn sync_source(
        &self,
        Parameters(params): Parameters<SyncSourceParams>,
    ) -> Result<String, String> {
        tracing::info!(source = %params.source, "sync_source called");

        let report = sift::source::sync_source(&self.state.store, &params.source, &params.config)
            .await
            .map_err(|e| format!("sync failed: {e:#}"))?;

        serde_json::to_string(&report).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Delete every item of a source.
    #[tool(description = "Delete every stored item of a source. Use when a vault is retired or moved; sync it again to re-import.")]
    async fn remove_source(
        &self,
        Parameters(params): Parameters<RemoveSourceParams>,
    ) -> Result<String, String> {
        if params.source.trim().is_empty() {
            return Err("source must not be empty".into());
        }
        tracing::info!(source = %params.source, "remove_source called");

        let removed = self
            .state
            .store
            .remove_source(&params.source)
            .await
            .map_err(|e| format!("remove failed: {e:#}"))?;

        serde_json::to_string(&serde_json::json!({
            "source": params.source,
            "removed": removed,
        }))
        .map_err(|e| format!("serialization failed: {e}"))
    }

    /// Semantic search over synced items.
    #[tool(description = "Search synced knowledge by meaning. Returns the closest items by cosine distance, optionally filtered by source and category.")]
    async fn search_knowledge(
        &self,
        Parameters(params): Parameters<SearchKnowledgeParams>,
    ) -> Result<String, String> {
        if params.query.trim().is_empty() {
            return Err("query must not be empty".into());
        }
        let limit = params
            .limit
            .unwrap_or(self.state.config.retrieval.default_limit);
        if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
            return Err(format!("limit must be between 1 and {MAX_SEARCH_LIMIT}"));
        }
        let category = params
            .category
            .as_deref()
            .map(str::parse::<Category>)
            .transpose()?;

        tracing::info!(query_len = params.query.len(), limit, "search_knowledge called");

        let options = SearchOptions {
            limit,
            source: params.source,
            category,
            max_distance: params
                .max_distance
                .or(self.state.config.retrieval.distance_threshold),
        };
        let hits = self
            .state
            .store
            .search(&params.query, options)
            .await
            .map_err(|e| format!("search failed: {e:#}"))?;

        serde_json::to_string(&serde_json::json!({
            "results": hits,
            "count": hits.len(),
        }))
        .map_err(|e| format!("serialization failed: {e}"))
    }

    /// Route a chat message to the best agent and return its answer.
    #[tool(description = "Answer a chat message by routing it to the most suitable agent (knowledge search, tasks, code). Keeps per-session history.")]
    async fn route_query(
        &self,
        Parameters(params): Parameters<RouteQueryParams>,
    ) -> Result<String, String> {
        if params.query.trim().is_empty() {
            return Err("query must not be empty".into());
        }
        let session = params.session_id.as_deref().unwrap_or("default");
        tracing::info!(session, "route_query called");

        let reply = self
            .state
            .dispatcher
            .answer(
                self.state.store.db(),
                session,
                &params.query,
                self.state.config.dispatch.history_limit,
            )
            .await
            .map_err(|e| format!("query failed: {e:#}"))?;

        serde_json::to_string(&reply).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Get statistics about the knowledge store.
    #[tool(description = "Get knowledge store statistics: item counts by source and category, embedded count, storage size.")]
    async fn knowledge_stats(
        &self,
        Parameters(_params): Parameters<KnowledgeStatsParams>,
    ) -> Result<String, String> {
        tracing::info!("knowledge_stats called");
        let stats = self
            .state
            .store
            .stats()
            .await
            .map_err(|e| format!("stats failed: {e:#}"))?;
        serde_json::to_string(&stats).map_err(|e| format!("serialization failed: {e}"))
    }
}

#[tool_handler]
impl ServerHandler for SiftTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "sift classifies and indexes your notes. Use sync_source to ingest a vault \
                 (remove_source to drop one), \
                 search_knowledge to find related items, and route_query to ask questions."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
