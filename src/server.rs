//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that wire up the
//! database, embedding provider, classifier, and dispatcher into a running
//! server. CLI commands reuse [`setup_shared_state`].

use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

use crate::tools::SiftTools;
use sift::classify::ensemble::EnsembleClassifier;
use sift::config::SiftConfig;
use sift::db;
use sift::dispatch::agents::{CodeAgent, KnowledgeSearchAgent, TaskAgent};
use sift::dispatch::{Agent, Dispatcher, KeywordMatcher};
use sift::embedding;
use sift::knowledge::service::KnowledgeStore;
use sift::knowledge::store::count_stale_embeddings;

/// Everything a request handler needs, cheap to clone.
#[derive(Clone)]
pub struct SharedState {
    pub store: KnowledgeStore,
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<SiftConfig>,
}

/// Open the DB, record the configured embedding model, create the provider,
/// and assemble the store and dispatcher.
pub fn setup_shared_state(config: SiftConfig) -> Result<SharedState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let configured = &config.embedding.model;
    if let Some(previous) = db::migrations::record_embedding_model(&conn, configured)? {
        let stale = count_stale_embeddings(&conn, configured)?;
        tracing::warn!(
            previous = %previous,
            configured = %configured,
            stale,
            "embedding model changed; stale items are re-embedded on the next sync of their source"
        );
    }

    let db = Arc::new(Mutex::new(conn));

    let provider = embedding::create_provider(&config.embedding)?;
    let embedding: Arc<dyn embedding::EmbeddingProvider> = Arc::from(provider);
    tracing::info!("embedding provider ready");

    let classifier = Arc::new(EnsembleClassifier::new(config.classification.clone()));
    let store = KnowledgeStore::new(db, embedding, classifier)
        .with_embed_timeout(std::time::Duration::from_secs(config.embedding.timeout_secs))
        .with_embedding_model(config.embedding.model.clone())
        .with_retry_policy(config.retry.policy())
        .with_db_path(&db_path);

    let limit = config.retrieval.default_limit;
    let agents: Vec<Arc<dyn Agent>> = vec![
        Arc::new(KnowledgeSearchAgent::new(store.clone(), limit)),
        Arc::new(TaskAgent::new(store.clone(), limit)),
        Arc::new(CodeAgent::new(store.clone(), limit)),
    ];
    let dispatcher = Dispatcher::new(agents, Arc::new(KeywordMatcher))
        .with_matcher_timeout(std::time::Duration::from_secs(
            config.dispatch.matcher_timeout_secs,
        ))
        .with_retry_policy(
            config
                .retry
                .policy()
                .with_max_attempts(config.dispatch.matcher_max_attempts),
        );

    Ok(SharedState {
        store,
        dispatcher: Arc::new(dispatcher),
        config: Arc::new(config),
    })
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: SiftConfig) -> Result<()> {
    tracing::info!("starting sift MCP server on stdio");

    let state = setup_shared_state(config)?;

    let tools = SiftTools::new(state);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over streamable HTTP transport.
pub async fn serve_http(config: SiftConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting sift MCP server on HTTP");

    let state = setup_shared_state(config)?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(SiftTools::new(state.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
