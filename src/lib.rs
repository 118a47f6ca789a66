//! Classify, index, and query personal knowledge.
//!
//! sift ingests notes from knowledge sources, classifies each one with an
//! ensemble of independent strategies, embeds it, and stores it in SQLite for
//! similarity search. Chat queries are routed to one of several agents by a
//! dispatcher.
//!
//! | Category | Typical signal |
//! |----------|----------------|
//! | **meeting** | agenda and attendee sections, calendar sources |
//! | **task** | checkbox lists, issue trackers |
//! | **code** | fenced code, repository sources |
//! | **documentation** | many headings over a long body |
//! | **note** | short, flat text |
//! | **journal** | dated titles, daily-note folders |
//! | **reference** | link-dense lists, bookmark sources |
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for exact cosine distance over stored embeddings
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions)
//! - **Classification**: semantic, structural, and context strategies merged by weighted vote
//! - **Transport**: MCP over stdio (primary) or streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema, migrations, and health checks
//! - [`embedding`]: Text-to-vector embedding pipeline via ONNX Runtime
//! - [`classify`]: Classification strategies and the ensemble combiner
//! - [`knowledge`]: Knowledge store: upsert, similarity search, stats
//! - [`source`]: Markdown normalizer and vault sync
//! - [`dispatch`]: Agent dispatcher, matcher, and built-in agents
//! - [`chat`]: Chat session history
//! - [`retry`]: Exponential-backoff retry helper
//! - [`error`]: Typed errors for external calls

pub mod chat;
pub mod classify;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod retry;
pub mod source;
