//! MCP `search_knowledge` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `search_knowledge` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchKnowledgeParams {
    #[schemars(description = "Natural language text to search for")]
    pub query: String,

    #[schemars(description = "Maximum number of results (1-50). Defaults to the configured limit.")]
    pub limit: Option<usize>,

    #[schemars(description = "Only return items from this source id")]
    pub source: Option<String>,

    /// One of the category names, e.g. `"task"`.
    #[schemars(
        description = "Only return items of this category: meeting, task, code, documentation, note, journal, reference"
    )]
    pub category: Option<String>,

    #[schemars(
        description = "Only return items with cosine distance strictly below this value (0.0-2.0)"
    )]
    pub max_distance: Option<f64>,
}
