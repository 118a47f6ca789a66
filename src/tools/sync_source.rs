//! MCP `sync_source` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `sync_source` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SyncSourceParams {
    /// Source id the items are stored under, e.g. `"vault"`.
    #[schemars(description = "Source id to store items under, e.g. 'vault' or 'work-notes'")]
    pub source: String,

    /// Source configuration. A markdown vault needs `path`.
    #[schemars(
        description = "Source configuration map. For a markdown vault: {\"path\": \"~/notes\"}"
    )]
    pub config: serde_json::Map<String, serde_json::Value>,
}
