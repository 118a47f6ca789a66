//! MCP `remove_source` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `remove_source` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RemoveSourceParams {
    #[schemars(description = "Source id whose items should all be deleted")]
    pub source: String,
}
