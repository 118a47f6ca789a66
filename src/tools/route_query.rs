//! MCP `route_query` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `route_query` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RouteQueryParams {
    #[schemars(description = "The chat message to answer")]
    pub query: String,

    /// Conversation id; history is kept per session. Defaults to `"default"`.
    #[schemars(description = "Chat session id. Messages in the same session share history. Defaults to 'default'.")]
    pub session_id: Option<String>,
}
