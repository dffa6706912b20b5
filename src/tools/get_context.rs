//! MCP `get_context` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `get_context` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetContextParams {
    /// The new user message to find relevant past turns for.
    #[schemars(description = "Text to find relevant past conversation turns for")]
    pub query: String,

    /// Number of nearest turns to consider (1-50). Defaults to the configured `default_k`.
    #[schemars(description = "Number of nearest turns to consider (1-50). Defaults to 5.")]
    pub k: Option<usize>,
}
