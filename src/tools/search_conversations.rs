//! MCP `search_conversations` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `search_conversations` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchConversationsParams {
    /// Literal text to look for in either side of a turn.
    #[schemars(description = "Literal text to find in the user or assistant side of past turns")]
    pub text: String,
}
