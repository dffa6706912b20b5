//! MCP `add_memory` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddMemoryParams {
    #[schemars(description = "What the user said in this turn")]
    pub user: String,

    #[schemars(description = "What the assistant replied")]
    pub bot: String,

    #[schemars(
        description = "Optional category labels. Tag a turn 'important' to keep it relevant regardless of age."
    )]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Conversation this turn belongs to. Defaults to 'default'.")]
    pub conversation_id: Option<String>,

    #[schemars(description = "Optional named entities mentioned in the turn (kept in the relational log)")]
    pub entities: Option<Vec<String>>,

    #[schemars(description = "Sentiment polarity of the user text, -1.0 to 1.0")]
    pub polarity: Option<f32>,

    #[schemars(description = "Subjectivity of the user text, 0.0 to 1.0")]
    pub subjectivity: Option<f32>,
}
