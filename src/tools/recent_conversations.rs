use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecentConversationsParams {
    #[schemars(description = "Maximum number of turns to return (1-100). Defaults to 10.")]
    pub limit: Option<usize>,
}
