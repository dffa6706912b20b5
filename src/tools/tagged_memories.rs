use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TaggedMemoriesParams {
    #[schemars(description = "Exact tag to filter by, e.g. 'important' or 'hobby'")]
    pub tag: String,
}
