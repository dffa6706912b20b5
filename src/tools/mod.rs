pub mod add_memory;
pub mod get_context;
pub mod recent_conversations;
pub mod search_conversations;
pub mod tagged_memories;

use add_memory::AddMemoryParams;
use get_context::GetContextParams;
use recent_conversations::RecentConversationsParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search_conversations::SearchConversationsParams;
use std::sync::Arc;
use tagged_memories::TaggedMemoriesParams;

use lyra::memory::manager::CombinedMemoryManager;
use lyra::memory::types::{NewTurn, Sentiment};

const MAX_K: usize = 50;
const MAX_RECENT: usize = 100;

/// The Lyra MCP tool handler. Holds the shared memory manager and exposes
/// all MCP tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct LyraTools {
    tool_router: ToolRouter<Self>,
    manager: Arc<CombinedMemoryManager>,
}

/// Run a manager operation on the blocking pool and render it as JSON.
async fn run_blocking<T, F>(
    manager: &Arc<CombinedMemoryManager>,
    op: &'static str,
    f: F,
) -> Result<String, String>
where
    F: FnOnce(&CombinedMemoryManager) -> lyra::error::Result<T> + Send + 'static,
    T: serde::Serialize + Send + 'static,
{
    let manager = Arc::clone(manager);
    let value = tokio::task::spawn_blocking(move || f(&manager))
        .await
        .map_err(|e| format!("{op} task failed: {e}"))?
        .map_err(|e| format!("{op} failed: {e}"))?;
    serde_json::to_string(&value).map_err(|e| format!("serialization failed: {e}"))
}

#[tool_router]
impl LyraTools {
    pub fn new(manager: Arc<CombinedMemoryManager>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            manager,
        }
    }

    /// Record a completed conversation turn in every memory store.
    #[tool(description = "Record a completed (user, assistant) turn. It is embedded for semantic recall and appended to the history logs.")]
    async fn add_memory(
        &self,
        Parameters(params): Parameters<AddMemoryParams>,
    ) -> Result<String, String> {
        if params.user.trim().is_empty() && params.bot.trim().is_empty() {
            return Err("user and bot must not both be empty".into());
        }

        tracing::info!(
            user_len = params.user.len(),
            bot_len = params.bot.len(),
            tags = ?params.tags,
            "add_memory called"
        );

        let tags = params.tags.unwrap_or_default();
        let mut turn = NewTurn::new(params.user, params.bot).with_tags(tags.as_slice());
        if let Some(id) = params.conversation_id {
            turn = turn.in_conversation(id);
        }
        if params.polarity.is_some() || params.subjectivity.is_some() {
            turn = turn.with_sentiment(Sentiment {
                polarity: params.polarity.unwrap_or(0.0),
                subjectivity: params.subjectivity.unwrap_or(0.0),
            });
        }
        turn.entities = params.entities.unwrap_or_default();

        run_blocking(&self.manager, "add_memory", move |m| m.record_turn(turn)).await
    }

    /// Retrieve ranked, deduplicated context for a new message.
    #[tool(description = "Find past turns relevant to a message. Results are ranked by similarity with a 24h recency decay (turns tagged 'important' never decay), deduplicated, and summarized.")]
    async fn get_context(
        &self,
        Parameters(params): Parameters<GetContextParams>,
    ) -> Result<String, String> {
        let k = params
            .k
            .unwrap_or(self.manager.options().retrieval.default_k)
            .clamp(1, MAX_K);
        tracing::info!(query_len = params.query.len(), k, "get_context called");

        let query = params.query;
        run_blocking(&self.manager, "get_context", move |m| m.get_context(&query, k)).await
    }

    /// List the newest turns from the relational log.
    #[tool(description = "List the most recent conversation turns, newest first.")]
    async fn recent_conversations(
        &self,
        Parameters(params): Parameters<RecentConversationsParams>,
    ) -> Result<String, String> {
        let limit = params.limit.unwrap_or(10).clamp(1, MAX_RECENT);
        tracing::info!(limit, "recent_conversations called");
        run_blocking(&self.manager, "recent_conversations", move |m| {
            m.recent_conversations(limit)
        })
        .await
    }

    /// Literal text search over the relational log.
    #[tool(description = "Find past turns whose user or assistant text contains the given literal text.")]
    async fn search_conversations(
        &self,
        Parameters(params): Parameters<SearchConversationsParams>,
    ) -> Result<String, String> {
        if params.text.is_empty() {
            return Err("text must not be empty".into());
        }
        tracing::info!(text = %params.text, "search_conversations called");
        let text = params.text;
        run_blocking(&self.manager, "search_conversations", move |m| {
            m.search_conversations(&text)
        })
        .await
    }

    /// Turns from the history log carrying a tag.
    #[tool(description = "List past turns carrying an exact tag, oldest first.")]
    async fn tagged_memories(
        &self,
        Parameters(params): Parameters<TaggedMemoriesParams>,
    ) -> Result<String, String> {
        tracing::info!(tag = %params.tag, "tagged_memories called");
        let tag = params.tag;
        run_blocking(&self.manager, "tagged_memories", move |m| m.tagged(&tag)).await
    }

    /// Get statistics about the memory stores.
    #[tool(description = "Get memory statistics: counts per store, tag histogram, conversations, time range, file sizes.")]
    async fn memory_stats(&self) -> Result<String, String> {
        tracing::info!("memory_stats called");
        run_blocking(&self.manager, "memory_stats", |m| Ok(m.stats())).await
    }
}

#[tool_handler]
impl ServerHandler for LyraTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Lyra is a conversation memory server. Call add_memory after every turn and \
                 get_context before answering to recall relevant past turns."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
