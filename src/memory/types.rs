//! Conversation memory records.
//!
//! [`MemoryEntry`] is the unit written to every store. [`RetrievalResult`]
//! wraps an entry with its query-time score, and [`ContextBundle`] is what
//! the prompt builder consumes.

use serde::{Deserialize, Serialize};

/// Sentiment of the user side of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Sentiment {
    /// Negative to positive, in `[-1.0, 1.0]`.
    pub polarity: f32,
    /// Objective to subjective, in `[0.0, 1.0]`.
    pub subjectivity: f32,
}

impl Sentiment {
    pub const NEUTRAL: Sentiment = Sentiment {
        polarity: 0.0,
        subjectivity: 0.0,
    };

    /// Clamp into the valid ranges; non-finite values become neutral.
    pub fn normalized(self) -> Self {
        let clamp = |v: f32, lo: f32| if v.is_finite() { v.clamp(lo, 1.0) } else { 0.0 };
        Self {
            polarity: clamp(self.polarity, -1.0),
            subjectivity: clamp(self.subjectivity, 0.0),
        }
    }
}

/// One completed (user, bot) turn.
///
/// Every field has a serde default so that placeholder metadata (`{}`)
/// restored for an index without a sidecar still deserializes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryEntry {
    /// UUID v7 shared by the copies of this turn in each store.
    pub turn_id: String,
    #[serde(rename = "user")]
    pub user_text: String,
    #[serde(rename = "bot")]
    pub bot_text: String,
    /// RFC 3339 creation time. Kept as text so a malformed value only
    /// disables decay for this entry.
    pub timestamp: String,
    pub tags: Vec<String>,
    pub sentiment: Sentiment,
    pub conversation_id: String,
    /// Ordinal in the vector store, once inserted there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_ref: Option<usize>,
}

impl MemoryEntry {
    /// Text that is embedded for this turn. Changing this format invalidates
    /// every stored vector.
    pub fn embedding_text(&self) -> String {
        embedding_text(&self.user_text, &self.bot_text)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// RFC 3339, or a zone-less ISO 8601 time read as local time (older logs).
    pub fn parsed_timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        use chrono::TimeZone;

        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&self.timestamp) {
            return Some(dt.with_timezone(&chrono::Utc));
        }
        let naive =
            chrono::NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        chrono::Local
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&chrono::Utc))
    }
}

pub fn embedding_text(user: &str, bot: &str) -> String {
    format!("User: {user} Bot: {bot}")
}

/// Trim, drop empties and duplicates, preserving first-seen order.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Input to [`CombinedMemoryManager::record_turn`](super::manager::CombinedMemoryManager::record_turn).
#[derive(Debug, Clone, Default)]
pub struct NewTurn {
    pub user_text: String,
    pub bot_text: String,
    pub tags: Vec<String>,
    pub conversation_id: Option<String>,
    pub sentiment: Option<Sentiment>,
    /// Free-form extras kept only in the relational log (e.g. entities).
    pub entities: Vec<String>,
}

impl NewTurn {
    pub fn new(user_text: impl Into<String>, bot_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            bot_text: bot_text.into(),
            ..Default::default()
        }
    }

    pub fn with_tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.tags = tags.iter().map(|t| t.as_ref().to_string()).collect();
        self
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }
}

/// A retrieved entry with its query-time score.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    #[serde(flatten)]
    pub entry: MemoryEntry,
    /// Similarity after decay; higher is more relevant.
    pub score: f32,
    /// Age at query time. `None` when the timestamp could not be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_hours: Option<f64>,
    /// Stored vector, loaded only when similarity dedup needs it.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl RetrievalResult {
    pub fn new(entry: MemoryEntry, score: f32) -> Self {
        Self {
            entry,
            score,
            age_hours: None,
            embedding: None,
        }
    }
}

/// Ranked context plus a natural-language summary of it.
#[derive(Debug, Clone, Serialize)]
pub struct ContextBundle {
    pub context: Vec<RetrievalResult>,
    pub summary: String,
}

/// Per-store result of one fan-out write. Failures are reported, never raised.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteOutcome {
    pub turn_id: String,
    /// Vector-store ordinal, if the vector write succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<usize>,
    pub history_logged: bool,
    /// Relational-log row id, if that write succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_id: Option<i64>,
    /// Degraded-mode notes: embedding fallback, failed or skipped writes.
    pub failures: Vec<String>,
}
