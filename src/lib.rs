//! Conversation memory for a personal assistant.
//!
//! Lyra records every completed (user, bot) turn in three independent stores
//! and, before each reply, recalls the past turns most relevant to the new
//! message:
//!
//! | Store | Purpose | Format |
//! |-------|---------|--------|
//! | **Vector store** | Semantic recall | Flat index (binary) + JSON metadata sidecar |
//! | **History** | Tag lookup, recency | Append-only JSON array |
//! | **Relational log** | Browsing, search, statistics | SQLite `conversations` table |
//!
//! # Retrieval
//!
//! A query is embedded and searched against the vector store. Each hit's
//! similarity is multiplied by a linear recency decay that reaches zero after
//! 24 hours; turns tagged `important` never decay. Hits are sorted, duplicate
//! user texts are collapsed, and a summarizer condenses what is left.
//!
//! Every backend fails independently. A write that cannot reach one store
//! still lands in the others, and a failed summary falls back to a fixed
//! string.
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: SQLite open, schema, migrations and health checks for the relational log
//! - [`embedding`]: text-to-vector providers (local ONNX, hashed)
//! - [`error`]: the store error taxonomy
//! - [`memory`]: the stores, ranking, and the combined memory manager
//! - [`summary`]: summarization providers (digest, OpenAI-compatible)

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod summary;
