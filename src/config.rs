use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LyraConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub summary: SummaryConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Relational conversation log (SQLite).
    pub db_path: String,
    /// Flat vector index; metadata lives beside it with a `.json` extension.
    pub index_path: String,
    /// Append-only JSON history.
    pub history_path: String,
    /// Conversation id recorded when a turn arrives without one.
    pub default_conversation: String,
    pub use_vector: bool,
    pub use_history: bool,
    pub use_sql: bool,
    /// Persist the vector index after every write.
    pub autosave: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    pub dimension: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SummaryConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

/// How retrieved candidates are collapsed before summarization.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DedupPolicy {
    /// Byte-identical `user_text` only.
    Exact,
    /// Exact match plus embedding similarity above `dedup_threshold`.
    Cosine,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_k: usize,
    pub decay_window_hours: f64,
    pub important_tag: String,
    pub dedup: DedupPolicy,
    pub dedup_threshold: f32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 7311,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = default_lyra_dir();
        let path = |name: &str| dir.join(name).to_string_lossy().into_owned();
        Self {
            db_path: path("conversation_history.db"),
            index_path: path("vector_index.bin"),
            history_path: path("conversation_history.json"),
            default_conversation: "default".into(),
            use_vector: true,
            use_history: true,
            use_sql: true,
            autosave: true,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_lyra_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
            dimension: 384,
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            provider: "digest".into(),
            base_url: "http://127.0.0.1:11434".into(),
            model: "llama3.2".into(),
            api_key: None,
            timeout_secs: 30,
            max_tokens: 256,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            decay_window_hours: 24.0,
            important_tag: "important".into(),
            dedup: DedupPolicy::Exact,
            dedup_threshold: 0.95,
        }
    }
}

/// Returns `~/.lyra/`, or `./.lyra/` when no home directory is known.
pub fn default_lyra_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lyra")
}

/// Returns the default config file path: `~/.lyra/config.toml`
pub fn default_config_path() -> PathBuf {
    default_lyra_dir().join("config.toml")
}

impl LyraConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            LyraConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LYRA_DATABASE_URL") {
            self.storage.db_path = strip_sqlite_scheme(&val).to_string();
        }
        if let Ok(val) = std::env::var("LYRA_INDEX") {
            self.storage.index_path = val;
        }
        if let Ok(val) = std::env::var("LYRA_HISTORY") {
            self.storage.history_path = val;
        }
        if let Ok(val) = std::env::var("LYRA_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("LYRA_SUMMARY_API_KEY") {
            self.summary.api_key = Some(val);
        }
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_index_path(&self) -> PathBuf {
        expand_tilde(&self.storage.index_path)
    }

    pub fn resolved_history_path(&self) -> PathBuf {
        expand_tilde(&self.storage.history_path)
    }
}

/// Accept both bare paths and `sqlite:///path` database URLs.
fn strip_sqlite_scheme(url: &str) -> &str {
    url.strip_prefix("sqlite:///").unwrap_or(url)
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = LyraConfig::default();
        assert_eq!(config.server.transport, "stdio");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.storage.default_conversation, "default");
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.retrieval.default_k, 5);
        assert_eq!(config.retrieval.decay_window_hours, 24.0);
        assert_eq!(config.retrieval.dedup, DedupPolicy::Exact);
        assert!(config.storage.use_vector && config.storage.use_history && config.storage.use_sql);
        assert!(config.storage.index_path.ends_with("vector_index.bin"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
db_path = "/tmp/lyra.db"
use_sql = false

[retrieval]
default_k = 8
dedup = "cosine"
dedup_threshold = 0.9
"#;
        let config: LyraConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/lyra.db");
        assert!(!config.storage.use_sql);
        assert_eq!(config.retrieval.default_k, 8);
        assert_eq!(config.retrieval.dedup, DedupPolicy::Cosine);
        // defaults still apply for unset fields
        assert!(config.storage.use_vector);
        assert_eq!(config.retrieval.important_tag, "important");
        assert_eq!(config.summary.provider, "digest");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = LyraConfig::default();
        std::env::set_var("LYRA_DATABASE_URL", "sqlite:///tmp/override.db");
        std::env::set_var("LYRA_INDEX", "/tmp/override.bin");
        std::env::set_var("LYRA_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "tmp/override.db");
        assert_eq!(config.storage.index_path, "/tmp/override.bin");
        assert_eq!(config.server.log_level, "trace");

        std::env::remove_var("LYRA_DATABASE_URL");
        std::env::remove_var("LYRA_INDEX");
        std::env::remove_var("LYRA_LOG_LEVEL");
    }

    #[test]
    fn sqlite_scheme_is_stripped() {
        assert_eq!(strip_sqlite_scheme("sqlite:///data/lyra.db"), "data/lyra.db");
        assert_eq!(strip_sqlite_scheme("/abs/lyra.db"), "/abs/lyra.db");
    }
}
