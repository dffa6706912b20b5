//! Conversation memory: the three stores, ranking, and the manager that ties
//! them together.

pub mod conversation_log;
pub mod history;
pub mod manager;
pub mod ranking;
pub mod stats;
pub mod types;
pub mod vector_store;

use std::io::Write;
use std::path::Path;

/// Write `bytes` to a sibling temp file, fsync, then rename over `path`.
/// Readers never observe a half-written artifact.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp_name);

    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}
