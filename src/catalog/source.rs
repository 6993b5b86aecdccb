use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::bridge::{BridgeError, ScriptBridge};

use super::ChatArchive;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("failed to read archive file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where chat data comes from.
#[derive(Clone)]
pub enum ArchiveSource {
    /// Live data printed by the extraction script.
    Script(ScriptBridge),
    /// A previously exported archive on disk.
    File(PathBuf),
}

impl ArchiveSource {
    pub fn describe(&self) -> String {
        match self {
            ArchiveSource::Script(_) => "script".to_string(),
            ArchiveSource::File(path) => format!("file {}", path.display()),
        }
    }

    pub async fn load_raw(&self) -> Result<Value, SourceError> {
        match self {
            ArchiveSource::Script(bridge) => Ok(bridge.archive().await?),
            ArchiveSource::File(path) => read_json(path).await,
        }
    }

    /// Reloaded on every call; the archive is never cached between requests.
    pub async fn load(&self) -> Result<ChatArchive, SourceError> {
        let raw = self.load_raw().await?;
        Ok(ChatArchive::from_value(raw))
    }

    /// The script's own interactions dataset, or `None` when the source has none and
    /// interactions have to be derived from the archive.
    pub async fn script_interactions(&self) -> Result<Option<Value>, SourceError> {
        match self {
            ArchiveSource::Script(bridge) => Ok(Some(bridge.interactions().await?)),
            ArchiveSource::File(_) => Ok(None),
        }
    }
}

async fn read_json(path: &Path) -> Result<Value, SourceError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let value = serde_json::from_slice(&bytes).map_err(|source| SourceError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = bytes.len(), "archive file read");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn loads_archive_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.json");
        std::fs::write(
            &path,
            json!({"alice": {"s1": [{"role": "user", "content": "hi"}]}}).to_string(),
        )
        .unwrap();

        let source = ArchiveSource::File(path);
        let archive = source.load().await.unwrap();
        assert_eq!(archive.users().len(), 1);
        assert!(source.script_interactions().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reports_missing_and_invalid_files() {
        let dir = TempDir::new().unwrap();
        let missing = ArchiveSource::File(dir.path().join("nope.json"));
        assert!(matches!(missing.load().await, Err(SourceError::Read { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{oops").unwrap();
        assert!(matches!(
            ArchiveSource::File(bad).load().await,
            Err(SourceError::Parse { .. })
        ));
    }
}
