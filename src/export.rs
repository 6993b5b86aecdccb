use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::info;
use uuid::Uuid;

use crate::catalog::ChatArchive;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// The archive as loaded, `user -> session -> payload`.
    #[default]
    Nested,
    /// One row per normalized message.
    Flat,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "nested" | "json" => Ok(ExportFormat::Nested),
            "flat" | "rows" => Ok(ExportFormat::Flat),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FlatRow {
    pub user_id: String,
    pub session_id: String,
    pub timestamp: String,
    pub role: String,
    pub content: Value,
    pub sequence: i64,
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedFile {
    pub path: String,
    /// Sessions for nested exports, rows for flat ones.
    pub records: usize,
}

#[derive(Clone)]
pub struct ExportService {
    root: PathBuf,
}

impl ExportService {
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create export dir at {}", root.display()))?;

        Ok(Self { root })
    }

    pub async fn export(&self, archive: &ChatArchive, format: ExportFormat) -> Result<ExportedFile> {
        let (bytes, records, suffix) = match format {
            ExportFormat::Nested => (
                serde_json::to_vec(archive.raw())?,
                archive.session_count(),
                "",
            ),
            ExportFormat::Flat => {
                let rows = flat_rows(archive);
                (serde_json::to_vec(&rows)?, rows.len(), "_flat")
            }
        };

        let path = self.next_path(suffix).await;
        let mut file = File::create(&path)
            .await
            .with_context(|| format!("Failed to create file {}", path.display()))?;
        file.write_all(&bytes)
            .await
            .with_context(|| format!("Failed to write file {}", path.display()))?;
        file.flush().await?;

        info!(path = %path.display(), records, ?format, "archive exported");
        Ok(ExportedFile {
            path: path.display().to_string(),
            records,
        })
    }

    async fn next_path(&self, suffix: &str) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self.root.join(format!("chat_histories_{stamp}{suffix}.json"));
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let short = Uuid::new_v4().simple().to_string();
            return self
                .root
                .join(format!("chat_histories_{stamp}{suffix}_{}.json", &short[..8]));
        }
        path
    }
}

pub fn flat_rows(archive: &ChatArchive) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    for (user_id, session_id, _) in archive.sessions_iter() {
        for message in archive.messages(user_id, session_id).unwrap_or_default() {
            rows.push(FlatRow {
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                timestamp: message.timestamp.unwrap_or_default(),
                role: message.role.to_string(),
                content: message.content,
                sequence: message.sequence,
                message_id: message.id,
            });
        }
    }
    rows
}
