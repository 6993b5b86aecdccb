use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::bridge::{ScriptBridge, ScriptCommand};
use crate::catalog::ArchiveSource;
use crate::config::ReviewConfig;
use crate::db::DBLayer;
use crate::export::ExportService;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DBLayer>,
    pub source: ArchiveSource,
    pub exports: ExportService,
}

impl AppState {
    /// Opens the store and export dir and picks the data source from `config`.
    pub async fn from_config(config: &ReviewConfig) -> Result<Self> {
        let db = Arc::new(DBLayer::new(&config.db_path)?);
        let exports = ExportService::new(&config.export_dir).await?;
        let source = data_source(config)?;
        info!(
            db_path = %config.db_path,
            export_dir = %config.export_dir.display(),
            source = %source.describe(),
            "application state ready"
        );
        Ok(Self {
            db,
            source,
            exports,
        })
    }
}

fn data_source(config: &ReviewConfig) -> Result<ArchiveSource> {
    if let Some(program) = &config.script {
        let command = ScriptCommand::new(
            program.clone(),
            config.script_args.clone(),
            config.script_timeout,
        );
        return Ok(ArchiveSource::Script(ScriptBridge::new(
            command,
            config.script_workers,
            config.script_queue,
        )));
    }
    if let Some(path) = &config.archive_file {
        return Ok(ArchiveSource::File(path.clone()));
    }
    anyhow::bail!("no data source configured: set REVIEW_SCRIPT or REVIEW_ARCHIVE_FILE")
}
