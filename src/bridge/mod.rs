//! Runs the external data-extraction script and parses what it prints.
//!
//! Calls are queued on a bounded channel and drained by a worker that keeps at most
//! `workers` child processes alive. Each run is bounded by a timeout and the child is
//! killed if the run is dropped.

mod worker;

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use worker::{worker_loop, ScriptJob};

/// Argument selecting what the script prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    /// Hierarchical `user -> session -> payload` archive.
    Archive,
    /// Flat list of prompt/response pairs.
    Interactions,
}

impl Dataset {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Dataset::Archive => "archive",
            Dataset::Interactions => "interactions",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to start script: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("script exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("script did not finish within {0:?}")]
    Timeout(Duration),

    #[error("script output is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("script output is not a JSON array")]
    NotAnArray,

    #[error("script queue is closed")]
    QueueClosed,
}

/// `<program> <args...> <dataset>`
#[derive(Debug, Clone)]
pub struct ScriptCommand {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ScriptCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

#[derive(Clone)]
pub struct ScriptBridge {
    tx: mpsc::Sender<ScriptJob>,
}

impl ScriptBridge {
    /// Spawns the worker on the current runtime.
    pub fn new(command: ScriptCommand, workers: usize, queue_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        tokio::spawn(worker_loop(rx, command, workers.max(1)));
        Self { tx }
    }

    /// Runs the script for `dataset` and returns its parsed stdout.
    pub async fn run(&self, dataset: Dataset) -> Result<Value, BridgeError> {
        let (reply, rx) = oneshot::channel();
        let job = ScriptJob {
            id: Uuid::new_v4(),
            dataset,
            reply,
        };
        debug!(job_id = %job.id, %dataset, "queueing script run");

        self.tx
            .send(job)
            .await
            .map_err(|_| BridgeError::QueueClosed)?;
        rx.await.map_err(|_| BridgeError::QueueClosed)?
    }

    pub async fn archive(&self) -> Result<Value, BridgeError> {
        self.run(Dataset::Archive).await
    }

    /// The interactions dataset must be a JSON array; it is returned untouched.
    pub async fn interactions(&self) -> Result<Value, BridgeError> {
        let value = self.run(Dataset::Interactions).await?;
        if !value.is_array() {
            return Err(BridgeError::NotAnArray);
        }
        Ok(value)
    }
}
