use std::process::Stdio;
use std::sync::Arc;

use serde_json::Value;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{BridgeError, Dataset, ScriptCommand};

pub(super) struct ScriptJob {
    pub id: Uuid,
    pub dataset: Dataset,
    pub reply: oneshot::Sender<Result<Value, BridgeError>>,
}

pub(super) async fn worker_loop(
    mut rx: mpsc::Receiver<ScriptJob>,
    command: ScriptCommand,
    workers: usize,
) {
    let command = Arc::new(command);
    let slots = Arc::new(Semaphore::new(workers));

    while let Some(job) = rx.recv().await {
        let Ok(permit) = slots.clone().acquire_owned().await else {
            break;
        };
        let command = command.clone();
        tokio::spawn(async move {
            let result = process_job(&command, &job).await;
            drop(permit);
            if job.reply.send(result).is_err() {
                debug!(job_id = %job.id, "script caller went away");
            }
        });
    }
}

async fn process_job(command: &ScriptCommand, job: &ScriptJob) -> Result<Value, BridgeError> {
    debug!(
        job_id = %job.id,
        program = %command.program,
        dataset = %job.dataset,
        "running script"
    );

    let child = Command::new(&command.program)
        .args(&command.args)
        .arg(job.dataset.as_arg())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            error!(job_id = %job.id, error = %e, "failed to spawn script");
            BridgeError::Spawn(e)
        })?;

    let output = match tokio::time::timeout(command.timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(BridgeError::Spawn)?,
        Err(_) => {
            warn!(job_id = %job.id, timeout = ?command.timeout, "script timed out");
            return Err(BridgeError::Timeout(command.timeout));
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        debug!(job_id = %job.id, %stderr, "script stderr");
    }

    if !output.status.success() {
        error!(job_id = %job.id, status = %output.status, %stderr, "script failed");
        return Err(BridgeError::Exit {
            status: output.status.to_string(),
            stderr,
        });
    }

    serde_json::from_slice(&output.stdout).map_err(|e| {
        error!(job_id = %job.id, error = %e, "script printed invalid JSON");
        BridgeError::InvalidJson(e)
    })
}
