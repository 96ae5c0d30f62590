//! External command execution
//!
//! Batches run on a spawned task, one command at a time, so later tagging
//! steps see the links created by earlier ones. Failures are logged and do
//! not stop the rest of the batch.

use crate::error::ProcessResult;
use crate::services::collaborators::{Command, CommandRunner};
use async_trait::async_trait;
use tokio::process::Command as ProcessCommand;
use tracing::{debug, warn};

/// Runs batches as child processes on the tokio runtime
#[derive(Debug, Default, Clone)]
pub struct ProcessCommandRunner;

impl ProcessCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

/// Run one batch to completion; returns the number of failed commands
pub async fn run_batch(batch: &[Command]) -> usize {
    let mut failures = 0;
    for command in batch {
        match ProcessCommand::new(&command.program)
            .args(&command.args)
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                debug!(command = %command, "Command finished");
            }
            Ok(output) => {
                failures += 1;
                warn!(
                    command = %command,
                    status = ?output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Command failed"
                );
            }
            Err(e) => {
                failures += 1;
                warn!(command = %command, error = %e, "Unable to start command");
            }
        }
    }
    failures
}

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn dispatch(&self, batch: Vec<Command>) -> ProcessResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        debug!(commands = batch.len(), "Dispatching command batch");
        tokio::spawn(async move {
            let failures = run_batch(&batch).await;
            if failures > 0 {
                warn!(failures, total = batch.len(), "Command batch finished with failures");
            }
        });
        Ok(())
    }
}
