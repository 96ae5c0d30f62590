//! Background encoder queue
//!
//! Jobs go onto a bounded channel and a single worker encodes them one at a
//! time with `lame` or `flac`. Nothing waits on a job: the next rip scan
//! sees the finished file.

use crate::error::{ProcessError, ProcessResult};
use crate::services::collaborators::{Command, ConversionJob, ConversionJobs, Encoding};
use crate::services::command_runner::run_batch;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Encoder invocation for one job
pub fn encoder_command(job: &ConversionJob) -> Command {
    let source = job.source.display().to_string();
    let target = job.target.display().to_string();
    match job.encoding {
        Encoding::Mp3 => Command::new("lame", vec!["--quiet".to_string(), "-V2".to_string(), source, target]),
        Encoding::Flac => Command::new(
            "flac",
            vec!["--silent".to_string(), "--best".to_string(), "-o".to_string(), target, source],
        ),
    }
}

/// Sending half of the encoder queue
#[derive(Clone)]
pub struct ConversionQueue {
    sender: mpsc::Sender<ConversionJob>,
}

impl ConversionQueue {
    /// Start the worker; it exits when cancelled or when every sender drops
    pub fn start(capacity: usize, cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(worker(receiver, cancel));
        (Self { sender }, handle)
    }
}

async fn worker(mut receiver: mpsc::Receiver<ConversionJob>, cancel: CancellationToken) {
    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = receiver.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let command = encoder_command(&job);
        info!(source = %job.source.display(), encoding = job.encoding.extension(), "Encoding");
        if run_batch(std::slice::from_ref(&command)).await > 0 {
            warn!(source = %job.source.display(), "Encoding failed");
        }
    }
    info!("Conversion worker stopped");
}

#[async_trait]
impl ConversionJobs for ConversionQueue {
    async fn enqueue(&self, job: ConversionJob) -> ProcessResult<()> {
        self.sender
            .send(job)
            .await
            .map_err(|e| ProcessError::Queue(format!("Conversion worker is gone: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn job(encoding: Encoding) -> ConversionJob {
        ConversionJob {
            encoding,
            source: PathBuf::from("/rips/1/track01.cdda.wav"),
            target: PathBuf::from(format!("/rips/1/track01.cdda.{}", encoding.extension())),
        }
    }

    #[test]
    fn test_encoder_commands() {
        let mp3 = encoder_command(&job(Encoding::Mp3));
        assert_eq!(mp3.program, "lame");
        assert_eq!(mp3.args.last().unwrap(), "/rips/1/track01.cdda.mp3");

        let flac = encoder_command(&job(Encoding::Flac));
        assert_eq!(flac.program, "flac");
        assert_eq!(flac.args.last().unwrap(), "/rips/1/track01.cdda.wav");
    }

    #[tokio::test]
    async fn test_enqueue_fails_after_worker_stops() {
        let cancel = CancellationToken::new();
        let (queue, handle) = ConversionQueue::start(4, cancel.clone());
        cancel.cancel();
        handle.await.unwrap();

        let result = queue.enqueue(job(Encoding::Mp3)).await;
        assert!(matches!(result, Err(ProcessError::Queue(_))));
    }
}
