//! Conversion pipeline
//!
//! Single-flight batch job converting every source video that has no
//! `<stem>.mp4` counterpart in the converted folder yet. Files are
//! processed one at a time; a failing file is recorded and the batch moves
//! on. Every outcome, including unexpected errors and panics, ends up in
//! the status cell rather than being returned to a caller.
//!
//! The pipeline only touches the filesystem and its own status cell. It
//! never takes the queue or playback locks.

use super::status::{ConversionPhase, ConversionState, ConversionStatus};
use super::transcoder::{Transcoder, TranscoderError};
use crate::db::SettingRegistry;
use crate::error::Error;
use karaoke_common::time;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(thiserror::Error, Debug)]
pub enum ConversionError {
    #[error("A conversion run is already in progress")]
    AlreadyRunning,

    #[error("No conversion run is in progress")]
    NotRunning,
}

impl From<ConversionError> for Error {
    fn from(err: ConversionError) -> Self {
        Error::Conflict(err.to_string())
    }
}

/// How a run ended, before it is written to the status cell
enum RunOutcome {
    Completed(String),
    Failed(String),
    Cancelled(String),
}

#[derive(Clone)]
pub struct ConversionPipeline {
    settings: SettingRegistry,
    state: Arc<ConversionState>,
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl ConversionPipeline {
    pub fn new(settings: SettingRegistry) -> Self {
        Self {
            settings,
            state: Arc::new(ConversionState::new()),
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn status(&self) -> ConversionStatus {
        self.state.snapshot().await
    }

    pub async fn is_running(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Start a run in the background
    ///
    /// Rejected with `AlreadyRunning` while another run is active.
    pub async fn start(&self) -> Result<(), ConversionError> {
        let token = self.acquire().await?;
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.run_with(token).await;
        });
        Ok(())
    }

    /// Run to completion in the caller's task and return the final status
    pub async fn run(&self) -> Result<ConversionStatus, ConversionError> {
        let token = self.acquire().await?;
        Ok(self.run_with(token).await)
    }

    /// Ask the active run to stop after the file in progress
    pub async fn cancel(&self) -> Result<(), ConversionError> {
        match self.active.lock().await.as_ref() {
            Some(token) => {
                info!("Conversion cancellation requested");
                token.cancel();
                Ok(())
            }
            None => Err(ConversionError::NotRunning),
        }
    }

    async fn acquire(&self) -> Result<CancellationToken, ConversionError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            warn!("Conversion start rejected: run already in progress");
            return Err(ConversionError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        *active = Some(token.clone());
        self.state.begin(time::now()).await;
        Ok(token)
    }

    async fn run_with(&self, token: CancellationToken) -> ConversionStatus {
        info!("Conversion run started");

        // Run in a child task so a panic is reported like any other error
        let worker = {
            let pipeline = self.clone();
            tokio::spawn(async move { pipeline.execute(&token).await })
        };

        let outcome = match worker.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = %e, "Conversion run failed");
                RunOutcome::Failed(format!("{}: {}", ConversionStatus::ERROR_KEYWORD, e))
            }
            Err(e) => {
                error!(error = %e, "Conversion task aborted");
                RunOutcome::Failed(format!(
                    "{}: conversion task aborted: {}",
                    ConversionStatus::ERROR_KEYWORD,
                    e
                ))
            }
        };

        let (phase, message) = match outcome {
            RunOutcome::Completed(msg) => (ConversionPhase::Completed, msg),
            RunOutcome::Failed(msg) => (ConversionPhase::Failed, msg),
            RunOutcome::Cancelled(msg) => (ConversionPhase::Cancelled, msg),
        };
        info!(phase = ?phase, message = %message, "Conversion run ended");
        self.state.finish(phase, message, time::now()).await;

        *self.active.lock().await = None;
        self.state.snapshot().await
    }

    async fn execute(&self, token: &CancellationToken) -> crate::Result<RunOutcome> {
        let original = self.settings.original_videos_path().await?;
        let converted = self.settings.converted_videos_path().await?;
        let transcoder = Transcoder::new(self.settings.transcoder_path().await?);

        if !original.is_dir() {
            warn!(path = %original.display(), "Original videos folder not found");
            return Ok(RunOutcome::Failed(format!(
                "{}: original videos folder not found: {}",
                ConversionStatus::ERROR_KEYWORD,
                original.display()
            )));
        }

        tokio::fs::create_dir_all(&converted).await?;

        let work = pending_files(&original, &converted).await?;
        self.state.set_total(work.len()).await;

        if work.is_empty() {
            info!("No new videos to convert");
            return Ok(RunOutcome::Completed(format!(
                "{}: nothing to convert",
                ConversionStatus::COMPLETED_KEYWORD
            )));
        }

        if let Err(e) = transcoder.check_available() {
            return Ok(RunOutcome::Failed(format!(
                "{}: {}",
                ConversionStatus::ERROR_KEYWORD,
                e
            )));
        }

        let total = work.len();
        info!(total, transcoder = %transcoder.program().display(), "Converting videos");

        for (index, job) in work.iter().enumerate() {
            if token.is_cancelled() {
                return Ok(RunOutcome::Cancelled(format!(
                    "{}: cancelled after {} of {} files",
                    ConversionStatus::ERROR_KEYWORD,
                    index,
                    total
                )));
            }

            self.state.file_started(index + 1, total, &job.file_name).await;

            match transcoder.convert(&job.source, &job.target).await {
                Ok(()) => {
                    info!(file = %job.file_name, "Video converted");
                    self.state.file_converted().await;
                }
                Err(e) if e.is_fatal() => {
                    return Ok(RunOutcome::Failed(format!(
                        "{}: {}",
                        ConversionStatus::ERROR_KEYWORD,
                        e
                    )));
                }
                Err(e) => {
                    if let TranscoderError::Failed { stderr, .. } = &e {
                        warn!(file = %job.file_name, stderr = %stderr.trim(), "Transcoder stderr");
                    }
                    warn!(file = %job.file_name, error = %e, "Video conversion failed");
                    discard_partial_output(&job.target).await;
                    self.state.file_failed(&job.file_name, e.to_string()).await;
                }
            }
        }

        let status = self.state.snapshot().await;
        let message = if status.failed == 0 {
            format!(
                "{}: {} videos converted",
                ConversionStatus::COMPLETED_KEYWORD,
                status.converted
            )
        } else {
            format!(
                "{} with errors: {} converted, {} failed",
                ConversionStatus::COMPLETED_KEYWORD,
                status.converted,
                status.failed
            )
        };
        Ok(RunOutcome::Completed(message))
    }
}

/// One source file and where its conversion goes
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConversionJob {
    file_name: String,
    source: PathBuf,
    target: PathBuf,
}

/// Target path for a source file: `<converted>/<stem>.mp4`
pub fn converted_target(source: &Path, converted_dir: &Path) -> Option<PathBuf> {
    let stem = source.file_stem()?;
    let mut name = stem.to_os_string();
    name.push(".mp4");
    Some(converted_dir.join(name))
}

/// Regular, non-hidden files in `original` without a converted counterpart,
/// sorted by file name
async fn pending_files(original: &Path, converted: &Path) -> crate::Result<Vec<ConversionJob>> {
    let mut dir = tokio::fs::read_dir(original).await?;
    let mut jobs = Vec::new();

    while let Some(entry) = dir.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }

        let source = entry.path();
        let Some(target) = converted_target(&source, converted) else {
            continue;
        };
        if tokio::fs::try_exists(&target).await? {
            continue;
        }

        jobs.push(ConversionJob {
            file_name,
            source,
            target,
        });
    }

    jobs.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(jobs)
}

async fn discard_partial_output(target: &Path) {
    match tokio::fs::remove_file(target).await {
        Ok(()) => warn!(path = %target.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %target.display(), error = %e, "Could not remove partial output"),
    }
}
