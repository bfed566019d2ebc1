//! Conversion status cell
//!
//! Shared, polled view of the current (or last) conversion run. Exactly one
//! run writes at a time; readers never block a writer for long.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionPhase {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ConversionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConversionPhase::Completed | ConversionPhase::Failed | ConversionPhase::Cancelled
        )
    }
}

/// One file the transcoder could not convert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub file_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionStatus {
    pub phase: ConversionPhase,
    pub message: String,
    pub current: usize,
    pub total: usize,
    pub converted: usize,
    pub failed: usize,
    pub errors: Vec<FileError>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for ConversionStatus {
    fn default() -> Self {
        Self {
            phase: ConversionPhase::Idle,
            message: "Idle".to_string(),
            current: 0,
            total: 0,
            converted: 0,
            failed: 0,
            errors: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }
}

impl ConversionStatus {
    /// Terminal messages start with one of these
    pub const COMPLETED_KEYWORD: &'static str = "Completed";
    pub const ERROR_KEYWORD: &'static str = "Error";

    pub fn is_running(&self) -> bool {
        self.phase == ConversionPhase::Running
    }
}

/// Status cell shared between the pipeline and the HTTP layer
#[derive(Debug, Default)]
pub struct ConversionState {
    inner: RwLock<ConversionStatus>,
}

impl ConversionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> ConversionStatus {
        self.inner.read().await.clone()
    }

    /// Reset for a new run
    pub async fn begin(&self, now: DateTime<Utc>) {
        let mut status = self.inner.write().await;
        *status = ConversionStatus {
            phase: ConversionPhase::Running,
            message: "Checking folders and files".to_string(),
            started_at: Some(now),
            ..ConversionStatus::default()
        };
    }

    pub async fn set_total(&self, total: usize) {
        self.inner.write().await.total = total;
    }

    pub async fn file_started(&self, index: usize, total: usize, file_name: &str) {
        let mut status = self.inner.write().await;
        status.current = index;
        status.total = total;
        status.message = format!("Converting {}/{}: {}", index, total, file_name);
    }

    pub async fn file_converted(&self) {
        self.inner.write().await.converted += 1;
    }

    pub async fn file_failed(&self, file_name: &str, message: impl Into<String>) {
        let mut status = self.inner.write().await;
        status.failed += 1;
        status.errors.push(FileError {
            file_name: file_name.to_string(),
            message: message.into(),
        });
    }

    /// Enter a terminal phase with its final message
    pub async fn finish(&self, phase: ConversionPhase, message: impl Into<String>, now: DateTime<Utc>) {
        debug_assert!(phase.is_terminal(), "finish with non-terminal phase {:?}", phase);
        let mut status = self.inner.write().await;
        status.phase = phase;
        status.message = message.into();
        status.finished_at = Some(now);
    }
}
