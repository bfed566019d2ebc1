//! External transcoder invocation
//!
//! Runs the transcoder once per file with a fixed argument template:
//! `-i <input> -c:v libx264 -c:a aac -preset fast -y <output>`.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum TranscoderError {
    #[error("Transcoder not found: {0}")]
    BinaryNotFound(String),

    #[error("Failed to run transcoder: {0}")]
    ExecutionError(String),

    #[error("Transcoder exited with code {code:?}")]
    Failed { code: Option<i32>, stderr: String },
}

impl TranscoderError {
    /// Errors that would repeat identically for every file
    pub fn is_fatal(&self) -> bool {
        matches!(self, TranscoderError::BinaryNotFound(_))
    }
}

#[derive(Debug, Clone)]
pub struct Transcoder {
    program: PathBuf,
}

impl Transcoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for converting `input` into `output`
    pub fn arguments(input: &Path, output: &Path) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = Vec::with_capacity(10);
        args.push("-i".into());
        args.push(input.as_os_str().to_owned());
        for arg in ["-c:v", "libx264", "-c:a", "aac", "-preset", "fast", "-y"] {
            args.push(arg.into());
        }
        args.push(output.as_os_str().to_owned());
        args
    }

    /// Fail early when the transcoder is given as a path that does not exist
    ///
    /// A bare program name is looked up on `PATH` at spawn time instead.
    pub fn check_available(&self) -> Result<(), TranscoderError> {
        let is_path = self.program.components().count() > 1;
        if is_path && !self.program.is_file() {
            return Err(TranscoderError::BinaryNotFound(
                self.program.display().to_string(),
            ));
        }
        Ok(())
    }

    /// Convert one file, waiting for the process to exit
    pub async fn convert(&self, input: &Path, output: &Path) -> Result<(), TranscoderError> {
        tracing::debug!(
            program = %self.program.display(),
            input = %input.display(),
            output = %output.display(),
            "Running transcoder"
        );

        let result = Command::new(&self.program)
            .args(Self::arguments(input, output))
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TranscoderError::BinaryNotFound(
                    self.program.display().to_string(),
                ));
            }
            Err(e) => return Err(TranscoderError::ExecutionError(e.to_string())),
        };

        if !output.status.success() {
            return Err(TranscoderError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(())
    }
}
