//! Interactive edit session: the user's editor over a temporary Markdown file.

use std::{env, fs, io, io::Write, process::Command};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::EditorSettings;

pub mod buffer;
pub mod recovery;

pub use recovery::RecoveryFile;

const FALLBACK_EDITOR: &str = "vi";

#[derive(Debug, Error)]
pub enum EditError {
    #[error("edit cancelled, nothing was saved")]
    Cancelled,
    #[error("no `---` line separates the header from the content")]
    MissingDelimiter,
    #[error("invalid header: {0}")]
    Header(#[from] serde_yaml::Error),
    #[error("editor command is empty")]
    EmptyCommand,
    #[error("failed to run editor `{program}`: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("edit buffer i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// Hands a buffer to the user and returns what they saved.
pub trait EditSession: Send + Sync {
    fn edit(&self, initial: &str) -> Result<String, EditError>;
}

/// Runs an external editor on a temporary `.md` file.
#[derive(Debug, Clone, Default)]
pub struct ExternalEditor {
    command: Option<String>,
}

impl ExternalEditor {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }

    pub fn from_settings(settings: &EditorSettings) -> Self {
        Self::new(settings.command.clone())
    }

    /// Configured command, then `$VISUAL`, then `$EDITOR`, then `vi`.
    fn command_line(&self) -> Vec<String> {
        let command = self
            .command
            .clone()
            .or_else(|| env_command("VISUAL"))
            .or_else(|| env_command("EDITOR"))
            .unwrap_or_else(|| FALLBACK_EDITOR.to_string());
        command.split_whitespace().map(str::to_string).collect()
    }
}

impl EditSession for ExternalEditor {
    fn edit(&self, initial: &str) -> Result<String, EditError> {
        let mut file = tempfile::Builder::new()
            .prefix("entries-")
            .suffix(".md")
            .tempfile()?;
        file.write_all(initial.as_bytes())?;
        file.flush()?;

        let mut parts = self.command_line().into_iter();
        let program = parts.next().ok_or(EditError::EmptyCommand)?;
        debug!(
            target = "infra::editor",
            program = %program,
            path = %file.path().display(),
            "Launching editor"
        );

        let status = Command::new(&program)
            .args(parts)
            .arg(file.path())
            .status()
            .map_err(|source| EditError::Spawn {
                program: program.clone(),
                source,
            })?;
        if !status.success() {
            info!(
                target = "infra::editor",
                op = "editor::edit",
                result = "cancelled",
                status = %status,
                "Editor exited without success"
            );
            return Err(EditError::Cancelled);
        }

        let edited = fs::read_to_string(file.path())?;
        if edited == initial {
            return Err(EditError::Cancelled);
        }
        Ok(edited)
    }
}

fn env_command(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
