use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use super::EditError;

/// A copy of the edited buffer that outlives the process until the publish succeeds.
#[derive(Debug)]
#[must_use = "call `discard` once the post is published"]
pub struct RecoveryFile {
    path: PathBuf,
}

impl RecoveryFile {
    pub fn persist(dir: &Path, text: &str) -> Result<Self, EditError> {
        let mut file = tempfile::Builder::new()
            .prefix("entries-")
            .suffix(".md")
            .tempfile_in(dir)?;
        file.write_all(text.as_bytes())?;
        file.flush()?;

        let (_, path) = file.keep().map_err(|err| EditError::Io(err.error))?;
        debug!(
            target = "infra::editor::recovery",
            path = %path.display(),
            "Recovery file written"
        );
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn discard(self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(
                target = "infra::editor::recovery",
                path = %self.path.display(),
                error = %err,
                "Failed to remove recovery file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_text_survives_until_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let recovery = RecoveryFile::persist(dir.path(), "name: a\n---\nbody").expect("persist");

        let path = recovery.path().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "name: a\n---\nbody"
        );

        recovery.discard();
        assert!(!path.exists());
    }

    #[test]
    fn dropping_without_discard_keeps_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = {
            let recovery = RecoveryFile::persist(dir.path(), "draft").expect("persist");
            recovery.path().to_path_buf()
        };
        assert!(path.exists());
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = RecoveryFile::persist(&dir.path().join("missing"), "x").expect_err("no dir");
        assert!(matches!(err, EditError::Io(_)));
    }
}
