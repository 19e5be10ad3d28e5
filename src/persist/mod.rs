// src/persist/mod.rs

//! Run artifacts: per-task outputs and the run summary.
//!
//! Layout of one run directory:
//!
//! ```text
//! <run_dir>/
//!   outputs/<task>.md
//!   run.toml
//!   log.txt        (written by `logging::attach_run_log`)
//! ```

pub mod summary;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::debug;

use crate::config::model::task_name_problem;
use crate::errors::{ClampanyError, Result as ClampanyResult};
use crate::fs::FileSystem;

pub use summary::RunSummary;

pub const OUTPUTS_DIR: &str = "outputs";
pub const SUMMARY_FILE: &str = "run.toml";

/// File name of a task's output inside `outputs/`.
///
/// Task names are validated when the graph is built, so this is the single
/// name-to-file mapping shared by the store, the AI queue entries and the
/// output watcher (which reverses it with the file stem).
pub fn output_file_name(task: &str) -> String {
    format!("{task}.md")
}

/// Writes artifacts of one run below `run_dir`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    fs: Arc<dyn FileSystem>,
    run_dir: PathBuf,
    run_id: String,
}

impl ArtifactStore {
    pub fn new(fs: Arc<dyn FileSystem>, run_dir: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            fs,
            run_dir: run_dir.into(),
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.run_dir.join(OUTPUTS_DIR)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.run_dir.join(SUMMARY_FILE)
    }

    /// Output file of `task`: `<run_dir>/outputs/<task>.md`.
    pub fn output_path(&self, task: &str) -> PathBuf {
        self.outputs_dir().join(output_file_name(task))
    }

    /// Create `run_dir/outputs`.
    pub fn prepare(&self) -> Result<()> {
        self.fs.create_dir_all(&self.outputs_dir())
    }

    pub fn write_output(&self, task: &str, output: &str) -> Result<PathBuf> {
        if let Some(reason) = task_name_problem(task) {
            bail!("refusing to write output of task {task:?}: {reason}");
        }
        let path = self.output_path(task);
        self.fs.write(&path, output.as_bytes())?;
        debug!(task = %task, path = %path.display(), "output persisted");
        Ok(path)
    }

    pub fn write_summary(&self, summary: &RunSummary) -> ClampanyResult<PathBuf> {
        let path = self.summary_path();
        let text = summary.to_toml()?;
        self.fs
            .write(&path, text.as_bytes())
            .map_err(ClampanyError::Other)?;
        Ok(path)
    }

    pub fn read_summary(&self) -> ClampanyResult<RunSummary> {
        let text = self
            .fs
            .read_to_string(&self.summary_path())
            .map_err(ClampanyError::Other)?;
        RunSummary::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn outputs_land_in_outputs_dir() {
        let fs = MockFileSystem::new();
        let store = ArtifactStore::new(Arc::new(fs.clone()), "runs/run-1", "1");

        let path = store.write_output("a_b", "hello").unwrap();

        assert_eq!(path, Path::new("runs/run-1/outputs/a_b.md"));
        assert_eq!(fs.read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn names_that_would_collide_or_escape_are_refused() {
        let fs = MockFileSystem::new();
        let store = ArtifactStore::new(Arc::new(fs.clone()), "runs/run-1", "1");
        store.write_output("a_b", "underscore").unwrap();

        assert!(store.write_output("a/b", "slash").is_err());
        assert!(store.write_output("", "empty").is_err());
        assert_eq!(
            fs.read_to_string(Path::new("runs/run-1/outputs/a_b.md")).unwrap(),
            "underscore"
        );
    }
}
