// src/watch/outputs.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::config::model::task_name_problem;
use crate::engine::{CompletionHandle, TaskName};
use crate::fs::FileSystem;
use crate::persist::output_file_name;

/// Handle for the output watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Task name for an output file: `outputs/plan.md` -> `plan`.
///
/// Inverse of [`output_file_name`]; files whose stem is not a valid task
/// name are not outputs.
pub fn task_for_path(path: &Path) -> Option<TaskName> {
    let stem = path.file_stem()?.to_str()?;
    if task_name_problem(stem).is_some() {
        return None;
    }
    let file = path.file_name()?.to_str()?;
    (output_file_name(stem) == file).then(|| stem.to_string())
}

/// Remembers which outputs were already reported, so each task completes at
/// most once no matter how many write events its file produces.
#[derive(Debug, Default)]
pub struct OutputTracker {
    reported: HashSet<TaskName>,
}

impl OutputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task and output for `path`, the first time it holds non-empty content.
    pub fn observe(&mut self, fs: &dyn FileSystem, path: &Path) -> Option<(TaskName, String)> {
        let task = task_for_path(path)?;
        if self.reported.contains(&task) {
            return None;
        }

        let output = match fs.read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "output file not readable yet");
                return None;
            }
        };
        if output.trim().is_empty() {
            return None;
        }

        self.reported.insert(task.clone());
        Some((task, output))
    }
}

/// Watch `outputs_dir` and complete AI tasks through `completion`.
///
/// The directory is created if missing. AI sessions should write each output
/// file in one go: the first non-empty content seen is taken as final.
pub fn spawn_output_watcher(
    outputs_dir: impl Into<PathBuf>,
    fs: Arc<dyn FileSystem>,
    completion: CompletionHandle,
) -> Result<WatcherHandle> {
    let outputs_dir = outputs_dir.into();
    fs.create_dir_all(&outputs_dir)?;

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // We can't log via tracing here easily, so fallback to stderr.
                    eprintln!("clampany: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("clampany: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&outputs_dir, RecursiveMode::NonRecursive)?;

    info!("output watcher started on {:?}", outputs_dir);

    tokio::spawn(async move {
        let mut tracker = OutputTracker::new();

        while let Some(event) = event_rx.recv().await {
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                continue;
            }
            debug!(?event, "received notify event");

            for path in &event.paths {
                let Some((task, output)) = tracker.observe(fs.as_ref(), path) else {
                    continue;
                };
                info!(task = %task, "AI output detected");
                if let Err(err) = completion.complete(task, output).await {
                    warn!(error = %err, "runtime no longer accepts completions; stopping watcher");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
