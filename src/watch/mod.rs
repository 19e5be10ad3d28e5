// src/watch/mod.rs

//! File watching for AI task completion.
//!
//! AI sessions answer by writing `<run_dir>/outputs/<task>.md`. The watcher
//! turns the first non-empty version of such a file into an external
//! completion for that task. It does **not** know which tasks are AI tasks;
//! the scheduler ignores completions for tasks it is not waiting on.

pub mod outputs;

pub use outputs::{OutputTracker, WatcherHandle, spawn_output_watcher, task_for_path};
