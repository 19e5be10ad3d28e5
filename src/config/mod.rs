// src/config/mod.rs

//! Configuration loading and validation for clampany.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load the tasks and roles files from disk (`loader.rs`).
//! - Validate roles, role flows and DAG correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_roles, load_tasks};
pub use model::{Project, RawProject, Role, RolesFile, Settings, Task, TasksFile};
