// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{Project, RawProject, RolesFile, TasksFile};
use crate::errors::Result;

/// Load a tasks file. Only performs TOML deserialization.
pub fn load_tasks(path: impl AsRef<Path>) -> Result<TasksFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let tasks: TasksFile = toml::from_str(&contents)?;
    Ok(tasks)
}

/// Load a roles file. Only performs TOML deserialization.
pub fn load_roles(path: impl AsRef<Path>) -> Result<RolesFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let roles: RolesFile = toml::from_str(&contents)?;
    Ok(roles)
}

/// Load both files and validate them into a [`Project`].
///
/// Checks for:
/// - duplicate task / role names,
/// - tasks referencing unknown roles or shell tasks without a command,
/// - unknown `depends_on` references and dependency cycles,
/// - role flows not listed in `[allowed_flows]` (when that table exists).
pub fn load_and_validate(
    tasks_path: impl AsRef<Path>,
    roles_path: impl AsRef<Path>,
) -> Result<Project> {
    let raw = RawProject {
        tasks: load_tasks(tasks_path)?,
        roles: load_roles(roles_path)?,
    };
    Project::try_from(raw)
}
