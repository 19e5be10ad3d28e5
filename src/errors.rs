// src/errors.rs

//! Crate-wide error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClampanyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("invalid task name '{name}': {reason}")]
    InvalidTaskName { name: String, reason: &'static str },

    #[error("Duplicate role name: {0}")]
    DuplicateRole(String),

    #[error("task '{task}' has unknown dependency '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("task '{task}' references unknown role '{role}'")]
    UnknownRole { task: String, role: String },

    #[error("invalid role flow: {from} -> {to} (from task '{from_task}' to '{to_task}')")]
    RoleFlowViolation {
        from: String,
        to: String,
        from_task: String,
        to_task: String,
    },

    #[error("Cycle detected in task dependencies: {0}")]
    CycleDetected(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("task '{task}' has no command to run")]
    MissingCommand { task: String },

    #[error("command for task '{task}' exited with {status}")]
    CommandFailed { task: String, status: String },

    #[error("no executor registered for role '{0}'")]
    NoExecutor(String),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ClampanyError {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ClampanyError::ChannelClosed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClampanyError>;
