// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of worker a role stands for.
///
/// - `Ai`: handed off to the external AI-session subsystem, never executed
///   by the local worker pool.
/// - `Human`: interactive prompt on the terminal.
/// - `Shell`: runs the task's `command` in a subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    Ai,
    Human,
    Shell,
}

impl RoleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::Ai => "ai",
            RoleType::Human => "human",
            RoleType::Shell => "shell",
        }
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ai" => Ok(RoleType::Ai),
            "human" => Ok(RoleType::Human),
            "shell" => Ok(RoleType::Shell),
            other => Err(format!(
                "invalid role type: {other} (expected \"ai\", \"human\" or \"shell\")"
            )),
        }
    }
}

/// Overall outcome of a run, as written to the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Fail,
}

impl Default for RunStatus {
    fn default() -> Self {
        RunStatus::Success
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => f.write_str("success"),
            RunStatus::Fail => f.write_str("fail"),
        }
    }
}
