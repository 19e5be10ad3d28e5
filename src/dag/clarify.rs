// src/dag/clarify.rs

//! Clarification flow.
//!
//! When a finished task's output contains the clarification marker, two new
//! tasks are synthesized:
//!
//! - `<name>_clarify`: handled by the escalation role, depends on the task
//!   that asked, prompt embeds the raw output.
//! - `<name>_retry`: the original role and command again, depends on the
//!   clarify task, prompt annotated as clarified.

use crate::config::model::{Settings, Task};

pub const DEFAULT_CLARIFICATION_MARKER: &str = "needs_clarification";
pub const DEFAULT_CLARIFICATION_ROLE: &str = "planner1";

const CLARIFY_SUFFIX: &str = "_clarify";
const RETRY_SUFFIX: &str = "_retry";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClarificationPolicy {
    /// Role that answers clarification requests.
    pub role: String,
    /// Substring that signals a request for clarification.
    pub marker: String,
    /// Maximum clarify/retry generations stacked on one planned task.
    pub max_rounds: u32,
}

impl Default for ClarificationPolicy {
    fn default() -> Self {
        Self {
            role: DEFAULT_CLARIFICATION_ROLE.to_string(),
            marker: DEFAULT_CLARIFICATION_MARKER.to_string(),
            max_rounds: 3,
        }
    }
}

impl From<&Settings> for ClarificationPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            role: settings.clarification_role.clone(),
            marker: settings.clarification_marker.clone(),
            max_rounds: settings.max_clarification_rounds,
        }
    }
}

impl ClarificationPolicy {
    pub fn requests_clarification(&self, output: &str) -> bool {
        output.contains(&self.marker)
    }
}

/// The two tasks injected for one clarification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClarificationPair {
    pub clarify: Task,
    pub retry: Task,
}

pub fn clarify_name(task: &str) -> String {
    format!("{task}{CLARIFY_SUFFIX}")
}

pub fn retry_name(task: &str) -> String {
    format!("{task}{RETRY_SUFFIX}")
}

/// Build the clarify/retry pair for `original`, which produced `output`.
pub fn synthesize(policy: &ClarificationPolicy, original: &Task, output: &str) -> ClarificationPair {
    let clarify = Task {
        name: clarify_name(&original.name),
        role: policy.role.clone(),
        prompt: format!("Question from {}: {}", original.name, output),
        command: None,
        depends_on: vec![original.name.clone()],
    };

    let retry = Task {
        name: retry_name(&original.name),
        role: original.role.clone(),
        prompt: format!("{}\n(clarification applied)", original.prompt),
        command: original.command.clone(),
        depends_on: vec![clarify.name.clone()],
    };

    ClarificationPair { clarify, retry }
}
