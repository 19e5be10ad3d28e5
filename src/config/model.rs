// src/config/model.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dag::clarify::{DEFAULT_CLARIFICATION_MARKER, DEFAULT_CLARIFICATION_ROLE};
use crate::dag::TaskGraph;
use crate::types::RoleType;

/// Placeholder in a prompt that is replaced with the task's input.
pub const INPUT_PLACEHOLDER: &str = "{{input}}";

/// Characters a task name may not contain. The name is also the stem of the
/// task's output file, and must map back to the task unchanged.
const FORBIDDEN_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Why `name` cannot be used as a task name, or `None` if it can.
pub fn task_name_problem(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        return Some("name is empty");
    }
    if name.trim() != name {
        return Some("name has leading or trailing whitespace");
    }
    if name == "." || name == ".." {
        return Some("name is a reserved path component");
    }
    if name
        .chars()
        .any(|c| c.is_control() || FORBIDDEN_NAME_CHARS.contains(&c))
    {
        return Some("name contains a path separator or a character not allowed in file names");
    }
    None
}

/// One unit of work.
///
/// ```toml
/// [[task]]
/// name = "build"
/// role = "ci"
/// prompt = "Build the project"
/// command = "make"
/// depends_on = ["plan"]
/// ```
///
/// Tasks are never mutated once loaded; the scheduler only creates new ones
/// (clarification flow).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique key across the whole run, including injected tasks.
    pub name: String,

    /// Name of the [`Role`] that performs this task.
    pub role: String,

    /// Free-text instructions. `{{input}}` is replaced with the outputs of
    /// the task's dependencies.
    #[serde(default)]
    pub prompt: String,

    /// Command line for shell roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Names of tasks that must complete first.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Task {
    pub fn new(name: impl Into<String>, role: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            prompt: prompt.into(),
            command: None,
            depends_on: Vec::new(),
        }
    }

    /// The prompt with `{{input}}` substituted.
    pub fn render_prompt(&self, input: &str) -> String {
        self.prompt.replace(INPUT_PLACEHOLDER, input)
    }

    /// `depends_on` without repeated names, in declaration order.
    pub fn unique_dependencies(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.depends_on.len());
        for dep in &self.depends_on {
            if !seen.contains(&dep.as_str()) {
                seen.push(dep.as_str());
            }
        }
        seen
    }
}

/// A named kind of worker.
///
/// ```toml
/// [[role]]
/// name = "planner1"
/// type = "ai"
/// model = "opus"
/// ```
///
/// `model`, `behavior` and `api_key` are opaque to scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,

    #[serde(rename = "type")]
    pub role_type: RoleType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Role {
    pub fn new(name: impl Into<String>, role_type: RoleType) -> Self {
        Self {
            name: name.into(),
            role_type,
            model: None,
            behavior: None,
            api_key: None,
        }
    }
}

/// `[settings]` section of the tasks file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Number of local workers.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Role that receives `<task>_clarify` tasks.
    #[serde(default = "default_clarification_role")]
    pub clarification_role: String,

    /// Substring of a task output that triggers the clarification flow.
    #[serde(default = "default_clarification_marker")]
    pub clarification_marker: String,

    /// How many clarify/retry generations may be stacked on one task.
    #[serde(default = "default_max_clarification_rounds")]
    pub max_clarification_rounds: u32,
}

fn default_max_parallel() -> usize {
    2
}

fn default_clarification_role() -> String {
    DEFAULT_CLARIFICATION_ROLE.to_string()
}

fn default_clarification_marker() -> String {
    DEFAULT_CLARIFICATION_MARKER.to_string()
}

fn default_max_clarification_rounds() -> u32 {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            clarification_role: default_clarification_role(),
            clarification_marker: default_clarification_marker(),
            max_clarification_rounds: default_max_clarification_rounds(),
        }
    }
}

/// Tasks file as read from TOML (`[settings]` + `[[task]]`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TasksFile {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub task: Vec<Task>,
}

/// Roles file as read from TOML (`[[role]]` + optional `[allowed_flows]`).
///
/// When `allowed_flows` is present, every dependency edge `dep -> task` must
/// go from `dep`'s role to one of the roles listed for it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolesFile {
    #[serde(default)]
    pub role: Vec<Role>,

    #[serde(default)]
    pub allowed_flows: Option<BTreeMap<String, Vec<String>>>,
}

/// Unvalidated project: both files, straight from deserialization.
#[derive(Debug, Clone, Default)]
pub struct RawProject {
    pub tasks: TasksFile,
    pub roles: RolesFile,
}

/// Validated project.
///
/// Can only be obtained through `Project::try_from(RawProject)`, which
/// guarantees that roles resolve, role flows are allowed and the dependency
/// graph is a DAG.
#[derive(Debug, Clone)]
pub struct Project {
    settings: Settings,
    roles: Vec<Role>,
    graph: TaskGraph,
}

impl Project {
    pub(crate) fn new_unchecked(settings: Settings, roles: Vec<Role>, graph: TaskGraph) -> Self {
        Self {
            settings,
            roles,
            graph,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn has_ai_roles(&self) -> bool {
        self.roles.iter().any(|r| r.role_type == RoleType::Ai)
    }
}
