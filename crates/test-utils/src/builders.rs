#![allow(dead_code)]

use std::collections::BTreeMap;

use clampany::config::{Project, RawProject, Role, RolesFile, Settings, Task, TasksFile};
use clampany::types::RoleType;

/// Builder for `Project` to simplify test setup.
///
/// Roles `dev` (human), `ci` (shell) and `planner1` (ai) are always present,
/// so `planner1` is a valid default clarification role.
pub struct ProjectBuilder {
    raw: RawProject,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawProject {
                tasks: TasksFile {
                    settings: Settings::default(),
                    task: Vec::new(),
                },
                roles: RolesFile {
                    role: vec![
                        Role::new("dev", RoleType::Human),
                        Role::new("ci", RoleType::Shell),
                        Role::new("planner1", RoleType::Ai),
                    ],
                    allowed_flows: None,
                },
            },
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.raw.tasks.task.push(task);
        self
    }

    pub fn with_role(mut self, name: &str, role_type: RoleType) -> Self {
        self.raw.roles.role.push(Role::new(name, role_type));
        self
    }

    pub fn with_flow(mut self, from: &str, to: &str) -> Self {
        self.raw
            .roles
            .allowed_flows
            .get_or_insert_with(BTreeMap::new)
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        self
    }

    pub fn max_parallel(mut self, n: usize) -> Self {
        self.raw.tasks.settings.max_parallel = n;
        self
    }

    pub fn clarification_role(mut self, role: &str) -> Self {
        self.raw.tasks.settings.clarification_role = role.to_string();
        self
    }

    pub fn max_clarification_rounds(mut self, n: u32) -> Self {
        self.raw.tasks.settings.max_clarification_rounds = n;
        self
    }

    pub fn raw(self) -> RawProject {
        self.raw
    }

    pub fn build(self) -> Project {
        Project::try_from(self.raw).expect("Failed to build valid project from builder")
    }

    /// Validate without panicking, for tests that expect rejection.
    pub fn try_build(self) -> clampany::errors::Result<Project> {
        Project::try_from(self.raw)
    }
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `Task`. Defaults to the human role `dev`.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: Task::new(name, "dev", format!("do {name}")),
        }
    }

    pub fn role(mut self, role: &str) -> Self {
        self.task.role = role.to_string();
        self
    }

    pub fn prompt(mut self, prompt: &str) -> Self {
        self.task.prompt = prompt.to_string();
        self
    }

    /// Sets the command and switches to the shell role `ci`.
    pub fn shell(mut self, command: &str) -> Self {
        self.task.role = "ci".to_string();
        self.task.command = Some(command.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.depends_on.push(dep.to_string());
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}
