// src/config/validate.rs

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::model::{Project, RawProject, Role, Settings, Task};
use crate::dag::TaskGraph;
use crate::errors::{ClampanyError, Result};
use crate::types::RoleType;

impl TryFrom<RawProject> for Project {
    type Error = ClampanyError;

    fn try_from(raw: RawProject) -> std::result::Result<Self, Self::Error> {
        let RawProject { tasks, roles } = raw;

        ensure_has_tasks(&tasks.task)?;
        validate_settings(&tasks.settings)?;
        validate_roles(&roles.role)?;
        validate_task_roles(&tasks.task, &roles.role)?;

        // Dependency resolution and cycle detection live in the graph itself.
        let graph = TaskGraph::build(tasks.task)?;

        if let Some(flows) = roles.allowed_flows.as_ref() {
            validate_role_flows(&graph, flows)?;
        }

        Ok(Project::new_unchecked(tasks.settings, roles.role, graph))
    }
}

fn ensure_has_tasks(tasks: &[Task]) -> Result<()> {
    if tasks.is_empty() {
        return Err(ClampanyError::Config(
            "tasks file must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.max_parallel == 0 {
        return Err(ClampanyError::Config(
            "[settings].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }
    if settings.clarification_marker.trim().is_empty() {
        return Err(ClampanyError::Config(
            "[settings].clarification_marker must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_roles(roles: &[Role]) -> Result<()> {
    let mut seen = HashSet::new();
    for role in roles {
        if !seen.insert(role.name.as_str()) {
            return Err(ClampanyError::DuplicateRole(role.name.clone()));
        }
    }
    Ok(())
}

fn validate_task_roles(tasks: &[Task], roles: &[Role]) -> Result<()> {
    let role_types: HashMap<&str, RoleType> = roles
        .iter()
        .map(|r| (r.name.as_str(), r.role_type))
        .collect();

    for task in tasks {
        match role_types.get(task.role.as_str()) {
            None => {
                return Err(ClampanyError::UnknownRole {
                    task: task.name.clone(),
                    role: task.role.clone(),
                });
            }
            Some(RoleType::Shell) => {
                let has_command = task
                    .command
                    .as_deref()
                    .is_some_and(|c| !c.trim().is_empty());
                if !has_command {
                    return Err(ClampanyError::Config(format!(
                        "task '{}' uses shell role '{}' but has no `command`",
                        task.name, task.role
                    )));
                }
            }
            Some(RoleType::Ai) | Some(RoleType::Human) => {}
        }
    }
    Ok(())
}

fn validate_role_flows(graph: &TaskGraph, flows: &BTreeMap<String, Vec<String>>) -> Result<()> {
    for task in graph.tasks() {
        for dep_name in task.unique_dependencies() {
            let Some(dep) = graph.task(dep_name) else {
                continue;
            };
            let allowed = flows
                .get(&dep.role)
                .is_some_and(|targets| targets.iter().any(|r| r == &task.role));
            if !allowed {
                return Err(ClampanyError::RoleFlowViolation {
                    from: dep.role.clone(),
                    to: task.role.clone(),
                    from_task: dep.name.clone(),
                    to_task: task.name.clone(),
                });
            }
        }
    }
    Ok(())
}
