// src/exec/executor.rs

//! Synchronous executor contract and the role -> executor registry.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::model::{Role, Task};
use crate::errors::{ClampanyError, Result};
use crate::exec::human::HumanExecutor;
use crate::exec::shell::ShellExecutor;
use crate::types::RoleType;

/// Performs one task and returns its output text.
///
/// `input` holds the outputs of the task's dependencies. Implementations may
/// block for an unbounded time (a human answering a prompt).
pub trait Executor: Send + Sync {
    fn execute<'a>(
        &'a self,
        task: &'a Task,
        input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// Executors keyed by role name.
///
/// AI roles never get an entry: their tasks are handed to an
/// [`AiDispatcher`](crate::exec::ai::AiDispatcher) instead.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    by_role: HashMap<String, Arc<dyn Executor>>,
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut roles: Vec<_> = self.by_role.keys().collect();
        roles.sort();
        f.debug_struct("ExecutorRegistry")
            .field("roles", &roles)
            .finish()
    }
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the standard executors: every shell role gets a
    /// [`ShellExecutor`], every human role shares one terminal
    /// [`HumanExecutor`].
    pub fn from_roles(roles: &[Role]) -> Self {
        let shell: Arc<dyn Executor> = Arc::new(ShellExecutor::new());
        let human: Arc<dyn Executor> = Arc::new(HumanExecutor::stdio());

        let mut registry = Self::new();
        for role in roles {
            match role.role_type {
                RoleType::Shell => registry.register(&role.name, Arc::clone(&shell)),
                RoleType::Human => registry.register(&role.name, Arc::clone(&human)),
                RoleType::Ai => {}
            }
        }
        registry
    }

    pub fn register(&mut self, role: impl Into<String>, executor: Arc<dyn Executor>) {
        self.by_role.insert(role.into(), executor);
    }

    pub fn with(mut self, role: impl Into<String>, executor: Arc<dyn Executor>) -> Self {
        self.register(role, executor);
        self
    }

    pub fn get(&self, role: &str) -> Result<Arc<dyn Executor>> {
        self.by_role
            .get(role)
            .cloned()
            .ok_or_else(|| ClampanyError::NoExecutor(role.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_role.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_role.is_empty()
    }
}
