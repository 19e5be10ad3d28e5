// src/exec/shell.rs

//! Shell executor: runs the task's `command` in a subprocess.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::model::Task;
use crate::errors::{ClampanyError, Result};
use crate::exec::executor::Executor;

/// Environment variable holding the outputs of the task's dependencies.
pub const INPUT_ENV: &str = "CLAMPANY_INPUT";
/// Environment variable holding the task name.
pub const TASK_ENV: &str = "CLAMPANY_TASK";
/// Environment variable holding the rendered prompt.
pub const PROMPT_ENV: &str = "CLAMPANY_PROMPT";

/// Runs `command` through the platform shell.
///
/// The output is stdout followed by stderr. A non-zero exit status is an
/// error, as is a task without a command.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, task: &Task, input: &str) -> Result<String> {
        let Some(command) = task.command.as_deref() else {
            return Err(ClampanyError::MissingCommand {
                task: task.name.clone(),
            });
        };

        info!(task = %task.name, cmd = %command, "starting shell command");

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        };

        cmd.env(INPUT_ENV, input)
            .env(TASK_ENV, &task.name)
            .env(PROMPT_ENV, task.render_prompt(input))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .with_context(|| format!("spawning process for task '{}'", task.name))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!(
            task = %task.name,
            exit_code = output.status.code().unwrap_or(-1),
            bytes = text.len(),
            "shell command exited"
        );

        if !output.status.success() {
            return Err(ClampanyError::CommandFailed {
                task: task.name.clone(),
                status: output.status.to_string(),
            });
        }

        Ok(text)
    }
}

impl Executor for ShellExecutor {
    fn execute<'a>(
        &'a self,
        task: &'a Task,
        input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.run(task, input))
    }
}
