// src/exec/human.rs

//! Human executor: prints the prompt, waits for one line of input.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::model::Task;
use crate::errors::Result;
use crate::exec::executor::Executor;

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

struct Terminal {
    reader: Reader,
    writer: Writer,
}

/// Interactive executor.
///
/// Human tasks running in parallel share one terminal; the lock serializes
/// prompt and answer so they never interleave.
pub struct HumanExecutor {
    terminal: Mutex<Terminal>,
}

impl fmt::Debug for HumanExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HumanExecutor").finish_non_exhaustive()
    }
}

impl HumanExecutor {
    pub fn new(reader: Reader, writer: Writer) -> Self {
        Self {
            terminal: Mutex::new(Terminal { reader, writer }),
        }
    }

    /// Prompts on stdout, answers from stdin.
    pub fn stdio() -> Self {
        Self::new(
            Box::new(BufReader::new(tokio::io::stdin())),
            Box::new(tokio::io::stdout()),
        )
    }

    async fn ask(&self, task: &Task, input: &str) -> Result<String> {
        let mut terminal = self.terminal.lock().await;

        let banner = format!(
            "\n[{}] {}\n{}\n> ",
            task.role,
            task.name,
            task.render_prompt(input)
        );
        terminal.writer.write_all(banner.as_bytes()).await?;
        terminal.writer.flush().await?;

        let mut answer = String::new();
        let read = terminal.reader.read_line(&mut answer).await?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("input closed before an answer for task '{}'", task.name),
            )
            .into());
        }

        let answer = answer.trim_end_matches(['\r', '\n']).to_string();
        info!(task = %task.name, "human answer received");
        Ok(answer)
    }
}

impl Executor for HumanExecutor {
    fn execute<'a>(
        &'a self,
        task: &'a Task,
        input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.ask(task, input))
    }
}
