// tests/on_disk_run.rs

#![cfg(unix)]

mod common;
use crate::common::builders::{ProjectBuilder, TaskBuilder};
use crate::common::{init_tracing, join_with_timeout, with_timeout};

use std::error::Error;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tempfile::TempDir;

use clampany::cli::CliArgs;
use clampany::dag::{ClarificationPolicy, Scheduler};
use clampany::engine::{Runtime, RuntimeOptions, run_tasks};
use clampany::exec::{ExecutorRegistry, QueueFileDispatcher};
use clampany::fs::{FileSystem, RealFileSystem};
use clampany::logging::RUN_LOG_FILE;
use clampany::persist::{ArtifactStore, RunSummary};
use clampany::watch::spawn_output_watcher;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn shell_chain_writes_outputs_and_summary() -> TestResult {
    init_tracing();

    let dir = TempDir::new()?;
    let project = ProjectBuilder::new()
        .with_task(TaskBuilder::new("gen").shell("printf hello").build())
        .with_task(
            TaskBuilder::new("upper")
                .shell("printf '%s' \"$CLAMPANY_INPUT\" | tr a-z A-Z")
                .after("gen")
                .build(),
        )
        .with_task(TaskBuilder::new("broken").shell("exit 7").build())
        .build();

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let store = ArtifactStore::new(Arc::clone(&fs), dir.path().join("run-1"), "1");
    store.prepare()?;
    let queue = Arc::new(QueueFileDispatcher::new(Arc::clone(&fs), dir.path().join("queue")));

    let summary = with_timeout(run_tasks(
        project.graph(),
        project.roles(),
        ExecutorRegistry::from_roles(project.roles()),
        queue,
        store.clone(),
        RuntimeOptions { max_parallel: 2 },
        ClarificationPolicy::default(),
    ))
    .await??;

    assert_eq!(fs::read_to_string(store.output_path("upper"))?, "HELLO");
    assert!(summary.failures.get("broken").is_some_and(|e| e.contains("exit status: 7")));
    assert!(!summary.is_success());

    let on_disk = RunSummary::from_toml(&fs::read_to_string(dir.path().join("run-1/run.toml"))?)?;
    assert_eq!(on_disk.tasks.get("upper").map(String::as_str), Some("succeeded"));

    Ok(())
}

#[tokio::test]
async fn ai_output_file_completes_the_task() -> TestResult {
    init_tracing();

    let dir = TempDir::new()?;
    let project = ProjectBuilder::new()
        .with_task(TaskBuilder::new("plan").role("planner1").prompt("Plan it").build())
        .with_task(
            TaskBuilder::new("echo")
                .shell("printf '%s' \"$CLAMPANY_INPUT\"")
                .after("plan")
                .build(),
        )
        .build();

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let store = ArtifactStore::new(Arc::clone(&fs), dir.path().join("run-2"), "2");
    store.prepare()?;
    let queue_dir = dir.path().join("queue");
    let queue = Arc::new(
        QueueFileDispatcher::new(Arc::clone(&fs), &queue_dir).with_output_dir(store.outputs_dir()),
    );

    let scheduler = Scheduler::new(
        project.graph(),
        project.roles(),
        ClarificationPolicy::default(),
    );
    let runtime = Runtime::with_worker_pool(
        scheduler,
        RuntimeOptions { max_parallel: 1 },
        ExecutorRegistry::from_roles(project.roles()),
        queue,
        store.clone(),
    );
    let _watcher = spawn_output_watcher(
        store.outputs_dir(),
        Arc::clone(&fs),
        runtime.completion_handle(),
    )?;
    let run = tokio::spawn(runtime.run());

    // Play the AI session: wait for the queue entry, then answer.
    let queue_file = queue_dir.join("planner_queue.md");
    with_timeout(async {
        while !queue_file.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    assert!(fs::read_to_string(&queue_file)?.starts_with("[planner1]\nPlan it\n"));

    fs::write(store.output_path("plan"), "step 1, step 2")?;

    let summary = join_with_timeout(run).await??;
    assert!(summary.is_success());
    assert_eq!(fs::read_to_string(store.output_path("echo"))?, "step 1, step 2");

    Ok(())
}

#[tokio::test]
async fn cli_run_keeps_a_log_next_to_its_artifacts() -> TestResult {
    init_tracing();

    let dir = TempDir::new()?;
    let tasks = dir.path().join("tasks.toml");
    let roles = dir.path().join("roles.toml");
    fs::write(
        &tasks,
        "[[task]]\nname = \"hello\"\nrole = \"ci\"\ncommand = \"printf hi\"\n",
    )?;
    fs::write(&roles, "[[role]]\nname = \"ci\"\ntype = \"shell\"\n")?;

    let args = CliArgs::parse_from([
        "clampany",
        "--tasks",
        tasks.to_str().ok_or("non-utf8 temp path")?,
        "--roles",
        roles.to_str().ok_or("non-utf8 temp path")?,
        "--output-dir",
        dir.path().join("runs").to_str().ok_or("non-utf8 temp path")?,
        "--queue-dir",
        dir.path().join("queue").to_str().ok_or("non-utf8 temp path")?,
    ]);

    let summary = with_timeout(clampany::run(args))
        .await??
        .ok_or("expected a run summary, got a dry run")?;
    assert!(summary.is_success());

    let run_dir = dir.path().join("runs").join(format!("run-{}", summary.run_id));
    assert_eq!(fs::read_to_string(run_dir.join("outputs/hello.md"))?, "hi");

    let log = fs::read_to_string(run_dir.join(RUN_LOG_FILE))?;
    assert!(log.contains("task succeeded"), "run log was: {log}");
    assert!(!log.contains('\u{1b}'), "run log carries ANSI escapes");

    Ok(())
}
