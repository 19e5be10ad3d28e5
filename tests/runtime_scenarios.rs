// tests/runtime_scenarios.rs

mod common;
use crate::common::builders::{ProjectBuilder, TaskBuilder};
use crate::common::fake_executor::{FakeBackend, RecordingAiDispatcher, ScriptedExecutor};
use crate::common::{init_tracing, join_with_timeout, mem_store, registry_with, with_timeout, RUN_DIR};

use std::error::Error;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use clampany::config::Project;
use clampany::dag::{ClarificationPolicy, Scheduler};
use clampany::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, run_tasks};
use clampany::errors::ClampanyError;
use clampany::fs::FileSystem;
use clampany::fs::mock::MockFileSystem;
use clampany::persist::RunSummary;
use clampany::types::RunStatus;

type TestResult = Result<(), Box<dyn Error>>;

async fn run_project(
    project: &Project,
    executor: Arc<ScriptedExecutor>,
    ai: Arc<RecordingAiDispatcher>,
) -> Result<(RunSummary, MockFileSystem), Box<dyn Error>> {
    let (fs, store) = mem_store();
    let summary = with_timeout(run_tasks(
        project.graph(),
        project.roles(),
        registry_with(executor),
        ai,
        store,
        RuntimeOptions {
            max_parallel: project.settings().max_parallel,
        },
        ClarificationPolicy::from(project.settings()),
    ))
    .await??;
    Ok((summary, fs))
}

fn output_file(task: &str) -> String {
    format!("{RUN_DIR}/outputs/{task}.md")
}

#[tokio::test]
async fn fan_out_runs_root_then_siblings_in_name_order() -> TestResult {
    init_tracing();

    let project = ProjectBuilder::new()
        .max_parallel(2)
        .with_task(TaskBuilder::new("A").build())
        .with_task(TaskBuilder::new("C").after("A").build())
        .with_task(TaskBuilder::new("B").after("A").build())
        .build();
    let executor = Arc::new(ScriptedExecutor::new());

    let (summary, fs) =
        run_project(&project, executor.clone(), Arc::new(RecordingAiDispatcher::new())).await?;

    assert_eq!(executor.executed(), vec!["A", "B", "C"]);
    assert_eq!(executor.input_of("B").as_deref(), Some("A done"));
    assert_eq!(summary.status, RunStatus::Success);
    assert!(summary.tasks.values().all(|state| state == "succeeded"));
    assert_eq!(fs.read_to_string(Path::new(&output_file("C")))?, "C done");

    Ok(())
}

#[tokio::test]
async fn never_more_than_max_parallel_local_executions() -> TestResult {
    init_tracing();

    let mut builder = ProjectBuilder::new().max_parallel(2);
    for name in ["t1", "t2", "t3", "t4", "t5"] {
        builder = builder.with_task(TaskBuilder::new(name).build());
    }
    let project = builder.build();
    let executor = Arc::new(ScriptedExecutor::new().delay(Duration::from_millis(30)));

    let (summary, _fs) =
        run_project(&project, executor.clone(), Arc::new(RecordingAiDispatcher::new())).await?;

    assert_eq!(executor.executed().len(), 5);
    assert!(executor.max_concurrency() <= 2);
    assert!(summary.is_success());

    Ok(())
}

#[tokio::test]
async fn clarification_marker_injects_clarify_and_retry() -> TestResult {
    init_tracing();

    let project = ProjectBuilder::new()
        .with_task(TaskBuilder::new("D").prompt("implement login").build())
        .build();
    let executor = Arc::new(
        ScriptedExecutor::new()
            .reply("D", "needs_clarification: which provider?")
            .reply("D_retry", "implemented"),
    );
    let ai = Arc::new(RecordingAiDispatcher::auto_complete().reply("D_clarify", "use OAuth"));

    let (summary, fs) = run_project(&project, executor.clone(), ai.clone()).await?;

    assert_eq!(executor.executed(), vec!["D", "D_retry"]);
    assert_eq!(ai.dispatched(), vec!["D_clarify"]);

    let clarify = ai.dispatched_task("D_clarify").expect("clarify task handed off");
    assert_eq!(clarify.task.role, "planner1");
    assert_eq!(clarify.task.depends_on, vec!["D"]);
    assert!(clarify.task.prompt.contains("which provider?"));

    assert_eq!(executor.input_of("D_retry").as_deref(), Some("use OAuth"));
    assert_eq!(
        summary.tasks.keys().collect::<Vec<_>>(),
        vec!["D", "D_clarify", "D_retry"]
    );
    assert_eq!(summary.tasks.get("D").map(String::as_str), Some("succeeded"));
    assert!(summary.is_success());
    assert_eq!(fs.read_to_string(Path::new(&output_file("D_clarify")))?, "use OAuth");

    Ok(())
}

#[tokio::test]
async fn clarification_stops_after_round_limit() -> TestResult {
    init_tracing();

    let project = ProjectBuilder::new()
        .max_clarification_rounds(1)
        .with_task(TaskBuilder::new("D").build())
        .build();
    let executor = Arc::new(
        ScriptedExecutor::new()
            .reply("D", "needs_clarification")
            .reply("D_retry", "still needs_clarification"),
    );

    let (summary, _fs) = run_project(
        &project,
        executor.clone(),
        Arc::new(RecordingAiDispatcher::auto_complete()),
    )
    .await?;

    assert_eq!(executor.executed(), vec!["D", "D_retry"]);
    assert_eq!(summary.tasks.len(), 3);
    assert!(summary.is_success());

    Ok(())
}

#[tokio::test]
async fn failure_skips_dependents_and_fails_the_run() -> TestResult {
    init_tracing();

    let project = ProjectBuilder::new()
        .with_task(TaskBuilder::new("E").build())
        .with_task(TaskBuilder::new("F").after("E").build())
        .with_task(TaskBuilder::new("G").build())
        .build();
    let executor = Arc::new(ScriptedExecutor::new().fail("E", "boom"));

    let (summary, fs) =
        run_project(&project, executor.clone(), Arc::new(RecordingAiDispatcher::new())).await?;

    assert!(!executor.executed().contains(&"F".to_string()));
    assert_eq!(summary.status, RunStatus::Fail);
    assert!(summary.failures.get("E").is_some_and(|e| e.contains("boom")));
    assert_eq!(summary.skipped.get("F").map(String::as_str), Some("E"));
    assert_eq!(summary.tasks.get("G").map(String::as_str), Some("succeeded"));
    assert!(!fs.exists(Path::new(&output_file("F"))));

    let written = RunSummary::from_toml(&fs.read_to_string(Path::new(&format!("{RUN_DIR}/run.toml")))?)?;
    assert_eq!(written, summary);

    Ok(())
}

#[tokio::test]
async fn ai_dependents_wait_for_external_completion() -> TestResult {
    init_tracing();

    let project = ProjectBuilder::new()
        .with_task(TaskBuilder::new("plan").role("planner1").build())
        .with_task(TaskBuilder::new("build").after("plan").build())
        .build();
    let executor = Arc::new(ScriptedExecutor::new());
    let ai = Arc::new(RecordingAiDispatcher::new());
    let (_fs, store) = mem_store();

    let scheduler = Scheduler::new(
        project.graph(),
        project.roles(),
        ClarificationPolicy::default(),
    );
    let runtime = Runtime::with_worker_pool(
        scheduler,
        RuntimeOptions { max_parallel: 1 },
        registry_with(executor.clone()),
        ai.clone(),
        store,
    );
    let completion = runtime.completion_handle();
    let run = tokio::spawn(runtime.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ai.dispatched(), vec!["plan"]);
    assert!(executor.executed().is_empty());
    assert!(!run.is_finished());

    completion.complete("plan", "the plan").await?;
    let summary = join_with_timeout(run).await??;

    assert_eq!(executor.executed(), vec!["build"]);
    assert_eq!(executor.input_of("build").as_deref(), Some("the plan"));
    assert!(summary.is_success());

    Ok(())
}

#[tokio::test]
async fn failed_ai_hand_off_fails_the_task() -> TestResult {
    init_tracing();

    let project = ProjectBuilder::new()
        .with_task(TaskBuilder::new("plan").role("planner1").build())
        .with_task(TaskBuilder::new("build").after("plan").build())
        .build();
    let executor = Arc::new(ScriptedExecutor::new());

    let (summary, _fs) = run_project(
        &project,
        executor.clone(),
        Arc::new(RecordingAiDispatcher::rejecting()),
    )
    .await?;

    assert!(executor.executed().is_empty());
    assert!(summary.failures.contains_key("plan"));
    assert_eq!(summary.skipped.get("build").map(String::as_str), Some("plan"));

    Ok(())
}

#[tokio::test]
async fn slow_ai_hand_off_does_not_stall_the_runtime_thread() -> TestResult {
    init_tracing();

    let project = ProjectBuilder::new()
        .with_task(TaskBuilder::new("plan").role("planner1").build())
        .with_task(TaskBuilder::new("build").after("plan").build())
        .build();

    // Single-threaded test runtime: the ticker only advances while the
    // runtime's thread is free.
    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = {
        let ticks = ticks.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let ai = Arc::new(RecordingAiDispatcher::auto_complete().pause(Duration::from_millis(300)));
    let (summary, _fs) = run_project(&project, Arc::new(ScriptedExecutor::new()), ai).await?;
    ticker.abort();

    assert!(summary.is_success());
    let ticks = ticks.load(Ordering::SeqCst);
    assert!(ticks >= 5, "runtime thread was blocked during hand-off ({ticks} ticks)");

    Ok(())
}

#[tokio::test]
async fn persistence_errors_are_reported_without_failing_the_run() -> TestResult {
    init_tracing();

    let project = ProjectBuilder::new()
        .with_task(TaskBuilder::new("A").build())
        .with_task(TaskBuilder::new("B").after("A").build())
        .build();
    let (fs, store) = mem_store();
    fs.deny_writes(output_file("A"));
    let executor = Arc::new(ScriptedExecutor::new());

    let summary = with_timeout(run_tasks(
        project.graph(),
        project.roles(),
        registry_with(executor.clone()),
        Arc::new(RecordingAiDispatcher::new()),
        store,
        RuntimeOptions::default(),
        ClarificationPolicy::default(),
    ))
    .await??;

    assert_eq!(executor.executed(), vec!["A", "B"]);
    assert!(summary.persistence_errors.contains_key("A"));
    assert_eq!(summary.status, RunStatus::Success);

    Ok(())
}

#[tokio::test]
async fn names_sharing_an_output_file_never_reach_the_runtime() -> TestResult {
    init_tracing();

    let rejected = ProjectBuilder::new()
        .with_task(TaskBuilder::new("x/y").build())
        .with_task(TaskBuilder::new("x_y").build())
        .try_build();
    assert!(matches!(
        rejected,
        Err(ClampanyError::InvalidTaskName { ref name, .. }) if name == "x/y"
    ));

    // Near-identical valid names keep separate artifacts.
    let project = ProjectBuilder::new()
        .with_task(TaskBuilder::new("x_y").build())
        .with_task(TaskBuilder::new("x.y").build())
        .build();
    let executor = Arc::new(
        ScriptedExecutor::new()
            .reply("x_y", "UNDERSCORE")
            .reply("x.y", "DOT"),
    );
    let (summary, fs) =
        run_project(&project, executor, Arc::new(RecordingAiDispatcher::new())).await?;

    assert!(summary.persistence_errors.is_empty());
    assert_eq!(fs.read_to_string(Path::new(&output_file("x_y")))?, "UNDERSCORE");
    assert_eq!(fs.read_to_string(Path::new(&output_file("x.y")))?, "DOT");

    Ok(())
}

#[tokio::test]
async fn unwritable_summary_is_an_error() -> TestResult {
    init_tracing();

    let project = ProjectBuilder::new()
        .with_task(TaskBuilder::new("A").build())
        .build();
    let (fs, store) = mem_store();
    fs.deny_writes(format!("{RUN_DIR}/run.toml"));

    let result = with_timeout(run_tasks(
        project.graph(),
        project.roles(),
        registry_with(Arc::new(ScriptedExecutor::new())),
        Arc::new(RecordingAiDispatcher::new()),
        store,
        RuntimeOptions::default(),
        ClarificationPolicy::default(),
    ))
    .await?;

    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn runtime_accepts_a_custom_backend() -> TestResult {
    init_tracing();

    let project = ProjectBuilder::new()
        .with_task(TaskBuilder::new("A").build())
        .with_task(TaskBuilder::new("B").after("A").build())
        .build();
    let scheduler = Scheduler::new(
        project.graph(),
        project.roles(),
        ClarificationPolicy::default(),
    );

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicUsize::new(0));
    let backend = FakeBackend::new(rt_tx.clone(), executed.clone(), closed.clone());
    let (_fs, store) = mem_store();

    let core = CoreRuntime::new(scheduler, RuntimeOptions { max_parallel: 1 });
    let runtime = Runtime::new(
        core,
        rt_tx,
        rt_rx,
        backend,
        Arc::new(RecordingAiDispatcher::new()),
        store,
    );

    let summary = with_timeout(runtime.run()).await??;

    assert_eq!(*executed.lock().unwrap(), vec!["A".to_string(), "B".to_string()]);
    assert!(closed.load(Ordering::SeqCst) >= 1);
    assert!(summary.is_success());

    Ok(())
}
