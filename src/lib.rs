// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod persist;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::config::model::Project;
use crate::dag::{ClarificationPolicy, Scheduler};
use crate::engine::{Runtime, RuntimeOptions};
use crate::exec::{ExecutorRegistry, QueueFileDispatcher};
use crate::fs::{FileSystem, RealFileSystem};
use crate::persist::{ArtifactStore, RunSummary};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - scheduler / core / runtime
/// - worker pool and AI queue-file dispatcher
/// - the output watcher for AI completions
/// - the per-run log file, `<run_dir>/log.txt`
///
/// Returns `None` for `--dry-run`, otherwise the summary of the finished run.
pub async fn run(args: CliArgs) -> Result<Option<RunSummary>> {
    let mut project = load_and_validate(&args.tasks, &args.roles).with_context(|| {
        format!(
            "loading {} and {}",
            args.tasks.display(),
            args.roles.display()
        )
    })?;

    if let Some(max_parallel) = args.max_parallel {
        if max_parallel == 0 {
            bail!("--max-parallel must be >= 1");
        }
        project.settings_mut().max_parallel = max_parallel;
    }

    if args.dry_run {
        print_dry_run(&project)?;
        return Ok(None);
    }

    let settings = project.settings();
    if !project
        .roles()
        .iter()
        .any(|r| r.name == settings.clarification_role)
    {
        warn!(
            role = %settings.clarification_role,
            "clarification role is not defined; clarification tasks will fail"
        );
    }

    let run_id = Uuid::new_v4().to_string();
    let run_dir: PathBuf = args.output_dir.join(format!("run-{run_id}"));
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let store = ArtifactStore::new(Arc::clone(&fs), &run_dir, &run_id);
    store
        .prepare()
        .with_context(|| format!("creating run directory {}", run_dir.display()))?;
    let _run_log = crate::logging::attach_run_log(&run_dir)?;

    let registry = ExecutorRegistry::from_roles(project.roles());
    let ai = Arc::new(
        QueueFileDispatcher::new(Arc::clone(&fs), &args.queue_dir)
            .with_output_dir(store.outputs_dir()),
    );

    let scheduler = Scheduler::new(
        project.graph(),
        project.roles(),
        ClarificationPolicy::from(settings),
    );
    let options = RuntimeOptions {
        max_parallel: settings.max_parallel,
    };

    info!(
        run_id = %run_id,
        run_dir = %run_dir.display(),
        tasks = project.graph().len(),
        max_parallel = options.max_parallel,
        "starting clampany run"
    );

    let runtime = Runtime::with_worker_pool(scheduler, options, registry, ai, store.clone());

    // Kept alive until the run finishes.
    let _watcher = if project.has_ai_roles() {
        Some(crate::watch::spawn_output_watcher(
            store.outputs_dir(),
            Arc::clone(&fs),
            runtime.completion_handle(),
        )?)
    } else {
        None
    };

    let summary = runtime.run().await?;
    println!(
        "run {} finished: {} ({})",
        summary.run_id,
        summary.status,
        store.summary_path().display()
    );
    Ok(Some(summary))
}

/// Dry-run output: settings, roles, and tasks in execution order.
fn print_dry_run(project: &Project) -> Result<()> {
    let settings = project.settings();
    let graph = project.graph();

    println!("clampany dry-run");
    println!("  settings.max_parallel = {}", settings.max_parallel);
    println!(
        "  settings.clarification_role = {}",
        settings.clarification_role
    );
    println!(
        "  settings.clarification_marker = {}",
        settings.clarification_marker
    );
    println!();

    println!("roles ({}):", project.roles().len());
    for role in project.roles() {
        println!("  - {} ({})", role.name, role.role_type);
    }
    println!();

    let order = graph.topo_sort()?;
    println!("tasks ({}), in execution order:", order.len());
    for name in &order {
        let Some(task) = graph.task(name) else {
            continue;
        };
        println!("  - {name} [{}]", task.role);
        if let Some(command) = &task.command {
            println!("      command: {command}");
        }
        let deps = graph.dependencies_of(name);
        if !deps.is_empty() {
            println!("      depends_on: {deps:?}");
        }
    }

    Ok(())
}
