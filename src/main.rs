// src/main.rs

use clampany::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("clampany error: {err:?}");
            std::process::exit(1);
        }
    }
}

/// `Ok(false)` when the run finished with status `fail`.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let summary = run(args).await?;
    Ok(summary.is_none_or(|s| s.is_success()))
}
