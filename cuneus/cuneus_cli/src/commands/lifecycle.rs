//! Lifecycle commands

use anyhow::Context;
use cuneus_runtime::{Application, ShutdownReport};

/// Implementation of the run command
pub async fn execute_run(application: &Application) -> anyhow::Result<()> {
    println!(
        "Running {} (press Ctrl-C to stop)",
        application.settings().app_name
    );
    let report = application.run().await.context("startup failed")?;
    finish(report)
}

/// Implementation of the check command
pub async fn execute_check(application: &Application) -> anyhow::Result<()> {
    let state = application.start().await.context("startup failed")?;

    println!(
        "Started {} extension(s): {}",
        application.extension_names().len(),
        application.extension_names().join(", ")
    );
    if state.is_empty() {
        println!("No state keys");
    }
    for key in state.keys() {
        println!(
            "state: {} (from {})",
            key,
            state.owner_of(key).unwrap_or("unknown")
        );
    }

    finish(application.shutdown().await)
}

fn finish(report: ShutdownReport) -> anyhow::Result<()> {
    if report.is_clean() {
        println!("Stopped {} extension(s)", report.stopped.len());
        Ok(())
    } else {
        anyhow::bail!("shutdown incomplete: {}", report)
    }
}
