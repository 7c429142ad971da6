// src/lib.rs

pub mod cancel;
pub mod chain;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

pub use cancel::{CancelSignal, CancelSource};
pub use chain::{Action, TaskChain, UnitHandle, UnitState};
pub use errors::{ChainError, Result};
pub use types::SubmitMode;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::PlanFile;
use crate::exec::{run_step, RunSummary, StepOutcome};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading
/// - a `TaskChain` bound to the current runtime
/// - Ctrl-C handling (shuts the chain down)
/// - the final summary on stdout
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let plan_path = PathBuf::from(&args.plan);
    let plan = load_and_validate(&plan_path)
        .with_context(|| format!("loading plan {}", plan_path.display()))?;

    if args.dry_run {
        print_dry_run(&plan);
        return Ok(());
    }

    let chain = Arc::new(TaskChain::new()?);

    // Ctrl-C → shut the chain down; pending steps resolve as cancelled and
    // running commands are killed.
    let ctrl_c = {
        let chain = Arc::clone(&chain);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; shutting down task chain");
            chain.shutdown();
        })
    };

    let summary = execute_plan(&plan, &chain).await;
    ctrl_c.abort();
    chain.shutdown();

    print_summary(&summary);

    if !summary.all_succeeded() {
        bail!("unsuccessful steps: {}", summary.unsuccessful().join(", "));
    }
    Ok(())
}

/// Submit every step of `plan` to `chain` in file order and wait for all of
/// them.
///
/// With `stop_on_failure`, every step's signal is linked to one shared
/// source that the first unsuccessful step fires, so steps that have not
/// started yet are cancelled and running siblings are aborted.
pub async fn execute_plan(plan: &PlanFile, chain: &TaskChain) -> RunSummary {
    let shell = plan.config.effective_shell().to_string();
    let stop_on_failure = plan.config.stop_on_failure;
    let abort = CancelSource::new();

    let mut submitted = Vec::with_capacity(plan.step.len());

    for step in plan.step.iter().cloned() {
        let signal = if stop_on_failure {
            abort.signal()
        } else {
            CancelSignal::none()
        };

        let (report_tx, report_rx) = oneshot::channel::<StepOutcome>();
        let name = step.name.clone();
        let mode = step.mode;
        let shell = shell.clone();
        let abort = abort.clone();

        let action = async move {
            let outcome = run_step(&step, &shell).await;
            // Report before cancelling: cancelling aborts this very future.
            let _ = report_tx.send(outcome);
            if stop_on_failure && !outcome.is_success() {
                warn!(step = %step.name, %outcome, "step unsuccessful; cancelling remaining steps");
                abort.cancel();
            }
        };

        let handle = chain.submit(mode, Action::future(action), signal);
        debug!(step = %name, ?mode, unit = %handle.id(), "step submitted");
        submitted.push((name, handle, report_rx));
    }

    let mut summary = RunSummary::default();
    for (name, handle, report_rx) in submitted {
        let state = handle.wait().await;
        let reported = report_rx.await.ok();
        let outcome = StepOutcome::from_unit(state, reported);
        info!(step = %name, ?state, %outcome, "step finished");
        summary.push(name, outcome);
    }

    summary
}

/// Dry-run output: the waves the plan will run in.
fn print_dry_run(plan: &PlanFile) {
    println!("taskchain dry-run");
    println!("  config.stop_on_failure = {}", plan.config.stop_on_failure);
    println!("  config.shell = {}", plan.config.effective_shell());
    println!();

    let waves = plan.waves();
    println!("waves ({}):", waves.len());
    for (idx, wave) in waves.iter().enumerate() {
        println!("  {}. {}", idx + 1, wave.join(" | "));
        for name in wave {
            if let Some(step) = plan.step.iter().find(|s| s.name == *name) {
                println!("      {name}: {}", step.cmd);
                if let Some(ms) = step.timeout_ms {
                    println!("      timeout_ms: {ms}");
                }
            }
        }
    }

    debug!("dry-run complete (no execution)");
}

fn print_summary(summary: &RunSummary) {
    println!("taskchain summary:");
    for report in &summary.steps {
        println!("  {:<24} {}", report.name, report.outcome);
    }
}
