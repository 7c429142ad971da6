// src/exec/command.rs

//! Single step process runner.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::StepConfig;
use crate::exec::report::StepOutcome;

/// Run a step's command to completion and classify the result.
///
/// The child is spawned with `kill_on_drop`, so when the chain aborts this
/// future (shutdown, or the step's cancel signal firing mid-flight) the
/// process is killed with it.
pub async fn run_step(step: &StepConfig, shell: &str) -> StepOutcome {
    match run_step_inner(step, shell).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(
                step = %step.name,
                error = %err,
                "step execution error"
            );
            StepOutcome::Failed(-1)
        }
    }
}

async fn run_step_inner(step: &StepConfig, shell: &str) -> Result<StepOutcome> {
    info!(step = %step.name, cmd = %step.cmd, "starting step process");

    let mut cmd = Command::new(shell);
    if cfg!(windows) && shell.eq_ignore_ascii_case("cmd") {
        cmd.arg("/C");
    } else {
        cmd.arg("-c");
    }
    cmd.arg(&step.cmd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for step '{}'", step.name))?;

    if let Some(stdout) = child.stdout.take() {
        let name = step.name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(step = %name, "stdout: {}", line);
            }
        });
    }

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let name = step.name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(step = %name, "stderr: {}", line);
            }
        });
    }

    let status = match step.timeout() {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(res) => res,
            Err(_) => {
                warn!(step = %step.name, timeout_ms = ?step.timeout_ms, "step timed out; killing process");
                if let Err(e) = child.kill().await {
                    warn!(step = %step.name, error = %e, "failed to kill timed-out process");
                }
                return Ok(StepOutcome::TimedOut);
            }
        },
        None => child.wait().await,
    }
    .with_context(|| format!("waiting for process of step '{}'", step.name))?;

    let code = status.code().unwrap_or(-1);
    info!(
        step = %step.name,
        exit_code = code,
        success = status.success(),
        "step process exited"
    );

    Ok(if status.success() {
        StepOutcome::Succeeded
    } else {
        StepOutcome::Failed(code)
    })
}
