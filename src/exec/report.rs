// src/exec/report.rs

//! Per-step outcomes and the run summary.

use std::fmt;

use crate::chain::UnitState;

/// Final outcome of one plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    /// Non-zero exit code, or `-1` when the process could not be run.
    Failed(i32),
    TimedOut,
    /// Never started, or aborted by shutdown.
    Cancelled,
    /// The step's action panicked.
    Faulted,
    /// Submitted after the chain was shut down.
    Rejected,
}

impl StepOutcome {
    /// Combine the unit's terminal state with the exit status the action
    /// reported. A reported status wins: the command ran to completion even
    /// if the unit was cancelled right afterwards.
    pub fn from_unit(state: UnitState, reported: Option<StepOutcome>) -> StepOutcome {
        if let Some(outcome) = reported {
            return outcome;
        }
        match state {
            UnitState::Completed | UnitState::Faulted => StepOutcome::Faulted,
            UnitState::Rejected => StepOutcome::Rejected,
            UnitState::Cancelled | UnitState::Pending | UnitState::Running => {
                StepOutcome::Cancelled
            }
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, StepOutcome::Succeeded)
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Succeeded => f.write_str("ok"),
            StepOutcome::Failed(code) => write!(f, "failed (exit {code})"),
            StepOutcome::TimedOut => f.write_str("timed out"),
            StepOutcome::Cancelled => f.write_str("cancelled"),
            StepOutcome::Faulted => f.write_str("faulted"),
            StepOutcome::Rejected => f.write_str("rejected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: String,
    pub outcome: StepOutcome,
}

/// Outcomes of every step, in plan order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub steps: Vec<StepReport>,
}

impl RunSummary {
    pub fn push(&mut self, name: impl Into<String>, outcome: StepOutcome) {
        self.steps.push(StepReport {
            name: name.into(),
            outcome,
        });
    }

    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.outcome.is_success())
    }

    /// Names of steps that did not succeed.
    pub fn unsuccessful(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| !s.outcome.is_success())
            .map(|s| s.name.as_str())
            .collect()
    }
}
