// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::{ChainError, Result};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = crate::errors::ChainError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.config, raw.step))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_steps(plan)?;
    validate_global_config(plan)?;
    validate_steps(plan)?;
    Ok(())
}

fn ensure_has_steps(plan: &RawPlanFile) -> Result<()> {
    if plan.step.is_empty() {
        return Err(ChainError::PlanError(
            "plan must contain at least one [[step]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(plan: &RawPlanFile) -> Result<()> {
    if let Some(shell) = &plan.config.shell {
        if shell.trim().is_empty() {
            return Err(ChainError::PlanError(
                "[config].shell must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_steps(plan: &RawPlanFile) -> Result<()> {
    let mut seen = HashSet::new();

    for (idx, step) in plan.step.iter().enumerate() {
        if step.name.trim().is_empty() {
            return Err(ChainError::PlanError(format!(
                "step #{} has an empty name",
                idx + 1
            )));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(ChainError::PlanError(format!(
                "duplicate step name '{}'",
                step.name
            )));
        }
        if step.cmd.trim().is_empty() {
            return Err(ChainError::PlanError(format!(
                "step '{}' has an empty cmd",
                step.name
            )));
        }
        if step.timeout_ms == Some(0) {
            return Err(ChainError::PlanError(format!(
                "step '{}': timeout_ms must be >= 1 (got 0)",
                step.name
            )));
        }
    }

    Ok(())
}
