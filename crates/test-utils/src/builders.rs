#![allow(dead_code)]

use taskchain::config::{ConfigSection, PlanFile, RawPlanFile, StepConfig};
use taskchain::SubmitMode;

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanBuilder {
    plan: RawPlanFile,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                config: ConfigSection::default(),
                step: Vec::new(),
            },
        }
    }

    pub fn with_step(mut self, step: StepConfig) -> Self {
        self.plan.step.push(step);
        self
    }

    pub fn stop_on_failure(mut self, val: bool) -> Self {
        self.plan.config.stop_on_failure = val;
        self
    }

    pub fn shell(mut self, shell: &str) -> Self {
        self.plan.config.shell = Some(shell.to_string());
        self
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepConfig`.
pub struct StepBuilder {
    step: StepConfig,
}

impl StepBuilder {
    pub fn new(name: &str, cmd: &str) -> Self {
        Self {
            step: StepConfig {
                name: name.to_string(),
                cmd: cmd.to_string(),
                mode: SubmitMode::Sequential,
                timeout_ms: None,
            },
        }
    }

    pub fn concurrent(mut self) -> Self {
        self.step.mode = SubmitMode::Concurrent;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.step.timeout_ms = Some(ms);
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}
