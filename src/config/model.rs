// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::types::SubmitMode;

/// Plan file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// stop_on_failure = true
/// shell = "sh"
///
/// [[step]]
/// name = "build"
/// cmd = "cargo build"
///
/// [[step]]
/// name = "lint"
/// cmd = "cargo clippy"
/// mode = "concurrent"
///
/// [[step]]
/// name = "test"
/// cmd = "cargo test"
/// mode = "concurrent"
/// timeout_ms = 60000
/// ```
///
/// Steps are submitted in file order. Consecutive concurrent steps form one
/// wave; every sequential step waits for everything before it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    /// Global behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All steps from `[[step]]`, in submission order.
    #[serde(default)]
    pub step: Vec<StepConfig>,
}

/// A validated plan. Only constructed through `TryFrom<RawPlanFile>`.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub config: ConfigSection,
    pub step: Vec<StepConfig>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(config: ConfigSection, step: Vec<StepConfig>) -> Self {
        Self { config, step }
    }

    /// Group step names into the waves the chain will run them in.
    ///
    /// Each sequential step is a wave of its own; back-to-back concurrent
    /// steps share one wave.
    pub fn waves(&self) -> Vec<Vec<&str>> {
        let mut waves: Vec<Vec<&str>> = Vec::new();
        let mut open_cohort = false;

        for step in &self.step {
            match step.mode {
                SubmitMode::Sequential => {
                    waves.push(vec![step.name.as_str()]);
                    open_cohort = false;
                }
                SubmitMode::Concurrent => {
                    match waves.last_mut() {
                        Some(wave) if open_cohort => wave.push(step.name.as_str()),
                        _ => waves.push(vec![step.name.as_str()]),
                    }
                    open_cohort = true;
                }
            }
        }

        waves
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Cancel all not-yet-started steps once any step fails.
    #[serde(default = "default_stop_on_failure")]
    pub stop_on_failure: bool,

    /// Shell used to run step commands. Defaults to `sh` (`cmd` on Windows).
    #[serde(default)]
    pub shell: Option<String>,
}

fn default_stop_on_failure() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            stop_on_failure: default_stop_on_failure(),
            shell: None,
        }
    }
}

impl ConfigSection {
    pub fn effective_shell(&self) -> &str {
        match self.shell.as_deref() {
            Some(shell) => shell,
            None if cfg!(windows) => "cmd",
            None => "sh",
        }
    }
}

/// `[[step]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// Unique step name, used in logs and the summary.
    pub name: String,

    /// The command to execute through the shell.
    pub cmd: String,

    /// `"sequential"` (default) or `"concurrent"`.
    #[serde(default)]
    pub mode: SubmitMode,

    /// Kill the command if it runs longer than this.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl StepConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str, mode: SubmitMode) -> StepConfig {
        StepConfig {
            name: name.to_string(),
            cmd: format!("echo {name}"),
            mode,
            timeout_ms: None,
        }
    }

    #[test]
    fn waves_group_consecutive_concurrent_steps() {
        use SubmitMode::*;
        let plan = PlanFile::new_unchecked(
            ConfigSection::default(),
            vec![
                step("a", Sequential),
                step("b", Concurrent),
                step("c", Concurrent),
                step("d", Sequential),
                step("e", Concurrent),
            ],
        );

        assert_eq!(
            plan.waves(),
            vec![vec!["a"], vec!["b", "c"], vec!["d"], vec!["e"]]
        );
    }

    #[test]
    fn leading_concurrent_steps_share_a_wave() {
        use SubmitMode::*;
        let plan = PlanFile::new_unchecked(
            ConfigSection::default(),
            vec![step("x", Concurrent), step("y", Concurrent)],
        );
        assert_eq!(plan.waves(), vec![vec!["x", "y"]]);
    }

    #[test]
    fn defaults_when_sections_missing() {
        let raw: RawPlanFile = toml::from_str(
            r#"
            [[step]]
            name = "only"
            cmd = "true"
            "#,
        )
        .unwrap();

        assert!(raw.config.stop_on_failure);
        assert_eq!(raw.step[0].mode, SubmitMode::Sequential);
        assert_eq!(raw.step[0].timeout(), None);
    }
}
