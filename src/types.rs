use std::str::FromStr;
use serde::Deserialize;

/// Ordering discipline of a submission.
///
/// - `Sequential`: run only after everything submitted so far has finished
///   (default).
/// - `Concurrent`: run together with the other concurrent submissions of the
///   same wave, once the preceding sequential point has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    Sequential,
    Concurrent,
}

impl Default for SubmitMode {
    fn default() -> Self {
        SubmitMode::Sequential
    }
}

impl FromStr for SubmitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" | "seq" => Ok(SubmitMode::Sequential),
            "concurrent" | "conc" => Ok(SubmitMode::Concurrent),
            other => Err(format!(
                "invalid mode: {other} (expected \"sequential\" or \"concurrent\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes_case_insensitively() {
        assert_eq!("Sequential".parse(), Ok(SubmitMode::Sequential));
        assert_eq!(" conc ".parse(), Ok(SubmitMode::Concurrent));
        assert!("parallel".parse::<SubmitMode>().is_err());
    }
}
