//! Self-test report produced by the verification run.

use serde::{Deserialize, Serialize};

use crate::compliance::CheckStatus;

/// Result of one self-test check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelfTestOutcome {
    /// Check passed
    Pass,
    /// Check failed
    Fail,
    /// Check passed with caveats
    #[serde(alias = "warn")]
    Warning,
    /// Check did not run
    #[serde(alias = "skip")]
    Skipped,
}

impl From<SelfTestOutcome> for CheckStatus {
    fn from(outcome: SelfTestOutcome) -> Self {
        match outcome {
            SelfTestOutcome::Pass => CheckStatus::Pass,
            SelfTestOutcome::Fail => CheckStatus::Fail,
            SelfTestOutcome::Warning => CheckStatus::Warning,
            SelfTestOutcome::Skipped => CheckStatus::Unknown,
        }
    }
}

/// One checked item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfTestCheck {
    /// Check identifier
    pub id: String,
    /// Grouping, becomes the compliance section
    #[serde(default = "default_category")]
    pub category: String,
    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,
    /// Outcome
    pub result: SelfTestOutcome,
    /// Failure reason or measured value
    #[serde(default)]
    pub detail: Option<String>,
}

fn default_category() -> String {
    "self-test".to_string()
}

/// Pass/fail report per checked item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfTestReport {
    /// When the run finished
    #[serde(default)]
    pub generated_at: Option<String>,
    /// Checks in run order
    #[serde(default)]
    pub checks: Vec<SelfTestCheck>,
}

impl SelfTestReport {
    /// Whether every check passed.
    pub fn all_passed(&self) -> bool {
        self.checks
            .iter()
            .all(|check| check.result == SelfTestOutcome::Pass)
    }
}
