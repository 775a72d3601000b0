//! Verdict types and score derivation

use serde::{Deserialize, Serialize};

/// Final judgment of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Passed every case
    #[serde(rename = "AC")]
    Accepted,
    /// Output does not match expected
    #[serde(rename = "WA")]
    WrongAnswer,
    /// Compiler rejected the source, or there was nothing to judge against
    #[serde(rename = "CE")]
    CompileError,
    /// Program crashed, exited non-zero, or could not be started
    #[serde(rename = "RE")]
    RuntimeError,
    /// Per-case or total time limit (or output cap) exceeded
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
    /// Catch-all for anything else
    #[serde(rename = "ERR")]
    Error,
}

impl Verdict {
    /// Get short code for verdict
    pub fn code(&self) -> &'static str {
        match self {
            Verdict::Accepted => "AC",
            Verdict::WrongAnswer => "WA",
            Verdict::CompileError => "CE",
            Verdict::RuntimeError => "RE",
            Verdict::TimeLimitExceeded => "TLE",
            Verdict::Error => "ERR",
        }
    }

    /// Check if verdict is a failure (not accepted)
    pub fn is_failure(&self) -> bool {
        !matches!(self, Verdict::Accepted)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Result of a case that was actually executed and passed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResult {
    /// Case number (1-indexed)
    pub case_index: usize,
    pub elapsed_ms: u64,
    pub passed: bool,
}

/// Diagnostics for the case that ended judging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstFailure {
    /// Case number (1-indexed)
    pub case_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_name: Option<String>,
    /// Normalized expected output (WA only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Normalized actual output (WA only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub got: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// How marks are awarded for non-accepted submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Anything but AC scores zero
    #[default]
    AllOrNothing,
    /// Passed cases earn their share of the marks, rounded down
    Proportional,
}

/// Sole return value of the judge engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeOutcome {
    pub verdict: Verdict,
    /// Human-readable summary for the submitter
    pub message: String,
    /// Sanitized compiler output (CE from the compiler only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_log: Option<String>,
    /// One entry per case attempted and passed, in order
    pub case_results: Vec<CaseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failure: Option<FirstFailure>,
    /// Size of the full case set, attempted or not
    pub total_cases: usize,
    pub total_elapsed_ms: u64,
}

impl JudgeOutcome {
    /// Number of cases that passed
    pub fn passed_cases(&self) -> usize {
        self.case_results.iter().filter(|r| r.passed).count()
    }

    /// Score for this outcome.
    ///
    /// Accepted always earns full marks. Otherwise the policy decides:
    /// proportional scoring uses `floor(passed / total_cases * total_marks)`
    /// where `total_cases` is the whole set, not just the attempted cases.
    pub fn score(&self, total_marks: u32, policy: ScoringPolicy) -> u32 {
        let total_cases = self.total_cases;
        if !self.verdict.is_failure() {
            return total_marks;
        }
        match policy {
            ScoringPolicy::AllOrNothing => 0,
            ScoringPolicy::Proportional => {
                if total_cases == 0 {
                    return 0;
                }
                let passed = self.passed_cases().min(total_cases) as u64;
                let marks = u64::from(total_marks) * passed / total_cases as u64;
                u32::try_from(marks).unwrap_or(total_marks)
            }
        }
    }
}
