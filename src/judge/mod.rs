//! Judging pipeline
//!
//! Compile a submission, run it against each case under wall-clock and output
//! limits, normalize and compare outputs, and reduce everything to a verdict.

pub mod engine;
pub mod languages;
pub mod normalize;
pub mod process_tree;
pub mod runner;
pub mod verdict;

pub use engine::{Judge, JudgeLimits, JudgeRequest, LimitOverrides};
pub use languages::Language;
pub use runner::{KillReason, RunLimits, RunOutput};
pub use verdict::{CaseResult, FirstFailure, JudgeOutcome, ScoringPolicy, Verdict};
