//! Course Judge - compile, run and compare C/C++ submissions
//!
//! This library provides the judging core of a course portal: it compiles a
//! student's C or C++ source, runs the binary against a directory of test
//! cases under time and output limits, and reduces the run to a verdict.
//!
//! # Features
//!
//! - C (`-std=c11`) and C++ (`-std=c++17`) via the host's gcc/g++
//! - Per-case wall-clock limit, per-submission time budget, stdout cap
//! - Process-tree termination on timeout (process groups / `taskkill`)
//! - Two case directory conventions, natural case ordering
//! - Zip-slip-safe import of uploaded case archives
//!
//! # Architecture
//!
//! - **judge**: engine, process runner, languages, normalizer, verdicts
//! - **testcase**: case discovery, loading and archive import
//! - **utils**: natural sort and path validation helpers

pub mod config;
pub mod constants;
pub mod error;
pub mod judge;
pub mod testcase;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{JudgeError, JudgeResult};
pub use judge::{Judge, JudgeLimits, JudgeOutcome, JudgeRequest, Language, Verdict};
pub use testcase::TestCase;
