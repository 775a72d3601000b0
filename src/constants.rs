//! Application-wide constants
//!
//! This module contains all constant values used throughout the judge.
//! Constants are grouped by their purpose for better organization.

// =============================================================================
// EXECUTION DEFAULTS
// =============================================================================

/// Default per-case wall-clock limit in milliseconds
pub const DEFAULT_TIME_LIMIT_MS: u64 = 2_000;

/// Compile timeout as a multiple of the per-case limit
pub const COMPILE_TIMEOUT_FACTOR: u64 = 4;

/// Default budget for the whole submission in milliseconds
pub const DEFAULT_TOTAL_LIMIT_MS: u64 = 9_000;

/// Default stdout cap per run in kilobytes
pub const DEFAULT_OUTPUT_CAP_KB: u64 = 256;

/// Cap on captured compiler output in bytes
pub const COMPILE_LOG_CAP_BYTES: usize = 64 * 1024;

/// Interval between process status polls
pub const POLL_INTERVAL_MS: u64 = 20;

/// Grace period for pipe readers after the process is gone
pub const DRAIN_GRACE_MS: u64 = 200;

/// Exit code reported when the process could not be started at all
pub const SPAWN_FAILED_EXIT_CODE: i32 = i32::MIN;

// =============================================================================
// TOOLCHAIN DEFAULTS
// =============================================================================

/// Default C compiler executable
pub const DEFAULT_C_COMPILER: &str = "gcc";

/// Default C++ compiler executable
pub const DEFAULT_CXX_COMPILER: &str = "g++";

/// Name of the compiled binary inside a run workspace
pub const BINARY_NAME: &str = "main";

/// Prefix of per-run workspace directories
pub const WORKSPACE_PREFIX: &str = "judge-";

/// Maximum `error:` lines kept in a friendly compile message
pub const FRIENDLY_MESSAGE_MAX_LINES: usize = 5;

// =============================================================================
// ARCHIVE IMPORT
// =============================================================================

/// Default cap on the total uncompressed size of an uploaded archive
pub const DEFAULT_ARCHIVE_MAX_EXTRACTED_MB: u64 = 256;

// =============================================================================
// SUPPORTED LANGUAGES
// =============================================================================

/// Language identifiers
pub mod languages {
    pub const C: &str = "c";
    pub const CPP: &str = "cpp";

    /// All supported languages
    pub const ALL: &[&str] = &[C, CPP];
}

// =============================================================================
// FAILURE MESSAGES
// =============================================================================

/// Messages placed in `FirstFailure::stderr` and outcome summaries
pub mod messages {
    pub const TIME_LIMIT_EXCEEDED: &str = "time limit exceeded";
    pub const OUTPUT_LIMIT_EXCEEDED: &str = "output limit exceeded";
    pub const TOTAL_TIME_EXCEEDED: &str = "total time limit exceeded";
    pub const COMPILE_TIMED_OUT: &str = "compilation timed out";
    pub const NO_BINARY: &str = "compiler produced no executable";
    pub const NO_TESTCASES: &str = "no testcases";
}
