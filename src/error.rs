//! Custom error types and handling
//!
//! Only infrastructure failures are errors. Anything caused by the submitted
//! code (compile errors, crashes, timeouts, wrong output) is reported as a
//! verdict on `JudgeOutcome` instead.

use thiserror::Error;

/// Engine-level error type
#[derive(Debug, Error)]
pub enum JudgeError {
    /// Filesystem failure on the judging host
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Compiler missing or not executable
    #[error("Toolchain unavailable: {0}")]
    ToolchainUnavailable(String),

    /// Per-run workspace could not be prepared
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Caller supplied something the engine cannot judge
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl JudgeError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO_ERROR",
            Self::ToolchainUnavailable(_) => "TOOLCHAIN_UNAVAILABLE",
            Self::Workspace(_) => "WORKSPACE_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
        }
    }
}

/// Result type alias using JudgeError
pub type JudgeResult<T> = Result<T, JudgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = JudgeError::ToolchainUnavailable("gcc".into());
        assert_eq!(err.error_code(), "TOOLCHAIN_UNAVAILABLE");
        assert_eq!(err.to_string(), "Toolchain unavailable: gcc");

        let err: JudgeError = std::io::Error::other("boom").into();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
