//! Application configuration management
//!
//! Configuration is read from environment variables (optionally seeded from a
//! `.env` file). Every value has a default, so an empty environment yields a
//! usable judge.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{
    COMPILE_TIMEOUT_FACTOR, DEFAULT_ARCHIVE_MAX_EXTRACTED_MB, DEFAULT_C_COMPILER,
    DEFAULT_CXX_COMPILER, DEFAULT_OUTPUT_CAP_KB, DEFAULT_TIME_LIMIT_MS, DEFAULT_TOTAL_LIMIT_MS,
};

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub rust_log: String,
    pub execution: ExecutionConfig,
    pub toolchain: ToolchainConfig,
    pub storage: StorageConfig,
}

/// Execution limits configuration
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Per-case wall-clock limit in milliseconds
    pub time_limit_ms: u64,
    /// Compile timeout in milliseconds (derived from the time limit when unset)
    pub compile_timeout_ms: Option<u64>,
    /// Budget for all cases of one submission in milliseconds
    pub total_limit_ms: u64,
    /// Stdout cap per run in kilobytes
    pub output_cap_kb: u64,
}

/// Compiler executables
#[derive(Debug, Clone)]
pub struct ToolchainConfig {
    pub c_compiler: String,
    pub cxx_compiler: String,
}

/// File storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Parent directory for per-run workspaces
    pub workspace_root: PathBuf,
    /// Cap on the uncompressed size of an imported archive
    pub archive_max_extracted_bytes: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "course_judge=info".to_string()),
            execution: ExecutionConfig::from_lookup(&lookup)?,
            toolchain: ToolchainConfig::from_lookup(&lookup),
            storage: StorageConfig::from_lookup(&lookup)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rust_log: "course_judge=info".to_string(),
            execution: ExecutionConfig::default(),
            toolchain: ToolchainConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl ExecutionConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            time_limit_ms: parse_var(lookup, "JUDGE_TIME_LIMIT_MS", DEFAULT_TIME_LIMIT_MS)?,
            compile_timeout_ms: parse_optional_var(lookup, "JUDGE_COMPILE_TIMEOUT_MS")?,
            total_limit_ms: parse_var(lookup, "JUDGE_TOTAL_LIMIT_MS", DEFAULT_TOTAL_LIMIT_MS)?,
            output_cap_kb: parse_var(lookup, "JUDGE_OUTPUT_CAP_KB", DEFAULT_OUTPUT_CAP_KB)?,
        })
    }

    /// Compile timeout, falling back to a multiple of the per-case limit
    pub fn effective_compile_timeout_ms(&self) -> u64 {
        self.compile_timeout_ms
            .unwrap_or(self.time_limit_ms.saturating_mul(COMPILE_TIMEOUT_FACTOR))
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: DEFAULT_TIME_LIMIT_MS,
            compile_timeout_ms: None,
            total_limit_ms: DEFAULT_TOTAL_LIMIT_MS,
            output_cap_kb: DEFAULT_OUTPUT_CAP_KB,
        }
    }
}

impl ToolchainConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            c_compiler: lookup("JUDGE_CC").unwrap_or_else(|| DEFAULT_C_COMPILER.to_string()),
            cxx_compiler: lookup("JUDGE_CXX").unwrap_or_else(|| DEFAULT_CXX_COMPILER.to_string()),
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            c_compiler: DEFAULT_C_COMPILER.to_string(),
            cxx_compiler: DEFAULT_CXX_COMPILER.to_string(),
        }
    }
}

impl StorageConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let max_mb = parse_var(
            lookup,
            "ARCHIVE_MAX_EXTRACTED_MB",
            DEFAULT_ARCHIVE_MAX_EXTRACTED_MB,
        )?;
        Ok(Self {
            workspace_root: lookup("JUDGE_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            archive_max_extracted_bytes: max_mb.saturating_mul(1024 * 1024),
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            workspace_root: env::temp_dir(),
            archive_max_extracted_bytes: DEFAULT_ARCHIVE_MAX_EXTRACTED_MB * 1024 * 1024,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn parse_optional_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, ConfigError> {
    lookup(name)
        .map(|raw| parse_value(name, &raw))
        .transpose()
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.execution.time_limit_ms, 2000);
        assert_eq!(config.execution.total_limit_ms, 9000);
        assert_eq!(config.execution.output_cap_kb, 256);
        assert_eq!(config.toolchain.c_compiler, "gcc");
        assert_eq!(config.toolchain.cxx_compiler, "g++");
    }

    #[test]
    fn test_compile_timeout_follows_time_limit() {
        let mut execution = ExecutionConfig::default();
        assert_eq!(execution.effective_compile_timeout_ms(), 8000);

        execution.time_limit_ms = 1000;
        assert_eq!(execution.effective_compile_timeout_ms(), 4000);

        execution.compile_timeout_ms = Some(15000);
        assert_eq!(execution.effective_compile_timeout_ms(), 15000);
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: std::collections::HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_reads_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("JUDGE_TIME_LIMIT_MS", "1500"),
            ("JUDGE_CXX", "clang++"),
            ("JUDGE_WORKSPACE_ROOT", "/srv/judge"),
            ("ARCHIVE_MAX_EXTRACTED_MB", "2"),
        ]))
        .unwrap();
        assert_eq!(config.execution.time_limit_ms, 1500);
        assert_eq!(config.execution.effective_compile_timeout_ms(), 6000);
        assert_eq!(config.toolchain.c_compiler, "gcc");
        assert_eq!(config.toolchain.cxx_compiler, "clang++");
        assert_eq!(config.storage.workspace_root, PathBuf::from("/srv/judge"));
        assert_eq!(config.storage.archive_max_extracted_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_from_lookup_rejects_bad_value() {
        let err = Config::from_lookup(lookup_from(&[("JUDGE_OUTPUT_CAP_KB", "lots")]))
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue(ref name) if name == "JUDGE_OUTPUT_CAP_KB")
        );

        let err = Config::from_lookup(lookup_from(&[("JUDGE_COMPILE_TIMEOUT_MS", "-1")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for environment variable: JUDGE_COMPILE_TIMEOUT_MS"
        );
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value::<u64>("X", " 42 ").unwrap(), 42);
        let err = parse_value::<u64>("JUDGE_TIME_LIMIT_MS", "fast").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for environment variable: JUDGE_TIME_LIMIT_MS"
        );
    }
}
