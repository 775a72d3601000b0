//! Language-specific compilation settings and compiler log formatting

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ToolchainConfig;
use crate::constants::{BINARY_NAME, FRIENDLY_MESSAGE_MAX_LINES, languages};
use crate::error::JudgeError;

/// Supported submission languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
}

impl Language {
    /// Language tag as stored by callers
    pub fn tag(&self) -> &'static str {
        match self {
            Language::C => languages::C,
            Language::Cpp => languages::CPP,
        }
    }

    /// Get the source file name
    pub fn source_file(&self) -> &'static str {
        match self {
            Language::C => "main.c",
            Language::Cpp => "main.cpp",
        }
    }

    /// Full compiler invocation, run inside the workspace directory
    pub fn compile_command(&self, toolchain: &ToolchainConfig) -> Vec<String> {
        let mut command = match self {
            Language::C => vec![
                toolchain.c_compiler.clone(),
                "-O2".to_string(),
                "-std=c11".to_string(),
            ],
            Language::Cpp => vec![
                toolchain.cxx_compiler.clone(),
                "-O2".to_string(),
                "-std=c++17".to_string(),
            ],
        };
        command.extend([
            "-o".to_string(),
            BINARY_NAME.to_string(),
            self.source_file().to_string(),
        ]);
        if *self == Language::C {
            command.push("-lm".to_string());
        }
        command
    }
}

impl FromStr for Language {
    type Err = JudgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            languages::C => Ok(Language::C),
            languages::CPP | "c++" | "cxx" => Ok(Language::Cpp),
            other => Err(JudgeError::InvalidInput(format!(
                "Unsupported language: {} (expected one of {})",
                other,
                languages::ALL.join(", ")
            ))),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Remove the judging host's workspace path from compiler diagnostics.
pub fn sanitize_compile_log(log: &str, workspace: &Path) -> String {
    let mut clean = log.to_string();

    // Canonical and as-given spellings can differ (e.g. /tmp vs /private/tmp).
    let mut prefixes = vec![workspace.to_string_lossy().into_owned()];
    if let Ok(canonical) = workspace.canonicalize() {
        prefixes.push(canonical.to_string_lossy().into_owned());
    }
    prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));

    for prefix in prefixes.iter().filter(|p| !p.is_empty()) {
        for separator in ['/', '\\'] {
            clean = clean.replace(&format!("{prefix}{separator}"), "");
        }
        clean = clean.replace(prefix.as_str(), ".");
    }
    clean
}

/// Short, display-friendly summary of a compiler log.
///
/// Keeps the first few `error:` lines; falls back to the first non-empty
/// line when the compiler did not emit any.
pub fn friendly_compile_message(log: &str) -> String {
    let errors: Vec<&str> = log
        .lines()
        .map(str::trim_end)
        .filter(|line| line.contains("error:"))
        .take(FRIENDLY_MESSAGE_MAX_LINES)
        .collect();

    if !errors.is_empty() {
        return errors.join("\n");
    }

    log.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("Compilation failed")
        .to_string()
}
