//! Judge engine - compile once, run every case in order, stop at the first failure
//!
//! The engine holds configuration only. Every call gets its own uniquely named
//! workspace, so concurrent calls never share mutable state.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{Config, ExecutionConfig, ToolchainConfig};
use crate::constants::{
    BINARY_NAME, COMPILE_LOG_CAP_BYTES, COMPILE_TIMEOUT_FACTOR, WORKSPACE_PREFIX, messages,
};
use crate::error::{JudgeError, JudgeResult};
use crate::testcase::{TestCase, load_cases};

use super::languages::{Language, friendly_compile_message, sanitize_compile_log};
use super::normalize::{Mismatch, compare_outputs};
use super::runner::{self, KillReason, RunLimits, RunOutput};
use super::verdict::{CaseResult, FirstFailure, JudgeOutcome, Verdict};

/// Limits for one judge call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JudgeLimits {
    pub time_limit_ms: u64,
    pub compile_timeout_ms: u64,
    pub total_limit_ms: u64,
    pub output_cap_kb: u64,
}

/// Per-call replacements for configured limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOverrides {
    pub time_limit_ms: Option<u64>,
    pub compile_timeout_ms: Option<u64>,
    pub total_limit_ms: Option<u64>,
    pub output_cap_kb: Option<u64>,
}

impl JudgeLimits {
    pub fn from_config(execution: &ExecutionConfig) -> Self {
        Self {
            time_limit_ms: execution.time_limit_ms,
            compile_timeout_ms: execution.effective_compile_timeout_ms(),
            total_limit_ms: execution.total_limit_ms,
            output_cap_kb: execution.output_cap_kb,
        }
    }

    /// Apply overrides. A new time limit drags the compile timeout along
    /// unless that is overridden too.
    pub fn with_overrides(&self, overrides: &LimitOverrides) -> Self {
        let time_limit_ms = overrides.time_limit_ms.unwrap_or(self.time_limit_ms);
        let compile_timeout_ms = match (overrides.compile_timeout_ms, overrides.time_limit_ms) {
            (Some(compile), _) => compile,
            (None, Some(time)) => time.saturating_mul(COMPILE_TIMEOUT_FACTOR),
            (None, None) => self.compile_timeout_ms,
        };

        Self {
            time_limit_ms,
            compile_timeout_ms,
            total_limit_ms: overrides.total_limit_ms.unwrap_or(self.total_limit_ms),
            output_cap_kb: overrides.output_cap_kb.unwrap_or(self.output_cap_kb),
        }
    }

    fn run_limits(&self) -> RunLimits {
        RunLimits::new(self.time_limit_ms, self.output_cap_kb)
    }

    fn compile_limits(&self) -> RunLimits {
        RunLimits {
            timeout: Duration::from_millis(self.compile_timeout_ms),
            output_cap_bytes: COMPILE_LOG_CAP_BYTES,
        }
    }
}

impl Default for JudgeLimits {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}

/// A complete judging request as received from a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub source_code: String,
    pub language: Language,
    /// Directory holding the case set, in either supported layout
    pub case_source_dir: PathBuf,
    #[serde(default)]
    pub overrides: LimitOverrides,
}

/// Stateless judging service
#[derive(Debug, Clone)]
pub struct Judge {
    toolchain: ToolchainConfig,
    workspace_root: PathBuf,
    default_limits: JudgeLimits,
}

impl Judge {
    pub fn new(config: &Config) -> Self {
        Self {
            toolchain: config.toolchain.clone(),
            workspace_root: config.storage.workspace_root.clone(),
            default_limits: JudgeLimits::from_config(&config.execution),
        }
    }

    /// Limits used when a request carries no overrides
    pub fn default_limits(&self) -> JudgeLimits {
        self.default_limits
    }

    /// Load the request's cases and judge its source against them.
    pub async fn judge_request(&self, request: &JudgeRequest) -> JudgeResult<JudgeOutcome> {
        let limits = self.default_limits.with_overrides(&request.overrides);
        let cases = load_cases(&request.case_source_dir).await?;
        self.judge(&request.source_code, request.language, &cases, &limits)
            .await
    }

    /// Judge `source` against `cases`.
    ///
    /// Every user-caused condition (CE, RE, TLE, WA) is an `Ok` outcome; only
    /// infrastructure failures are returned as errors.
    pub async fn judge(
        &self,
        source: &str,
        language: Language,
        cases: &[TestCase],
        limits: &JudgeLimits,
    ) -> JudgeResult<JudgeOutcome> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("judge", %run_id, %language);

        async move {
            let started = Instant::now();
            let outcome = self.judge_inner(source, language, cases, limits, started).await?;

            tracing::info!(
                verdict = %outcome.verdict,
                passed = outcome.passed_cases(),
                total = outcome.total_cases,
                elapsed_ms = outcome.total_elapsed_ms,
                "Judging finished"
            );
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    async fn judge_inner(
        &self,
        source: &str,
        language: Language,
        cases: &[TestCase],
        limits: &JudgeLimits,
        started: Instant,
    ) -> JudgeResult<JudgeOutcome> {
        if cases.is_empty() {
            tracing::warn!("No test cases supplied, refusing to judge");
            return Ok(OutcomeBuilder::new(0, started).compile_error(messages::NO_TESTCASES, None));
        }

        let workspace = self.create_workspace().await?;
        let outcome = self
            .judge_in_workspace(workspace.path(), source, language, cases, limits, started)
            .await;

        if let Err(e) = workspace.close() {
            tracing::warn!(error = %e, "Failed to remove judge workspace");
        }
        outcome
    }

    async fn create_workspace(&self) -> JudgeResult<tempfile::TempDir> {
        tokio::fs::create_dir_all(&self.workspace_root)
            .await
            .map_err(|e| {
                JudgeError::Workspace(format!(
                    "cannot create workspace root {}: {}",
                    self.workspace_root.display(),
                    e
                ))
            })?;

        tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(&self.workspace_root)
            .map_err(|e| JudgeError::Workspace(format!("cannot create run workspace: {e}")))
    }

    async fn judge_in_workspace(
        &self,
        workspace: &Path,
        source: &str,
        language: Language,
        cases: &[TestCase],
        limits: &JudgeLimits,
        started: Instant,
    ) -> JudgeResult<JudgeOutcome> {
        let builder = OutcomeBuilder::new(cases.len(), started);

        let binary = match self.compile(workspace, source, language, limits).await? {
            Ok(binary) => binary,
            Err((message, log)) => return Ok(builder.compile_error(&message, log)),
        };

        Ok(run_cases(&binary, workspace, cases, limits, builder).await)
    }

    /// Compile into `workspace`. The inner `Err` is a compile error
    /// (friendly message, sanitized log) rather than an infrastructure failure.
    async fn compile(
        &self,
        workspace: &Path,
        source: &str,
        language: Language,
        limits: &JudgeLimits,
    ) -> JudgeResult<Result<PathBuf, (String, Option<String>)>> {
        tokio::fs::write(workspace.join(language.source_file()), source).await?;

        let command = language.compile_command(&self.toolchain);
        tracing::debug!(command = ?command, "Compiling");
        let output = runner::run(&command, workspace, &[], &limits.compile_limits()).await;

        if !output.started {
            return Err(JudgeError::ToolchainUnavailable(output.stderr));
        }

        let log = sanitize_compile_log(&combined_log(&output), workspace);

        if output.timed_out {
            let message = match output.kill_reason {
                Some(KillReason::OutputLimit) => messages::OUTPUT_LIMIT_EXCEEDED,
                _ => messages::COMPILE_TIMED_OUT,
            };
            tracing::info!(elapsed_ms = output.elapsed_ms(), "Compilation killed: {}", message);
            return Ok(Err((message.to_string(), Some(log))));
        }

        if output.exit_code != 0 {
            tracing::info!(exit_code = output.exit_code, "Compilation failed");
            return Ok(Err((friendly_compile_message(&log), Some(log))));
        }

        let binary = binary_path(workspace);
        if !tokio::fs::try_exists(&binary).await.unwrap_or(false) {
            return Ok(Err((messages::NO_BINARY.to_string(), Some(log))));
        }

        tracing::debug!(elapsed_ms = output.elapsed_ms(), "Compiled");
        Ok(Ok(binary))
    }
}

async fn run_cases(
    binary: &Path,
    workspace: &Path,
    cases: &[TestCase],
    limits: &JudgeLimits,
    mut builder: OutcomeBuilder,
) -> JudgeOutcome {
    let run_limits = limits.run_limits();
    let budget = Duration::from_millis(limits.total_limit_ms);
    let budget_start = Instant::now();
    let command = [binary.as_os_str()];

    for (index, case) in cases.iter().enumerate() {
        let case_index = index + 1;

        if budget_start.elapsed() >= budget {
            tracing::info!(case = case_index, "Total time budget exhausted");
            return builder.fail(
                Verdict::TimeLimitExceeded,
                format!("Total time limit exceeded before test {case_index}"),
                FirstFailure {
                    case_index,
                    case_name: Some(case.name.clone()),
                    stderr: Some(messages::TOTAL_TIME_EXCEEDED.to_string()),
                    ..Default::default()
                },
            );
        }

        let output = runner::run(&command, workspace, &case.input, &run_limits).await;
        tracing::debug!(
            case = case_index,
            elapsed_ms = output.elapsed_ms(),
            exit_code = output.exit_code,
            timed_out = output.timed_out,
            "Case finished"
        );

        let failure = FirstFailure {
            case_index,
            case_name: Some(case.name.clone()),
            ..Default::default()
        };

        if output.timed_out {
            let (label, stderr) = match output.kill_reason {
                Some(KillReason::OutputLimit) => {
                    ("Output limit exceeded", messages::OUTPUT_LIMIT_EXCEEDED)
                }
                _ => ("Time limit exceeded", messages::TIME_LIMIT_EXCEEDED),
            };
            return builder.fail(
                Verdict::TimeLimitExceeded,
                format!("{label} on test {case_index}"),
                FirstFailure {
                    stderr: Some(stderr.to_string()),
                    ..failure
                },
            );
        }

        if !output.success() {
            return builder.fail(
                Verdict::RuntimeError,
                format!("Runtime error on test {case_index}"),
                FirstFailure {
                    stderr: Some(sanitize_compile_log(&output.stderr, workspace)),
                    exit_code: Some(output.exit_code),
                    ..failure
                },
            );
        }

        if let Err(Mismatch { expected, got }) =
            compare_outputs(&output.stdout, &case.expected_output)
        {
            return builder.fail(
                Verdict::WrongAnswer,
                format!("Wrong answer on test {case_index}"),
                FirstFailure {
                    expected: Some(expected),
                    got: Some(got),
                    ..failure
                },
            );
        }

        builder.pass(case_index, &output);
    }

    builder.accepted()
}

fn combined_log(output: &RunOutput) -> String {
    match (output.stdout.is_empty(), output.stderr.is_empty()) {
        (true, _) => output.stderr.clone(),
        (false, true) => output.stdout.clone(),
        (false, false) => format!("{}\n{}", output.stdout.trim_end(), output.stderr),
    }
}

fn binary_path(workspace: &Path) -> PathBuf {
    if cfg!(windows) {
        workspace.join(format!("{BINARY_NAME}.exe"))
    } else {
        workspace.join(BINARY_NAME)
    }
}

/// Accumulates passed cases and produces the final outcome
struct OutcomeBuilder {
    total_cases: usize,
    started: Instant,
    case_results: Vec<CaseResult>,
}

impl OutcomeBuilder {
    fn new(total_cases: usize, started: Instant) -> Self {
        Self {
            total_cases,
            started,
            case_results: Vec::with_capacity(total_cases),
        }
    }

    fn pass(&mut self, case_index: usize, output: &RunOutput) {
        self.case_results.push(CaseResult {
            case_index,
            elapsed_ms: output.elapsed_ms(),
            passed: true,
        });
    }

    fn compile_error(self, message: &str, compile_log: Option<String>) -> JudgeOutcome {
        JudgeOutcome {
            verdict: Verdict::CompileError,
            message: message.to_string(),
            compile_log,
            case_results: Vec::new(),
            first_failure: None,
            total_cases: self.total_cases,
            total_elapsed_ms: elapsed_ms(self.started),
        }
    }

    fn fail(self, verdict: Verdict, message: String, failure: FirstFailure) -> JudgeOutcome {
        tracing::info!(case = failure.case_index, %verdict, "Case failed");
        JudgeOutcome {
            verdict,
            message,
            compile_log: None,
            case_results: self.case_results,
            first_failure: Some(failure),
            total_cases: self.total_cases,
            total_elapsed_ms: elapsed_ms(self.started),
        }
    }

    fn accepted(self) -> JudgeOutcome {
        JudgeOutcome {
            verdict: Verdict::Accepted,
            message: "Accepted".to_string(),
            compile_log: None,
            case_results: self.case_results,
            first_failure: None,
            total_cases: self.total_cases,
            total_elapsed_ms: elapsed_ms(self.started),
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    runner::duration_ms(since.elapsed())
}
