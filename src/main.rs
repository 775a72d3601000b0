//! Course Judge - Command Line Entry Point
//!
//! Judges a single submission, imports a case archive or lists a case set.
//! Verdicts are printed as JSON; the exit status is non-zero only when the
//! judge itself failed.

mod cli;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_judge::{
    Config, Judge, JudgeRequest,
    judge::{LimitOverrides, ScoringPolicy},
    testcase::{ArchiveImporter, detect_layout, load_cases},
};

use cli::{CasesSubCmd, ImportSubCmd, JudgeSubCmd, Opts, SubCmd};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.rust_log.clone().into());
    let registry = tracing_subscriber::registry().with(filter);
    if opts.global.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match opts.cmd {
        SubCmd::Judge(cmd) => judge(&config, cmd).await,
        SubCmd::Import(cmd) => import(&config, cmd).await,
        SubCmd::Cases(cmd) => cases(cmd).await,
    }
}

async fn judge(config: &Config, cmd: JudgeSubCmd) -> anyhow::Result<()> {
    let source_code = tokio::fs::read_to_string(&cmd.source)
        .await
        .with_context(|| format!("Failed to read source file {}", cmd.source.display()))?;

    let request = JudgeRequest {
        source_code,
        language: cmd.language.parse()?,
        case_source_dir: cmd.cases,
        overrides: LimitOverrides {
            time_limit_ms: cmd.time_limit_ms,
            compile_timeout_ms: cmd.compile_timeout_ms,
            total_limit_ms: cmd.total_limit_ms,
            output_cap_kb: cmd.output_cap_kb,
        },
    };

    let judge = Judge::new(config);
    let outcome = judge.judge_request(&request).await?;

    let mut report = serde_json::to_value(&outcome)?;
    if let Some(marks) = cmd.marks {
        let policy = if cmd.partial {
            ScoringPolicy::Proportional
        } else {
            ScoringPolicy::AllOrNothing
        };
        report["score"] = json!(outcome.score(marks, policy));
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn import(config: &Config, cmd: ImportSubCmd) -> anyhow::Result<()> {
    let importer = ArchiveImporter::from_config(&config.storage);
    let summary = importer
        .extract(&cmd.archive, &cmd.dest)
        .await
        .with_context(|| format!("Failed to import {}", cmd.archive.display()))?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn cases(cmd: CasesSubCmd) -> anyhow::Result<()> {
    let layout = detect_layout(&cmd.dir)
        .await
        .with_context(|| format!("Failed to scan {}", cmd.dir.display()))?;
    let cases = load_cases(&cmd.dir)
        .await
        .with_context(|| format!("Failed to load cases from {}", cmd.dir.display()))?;

    let listing: Vec<_> = cases
        .iter()
        .enumerate()
        .map(|(i, case)| {
            json!({
                "index": i + 1,
                "name": case.name,
                "input_bytes": case.input.len(),
                "output_bytes": case.expected_output.len(),
            })
        })
        .collect();

    let report = json!({ "layout": layout, "cases": listing });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
