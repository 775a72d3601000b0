//! Command line options

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "course-judge", version, about = "Compile, run and judge C/C++ submissions")]
pub struct Opts {
    #[command(subcommand)]
    pub cmd: SubCmd,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCmd {
    /// Judge a source file against a case directory
    Judge(JudgeSubCmd),

    /// Extract an uploaded case archive into a case directory
    Import(ImportSubCmd),

    /// List the cases found in a directory
    Cases(CasesSubCmd),
}

#[derive(Args, Debug, Clone)]
pub struct JudgeSubCmd {
    /// Source file to judge
    #[arg(long)]
    pub source: PathBuf,

    /// Submission language (c or cpp)
    #[arg(long)]
    pub language: String,

    /// Directory containing the test cases
    #[arg(long)]
    pub cases: PathBuf,

    /// Per-case wall-clock limit
    #[arg(long)]
    pub time_limit_ms: Option<u64>,

    /// Compile timeout (defaults to 4x the time limit)
    #[arg(long)]
    pub compile_timeout_ms: Option<u64>,

    /// Time budget across all cases
    #[arg(long)]
    pub total_limit_ms: Option<u64>,

    /// Stdout cap per run
    #[arg(long)]
    pub output_cap_kb: Option<u64>,

    /// Total marks; adds a `score` field to the output
    #[arg(long)]
    pub marks: Option<u32>,

    /// Award proportional credit for non-accepted runs
    #[arg(long, requires = "marks")]
    pub partial: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ImportSubCmd {
    /// Zip archive to import
    #[arg(long)]
    pub archive: PathBuf,

    /// Case directory to (re)create
    #[arg(long)]
    pub dest: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CasesSubCmd {
    /// Case directory
    pub dir: PathBuf,
}
