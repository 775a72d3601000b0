//! Test case discovery and loading

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use tokio::fs;

use crate::error::JudgeResult;
use crate::utils::natural_cmp;

use super::TestCase;

const INPUTS_DIR: &str = "inputs";
const OUTPUTS_DIR: &str = "outputs";

/// Directory convention a case set follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseLayout {
    /// `inputs/` + `outputs/` subdirectories
    Paired,
    /// Numbered files in the base directory
    Flat,
}

/// Matched input/output file paths for one case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFiles {
    pub name: String,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Result of scanning a case directory
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// `None` when no convention yielded a single pair
    pub layout: Option<CaseLayout>,
    /// Matched pairs in judging order
    pub cases: Vec<CaseFiles>,
}

/// A flat naming scheme: how an input name maps to its output name
struct FlatPattern {
    input: Regex,
    output: fn(&Captures) -> String,
}

static FLAT_PATTERNS: LazyLock<Vec<FlatPattern>> = LazyLock::new(|| {
    vec![
        FlatPattern {
            input: Regex::new(r"^(?P<num>\d+)\.in$").expect("valid regex"),
            output: |caps| format!("{}.out", &caps["num"]),
        },
        FlatPattern {
            input: Regex::new(r"^in(?P<num>\d+)\.txt$").expect("valid regex"),
            output: |caps| format!("out{}.txt", &caps["num"]),
        },
        FlatPattern {
            input: Regex::new(r"^input(?P<sep>_?)(?P<num>\d+)\.txt$").expect("valid regex"),
            output: |caps| format!("output{}{}.txt", &caps["sep"], &caps["num"]),
        },
    ]
});

/// Load all cases under `base`, in judging order.
///
/// Returns an empty list when the directory is missing or follows no known
/// convention; callers must treat that as "cannot judge".
pub async fn load_cases(base: &Path) -> JudgeResult<Vec<TestCase>> {
    let discovery = discover(base).await?;
    let mut cases = Vec::with_capacity(discovery.cases.len());

    for files in discovery.cases {
        let input = match fs::read(&files.input).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(case = %files.name, path = ?files.input, error = %e, "Skipping unreadable case input");
                continue;
            }
        };
        let expected_output = match fs::read(&files.output).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(case = %files.name, path = ?files.output, error = %e, "Skipping unreadable case output");
                continue;
            }
        };
        cases.push(TestCase {
            name: files.name,
            input,
            expected_output,
        });
    }

    tracing::debug!(
        base = ?base,
        layout = ?discovery.layout,
        count = cases.len(),
        "Loaded test cases"
    );
    Ok(cases)
}

/// Determine which convention `base` follows, if any.
pub async fn detect_layout(base: &Path) -> io::Result<Option<CaseLayout>> {
    Ok(discover(base).await?.layout)
}

/// Scan `base` and pair up input and output files.
///
/// The paired convention wins when it yields at least one case.
pub async fn discover(base: &Path) -> io::Result<Discovery> {
    let inputs_dir = base.join(INPUTS_DIR);
    let outputs_dir = base.join(OUTPUTS_DIR);

    if is_dir(&inputs_dir).await && is_dir(&outputs_dir).await {
        let cases = pair_subdirectories(&inputs_dir, &outputs_dir).await?;
        if !cases.is_empty() {
            return Ok(Discovery {
                layout: Some(CaseLayout::Paired),
                cases,
            });
        }
    }

    let cases = pair_flat(base).await?;
    if !cases.is_empty() {
        return Ok(Discovery {
            layout: Some(CaseLayout::Flat),
            cases,
        });
    }

    Ok(Discovery::default())
}

async fn pair_subdirectories(inputs_dir: &Path, outputs_dir: &Path) -> io::Result<Vec<CaseFiles>> {
    let inputs = list_files(inputs_dir).await?;
    let outputs = list_files(outputs_dir).await?;

    let by_name: HashMap<&str, &PathBuf> =
        outputs.iter().map(|(n, p)| (n.as_str(), p)).collect();

    // Each output pairs with at most one input. Identical names claim first,
    // then the stem fallback takes the natural-order first unclaimed output.
    let mut claimed: HashSet<&str> = inputs
        .iter()
        .map(|(name, _)| name.as_str())
        .filter(|name| by_name.contains_key(name))
        .collect();

    let mut cases = Vec::new();
    for (name, input) in &inputs {
        let output = match by_name.get(name.as_str()) {
            Some(path) => Some(*path),
            None => {
                let stem = stem_of(name);
                let found = outputs
                    .iter()
                    .find(|(out, _)| stem_of(out) == stem && !claimed.contains(out.as_str()));
                if let Some((out, _)) = found {
                    claimed.insert(out.as_str());
                }
                found.map(|(_, path)| path)
            }
        };

        match output {
            Some(output) => cases.push(CaseFiles {
                name: name.clone(),
                input: input.clone(),
                output: output.clone(),
            }),
            None => tracing::warn!(input = ?input, "Input has no matching output, skipping"),
        }
    }
    Ok(cases)
}

async fn pair_flat(base: &Path) -> io::Result<Vec<CaseFiles>> {
    let files = list_files(base).await?;
    let present: HashMap<&str, &PathBuf> = files.iter().map(|(n, p)| (n.as_str(), p)).collect();

    let mut cases = Vec::new();
    for (name, input) in &files {
        let Some(output_name) = FLAT_PATTERNS
            .iter()
            .find_map(|pattern| pattern.input.captures(name).map(|caps| (pattern.output)(&caps)))
        else {
            continue;
        };
        match present.get(output_name.as_str()) {
            Some(output) => cases.push(CaseFiles {
                name: name.clone(),
                input: input.clone(),
                output: (*output).clone(),
            }),
            None => tracing::warn!(
                input = ?input,
                expected = %output_name,
                "Input has no matching output, skipping"
            ),
        }
    }
    Ok(cases)
}

/// Regular, non-hidden files in `dir`, sorted naturally by name.
/// A missing directory is treated as empty.
async fn list_files(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!(path = ?entry.path(), "Skipping non UTF-8 file name");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
            files.push((name, path));
        }
    }

    files.sort_by(|a, b| natural_cmp(&a.0, &b.0));
    Ok(files)
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

fn stem_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}
