//! Test case management - discovery, loading and archive import
//!
//! Two directory conventions are understood:
//!
//! 1. **Paired**: `inputs/` and `outputs/` subdirectories, matched by file name
//!    (falling back to the same stem with a different extension).
//! 2. **Flat**: numbered files side by side: `N.in`/`N.out`,
//!    `inN.txt`/`outN.txt` or `input_NNN.txt`/`output_NNN.txt`.

pub mod archive;
pub mod loader;

pub use archive::{ArchiveImport, ArchiveImporter, ImportError};
pub use loader::{CaseFiles, CaseLayout, Discovery, detect_layout, discover, load_cases};

/// Test case input/expected-output pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Display name, derived from the input file name
    pub name: String,
    pub input: Vec<u8>,
    pub expected_output: Vec<u8>,
}

impl TestCase {
    pub fn new(
        name: impl Into<String>,
        input: impl Into<Vec<u8>>,
        expected_output: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}
