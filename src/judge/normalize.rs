//! Output normalization used for verdict comparison.
//!
//! Two outputs are equal for judging purposes iff their normalized forms are
//! byte-identical. Nothing beyond the rules below is forgiven: internal blank
//! lines, leading spaces and letter case all still count.

/// Canonicalize program output.
///
/// - `\r\n` becomes `\n`
/// - trailing whitespace is trimmed from every line
/// - blank lines at the start and end of the text are dropped
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n");
    let lines: Vec<&str> = unified.split('\n').map(str::trim_end).collect();

    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());

    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].join("\n"),
        _ => String::new(),
    }
}

/// Normalize raw bytes, replacing invalid UTF-8 sequences.
pub fn normalize_bytes(bytes: &[u8]) -> String {
    normalize(&String::from_utf8_lossy(bytes))
}

/// Normalized outputs that failed to match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: String,
    pub got: String,
}

/// Compare program output with the expected bytes after normalization.
pub fn compare_outputs(actual: &str, expected: &[u8]) -> Result<(), Mismatch> {
    let got = normalize(actual);
    let expected = normalize_bytes(expected);
    if got == expected {
        Ok(())
    } else {
        Err(Mismatch { expected, got })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_trailing_space_and_blank_lines_collapse() {
        assert_eq!(normalize("a \r\nb\r\n\r\n"), normalize("a\nb"));
        assert_eq!(normalize("a \r\nb\r\n\r\n"), "a\nb");
    }

    #[test]
    fn test_internal_blank_lines_preserved() {
        assert_eq!(normalize("a\n\nb\n"), "a\n\nb");
        assert_ne!(normalize("a\n\nb"), normalize("a\nb"));
    }

    #[test]
    fn test_leading_blank_lines_dropped_but_indentation_kept() {
        assert_eq!(normalize("\n\n  x\n"), "  x");
        assert_ne!(normalize("  x"), normalize("x"));
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \r\n\t\n"), "");
    }

    #[test]
    fn test_exact_comparison() {
        assert!(compare_outputs("5\n", b"5").is_ok());
        assert!(compare_outputs("3  \r\n", b"3\n").is_ok());
        assert!(compare_outputs("1 2", b"1  2").is_err());

        let mismatch = compare_outputs("Hello\n", b"World\r\n").unwrap_err();
        assert_eq!(mismatch.expected, "World");
        assert_eq!(mismatch.got, "Hello");
    }

    #[test]
    fn test_normalize_bytes_lossy() {
        assert_eq!(normalize_bytes(b"ok\r\n"), "ok");
        assert_eq!(normalize_bytes(&[0x66, 0xff, 0x0a]), "f\u{fffd}");
    }
}
