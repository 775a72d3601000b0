//! Validation of untrusted relative paths such as archive entry names.
//!
//! Names are checked as text, with both `/` and `\` treated as separators, so
//! the result does not depend on the platform the judge runs on.

use std::path::PathBuf;

/// Why an entry name was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnsafePath {
    #[error("empty entry name")]
    Empty,
    #[error("entry name {0:?} contains a NUL byte")]
    Nul(String),
    #[error("entry name {0:?} is an absolute path")]
    Absolute(String),
    #[error("entry name {0:?} has a drive-letter prefix")]
    DriveLetter(String),
    #[error("entry name {0:?} navigates into a parent directory")]
    ParentTraversal(String),
}

/// Checks that `name` is a relative path that stays inside its root.
///
/// Returns the sanitized relative path (empty and `.` segments dropped) on
/// success. Any `..` segment is refused, even one that would stay inside the
/// root after resolution.
pub fn enforce_child_path(name: &str) -> Result<PathBuf, UnsafePath> {
    if name.is_empty() {
        return Err(UnsafePath::Empty);
    }
    if name.contains('\0') {
        return Err(UnsafePath::Nul(name.to_string()));
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(UnsafePath::Absolute(name.to_string()));
    }
    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(UnsafePath::DriveLetter(name.to_string()));
    }

    let mut clean = PathBuf::new();
    for part in name.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => return Err(UnsafePath::ParentTraversal(name.to_string())),
            normal => clean.push(normal),
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(UnsafePath::Empty);
    }
    Ok(clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enforce_child_path() {
        assert_eq!(
            enforce_child_path("inputs/1.in").unwrap(),
            PathBuf::from("inputs").join("1.in")
        );
        enforce_child_path("./1.in").unwrap();
        enforce_child_path("outputs/").unwrap();
        enforce_child_path("a\\b.txt").unwrap();
    }

    #[test]
    fn test_enforce_child_path_fail() {
        assert!(matches!(
            enforce_child_path("../../evil.txt"),
            Err(UnsafePath::ParentTraversal(_))
        ));
        assert!(matches!(
            enforce_child_path("inputs/../../evil.txt"),
            Err(UnsafePath::ParentTraversal(_))
        ));
        assert!(matches!(
            enforce_child_path("inputs\\..\\..\\evil.txt"),
            Err(UnsafePath::ParentTraversal(_))
        ));
        assert!(matches!(
            enforce_child_path("inputs/../1.in"),
            Err(UnsafePath::ParentTraversal(_))
        ));
        assert!(matches!(
            enforce_child_path("/etc/passwd"),
            Err(UnsafePath::Absolute(_))
        ));
        assert!(matches!(
            enforce_child_path("\\windows\\evil"),
            Err(UnsafePath::Absolute(_))
        ));
        assert!(matches!(
            enforce_child_path("C:evil.txt"),
            Err(UnsafePath::DriveLetter(_))
        ));
        assert!(matches!(
            enforce_child_path("c:\\evil.txt"),
            Err(UnsafePath::DriveLetter(_))
        ));
        assert_eq!(enforce_child_path(""), Err(UnsafePath::Empty));
        assert_eq!(enforce_child_path("./"), Err(UnsafePath::Empty));
        assert!(matches!(
            enforce_child_path("a\0b"),
            Err(UnsafePath::Nul(_))
        ));
    }
}
