//! Filesystem helpers for completion and path display.

use std::fs;
use std::path::{Path, MAIN_SEPARATOR};

/// Normalize directory separators to forward slashes for display and for
/// macros evaluating the `*` and `$` registers. Does not change the length
/// of the string.
pub fn normalize_path(path: &str) -> String {
    if MAIN_SEPARATOR == '/' {
        path.to_owned()
    } else {
        path.replace(MAIN_SEPARATOR, "/")
    }
}

/// Length of the directory prefix of `path`, including the trailing
/// separator. 0 when the path has no directory component.
pub fn dirname_len(path: &str) -> usize {
    path.rfind(['/', MAIN_SEPARATOR])
        .map(|i| i + 1)
        .unwrap_or(0)
}

/// Expand a leading `~/` to the home directory, if known.
pub fn expand_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        let mut out = home.to_string_lossy().into_owned();
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(rest);
        return out;
    }
    path.to_owned()
}

/// Whether a file should appear in completions when no prefix is given
/// (dot-files are hidden).
pub fn is_visible(path: &str) -> bool {
    let base = &path[dirname_len(path)..];
    !base.starts_with('.')
}

/// Glob pattern detection; patterned arguments are not auto-completed.
pub fn is_pattern(path: &str) -> bool {
    path.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
}

/// Whether `path` names a directory (used to append a separator in
/// completions).
pub fn is_dir(path: &str) -> bool {
    Path::new(path).is_dir()
}

/// Names of entries in a directory; empty directory name means `.`.
pub fn list_dir(dirname: &str) -> std::io::Result<Vec<String>> {
    let dir = if dirname.is_empty() { "." } else { dirname };
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirname_len_splits_at_last_separator() {
        assert_eq!(dirname_len("a/b/c.txt"), 4);
        assert_eq!(dirname_len("c.txt"), 0);
        assert_eq!(dirname_len("/abs"), 1);
    }

    #[test]
    fn pattern_detection() {
        assert!(is_pattern("*.rs"));
        assert!(is_pattern("a?c"));
        assert!(!is_pattern("plain.txt"));
    }

    #[test]
    fn visibility() {
        assert!(is_visible("src/main.rs"));
        assert!(!is_visible("src/.hidden"));
    }

    #[test]
    fn list_dir_reads_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x"), b"").unwrap();
        std::fs::write(dir.path().join("y"), b"").unwrap();
        let mut names = list_dir(dir.path().to_str().unwrap()).unwrap();
        names.sort();
        assert_eq!(names, vec!["x", "y"]);
    }
}
