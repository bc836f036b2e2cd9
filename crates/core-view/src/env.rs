//! Process environment and working directory access.

use std::path::Path;

use crate::file::normalize_path;

/// The process environment as `(NAME, VALUE)` pairs.
///
/// On Windows some entries carry a spurious leading `=` in the name
/// (e.g. `=C:=C:\dir`); it is stripped here so names are usable as
/// register names.
pub fn get_environ() -> Vec<(String, String)> {
    std::env::vars()
        .map(|(mut name, value)| {
            if cfg!(windows) && name.starts_with('=') {
                name.remove(0);
            }
            (name, value)
        })
        .collect()
}

/// Current working directory as a forward-slash-normalized absolute path.
pub fn current_dir_normalized() -> String {
    std::env::current_dir()
        .map(|p| normalize_path(&p.to_string_lossy()))
        .unwrap_or_default()
}

pub fn chdir(path: &str) -> std::io::Result<()> {
    std::env::set_current_dir(Path::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environ_contains_path_like_entries() {
        // Every environment has at least one variable in practice; assert
        // the shape rather than specific contents.
        for (name, _) in get_environ() {
            assert!(!name.starts_with('='));
        }
    }

    #[test]
    fn cwd_is_normalized() {
        let cwd = current_dir_normalized();
        assert!(!cwd.contains('\\'));
    }
}
