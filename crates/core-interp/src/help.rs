//! Help topic index over woman pages.
//!
//! A woman page is a plain `.woman` text file, optionally accompanied by a
//! `.woman.tec` script whose first line is `!*` followed by `POS:TOPIC`
//! lines and a terminating `*!`. Topics are case-insensitive and
//! canonicalized by mapping control bytes to their printable `^X` form.

use core_string::{Completion, NameIndex, echo_bytes};
use std::path::Path;

use crate::Int;
use crate::error::Error;

struct Topic {
    filename: String,
    pos: Int,
}

pub struct HelpIndex {
    index: NameIndex<Topic>,
}

impl Default for HelpIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl HelpIndex {
    pub fn new() -> Self {
        Self {
            index: NameIndex::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn canonicalize(topic: &[u8]) -> Vec<u8> {
        echo_bytes(topic).into_bytes()
    }

    pub fn set(&mut self, topic: &[u8], filename: &str, pos: Int) {
        let key = Self::canonicalize(topic);
        self.index.insert_unique(
            &key,
            Topic {
                filename: filename.to_owned(),
                pos,
            },
        );
    }

    /// Resolve a topic to `(filename, glyph position)`.
    pub fn find(&self, topic: &[u8]) -> Option<(String, Int)> {
        let key = Self::canonicalize(topic);
        self.index
            .find(&key)
            .map(|t| (t.filename.clone(), t.pos))
    }

    pub fn auto_complete(&self, prefix: &[u8]) -> Completion {
        self.index.auto_complete(&Self::canonicalize(prefix), 0)
    }

    /// Register a woman page: the file stem becomes a topic at position 0,
    /// and the optional `<file>.tec` script contributes `POS:TOPIC` entries.
    pub fn load_file(&mut self, path: &str) -> Result<(), Error> {
        let stem = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| Error::failed(format!("Invalid woman page path \"{path}\"")))?;
        self.set(stem.as_bytes(), path, 0);

        let script_path = format!("{path}.tec");
        let Ok(script) = std::fs::read_to_string(&script_path) else {
            return Ok(());
        };
        self.load_script(&script, path, &script_path)
    }

    fn load_script(&mut self, script: &str, page: &str, script_path: &str) -> Result<(), Error> {
        let mut lines = script.lines();
        if lines.next().map(str::trim) != Some("!*") {
            return Err(Error::failed(format!(
                "Invalid topic script \"{script_path}\": missing \"!*\" header"
            )));
        }
        for line in lines {
            let line = line.trim_end();
            if line == "*!" {
                return Ok(());
            }
            let Some((pos, topic)) = line.split_once(':') else {
                return Err(Error::failed(format!(
                    "Invalid topic line in \"{script_path}\""
                )));
            };
            let pos: Int = pos
                .trim()
                .parse()
                .map_err(|_| Error::failed(format!("Invalid topic position in \"{script_path}\"")))?;
            self.set(topic.as_bytes(), page, pos);
        }
        Err(Error::failed(format!(
            "Invalid topic script \"{script_path}\": missing \"*!\" terminator"
        )))
    }
}
