//! The shared text widget and its external collaborators.
//!
//! The interpreter owns exactly one [`View`]: a rope-backed text widget with
//! a cursor ("dot"), an anchor and an EOL mode. Buffers and Q-Register
//! strings live in parked [`Doc`] records and are mounted into the view one
//! at a time; whoever mounts a different document must park the outgoing one
//! first so its cursor/EOL state survives.
//!
//! Byte offsets address the UTF-8 text; "glyph" positions count characters.

use ropey::Rope;
use std::fs;
use std::io::Write;
use std::path::Path;

pub mod doc;
pub mod env;
pub mod file;
pub mod iface;

pub use doc::Doc;
pub use iface::{Interface, MsgLevel, PopupKind, RecordingInterface, SharedRecorder};

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("text is not valid UTF-8")]
    Encoding,
    #[error("position off page")]
    OffPage,
}

/// End-of-line translation mode of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EolMode {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl EolMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EolMode::Lf => "\n",
            EolMode::CrLf => "\r\n",
            EolMode::Cr => "\r",
        }
    }

    /// Mode of the first line terminator found, if any.
    pub fn detect(text: &str) -> Option<EolMode> {
        let bytes = text.as_bytes();
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'\n' => return Some(EolMode::Lf),
                b'\r' => {
                    return Some(if bytes.get(i + 1) == Some(&b'\n') {
                        EolMode::CrLf
                    } else {
                        EolMode::Cr
                    });
                }
                _ => {}
            }
        }
        None
    }
}

/// Normalize all line terminators to `\n`, reporting the detected mode.
pub fn normalize_eol(text: &str) -> (String, EolMode) {
    let mode = EolMode::detect(text).unwrap_or_default();
    if mode == EolMode::Lf {
        return (text.to_owned(), mode);
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    (out, mode)
}

/// Expand internal `\n` terminators to the given mode.
pub fn denormalize_eol(text: &str, mode: EolMode) -> String {
    match mode {
        EolMode::Lf => text.to_owned(),
        _ => text.replace('\n', mode.as_str()),
    }
}

/// The single shared text widget.
pub struct View {
    text: Rope,
    dot: usize,
    anchor: usize,
    eol_mode: EolMode,
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}

impl View {
    pub fn new() -> Self {
        Self {
            text: Rope::new(),
            dot: 0,
            anchor: 0,
            eol_mode: EolMode::default(),
        }
    }

    pub fn len_bytes(&self) -> usize {
        self.text.len_bytes()
    }

    pub fn len_glyphs(&self) -> usize {
        self.text.len_chars()
    }

    pub fn dot(&self) -> usize {
        self.dot
    }

    pub fn anchor(&self) -> usize {
        self.anchor
    }

    pub fn eol_mode(&self) -> EolMode {
        self.eol_mode
    }

    pub fn set_eol_mode(&mut self, mode: EolMode) {
        self.eol_mode = mode;
    }

    /// Move dot to a byte position; fails when off page or mid-character.
    pub fn goto_pos(&mut self, pos: usize) -> Result<(), ViewError> {
        if pos > self.len_bytes() || !self.is_char_boundary(pos) {
            return Err(ViewError::OffPage);
        }
        self.dot = pos;
        self.anchor = pos;
        Ok(())
    }

    pub fn set_sel(&mut self, anchor: usize, dot: usize) {
        self.anchor = anchor.min(self.len_bytes());
        self.dot = dot.min(self.len_bytes());
    }

    fn is_char_boundary(&self, pos: usize) -> bool {
        pos == self.len_bytes() || {
            let ch = self.text.byte_to_char(pos);
            self.text.char_to_byte(ch) == pos
        }
    }

    /// Glyph (character) position of a byte offset.
    pub fn bytes_to_glyphs(&self, pos: usize) -> usize {
        self.text.byte_to_char(pos.min(self.len_bytes()))
    }

    /// Byte offset of a glyph position; `None` when off page.
    pub fn glyphs_to_bytes(&self, glyph: i64) -> Option<usize> {
        if glyph < 0 || glyph as usize > self.len_glyphs() {
            return None;
        }
        Some(self.text.char_to_byte(glyph as usize))
    }

    /// Character at a glyph position, or `None` at/past the end.
    pub fn char_at_glyph(&self, glyph: usize) -> Option<char> {
        if glyph < self.len_glyphs() {
            Some(self.text.char(glyph))
        } else {
            None
        }
    }

    pub fn line_count(&self) -> usize {
        self.text.len_lines()
    }

    /// Line index containing a byte offset.
    pub fn line_of_byte(&self, pos: usize) -> usize {
        self.text.byte_to_line(pos.min(self.len_bytes()))
    }

    /// Byte offset of the start of a line, clamped to the last line start.
    pub fn byte_of_line(&self, line: usize) -> usize {
        let line = line.min(self.text.len_lines());
        if line == self.text.len_lines() {
            self.len_bytes()
        } else {
            self.text.line_to_byte(line)
        }
    }

    /// Insert text at dot, leaving dot after the insertion.
    pub fn insert(&mut self, text: &str) {
        let at = self.text.byte_to_char(self.dot);
        self.text.insert(at, text);
        self.dot += text.len();
        self.anchor = self.dot;
    }

    pub fn delete_range(&mut self, from: usize, to: usize) {
        debug_assert!(from <= to && to <= self.len_bytes());
        let from_c = self.text.byte_to_char(from);
        let to_c = self.text.byte_to_char(to);
        self.text.remove(from_c..to_c);
        if self.dot > to {
            self.dot -= to - from;
        } else if self.dot > from {
            self.dot = from;
        }
        self.anchor = self.dot;
    }

    pub fn get_range(&self, from: usize, to: usize) -> String {
        let from_c = self.text.byte_to_char(from.min(self.len_bytes()));
        let to_c = self.text.byte_to_char(to.min(self.len_bytes()));
        self.text.slice(from_c..to_c).to_string()
    }

    pub fn get_all(&self) -> String {
        self.text.to_string()
    }

    /// Replace the whole text, resetting dot and anchor.
    pub fn set_text(&mut self, text: &str) {
        self.text = Rope::from_str(text);
        self.dot = 0;
        self.anchor = 0;
    }

    /// Load a file, normalizing line terminators and recording the mode.
    pub fn load(&mut self, path: &Path) -> Result<(), ViewError> {
        let raw = fs::read(path)?;
        let text = String::from_utf8(raw).map_err(|_| ViewError::Encoding)?;
        let (normalized, mode) = normalize_eol(&text);
        self.set_text(&normalized);
        self.eol_mode = mode;
        tracing::debug!(target: "view.io", path = %path.display(), bytes = self.len_bytes(), ?mode, "loaded");
        Ok(())
    }

    /// Save the text with the document's EOL mode restored.
    pub fn save(&mut self, path: &Path) -> Result<(), ViewError> {
        let out = denormalize_eol(&self.get_all(), self.eol_mode);
        let mut f = fs::File::create(path)?;
        f.write_all(out.as_bytes())?;
        tracing::debug!(target: "view.io", path = %path.display(), bytes = out.len(), "saved");
        Ok(())
    }
}
