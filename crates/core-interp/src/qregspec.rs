//! Q-Register specification parsing.
//!
//! Parses one register spec, one byte at a time: an optional leading `.`
//! selects the local table, then a single printable name byte, `^<letter>`
//! for a control-character name, `#XY` for a two-letter name, or `[…]` for
//! an arbitrary bracketed name built with string building (balanced
//! brackets nest).

use core_string::{TecoString, ascii_toupper};

use crate::error::Error;
use crate::qreg::QRegSel;
use crate::stringbuilding::StringBuildMachine;
use crate::Interp;

/// What to do once a name is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QRegSpecMode {
    /// The register must exist.
    Required,
    /// A missing register yields `Done(None)`.
    Optional,
    /// A missing register is created as a plain register, with an undo
    /// token registered for its removal.
    OptionalInit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum QsState {
    #[default]
    Start,
    /// After a `.` local prefix.
    StartGlobal,
    /// After `^`.
    Caret,
    /// After `#`.
    FirstChar,
    SecondChar,
    /// Inside `[…]`.
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QRegSpecStatus {
    More,
    /// Spec complete. `None` in parse-only mode or when an `Optional`
    /// register does not exist.
    Done(Option<QRegSel>),
}

#[derive(Clone)]
pub struct QRegSpecMachine {
    state: QsState,
    mode: QRegSpecMode,
    local: bool,
    nesting: u32,
    name: TecoString,
    sb: StringBuildMachine,
}

impl QRegSpecMachine {
    pub fn new(mode: QRegSpecMode, local_default: bool) -> Self {
        Self {
            state: QsState::Start,
            mode,
            local: local_default,
            nesting: 0,
            name: TecoString::new(),
            sb: StringBuildMachine::new(),
        }
    }

    pub fn reset(&mut self, mode: QRegSpecMode) {
        *self = Self::new(mode, false);
    }

    /// Name collected so far (for completion).
    pub fn name(&self) -> &[u8] {
        self.name.as_bytes()
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Length restriction for completion in the current state: 1 for the
    /// single-byte form, 2 for `#XY`, unrestricted inside brackets.
    pub fn completion_restrict(&self) -> usize {
        match self.state {
            QsState::Start | QsState::StartGlobal => 1,
            QsState::FirstChar | QsState::SecondChar => 2,
            _ => 0,
        }
    }

    pub fn input(
        &mut self,
        i: &mut Interp,
        chr: u8,
        parse_only: bool,
    ) -> Result<QRegSpecStatus, Error> {
        match self.state {
            QsState::Start => {
                if chr == b'.' {
                    self.local = true;
                    self.state = QsState::StartGlobal;
                    return Ok(QRegSpecStatus::More);
                }
                self.input_global(i, chr, parse_only)
            }
            QsState::StartGlobal => self.input_global(i, chr, parse_only),
            QsState::Caret => {
                let chr = ascii_toupper(chr);
                if !(b'@'..=b'_').contains(&chr) {
                    return Err(Error::syntax(chr));
                }
                self.name.push_byte(chr & 0x1F);
                self.done(i, parse_only)
            }
            QsState::FirstChar => {
                self.name.push_byte(ascii_toupper(chr));
                self.state = QsState::SecondChar;
                Ok(QRegSpecStatus::More)
            }
            QsState::SecondChar => {
                self.name.push_byte(ascii_toupper(chr));
                self.done(i, parse_only)
            }
            QsState::String => {
                // Balanced brackets inside the name do not need escaping;
                // `^Q[`/`^Q]` escape them explicitly.
                if self.sb.is_start() {
                    match chr {
                        b'[' => {
                            self.nesting += 1;
                        }
                        b']' => {
                            self.nesting -= 1;
                            if self.nesting == 0 {
                                return self.done(i, parse_only);
                            }
                        }
                        _ => {}
                    }
                }
                let target = if parse_only {
                    None
                } else {
                    Some(&mut self.name)
                };
                self.sb.input(i, chr, target)?;
                Ok(QRegSpecStatus::More)
            }
        }
    }

    fn input_global(
        &mut self,
        i: &mut Interp,
        chr: u8,
        parse_only: bool,
    ) -> Result<QRegSpecStatus, Error> {
        match chr {
            b'^' => {
                self.state = QsState::Caret;
                Ok(QRegSpecStatus::More)
            }
            b'#' => {
                self.state = QsState::FirstChar;
                Ok(QRegSpecStatus::More)
            }
            b'[' => {
                self.nesting = 1;
                self.state = QsState::String;
                Ok(QRegSpecStatus::More)
            }
            _ => {
                self.name.push_byte(ascii_toupper(chr));
                self.done(i, parse_only)
            }
        }
    }

    fn done(&mut self, i: &mut Interp, parse_only: bool) -> Result<QRegSpecStatus, Error> {
        self.state = QsState::Start;
        if parse_only {
            return Ok(QRegSpecStatus::Done(None));
        }
        let sel = if self.local {
            QRegSel::local(self.name.as_bytes())
        } else {
            QRegSel::global(self.name.as_bytes())
        };
        match self.mode {
            QRegSpecMode::Required => {
                if !i.qreg_exists(&sel) {
                    return Err(Error::invalid_qreg(&sel.name, sel.local));
                }
            }
            QRegSpecMode::Optional => {
                if !i.qreg_exists(&sel) {
                    return Ok(QRegSpecStatus::Done(None));
                }
            }
            QRegSpecMode::OptionalInit => {
                i.qreg_create(&sel);
            }
        }
        Ok(QRegSpecStatus::Done(Some(sel)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(i: &mut Interp, mode: QRegSpecMode, input: &[u8]) -> Result<QRegSpecStatus, Error> {
        let mut m = QRegSpecMachine::new(mode, false);
        let mut status = QRegSpecStatus::More;
        for &b in input {
            status = m.input(i, b, false)?;
        }
        Ok(status)
    }

    #[test]
    fn single_letter_is_upper_cased() {
        let mut i = Interp::new_for_test();
        let status = parse(&mut i, QRegSpecMode::Required, b"a").unwrap();
        assert_eq!(status, QRegSpecStatus::Done(Some(QRegSel::global(b"A"))));
    }

    #[test]
    fn dot_prefix_selects_local_table() {
        let mut i = Interp::new_for_test();
        let status = parse(&mut i, QRegSpecMode::Required, b".b").unwrap();
        assert_eq!(status, QRegSpecStatus::Done(Some(QRegSel::local(b"B"))));
    }

    #[test]
    fn caret_names_control_register() {
        let mut i = Interp::new_for_test();
        // ^R is pre-populated in the local table
        let status = parse(&mut i, QRegSpecMode::Required, b".^r").unwrap();
        assert_eq!(
            status,
            QRegSpecStatus::Done(Some(QRegSel::local(b"\x12")))
        );
    }

    #[test]
    fn caret_rejects_invalid_range() {
        let mut i = Interp::new_for_test();
        assert!(parse(&mut i, QRegSpecMode::Required, b"^1").is_err());
    }

    #[test]
    fn two_letter_names() {
        let mut i = Interp::new_for_test();
        let status = parse(&mut i, QRegSpecMode::OptionalInit, b"#ed").unwrap();
        assert_eq!(status, QRegSpecStatus::Done(Some(QRegSel::global(b"ED"))));
        assert!(i.qreg_exists(&QRegSel::global(b"ED")));
    }

    #[test]
    fn bracketed_names_nest() {
        let mut i = Interp::new_for_test();
        let status = parse(&mut i, QRegSpecMode::OptionalInit, b"[a[b]c]").unwrap();
        assert_eq!(
            status,
            QRegSpecStatus::Done(Some(QRegSel::global(b"a[b]c")))
        );
    }

    #[test]
    fn bracketed_names_support_string_building() {
        let mut i = Interp::new_for_test();
        i.qreg_set_string(&crate::qreg::QRegSel::global(b"N"), b"amed")
            .unwrap();
        let status = parse(&mut i, QRegSpecMode::OptionalInit, b"[n^EQN]").unwrap();
        assert_eq!(
            status,
            QRegSpecStatus::Done(Some(QRegSel::global(b"named")))
        );
    }

    #[test]
    fn required_mode_fails_on_missing_register() {
        let mut i = Interp::new_for_test();
        let err = parse(&mut i, QRegSpecMode::Required, b"[nosuch]").unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::InvalidQReg);
    }

    #[test]
    fn optional_mode_returns_none_on_missing() {
        let mut i = Interp::new_for_test();
        let status = parse(&mut i, QRegSpecMode::Optional, b"[nosuch]").unwrap();
        assert_eq!(status, QRegSpecStatus::Done(None));
    }

    #[test]
    fn parse_only_never_touches_tables() {
        let mut i = Interp::new_for_test();
        let mut m = QRegSpecMachine::new(QRegSpecMode::OptionalInit, false);
        let mut status = QRegSpecStatus::More;
        for &b in b"[fresh]" {
            status = m.input(&mut i, b, true).unwrap();
        }
        assert_eq!(status, QRegSpecStatus::Done(None));
        assert!(!i.qreg_exists(&QRegSel::global(b"fresh")));
    }
}
