//! Structured interpreter failures and non-error control flow.
//!
//! Low-level operations return `Result<T, Error>`; intermediate callers
//! attach frames (macro name, register name, hook name) on the way out. The
//! command-line loop is the single recovery point.
//!
//! `Return`, `Quit` and command-line replacement are not failures; they are
//! threaded through the same `Result` channel as [`Interrupt`] variants so
//! that every executor step has exactly one outcome type.

use core_string::{TecoString, echo_bytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid character in the current parser state.
    Syntax,
    /// Generic semantic failure (missing operand, divide by zero, …).
    Failed,
    /// Cursor motion off page.
    Move,
    /// `from,to` range out of buffer bounds.
    Range,
    /// Q-Register not found in required mode.
    InvalidQReg,
    /// ED hook left a local register mounted that is about to be freed.
    EditingLocalQReg,
    /// External lexer library could not be loaded.
    Module,
}

/// One level of execution context attached while an error propagates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Toplevel,
    Macro { name: String },
    QReg { name: String },
    EdHook { name: &'static str },
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{msg}")]
pub struct Error {
    pub kind: ErrorKind,
    pub msg: String,
    /// Innermost frame first.
    pub frames: Vec<Frame>,
}

impl Error {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            frames: Vec::new(),
        }
    }

    pub fn syntax(chr: u8) -> Self {
        Self::new(
            ErrorKind::Syntax,
            format!("Syntax error \"{}\"", echo_bytes(&[chr])),
        )
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Failed, msg)
    }

    pub fn moved(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Move, msg)
    }

    pub fn range(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Range, msg)
    }

    pub fn invalid_qreg(name: &[u8], local: bool) -> Self {
        Self::new(
            ErrorKind::InvalidQReg,
            format!(
                "Invalid Q-Register \"{}{}\"",
                if local { "." } else { "" },
                echo_bytes(name)
            ),
        )
    }

    pub fn editing_local_qreg(name: &[u8]) -> Self {
        Self::new(
            ErrorKind::EditingLocalQReg,
            format!(
                "Editing local Q-Register \"{}\" of finished macro invocation",
                echo_bytes(name)
            ),
        )
    }

    pub fn add_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// The one-line message shown interactively.
    pub fn short_message(&self) -> &str {
        &self.msg
    }

    /// The long form with the frame list, for the detail view.
    pub fn long_message(&self) -> String {
        let mut out = self.msg.clone();
        for frame in &self.frames {
            match frame {
                Frame::Toplevel => out.push_str("\n  at top level"),
                Frame::Macro { name } => {
                    out.push_str("\n  in macro \"");
                    out.push_str(name);
                    out.push('"');
                }
                Frame::QReg { name } => {
                    out.push_str("\n  in Q-Register \"");
                    out.push_str(name);
                    out.push('"');
                }
                Frame::EdHook { name } => {
                    out.push_str("\n  in ED hook ");
                    out.push_str(name);
                }
            }
        }
        out
    }
}

/// Outcome channel of every executor step.
#[derive(Debug)]
pub enum Interrupt {
    Error(Error),
    /// Return from the current macro; at top level this terminates the
    /// command line.
    Return,
    /// Unwind to the host (also raised by the `CLOSE` function key).
    Quit,
    /// Replace the command line with the payload and resume execution.
    Replace(TecoString),
}

impl From<Error> for Interrupt {
    fn from(e: Error) -> Self {
        Interrupt::Error(e)
    }
}

pub type Exec<T> = Result<T, Interrupt>;

/// Attach a frame if the interrupt carries an error.
pub fn add_frame(interrupt: Interrupt, frame: Frame) -> Interrupt {
    match interrupt {
        Interrupt::Error(mut e) => {
            e.add_frame(frame);
            Interrupt::Error(e)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_accumulate_in_long_message() {
        let mut e = Error::failed("Division by zero");
        e.add_frame(Frame::Macro {
            name: "M".to_owned(),
        });
        e.add_frame(Frame::Toplevel);
        let long = e.long_message();
        assert!(long.starts_with("Division by zero"));
        assert!(long.contains("in macro \"M\""));
        assert!(long.contains("at top level"));
        assert_eq!(e.short_message(), "Division by zero");
    }

    #[test]
    fn syntax_error_echoes_control_chars() {
        let e = Error::syntax(0x01);
        assert!(e.msg.contains("^A"));
    }
}
