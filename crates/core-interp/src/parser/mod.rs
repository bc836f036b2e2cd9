//! The main parser state machine.
//!
//! One state per lexical context. Each input byte advances the machine; in
//! any non-normal mode the side-effecting branches are short-circuited while
//! label collection and structure tracking still run, so a skipped region
//! parses exactly like an executed one.
//!
//! The top-level machine (the interactive command line) mirrors every state
//! transition on the undo log; macro machines are throwaway values whose
//! parser state needs no undo; only their side effects do.

use core_string::TecoString;

use crate::error::{Error, Exec, Frame, Interrupt, add_frame};
use crate::goto::GotoTable;
use crate::qreg::{QRegSel, QRegTable};
use crate::qregspec::{QRegSpecMachine, QRegSpecMode};
use crate::{Int, Interp};

pub mod qregcmds;
pub mod start;
pub mod strings;

pub use strings::ExpectString;

pub(crate) const ESC: u8 = 0x1B;

/// Parser execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    /// Seeking a goto label; everything else is parse-only.
    ParseOnlyGoto,
    /// Skipping a conditional branch until the matching `'` (optionally
    /// stopping at `|`). `nest` counts conditionals opened inside the
    /// skipped region.
    ParseOnlyCond { nest: u32, stop_at_else: bool },
    /// Skipping to the end of a loop. `pop_frame` drops the loop frame at
    /// the closing `>` (break); `execute_close` lets the `>` run its normal
    /// iteration logic instead (loop continue).
    ParseOnlyLoop {
        nest: u32,
        pop_frame: bool,
        execute_close: bool,
    },
    /// Syntax-highlighting dry run; nothing executes.
    Lexing,
}

impl Mode {
    #[inline]
    pub fn executing(self) -> bool {
        self == Mode::Normal
    }
}

/// Commands that take a Q-Register specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QRegCmd {
    /// `U`: store an integer.
    SetInt,
    /// `Q`: query integer/character/length.
    GetInt,
    /// `%`: add to the integer, push the result.
    Increase,
    /// `G`: insert the register's string at dot.
    GetString,
    /// `X`: extract a line range into the register.
    Extract,
    /// `M`: execute the register as a macro.
    Macro,
    /// `[`: push the register onto the stack.
    Push,
    /// `]`: pop the stack into the register.
    Pop,
    /// `^U`: set the string cell (string argument follows).
    CtlU,
    /// `*` at the start of a command line: save the last command line.
    SaveCmdline,
    /// `EQ`: load the register's string from a file.
    EqFile,
    /// `E%`: save the register's string to a file.
    EpFile,
}

/// Commands that take a string argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringCmd {
    Insert,
    Search,
    SearchAll,
    Goto,
    CtlU,
    EbFile,
    EwFile,
    EqFile,
    EpFile,
    EsSymbols,
    Help,
}

/// Parser states; one per lexical context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Start,
    /// One escape consumed; a second terminates the macro.
    EscapeSeen,
    /// `^` pending.
    Caret,
    /// `^^`: the next byte is pushed as a character code.
    CaretChar,
    /// `"` consumed; the condition character follows.
    Cond,
    /// `E` consumed.
    ECmd,
    /// `F` consumed.
    FCmd,
    /// Collecting a `!label!`.
    Label,
    BlockComment,
    BlockCommentStar,
    EolComment,
    ExpectQReg(QRegCmd),
    ExpectString(StringCmd),
}

impl State {
    pub fn is_start(self) -> bool {
        self == State::Start
    }
}

/// One `<`…`>` loop on the global loop stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopFrame {
    /// Program counter of the first byte of the loop body.
    pub pc: usize,
    /// Remaining iterations; `None` is an infinite loop.
    pub counter: Option<Int>,
    /// Pushed while in a parse-only mode, for structure tracking only.
    pub parse_only: bool,
}

/// Search parameters captured at search-state entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    pub count: Int,
    pub origin_dot: usize,
    pub origin_anchor: usize,
    /// Whole-ring search (`N`).
    pub multi_buffer: bool,
    pub origin_buffer: usize,
}

pub struct Machine {
    pub state: State,
    pub mode: Mode,
    /// Next input index within the macro (or command line).
    pub macro_pc: usize,
    /// Whether parser state transitions are mirrored on the undo log; true
    /// only for the top-level interactive machine.
    pub must_undo: bool,
    pub goto_table: GotoTable,
    pub(crate) goto_label: TecoString,
    /// Loop stack depth at machine start; closing below it is an error.
    pub loop_base: usize,
    pub brace_base: u32,
    /// `:` modifier count (0, 1 or 2).
    pub colon: u8,
    /// `@` modifier pending.
    pub at_mod: bool,
    pub(crate) expectstring: ExpectString,
    pub(crate) qregspec: QRegSpecMachine,
    /// Register parsed by a two-stage command (`^U`, `EQ`, `E%`).
    pub(crate) pending_qreg: Option<QRegSel>,
    pub(crate) search: Option<SearchParams>,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Machine {
    pub fn new(must_undo: bool) -> Self {
        Self {
            state: State::Start,
            mode: Mode::Normal,
            macro_pc: 0,
            must_undo,
            goto_table: GotoTable::new(must_undo),
            goto_label: TecoString::new(),
            loop_base: 0,
            brace_base: 0,
            colon: 0,
            at_mod: false,
            expectstring: ExpectString::new(),
            qregspec: QRegSpecMachine::new(QRegSpecMode::Required, false),
            pending_qreg: None,
            search: None,
        }
    }

    /// Feed one byte. Scalar machine state changed by this byte is captured
    /// for undo as a whole; strings and sub-machines register their own
    /// finer-grained tokens.
    pub fn input(&mut self, i: &mut Interp, chr: u8) -> Exec<()> {
        let snap = (self.state, self.mode, self.colon, self.at_mod, self.search);
        let result = self.input_inner(i, chr);
        if self.must_undo && snap != (self.state, self.mode, self.colon, self.at_mod, self.search) {
            let (state, mode, colon, at_mod, search) = snap;
            i.undo.push(move |i: &mut Interp| {
                let m = &mut i.machine;
                m.state = state;
                m.mode = mode;
                m.colon = colon;
                m.at_mod = at_mod;
                m.search = search;
            });
        }
        result
    }

    fn input_inner(&mut self, i: &mut Interp, chr: u8) -> Exec<()> {
        match self.state {
            State::ExpectQReg(cmd) => qregcmds::input(self, i, chr, cmd),
            State::ExpectString(cmd) => strings::input(self, i, chr, cmd),
            _ => start::input(self, i, chr),
        }
    }

    /// Reset the top-level machine after command-line termination.
    pub fn reset_top_level(&mut self) {
        self.state = State::Start;
        self.mode = Mode::Normal;
        self.macro_pc = 0;
        self.goto_table.clear();
        self.goto_label.clear();
        self.colon = 0;
        self.at_mod = false;
        self.expectstring = ExpectString::new();
        self.pending_qreg = None;
        self.search = None;
    }

    /// Verify clean termination of a machine's input stream.
    fn check_termination(&self, i: &Interp) -> Result<(), Error> {
        if !i.skip_label.is_empty() {
            return Err(Error::failed(format!(
                "Undefined label \"{}\"",
                i.skip_label.echo()
            )));
        }
        match self.mode {
            Mode::ParseOnlyCond { .. } => {
                return Err(Error::failed("Unterminated conditional"));
            }
            Mode::ParseOnlyLoop { .. } => {
                return Err(Error::failed("Unterminated loop"));
            }
            _ => {}
        }
        if i.loop_stack.len() > self.loop_base {
            return Err(Error::failed("Unterminated loop"));
        }
        if !matches!(self.state, State::Start | State::EscapeSeen) {
            return Err(Error::failed("Unterminated command"));
        }
        Ok(())
    }
}

impl Interp {
    pub(crate) fn loop_stack_push(&mut self, frame: LoopFrame) {
        self.loop_stack.push(frame);
        self.undo.push(|i: &mut Interp| {
            i.loop_stack.pop();
        });
    }

    pub(crate) fn loop_stack_pop(&mut self) -> Option<LoopFrame> {
        let frame = self.loop_stack.pop()?;
        self.undo.push(move |i: &mut Interp| {
            i.loop_stack.push(frame);
        });
        Some(frame)
    }

    pub(crate) fn loop_counter_set(&mut self, counter: Option<Int>) {
        if let Some(frame) = self.loop_stack.last_mut() {
            let old = frame.counter;
            frame.counter = counter;
            self.undo.push(move |i: &mut Interp| {
                if let Some(frame) = i.loop_stack.last_mut() {
                    frame.counter = old;
                }
            });
        }
    }

    /// Insert text at dot, registering the inverse deletion.
    pub fn insert_at_dot(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let dot = self.view.dot();
        let len = text.len();
        self.undo.push(move |i: &mut Interp| {
            let end = (dot + len).min(i.view.len_bytes());
            i.view.delete_range(dot, end);
            let _ = i.view.goto_pos(dot);
        });
        self.view.insert(text);
    }

    /// Delete a byte range, registering the inverse insertion.
    pub fn delete_range_undoable(&mut self, from: usize, to: usize) {
        if from >= to {
            return;
        }
        let removed = self.view.get_range(from, to);
        let dot = self.view.dot();
        self.undo.push(move |i: &mut Interp| {
            let _ = i.view.goto_pos(from.min(i.view.len_bytes()));
            i.view.insert(&removed);
            let _ = i.view.goto_pos(dot.min(i.view.len_bytes()));
        });
        self.view.delete_range(from, to);
    }

    /// Move dot with an undo token restoring the previous position.
    pub fn goto_pos_undoable(&mut self, pos: usize) -> Result<(), Error> {
        let old = self.view.dot();
        self.view
            .goto_pos(pos)
            .map_err(|_| Error::moved("Attempt to move pointer off page"))?;
        self.undo.push(move |i: &mut Interp| {
            let _ = i.view.goto_pos(old.min(i.view.len_bytes()));
        });
        Ok(())
    }

    /// Execute a macro string in the current local table.
    pub fn execute_macro(&mut self, code: &[u8]) -> Exec<()> {
        let mut machine = Machine::new(false);
        machine.loop_base = self.loop_stack.len();
        machine.brace_base = self.brace_level;
        let result = self.run_machine(&mut machine, code);
        match result {
            Err(Interrupt::Return) | Ok(()) => machine
                .check_termination(self)
                .map_err(Interrupt::from),
            err => err,
        }
    }

    /// Execute a macro with its own local register table (plain `M`), which
    /// is freed afterwards. Leaving a register of that table mounted is an
    /// error.
    pub fn execute_macro_with_locals(&mut self, code: &[u8], locals: QRegTable) -> Exec<()> {
        let saved = std::mem::replace(&mut self.locals, locals);
        let result = self.execute_macro(code);
        let result = result.and_then(|()| {
            if let crate::CurrentDoc::QReg(sel) = &self.current_doc
                && sel.local
            {
                return Err(Error::editing_local_qreg(&sel.name).into());
            }
            Ok(())
        });
        self.locals = saved;
        result
    }

    fn run_machine(&mut self, machine: &mut Machine, code: &[u8]) -> Exec<()> {
        while machine.macro_pc < code.len() {
            let chr = code[machine.macro_pc];
            machine.macro_pc += 1;
            machine.input(self, chr)?;
        }
        Ok(())
    }

    /// Execute a named macro file (batch mode entry point).
    pub fn execute_toplevel_macro(&mut self, code: &[u8], name: &str) -> Exec<()> {
        self.execute_macro(code).map_err(|e| {
            add_frame(
                e,
                Frame::Macro {
                    name: name.to_owned(),
                },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_macro_executes() {
        let mut i = Interp::new_for_test();
        i.execute_macro(b"5 8*").unwrap();
        assert_eq!(i.pop_num_calc(0).unwrap(), 40);
    }

    #[test]
    fn macro_with_unterminated_loop_fails() {
        let mut i = Interp::new_for_test();
        let err = i.execute_macro(b"<1");
        assert!(err.is_err());
    }

    #[test]
    fn double_escape_returns_early() {
        let mut i = Interp::new_for_test();
        // everything after $$ is ignored
        i.execute_macro(b"3\x1b\x1b 9999 not-even-parsed ((((").unwrap();
    }

    #[test]
    fn pending_skip_label_at_end_is_an_error() {
        let mut i = Interp::new_for_test();
        let err = i.execute_macro(b"Onowhere\x1b 1 2 3").unwrap_err();
        match err {
            Interrupt::Error(e) => assert!(e.msg.contains("nowhere")),
            other => panic!("expected error, got {other:?}"),
        }
    }
}
