//! The incremental TECO interpreter.
//!
//! One [`Interp`] owns every piece of process-wide state the language can
//! observe: the expression stacks, the Q-Register tables and stack, the
//! buffer ring, the goto skip label, the loop stack, the command line, the
//! shared text widget and the undo log. Each input byte is atomically
//! committed or atomically rolled back across all of them; the undo log is
//! the mechanism and the command-line loop is the only recovery point.

use core_string::TecoString;
use core_undo::UndoLog;
use core_view::{Doc, Interface, MsgLevel, RecordingInterface, View};

pub mod cmdline;
pub mod error;
pub mod expr;
pub mod goto;
pub mod help;
pub mod parser;
pub mod qreg;
pub mod qregspec;
pub mod ring;
pub mod search;
pub mod stringbuilding;
pub mod symbols;

pub use cmdline::{Cmdline, KeyAction};
pub use error::{Error, ErrorKind, Exec, Frame, Interrupt};
pub use expr::Op;
pub use parser::{Machine, Mode, State};
pub use qreg::{QReg, QRegKind, QRegSel, QRegTable};
pub use ring::Ring;

/// The interpreter's machine integer.
pub type Int = i64;

bitflags::bitflags! {
    /// The ED flag word (`ED` command).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EdFlags: u32 {
        /// Invoke ED hooks on buffer add/edit/close/quit.
        const HOOKS = 1 << 5;
        /// Enable function-key macros.
        const FNKEYS = 1 << 6;
        /// Automatic EOL translation on load/save.
        const AUTOEOL = 1 << 8;
        /// Default clipboard is the primary selection.
        const CLIP_PRIMARY = 1 << 10;
        /// Fold letter case of interactively typed command characters.
        const AUTOCASEFOLD = 1 << 11;
    }
}

impl Default for EdFlags {
    fn default() -> Self {
        EdFlags::FNKEYS | EdFlags::AUTOEOL
    }
}

/// Which document is currently mounted in the shared view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrentDoc {
    /// A ring buffer, by id.
    Buffer(usize),
    /// A Q-Register, by table and name.
    QReg(QRegSel),
}

pub struct Interp {
    pub undo: UndoLog<Interp>,
    pub view: View,
    pub iface: Box<dyn Interface>,

    // Expression evaluator state.
    pub(crate) numbers: Vec<Int>,
    pub(crate) operators: Vec<Op>,
    pub(crate) num_sign: i32,
    pub(crate) brace_level: u32,

    // Q-Register store.
    pub globals: QRegTable,
    /// Local table of the innermost macro frame.
    pub locals: QRegTable,
    pub(crate) qreg_stack: Vec<qreg::QRegStackEntry>,
    pub(crate) current_doc: CurrentDoc,

    pub ring: Ring,

    // Flow control.
    pub(crate) loop_stack: Vec<parser::LoopFrame>,
    /// Pending forward-goto label; empty when in normal mode.
    pub(crate) skip_label: TecoString,

    // Command line.
    pub cmdline: Cmdline,
    pub(crate) machine: Machine,
    pub(crate) last_cmdline: TecoString,
    pub(crate) modifier_enabled: bool,
    pub quit_requested: bool,

    pub ed: EdFlags,
    pub help: help::HelpIndex,
    pub symbols: symbols::SymbolTable,
}

impl Interp {
    pub fn new(iface: Box<dyn Interface>) -> Self {
        let mut interp = Self {
            undo: UndoLog::new(),
            view: View::new(),
            iface,
            numbers: Vec::new(),
            operators: Vec::new(),
            num_sign: 1,
            brace_level: 0,
            globals: QRegTable::new_globals(),
            locals: QRegTable::new_locals(true),
            qreg_stack: Vec::new(),
            current_doc: CurrentDoc::Buffer(0),
            ring: Ring::new(),
            loop_stack: Vec::new(),
            skip_label: TecoString::new(),
            cmdline: Cmdline::new(),
            machine: Machine::new(true),
            last_cmdline: TecoString::new(),
            modifier_enabled: false,
            quit_requested: false,
            ed: EdFlags::default(),
            help: help::HelpIndex::new(),
            symbols: symbols::SymbolTable::builtin(),
        };
        interp.current_doc = CurrentDoc::Buffer(interp.ring.current_id());
        interp
    }

    /// Interpreter with a recording interface, for tests.
    pub fn new_for_test() -> Self {
        Self::new(Box::new(RecordingInterface::new()))
    }

    /// Batch mode: undo globally disabled, errors terminate.
    pub fn set_batch_mode(&mut self) {
        self.undo.set_enabled(false);
        self.globals.must_undo = false;
        self.locals.must_undo = false;
        self.machine.must_undo = false;
    }

    pub fn msg(&mut self, level: MsgLevel, text: &str) {
        self.iface.msg(level, text);
    }

    /// Replay undo actions down to `pc`, restoring byte-exact prior state.
    ///
    /// Replay proceeds even over partially corrupted state; the actions must
    /// not push while running.
    pub fn rubout_to(&mut self, pc: usize) {
        let was_enabled = self.undo.enabled();
        self.undo.set_enabled(false);
        while let Some(action) = self.undo.pop_to(pc) {
            action(self);
        }
        self.undo.set_enabled(was_enabled);
        self.undo.set_pc(pc);
    }

    /// The document record currently mounted in the view, if addressable.
    pub fn current_doc(&self) -> &CurrentDoc {
        &self.current_doc
    }

    fn doc_record_mut(&mut self, which: &CurrentDoc) -> Option<&mut Doc> {
        match which {
            CurrentDoc::Buffer(id) => self.ring.doc_mut(*id),
            CurrentDoc::QReg(sel) => {
                let table = if sel.local {
                    &mut self.locals
                } else {
                    &mut self.globals
                };
                table.get_mut(&sel.name).map(|r| &mut r.doc)
            }
        }
    }

    /// Park the view state back into the current document's record.
    pub(crate) fn park_current(&mut self) {
        let which = self.current_doc.clone();
        let snapshot = {
            let view = &self.view;
            let mut doc = Doc::new();
            doc.park(view);
            doc
        };
        if let Some(record) = self.doc_record_mut(&which) {
            *record = snapshot;
        }
    }

    /// Park the outgoing document and mount `target`. No undo; callers
    /// register their own remount token first.
    pub(crate) fn mount(&mut self, target: CurrentDoc) {
        if self.current_doc == target {
            return;
        }
        self.park_current();
        self.current_doc = target.clone();
        let mut doc = match self.doc_record_mut(&target) {
            Some(record) => std::mem::take(record),
            None => Doc::new(),
        };
        doc.mount(&mut self.view);
    }

    /// Reset all per-command-line state after termination. The undo log is
    /// discarded wholesale; buffer contents survive.
    pub(crate) fn reset_after_termination(&mut self) {
        self.undo.clear();
        self.machine.reset_top_level();
        self.expressions_clear();
        self.loop_stack.clear();
        self.skip_label.clear();
        tracing::trace!(target: "interp", "command line committed, heap trim hint");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_interpreter_has_prepopulated_registers() {
        let i = Interp::new_for_test();
        assert!(i.globals.get(b"A").is_some());
        assert!(i.globals.get(b"9").is_some());
        assert!(i.globals.get(b"_").is_some());
        assert!(i.globals.get(b"*").is_some());
        // radix lives in the local table
        assert!(i.locals.get(b"\x12").is_some());
    }

    #[test]
    fn mount_switches_documents() {
        let mut i = Interp::new_for_test();
        i.view.insert("buffer text");
        let sel = QRegSel::global(b"A");
        i.mount(CurrentDoc::QReg(sel.clone()));
        assert_eq!(i.view.get_all(), "");
        i.view.insert("register text");
        i.mount(CurrentDoc::Buffer(i.ring.current_id()));
        assert_eq!(i.view.get_all(), "buffer text");
        // register kept its text while parked
        i.mount(CurrentDoc::QReg(sel));
        assert_eq!(i.view.get_all(), "register text");
    }
}
