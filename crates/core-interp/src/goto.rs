//! Goto label table and forward-reference skip mode.
//!
//! Labels are single-assignment: the first definition wins, later ones are
//! ignored with a warning (re-encountering the *same* program counter, as a
//! loop body does, stays silent). A goto to a label not yet defined sets
//! the pending skip label and flips the parser into parse-only mode; the
//! defining `!label!` terminator clears it and normal execution resumes at
//! the definition point.

use core_string::{NameIndex, TecoString, echo_bytes};
use tracing::trace;

use crate::error::Error;
use crate::parser::{Machine, Mode};
use crate::Interp;

pub struct GotoTable {
    index: NameIndex<usize>,
    pub must_undo: bool,
}

impl GotoTable {
    pub fn new(must_undo: bool) -> Self {
        Self {
            index: NameIndex::new(true),
            must_undo,
        }
    }

    pub fn find(&self, name: &[u8]) -> Option<usize> {
        self.index.find(name).copied()
    }

    /// Insert a label. Returns the program counter of an existing label of
    /// the same name, or `None` when the label was actually inserted.
    pub fn set(&mut self, name: &[u8], pc: usize) -> Option<usize> {
        if let Some(&existing) = self.index.find(name) {
            return Some(existing);
        }
        self.index.insert_unique(name, pc);
        None
    }

    pub fn remove(&mut self, name: &[u8]) -> bool {
        self.index.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        let _ = self.index.drain().count();
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn auto_complete(&self, prefix: &[u8]) -> core_string::Completion {
        self.index.auto_complete(prefix, 0)
    }
}

impl Machine {
    /// Commit the collected label at its terminating `!`.
    pub(crate) fn define_label(&mut self, i: &mut Interp) {
        let label = self.goto_label.as_bytes().to_vec();
        let pc = self.macro_pc;

        match self.goto_table.set(&label, pc) {
            Some(existing) if existing == pc => {
                // the same label re-encountered, e.g. inside a loop body
            }
            Some(_) => {
                i.warn(&format!(
                    "Ignoring goto label \"{}\" redefinition",
                    echo_bytes(&label)
                ));
            }
            None => {
                if self.must_undo && self.goto_table.must_undo {
                    let label_u = label.clone();
                    i.undo.push(move |i: &mut Interp| {
                        i.machine.goto_table.remove(&label_u);
                    });
                }

                if !i.skip_label.is_empty() && i.skip_label.as_bytes() == label.as_slice() {
                    trace!(target: "interp.goto", label = %echo_bytes(&label), "skip label reached");
                    let old = i.skip_label.clone();
                    i.undo.push(move |i: &mut Interp| i.skip_label = old);
                    i.skip_label.clear();
                    self.mode = Mode::Normal;
                }
            }
        }

        if self.must_undo {
            let old = std::mem::take(&mut self.goto_label);
            i.undo
                .push(move |i: &mut Interp| i.machine.goto_label = old);
        } else {
            self.goto_label.clear();
        }
    }

    /// The `O` command: jump to the `value`-th comma-separated label of
    /// `list` (1-based). An out-of-range selector does nothing; an unknown
    /// label arms skip mode.
    pub(crate) fn goto_label_list(
        &mut self,
        i: &mut Interp,
        list: &[u8],
        value: crate::Int,
    ) -> Result<(), Error> {
        if value < 1 {
            return Ok(());
        }
        let Some(label) = list.split(|&b| b == b',').nth(value as usize - 1) else {
            return Ok(());
        };

        if let Some(pc) = self.goto_table.find(label) {
            self.macro_pc = pc;
            return Ok(());
        }

        // Skip until the label is defined.
        debug_assert!(i.skip_label.is_empty());
        i.undo.push(|i: &mut Interp| i.skip_label.clear());
        i.skip_label = TecoString::from_bytes(label);
        self.mode = Mode::ParseOnlyGoto;
        trace!(target: "interp.goto", label = %echo_bytes(label), "entering skip mode");
        Ok(())
    }
}
