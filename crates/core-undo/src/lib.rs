//! Program-counter-tagged undo log.
//!
//! Every state-mutating operation of the interpreter pushes an action here
//! *before* committing the change, tagged with the command-line program
//! counter of the character being executed. Rubbing out a character replays
//! the actions whose tag exceeds the target program counter, in strict LIFO
//! order, restoring byte-exact prior state.
//!
//! Actions are boxed `FnOnce(&mut C)` closures over the interpreter context
//! `C`. Discarding the log (on command-line termination) simply drops the
//! closures, which releases any owned payloads without running them; the
//! run/free distinction of the legacy token design falls out of ordinary
//! drop glue.

use tracing::trace;

struct Token<C> {
    pc: usize,
    action: Box<dyn FnOnce(&mut C)>,
}

pub struct UndoLog<C> {
    tokens: Vec<Token<C>>,
    /// Tag applied to newly pushed tokens; the executor bumps this as it
    /// advances through the command line.
    pc: usize,
    /// Globally disabled in batch mode: `push` becomes a no-op and the
    /// closure (with any owned payload) is dropped eagerly.
    enabled: bool,
}

impl<C> Default for UndoLog<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> UndoLog<C> {
    pub fn new() -> Self {
        Self {
            tokens: Vec::new(),
            pc: 0,
            enabled: true,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    pub fn depth(&self) -> usize {
        self.tokens.len()
    }

    /// Record an action reverting the change about to be made.
    ///
    /// Actions must be cheap (a capture of a few scalars or one owned
    /// object) and must not themselves push onto the log when run.
    pub fn push(&mut self, action: impl FnOnce(&mut C) + 'static) {
        if !self.enabled {
            return;
        }
        self.tokens.push(Token {
            pc: self.pc,
            action: Box::new(action),
        });
    }

    /// Pop the most recent action if it is tagged beyond `pc`.
    ///
    /// The caller runs the returned closure against the context; doing the
    /// hand-off one token at a time keeps the context free of aliasing while
    /// an action executes. Replay must proceed to completion even if the
    /// context is partially corrupted; error recovery depends on it.
    pub fn pop_to(&mut self, pc: usize) -> Option<Box<dyn FnOnce(&mut C)>> {
        match self.tokens.last() {
            Some(token) if token.pc > pc => {
                let token = self.tokens.pop().expect("token observed above");
                Some(token.action)
            }
            _ => None,
        }
    }

    /// Discard the whole log without running anything.
    pub fn clear(&mut self) {
        trace!(target: "undo", depth = self.tokens.len(), "clear");
        self.tokens.clear();
        self.pc = 0;
    }
}
