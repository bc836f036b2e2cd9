//! The interactive command line.
//!
//! Every keypress either edits the pending command buffer or appends a byte
//! that the parser executes immediately. The committed prefix `[0..len)` has
//! been parsed exactly once; the bytes `[len..len+rubout_len)` are the most
//! recently rubbed-out suffix, kept verbatim for byte-for-byte re-insertion.
//! On failure the loop rolls undo back to the start of the failing byte and
//! turns the failing tail into rubout space; the single recovery point of
//! the whole interpreter.

use core_string::{Completion, TecoString};
use core_view::{MsgLevel, PopupKind, file};
use tracing::{debug, trace};

use crate::error::{Exec, Interrupt};
use crate::parser::{State, StringCmd};
use crate::{EdFlags, Interp};

const CTL_F: u8 = b'F' & 0x1F;

#[derive(Debug, Clone, Default)]
pub struct Cmdline {
    /// Committed prefix plus rubout region.
    pub(crate) str: TecoString,
    /// Length of the committed (executed) prefix.
    pub len: usize,
    /// Length of the rubbed-out suffix after the committed prefix.
    pub rubout_len: usize,
    /// Index of the byte currently being executed.
    pub pc: usize,
}

impl Cmdline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> &[u8] {
        &self.str.as_bytes()[..self.len]
    }

    pub fn rubout_region(&self) -> &[u8] {
        &self.str.as_bytes()[self.len..self.len + self.rubout_len]
    }
}

/// What the host loop should do after a keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    Quit,
}

impl Interp {
    /// Feed one key byte through the current state's edit-command handler.
    pub fn keypress(&mut self, key: u8) -> KeyAction {
        self.iface.msg_clear();

        let action = match self.process_edit_cmd(key) {
            Ok(()) => KeyAction::Continue,
            Err(Interrupt::Return) => {
                self.iface.popup_clear();
                if self.quit_requested {
                    let _ = self.ed_hook(crate::qreg::EdHookType::Quit);
                    return KeyAction::Quit;
                }
                self.terminate_cmdline();
                KeyAction::Continue
            }
            Err(Interrupt::Quit) => return KeyAction::Quit,
            Err(Interrupt::Error(e)) => {
                self.iface.msg(MsgLevel::Error, e.short_message());
                debug!(target: "cmdline", error = %e.long_message(), "recovered");
                let pc = self.cmdline.pc;
                self.rubout_to(pc);
                self.cmdline.rubout_len += self.cmdline.len - pc;
                self.cmdline.len = pc;
                self.machine.macro_pc = pc;
                KeyAction::Continue
            }
            Err(Interrupt::Replace(_)) => {
                unreachable!("replacement is resolved inside the execute loop")
            }
        };

        let line = self.cmdline.committed().to_vec();
        self.iface.cmdline_update(&line);
        action
    }

    /// Feed a whole byte string as if typed.
    pub fn keypress_str(&mut self, keys: &[u8]) -> KeyAction {
        for &key in keys {
            if self.keypress(key) == KeyAction::Quit {
                return KeyAction::Quit;
            }
        }
        KeyAction::Continue
    }

    /// A named function key (`LEFT`, `CLOSE`, …): looks up the `^F<KEY>`
    /// macro register, gated by its state mask. `CLOSE` quits by default.
    pub fn keypress_fn(&mut self, name: &str) -> KeyAction {
        if self.ed.contains(EdFlags::FNKEYS) {
            let mut reg_name = vec![CTL_F];
            reg_name.extend_from_slice(name.as_bytes());
            let sel = crate::qreg::QRegSel::global(&reg_name);
            if self.qreg_exists(&sel) {
                let mask = self.qreg_get_integer(&sel).unwrap_or(0);
                if mask & self.fnmacro_mask() != 0 {
                    // masked out in the current state
                    return KeyAction::Continue;
                }
                if let Ok(macro_str) = self.qreg_get_string(&sel) {
                    return self.keypress_str(&macro_str);
                }
            }
        }
        if name == "CLOSE" {
            return KeyAction::Quit;
        }
        KeyAction::Continue
    }

    fn fnmacro_mask(&self) -> crate::Int {
        match self.machine.state {
            State::Start | State::EscapeSeen => 1,
            State::ExpectString(_) => 2,
            State::ExpectQReg(_) => 4,
            _ => 8,
        }
    }

    // ---- edit commands --------------------------------------------------

    fn process_edit_cmd(&mut self, key: u8) -> Exec<()> {
        match key {
            0x07 => {
                // ^G: toggle the immediate editing modifier
                self.iface.popup_clear();
                self.modifier_enabled = !self.modifier_enabled;
                let text = format!(
                    "Immediate editing modifier is now {}.",
                    if self.modifier_enabled {
                        "enabled"
                    } else {
                        "disabled"
                    }
                );
                self.msg(MsgLevel::Info, &text);
                Ok(())
            }

            0x08 | 0x7F => {
                // ^H: rub out or (with the modifier) re-insert one character
                self.iface.popup_clear();
                if self.modifier_enabled {
                    self.cmdline_insert(None)
                } else {
                    self.cmdline_rubout();
                    Ok(())
                }
            }

            0x17 => {
                // ^W: word rub-out inside string arguments, command rub-out
                // otherwise
                self.iface.popup_clear();
                if matches!(self.machine.state, State::ExpectString(_))
                    && (self.modifier_enabled || !self.machine.expectstring.text().is_empty())
                {
                    return self.word_rubout();
                }
                if self.modifier_enabled {
                    loop {
                        self.cmdline_insert(None)?;
                        if self.machine.state.is_start() || self.cmdline.rubout_len == 0 {
                            return Ok(());
                        }
                    }
                }
                while !self.machine.state.is_start() && self.cmdline.len > 0 {
                    self.cmdline_rubout();
                }
                Ok(())
            }

            0x15 if matches!(self.machine.state, State::ExpectString(_)) => {
                // ^U: rub out (or re-insert) the whole string argument
                self.iface.popup_clear();
                if self.modifier_enabled {
                    while matches!(self.machine.state, State::ExpectString(_))
                        && self.cmdline.rubout_len > 0
                    {
                        self.cmdline_insert(None)?;
                    }
                } else {
                    while !self.machine.expectstring.text().is_empty() {
                        self.cmdline_rubout();
                    }
                }
                Ok(())
            }

            b'\t' => self.tab_complete(),

            _ => {
                self.iface.popup_clear();
                self.cmdline_insert(Some(&[key]))
            }
        }
    }

    /// Rub out one committed character.
    pub fn cmdline_rubout(&mut self) {
        if self.cmdline.len == 0 {
            return;
        }
        self.cmdline.len -= 1;
        self.cmdline.rubout_len += 1;
        let pc = self.cmdline.len;
        self.rubout_to(pc);
        self.cmdline.pc = pc;
        self.machine.macro_pc = pc;
        trace!(target: "cmdline", pc, "rubout");
    }

    /// Insert into the command line and execute immediately. `None`
    /// re-inserts one byte from the rubout region.
    pub fn cmdline_insert(&mut self, src: Option<&[u8]>) -> Exec<()> {
        self.cmdline.pc = self.cmdline.len;
        self.machine.macro_pc = self.cmdline.len;

        match src {
            None => {
                if self.cmdline.rubout_len > 0 {
                    self.cmdline.len += 1;
                    self.cmdline.rubout_len -= 1;
                }
            }
            Some(src) => {
                let reusable = src.len() <= self.cmdline.rubout_len
                    && self.cmdline.rubout_region()[..src.len()] == *src;
                if reusable {
                    self.cmdline.len += src.len();
                    self.cmdline.rubout_len -= src.len();
                } else {
                    if self.cmdline.rubout_len > 0 {
                        // diverging from the rubbed-out text drops it and
                        // the immediate editing modifier
                        self.modifier_enabled = false;
                    }
                    self.cmdline.str.truncate(self.cmdline.len);
                    self.cmdline.str.append(src);
                    self.cmdline.len += src.len();
                    self.cmdline.rubout_len = 0;
                }
            }
        }

        self.cmdline_execute()
    }

    /// Parse and execute committed bytes one at a time, handling
    /// command-line replacement and replay errors.
    fn cmdline_execute(&mut self) -> Exec<()> {
        // (buffer, committed length, pc where replacement started)
        let mut old_cmdline: Option<(TecoString, usize, usize)> = None;

        while self.cmdline.pc < self.cmdline.len {
            let pc = self.cmdline.pc;
            self.undo.set_pc(pc + 1);
            match self.exec_cmdline_char(pc) {
                Ok(()) => {
                    self.cmdline.pc += 1;
                }
                Err(Interrupt::Replace(new_line)) => {
                    let prefix = {
                        let old = self.cmdline.committed();
                        let new = new_line.as_bytes();
                        old.iter().zip(new).take_while(|(a, b)| a == b).count()
                    };
                    trace!(target: "cmdline", prefix, "command line replacement");
                    self.rubout_to(prefix);
                    old_cmdline = Some((
                        std::mem::replace(&mut self.cmdline.str, new_line),
                        self.cmdline.len,
                        prefix,
                    ));
                    self.cmdline.len = self.cmdline.str.len();
                    self.cmdline.rubout_len = 0;
                    self.cmdline.pc = prefix;
                    self.machine.macro_pc = prefix;
                }
                Err(Interrupt::Error(e)) => {
                    if let Some((old_str, old_len, repl_pc)) = old_cmdline.take() {
                        // Error while replaying a replacement: reinstate the
                        // old command line and rub out the offending `}`.
                        self.iface.msg(MsgLevel::Error, e.short_message());
                        self.rubout_to(repl_pc);
                        self.cmdline.str = old_str;
                        self.cmdline.len = old_len;
                        self.cmdline.rubout_len = 0;
                        self.cmdline.pc = repl_pc;
                        self.machine.macro_pc = repl_pc;
                        self.cmdline.len -= 1;
                        self.cmdline.rubout_len += 1;
                        continue;
                    }
                    return Err(Interrupt::Error(e));
                }
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    /// Execute the parser up to and including the command-line byte at
    /// `pc`. Backward gotos rewind `macro_pc` and re-execute.
    fn exec_cmdline_char(&mut self, pc: usize) -> Exec<()> {
        loop {
            let mpc = self.machine.macro_pc;
            if mpc > pc {
                return Ok(());
            }
            let chr = self.cmdline.str.as_bytes()[mpc];
            self.machine.macro_pc = mpc + 1;
            self.machine_input(chr)?;
        }
    }

    fn machine_input(&mut self, chr: u8) -> Exec<()> {
        let mut machine = std::mem::take(&mut self.machine);
        let result = machine.input(self, chr);
        self.machine = machine;
        result
    }

    /// Commit point: the command line terminated normally.
    fn terminate_cmdline(&mut self) {
        debug_assert!(self.machine.state.is_start() || self.machine.state == State::EscapeSeen);
        self.last_cmdline = TecoString::from_bytes(self.cmdline.committed());
        self.cmdline = Cmdline::new();
        self.reset_after_termination();
    }

    // ---- word rub-out ---------------------------------------------------

    fn word_rubout(&mut self) -> Exec<()> {
        let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
        if self.modifier_enabled {
            let here = self.machine.state;
            while self.machine.state == here
                && self.cmdline.rubout_len > 0
                && !is_word(self.cmdline.str.as_bytes()[self.cmdline.len])
            {
                self.cmdline_insert(None)?;
            }
            while self.machine.state == here
                && self.cmdline.rubout_len > 0
                && is_word(self.cmdline.str.as_bytes()[self.cmdline.len])
            {
                self.cmdline_insert(None)?;
            }
            return Ok(());
        }
        while !self.machine.expectstring.text().is_empty()
            && !is_word(self.cmdline.str.as_bytes()[self.cmdline.len - 1])
        {
            self.cmdline_rubout();
        }
        while !self.machine.expectstring.text().is_empty()
            && is_word(self.cmdline.str.as_bytes()[self.cmdline.len - 1])
        {
            self.cmdline_rubout();
        }
        Ok(())
    }

    // ---- completion -----------------------------------------------------

    fn tab_complete(&mut self) -> Exec<()> {
        if self.iface.popup_is_shown() {
            // cycle through popup pages
            self.iface.popup_show();
            return Ok(());
        }

        let completion = match self.machine.state {
            State::ExpectQReg(_) => {
                let prefix = self.machine.qregspec.name().to_vec();
                let restrict = self.machine.qregspec.completion_restrict();
                let table = if self.machine.qregspec.is_local() {
                    &self.locals
                } else {
                    &self.globals
                };
                Some(table.auto_complete(&prefix, restrict))
            }
            State::ExpectString(cmd) => match cmd {
                StringCmd::Goto => {
                    let text = self.machine.expectstring.text().to_vec();
                    let start = TecoString::from_bytes(&text).last_occurrence(b",");
                    Some(self.machine.goto_table.auto_complete(&text[start..]))
                }
                StringCmd::Help => {
                    let text = self.machine.expectstring.text().to_vec();
                    Some(self.help.auto_complete(&text))
                }
                StringCmd::EsSymbols => {
                    let text = self.machine.expectstring.text().to_vec();
                    let start = TecoString::from_bytes(&text).last_occurrence(b",");
                    Some(self.symbols.auto_complete(&text[start..]))
                }
                StringCmd::EbFile | StringCmd::EwFile | StringCmd::EqFile | StringCmd::EpFile => {
                    let text = self.machine.expectstring.text().to_vec();
                    self.filename_complete(&text)
                }
                _ => {
                    if self.modifier_enabled {
                        // complete a filename embedded in the string
                        let text = self.machine.expectstring.text().to_vec();
                        let start =
                            TecoString::from_bytes(&text).last_occurrence(b" \t\x0b\r\n\x0c<>,;@");
                        self.filename_complete(&text[start..])
                    } else {
                        None
                    }
                }
            },
            _ => None,
        };

        match completion {
            Some(Completion::Unique { insert }) => self.cmdline_insert(Some(&insert)),
            Some(Completion::Ambiguous { insert, candidates }) => {
                for name in candidates {
                    let kind = if name.ends_with(b"/") {
                        PopupKind::Directory
                    } else {
                        PopupKind::Plain
                    };
                    self.iface.popup_add(kind, &name, false);
                }
                self.iface.popup_show();
                if insert.is_empty() {
                    Ok(())
                } else {
                    self.cmdline_insert(Some(&insert))
                }
            }
            Some(Completion::None) | None => Ok(()),
        }
    }

    fn filename_complete(&mut self, prefix: &[u8]) -> Option<Completion> {
        let prefix = String::from_utf8(prefix.to_vec()).ok()?;
        if file::is_pattern(&prefix) {
            return None;
        }
        let expanded = file::expand_path(&prefix);
        let dlen = file::dirname_len(&expanded);
        let (dirname, basename) = expanded.split_at(dlen);

        let mut candidates: Vec<Vec<u8>> = Vec::new();
        for name in file::list_dir(dirname).ok()? {
            if !name.starts_with(basename) {
                continue;
            }
            let full = format!("{dirname}{name}");
            if basename.is_empty() && !file::is_visible(&full) {
                continue;
            }
            let mut decorated = full.into_bytes();
            if file::is_dir(std::str::from_utf8(&decorated).unwrap_or_default()) {
                decorated.push(b'/');
            }
            candidates.push(decorated);
        }
        candidates.sort();

        match candidates.len() {
            0 => Some(Completion::None),
            1 => Some(Completion::Unique {
                insert: candidates[0][expanded.len()..].to_vec(),
            }),
            _ => {
                let first = candidates[0].clone();
                let mut lcp = first.len() - expanded.len();
                for c in &candidates[1..] {
                    let common = first[expanded.len()..]
                        .iter()
                        .zip(&c[expanded.len()..])
                        .take_while(|(a, b)| a == b)
                        .count();
                    lcp = lcp.min(common);
                }
                Some(Completion::Ambiguous {
                    insert: first[expanded.len()..expanded.len() + lcp].to_vec(),
                    candidates,
                })
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qreg::QRegSel;

    fn type_str(i: &mut Interp, s: &[u8]) {
        for &b in s {
            assert_eq!(i.keypress(b), KeyAction::Continue, "typing {:?}", b as char);
        }
    }

    #[test]
    fn typing_executes_incrementally() {
        let mut i = Interp::new_for_test();
        type_str(&mut i, b"Iabc\x1b");
        assert_eq!(i.view.get_all(), "abc");
        assert_eq!(i.cmdline.len, 5);
    }

    #[test]
    fn rubout_restores_prior_state() {
        let mut i = Interp::new_for_test();
        type_str(&mut i, b"Iabc\x1b");
        // rub out the escape and the 'c'
        i.keypress(0x08);
        i.keypress(0x08);
        assert_eq!(i.view.get_all(), "ab");
        assert_eq!(i.cmdline.committed(), b"Iab");
        assert_eq!(i.cmdline.rubout_region(), b"c\x1b");
    }

    #[test]
    fn reinsert_after_rubout() {
        let mut i = Interp::new_for_test();
        type_str(&mut i, b"Iabc\x1b");
        i.keypress(0x08);
        i.keypress(0x08);
        i.keypress(0x07); // enable modifier
        i.keypress(0x08); // re-insert 'c'
        i.keypress(0x08); // re-insert escape
        assert_eq!(i.view.get_all(), "abc");
        assert_eq!(i.cmdline.rubout_len, 0);
    }

    #[test]
    fn prefix_run_equivalence() {
        // running s then rubbing out the tail equals running the prefix
        let full = b"2UA QA 3+UA Ix\x1b";
        let prefix_len = 7; // "2UA QA "
        let mut a = Interp::new_for_test();
        type_str(&mut a, full);
        for _ in prefix_len..full.len() {
            a.keypress(0x08);
        }
        let mut b = Interp::new_for_test();
        type_str(&mut b, &full[..prefix_len]);
        assert_eq!(a.view.get_all(), b.view.get_all());
        assert_eq!(
            a.qreg_get_integer(&QRegSel::global(b"A")).unwrap(),
            b.qreg_get_integer(&QRegSel::global(b"A")).unwrap()
        );
        assert_eq!(a.cmdline.committed(), b.cmdline.committed());
    }

    #[test]
    fn error_moves_tail_into_rubout_region() {
        let mut i = Interp::new_for_test();
        type_str(&mut i, b"1/");
        // division by zero fails; the '0' is rubbed out again
        i.keypress(b'0');
        i.keypress(b'=');
        // "=" with the dangling division also fails; the committed line
        // stays consistent
        assert!(i.cmdline.committed().len() <= 3);
        // typing continues to work
        type_str(&mut i, b"");
    }

    #[test]
    fn double_escape_terminates_and_saves_last_cmdline() {
        let mut i = Interp::new_for_test();
        type_str(&mut i, b"Ihello\x1b\x1b\x1b");
        assert_eq!(i.cmdline.len, 0);
        assert_eq!(i.undo.depth(), 0);
        assert_eq!(i.view.get_all(), "hello");
        assert_eq!(i.last_cmdline.as_bytes(), b"Ihello\x1b\x1b\x1b");

        // *q at the start of the next command line saves it
        type_str(&mut i, b"*A");
        assert_eq!(
            i.qreg_get_string(&QRegSel::global(b"A")).unwrap(),
            b"Ihello\x1b\x1b\x1b"
        );
    }

    #[test]
    fn rollback_to_zero_restores_everything() {
        let mut i = Interp::new_for_test();
        type_str(&mut i, b"5UA Iword\x1b 2\"G Iyes\x1b '");
        while i.cmdline.len > 0 {
            i.keypress(0x08);
        }
        assert_eq!(i.view.get_all(), "");
        assert_eq!(i.qreg_get_integer(&QRegSel::global(b"A")).unwrap(), 0);
        assert_eq!(i.undo.depth(), 0);
        assert_eq!(i.args(), 0);
    }

    #[test]
    fn word_rubout_in_string_argument() {
        let mut i = Interp::new_for_test();
        type_str(&mut i, b"Ione two\x1b");
        i.keypress(0x08); // take back the terminator first
        i.keypress(0x17); // ^W rubs out "two"
        assert_eq!(i.view.get_all(), "one ");
        i.keypress(0x17); // ^W rubs out "one " as well
        assert_eq!(i.view.get_all(), "");
    }

    #[test]
    fn line_rubout_clears_string_argument() {
        let mut i = Interp::new_for_test();
        type_str(&mut i, b"Isome text here");
        i.keypress(0x15); // ^U
        assert_eq!(i.view.get_all(), "");
        // still inside the insert command
        assert!(matches!(i.machine.state, State::ExpectString(_)));
    }

    #[test]
    fn command_rubout_returns_to_start_state() {
        let mut i = Interp::new_for_test();
        type_str(&mut i, b"Iabc");
        i.keypress(0x17);
        i.keypress(0x17); // string then command
        assert!(i.machine.state.is_start());
        assert_eq!(i.view.get_all(), "");
    }

    #[test]
    fn command_line_replacement() {
        let mut i = Interp::new_for_test();
        // the M register computes 1+2, formats it into the buffer, copies
        // it into the replacement register, and replaces the command line
        type_str(&mut i, b"@\x15M/1+2\\ 0XB HK \x15\x1b^Q^EQB\x1b}/");
        assert_eq!(i.cmdline.rubout_len, 0);
        type_str(&mut i, b"MM");
        // the command line is now the macro's output ("3"), executed
        assert_eq!(i.cmdline.committed(), b"3");
        assert_eq!(i.pop_num_calc(0).unwrap(), 3);
    }

    #[test]
    fn fn_macro_with_default_close() {
        let mut i = Interp::new_for_test();
        assert_eq!(i.keypress_fn("CLOSE"), KeyAction::Quit);
        assert_eq!(i.keypress_fn("LEFT"), KeyAction::Continue);
    }

    #[test]
    fn fn_macro_executes_register() {
        let mut i = Interp::new_for_test();
        // ^FLEFT register types "Ix$"
        let mut name = vec![CTL_F];
        name.extend_from_slice(b"LEFT");
        let sel = QRegSel::global(&name);
        i.qreg_create(&sel);
        i.qreg_set_string(&sel, b"Ix\x1b").unwrap();
        assert_eq!(i.keypress_fn("LEFT"), KeyAction::Continue);
        assert_eq!(i.view.get_all(), "x");
    }

    #[test]
    fn fn_macro_mask_suppresses_in_state() {
        let mut i = Interp::new_for_test();
        let mut name = vec![CTL_F];
        name.extend_from_slice(b"LEFT");
        let sel = QRegSel::global(&name);
        i.qreg_create(&sel);
        i.qreg_set_string(&sel, b"Iy\x1b").unwrap();
        i.qreg_set_integer(&sel, 1).unwrap(); // masked in the start state
        assert_eq!(i.keypress_fn("LEFT"), KeyAction::Continue);
        assert_eq!(i.view.get_all(), "");
    }

    #[test]
    fn tab_completes_qreg_names() {
        let mut i = Interp::new_for_test();
        i.qreg_create(&QRegSel::global(b"label-one"));
        type_str(&mut i, b"Q[label-");
        i.keypress(b'\t');
        assert!(i.cmdline.committed().starts_with(b"Q[label-one"));
    }

    #[test]
    fn quit_via_ex_termination() {
        let mut i = Interp::new_for_test();
        type_str(&mut i, b"EX");
        assert_eq!(i.keypress(0x1b), KeyAction::Continue);
        assert_eq!(i.keypress(0x1b), KeyAction::Quit);
    }
}
