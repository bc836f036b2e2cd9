//! Q-Register store.
//!
//! A register is a named cell holding an integer and a document. Behavior
//! varies by storage kind; every kind overrides only the operations whose
//! semantics differ and falls through to the plain implementation for the
//! rest. Registers are addressed by [`QRegSel`] (table + name) so that undo
//! actions can re-resolve them on replay.

use core_string::{NameIndex, echo_bytes};
use core_view::{Doc, MsgLevel, env};
use tracing::trace;

use crate::error::{Error, Exec, Frame, Interrupt, add_frame};
use crate::{CurrentDoc, EdFlags, Int, Interp};

/// Storage variant of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QRegKind {
    Plain,
    /// `:`: integer is the cursor glyph position; setting it seeks.
    Dot,
    /// `^R`: numeric radix; rejects values below 2.
    Radix,
    /// `*`: integer is the current buffer id, string its filename.
    BufferInfo,
    /// `$`: string is the process working directory.
    WorkingDir,
    /// `~`, `~C`, `~P`, `~S`: string maps to a system clipboard.
    Clipboard,
}

#[derive(Debug)]
pub struct QReg {
    pub kind: QRegKind,
    pub integer: Int,
    pub doc: Doc,
    pub must_undo: bool,
}

impl QReg {
    fn new(kind: QRegKind) -> Self {
        Self {
            kind,
            integer: 0,
            doc: Doc::new(),
            must_undo: true,
        }
    }
}

/// Register address: which table, which name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QRegSel {
    pub local: bool,
    pub name: Vec<u8>,
}

impl QRegSel {
    pub fn global(name: &[u8]) -> Self {
        Self {
            local: false,
            name: name.to_vec(),
        }
    }

    pub fn local(name: &[u8]) -> Self {
        Self {
            local: true,
            name: name.to_vec(),
        }
    }

    pub fn display(&self) -> String {
        format!(
            "{}{}",
            if self.local { "." } else { "" },
            echo_bytes(&self.name)
        )
    }
}

/// Ordered register table with the fixed single-letter alphabet
/// pre-populated.
pub struct QRegTable {
    index: NameIndex<QReg>,
    pub must_undo: bool,
}

/// Name of the radix register (`^R`).
pub const RADIX_REG: &[u8] = b"\x12";
/// Name of the search mode register (`^X`).
pub const SEARCH_MODE_REG: &[u8] = b"\x18";
/// Name of the search result register.
pub const SEARCH_REG: &[u8] = b"_";
/// Name of the command-line replacement register (control escape).
pub const CMDLINE_REG: &[u8] = b"\x1b";

impl QRegTable {
    fn new(must_undo: bool) -> Self {
        let mut table = Self {
            index: NameIndex::new(true),
            must_undo,
        };
        for q in b'A'..=b'Z' {
            table.index.insert_unique(&[q], QReg::new(QRegKind::Plain));
        }
        for q in b'0'..=b'9' {
            table.index.insert_unique(&[q], QReg::new(QRegKind::Plain));
        }
        table
    }

    pub fn new_globals() -> Self {
        let mut table = Self::new(true);
        table.index.insert_unique(b":", QReg::new(QRegKind::Dot));
        table
            .index
            .insert_unique(b"*", QReg::new(QRegKind::BufferInfo));
        table
            .index
            .insert_unique(b"$", QReg::new(QRegKind::WorkingDir));
        let mut clip = QReg::new(QRegKind::Clipboard);
        clip.integer = 'C' as Int;
        table.index.insert_unique(b"~", clip);
        for name in [b"~C".as_slice(), b"~P", b"~S"] {
            table
                .index
                .insert_unique(name, QReg::new(QRegKind::Clipboard));
        }
        table.index.insert_unique(SEARCH_REG, QReg::new(QRegKind::Plain));
        table
            .index
            .insert_unique(CMDLINE_REG, QReg::new(QRegKind::Plain));
        table
    }

    pub fn new_locals(must_undo: bool) -> Self {
        let mut table = Self::new(must_undo);
        let mut radix = QReg::new(QRegKind::Radix);
        radix.integer = 10;
        table.index.insert_unique(RADIX_REG, radix);
        table
            .index
            .insert_unique(SEARCH_MODE_REG, QReg::new(QRegKind::Plain));
        table
    }

    pub fn get(&self, name: &[u8]) -> Option<&QReg> {
        self.index.find(name)
    }

    pub fn get_mut(&mut self, name: &[u8]) -> Option<&mut QReg> {
        self.index.find_mut(name)
    }

    pub fn insert_unique(&mut self, name: &[u8], reg: QReg) -> bool {
        self.index.insert_unique(name, reg)
    }

    pub fn remove(&mut self, name: &[u8]) -> Option<QReg> {
        self.index.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &[u8]> {
        self.index.iter().map(|(n, _)| n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &QReg)> {
        self.index.iter()
    }

    pub fn auto_complete(
        &self,
        prefix: &[u8],
        restrict_len: usize,
    ) -> core_string::Completion {
        self.index.auto_complete(prefix, restrict_len)
    }
}

/// One `[q` stack entry: a snapshot of a register's contents.
#[derive(Debug)]
pub struct QRegStackEntry {
    pub integer: Int,
    pub doc: Doc,
}

/// ED hook events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdHookType {
    Add = 1,
    Edit = 2,
    Close = 3,
    Quit = 4,
}

impl EdHookType {
    pub fn name(self) -> &'static str {
        match self {
            EdHookType::Add => "ADD",
            EdHookType::Edit => "EDIT",
            EdHookType::Close => "CLOSE",
            EdHookType::Quit => "QUIT",
        }
    }
}

impl Interp {
    fn table(&self, local: bool) -> &QRegTable {
        if local { &self.locals } else { &self.globals }
    }

    fn table_mut(&mut self, local: bool) -> &mut QRegTable {
        if local { &mut self.locals } else { &mut self.globals }
    }

    pub fn qreg_exists(&self, sel: &QRegSel) -> bool {
        self.table(sel.local).get(&sel.name).is_some()
    }

    fn qreg(&self, sel: &QRegSel) -> Result<&QReg, Error> {
        self.table(sel.local)
            .get(&sel.name)
            .ok_or_else(|| Error::invalid_qreg(&sel.name, sel.local))
    }

    fn qreg_mut(&mut self, sel: &QRegSel) -> Result<&mut QReg, Error> {
        self.table_mut(sel.local)
            .get_mut(&sel.name)
            .ok_or_else(|| Error::invalid_qreg(&sel.name, sel.local))
    }

    /// Create a plain register if absent, registering its removal on the
    /// undo log (the `OPTIONAL_INIT` mode of the spec machine).
    pub fn qreg_create(&mut self, sel: &QRegSel) {
        if self.qreg_exists(sel) {
            return;
        }
        self.table_mut(sel.local)
            .insert_unique(&sel.name, QReg::new(QRegKind::Plain));
        if self.table(sel.local).must_undo {
            let sel = sel.clone();
            self.undo.push(move |i: &mut Interp| {
                i.table_mut(sel.local).remove(&sel.name);
            });
        }
    }

    fn reg_must_undo(&self, sel: &QRegSel) -> bool {
        self.table(sel.local).must_undo
            && self.qreg(sel).map(|r| r.must_undo).unwrap_or(false)
    }

    fn is_current(&self, sel: &QRegSel) -> bool {
        matches!(&self.current_doc, CurrentDoc::QReg(cur) if cur == sel)
    }

    // ---- integer cell ---------------------------------------------------

    pub fn qreg_get_integer(&mut self, sel: &QRegSel) -> Result<Int, Error> {
        match self.qreg(sel)?.kind {
            QRegKind::Dot => Ok(self.view.bytes_to_glyphs(self.view.dot()) as Int),
            QRegKind::BufferInfo => Ok(self.ring.current_id() as Int),
            _ => Ok(self.qreg(sel)?.integer),
        }
    }

    pub fn qreg_set_integer(&mut self, sel: &QRegSel, value: Int) -> Result<(), Error> {
        match self.qreg(sel)?.kind {
            QRegKind::Dot => {
                let pos = self.view.glyphs_to_bytes(value).ok_or_else(|| {
                    Error::moved("Attempt to move pointer off page when setting Q-Register \":\"")
                })?;
                self.view.goto_pos(pos).map_err(|_| {
                    Error::moved("Attempt to move pointer off page when setting Q-Register \":\"")
                })
            }
            QRegKind::Radix => {
                if value < 2 {
                    return Err(Error::failed("Invalid radix"));
                }
                self.qreg_mut(sel)?.integer = value;
                Ok(())
            }
            QRegKind::BufferInfo => self.ring_edit(value),
            _ => {
                self.qreg_mut(sel)?.integer = value;
                Ok(())
            }
        }
    }

    pub fn qreg_undo_set_integer(&mut self, sel: &QRegSel) -> Result<(), Error> {
        match self.qreg(sel)?.kind {
            QRegKind::Dot => {
                let dot = self.view.dot();
                self.undo.push(move |i: &mut Interp| {
                    let _ = i.view.goto_pos(dot);
                });
            }
            QRegKind::BufferInfo => {
                let prev = self.current_doc.clone();
                self.undo.push(move |i: &mut Interp| i.remount(prev));
            }
            _ => {
                if self.reg_must_undo(sel) {
                    let sel = sel.clone();
                    let old = self.qreg(&sel)?.integer;
                    self.undo.push(move |i: &mut Interp| {
                        if let Ok(reg) = i.qreg_mut(&sel) {
                            reg.integer = old;
                        }
                    });
                }
            }
        }
        Ok(())
    }

    // ---- string cell ----------------------------------------------------

    pub fn qreg_get_string(&mut self, sel: &QRegSel) -> Result<Vec<u8>, Error> {
        match self.qreg(sel)?.kind {
            QRegKind::BufferInfo => Ok(self.ring.current_filename_normalized().into_bytes()),
            QRegKind::WorkingDir => Ok(env::current_dir_normalized().into_bytes()),
            QRegKind::Clipboard => {
                let name = self.clipboard_name(sel)?;
                self.iface
                    .get_clipboard(&name)
                    .map_err(|e| Error::failed(e.to_string()))
            }
            _ => {
                if self.is_current(sel) {
                    Ok(self.view.get_all().into_bytes())
                } else {
                    Ok(self.qreg(sel)?.doc.text().as_bytes().to_vec())
                }
            }
        }
    }

    pub fn qreg_set_string(&mut self, sel: &QRegSel, value: &[u8]) -> Result<(), Error> {
        match self.qreg(sel)?.kind {
            QRegKind::BufferInfo => Err(self.unsupported_op(sel)),
            QRegKind::WorkingDir => {
                if value.contains(&0) {
                    return Err(Error::failed("Directory contains null-character"));
                }
                let dir = String::from_utf8(value.to_vec())
                    .map_err(|_| Error::failed("Directory is not valid UTF-8"))?;
                env::chdir(&dir).map_err(|_| {
                    Error::failed(format!("Cannot change working directory to \"{dir}\""))
                })
            }
            QRegKind::Clipboard => {
                let name = self.clipboard_name(sel)?;
                self.iface
                    .set_clipboard(&name, value)
                    .map_err(|e| Error::failed(e.to_string()))
            }
            _ => {
                let text = utf8(value)?;
                if self.is_current(sel) {
                    self.view.set_text(&text);
                } else {
                    self.qreg_mut(sel)?.doc.set_text(&text);
                }
                Ok(())
            }
        }
    }

    pub fn qreg_undo_set_string(&mut self, sel: &QRegSel) -> Result<(), Error> {
        match self.qreg(sel)?.kind {
            QRegKind::BufferInfo => Ok(()),
            QRegKind::WorkingDir => {
                let cwd = env::current_dir_normalized();
                self.undo.push(move |_i: &mut Interp| {
                    let _ = env::chdir(&cwd);
                });
                Ok(())
            }
            QRegKind::Clipboard => {
                let name = self.clipboard_name(sel)?;
                let old = self
                    .iface
                    .get_clipboard(&name)
                    .map_err(|e| Error::failed(e.to_string()))?;
                self.undo.push(move |i: &mut Interp| {
                    let _ = i.iface.set_clipboard(&name, &old);
                });
                Ok(())
            }
            _ => {
                if self.reg_must_undo(sel) {
                    let sel = sel.clone();
                    let old = self.qreg_get_string(&sel)?;
                    self.undo.push(move |i: &mut Interp| {
                        let _ = i.qreg_set_string(&sel, &old);
                    });
                }
                Ok(())
            }
        }
    }

    /// Append to the string cell. Never touches the undo log for an empty
    /// slice (prevents pathological undo growth during character-at-a-time
    /// input).
    pub fn qreg_append_string(&mut self, sel: &QRegSel, value: &[u8]) -> Result<(), Error> {
        if value.is_empty() {
            return Ok(());
        }
        match self.qreg(sel)?.kind {
            QRegKind::Plain | QRegKind::Dot | QRegKind::Radix => {
                let text = utf8(value)?;
                if self.reg_must_undo(sel) {
                    let sel_u = sel.clone();
                    let old_len = if self.is_current(sel) {
                        self.view.len_bytes()
                    } else {
                        self.qreg(sel)?.doc.text().len()
                    };
                    self.undo.push(move |i: &mut Interp| {
                        if i.is_current(&sel_u) {
                            let len = i.view.len_bytes();
                            i.view.delete_range(old_len.min(len), len);
                        } else if let Ok(reg) = i.qreg_mut(&sel_u) {
                            let truncated =
                                reg.doc.text()[..old_len.min(reg.doc.text().len())].to_owned();
                            reg.doc.set_text(&truncated);
                        }
                    });
                }
                if self.is_current(sel) {
                    let end = self.view.len_bytes();
                    let _ = self.view.goto_pos(end);
                    self.view.insert(&text);
                } else {
                    let reg = self.qreg_mut(sel)?;
                    let mut s = reg.doc.text().to_owned();
                    s.push_str(&text);
                    reg.doc.set_text(&s);
                }
                Ok(())
            }
            // external storage: read-concatenate-write
            _ => {
                self.qreg_undo_set_string(sel)?;
                let mut buf = self.qreg_get_string(sel)?;
                buf.extend_from_slice(value);
                self.qreg_set_string(sel, &buf)
            }
        }
    }

    /// Character code at a glyph position, or -1 when out of range.
    pub fn qreg_get_character(&mut self, sel: &QRegSel, position: Int) -> Result<Int, Error> {
        let bytes = self.qreg_get_string(sel)?;
        let text = utf8(&bytes)?;
        if position < 0 {
            return Ok(-1);
        }
        Ok(text
            .chars()
            .nth(position as usize)
            .map(|c| c as Int)
            .unwrap_or(-1))
    }

    /// String length in glyphs.
    pub fn qreg_get_length(&mut self, sel: &QRegSel) -> Result<Int, Error> {
        let bytes = self.qreg_get_string(sel)?;
        Ok(utf8(&bytes)?.chars().count() as Int)
    }

    fn clipboard_name(&self, sel: &QRegSel) -> Result<String, Error> {
        debug_assert!(!sel.name.is_empty() && sel.name[0] == b'~');
        if sel.name.len() > 1 {
            return Ok(String::from_utf8_lossy(&sel.name[1..]).into_owned());
        }
        // The bare "~" register's integer selects the default clipboard.
        let reg = self.qreg(sel)?;
        let letter = u32::try_from(reg.integer)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or(if self.ed.contains(EdFlags::CLIP_PRIMARY) {
                'P'
            } else {
                'C'
            });
        Ok(letter.to_string())
    }

    fn unsupported_op(&self, sel: &QRegSel) -> Error {
        Error::failed(format!(
            "Unsupported operation on Q-Register \"{}\"",
            sel.display()
        ))
    }

    // ---- editing --------------------------------------------------------

    /// Mount a register's document in the view, with undo restoring the
    /// previous binding.
    pub fn qreg_edit(&mut self, sel: &QRegSel) -> Result<(), Error> {
        self.qreg(sel)?;
        let prev = self.current_doc.clone();
        self.undo.push(move |i: &mut Interp| i.remount(prev));
        self.mount(CurrentDoc::QReg(sel.clone()));
        let name = sel.display();
        self.iface.info_update(&name);
        trace!(target: "interp.qreg", reg = %name, "edit");
        Ok(())
    }

    /// Undo action target: park whatever is mounted and remount `prev`.
    pub(crate) fn remount(&mut self, prev: CurrentDoc) {
        self.mount(prev);
        let name = match &self.current_doc {
            CurrentDoc::Buffer(id) => self.ring.filename_of(*id).unwrap_or_default(),
            CurrentDoc::QReg(sel) => sel.display(),
        };
        self.iface.info_update(&name);
    }

    // ---- push/pop stack -------------------------------------------------

    pub fn qreg_stack_push(&mut self, sel: &QRegSel) -> Result<(), Error> {
        let integer = self.qreg_get_integer(sel)?;
        let string = self.qreg_get_string(sel)?;
        let mut doc = Doc::new();
        doc.set_text(&utf8(&string)?);
        self.qreg_stack.push(QRegStackEntry { integer, doc });
        self.undo.push(|i: &mut Interp| {
            i.qreg_stack.pop();
        });
        Ok(())
    }

    pub fn qreg_stack_pop(&mut self, sel: &QRegSel) -> Result<(), Error> {
        let Some(mut entry) = self.qreg_stack.pop() else {
            return Err(Error::failed("Q-Register stack empty"));
        };
        self.qreg_undo_set_integer(sel)?;
        self.qreg_set_integer(sel, entry.integer)?;

        // Exchange documents; the entry then owns the register's old
        // contents and ownership passes to the undo log.
        self.qreg_exchange_doc(sel, &mut entry.doc)?;
        let sel_u = sel.clone();
        self.undo.push(move |i: &mut Interp| {
            let mut entry = entry;
            let _ = i.qreg_exchange_doc(&sel_u, &mut entry.doc);
            i.qreg_stack.push(entry);
        });
        Ok(())
    }

    pub fn qreg_stack_depth(&self) -> usize {
        self.qreg_stack.len()
    }

    /// Swap a register's document with another document, respecting the
    /// storage kind.
    fn qreg_exchange_doc(&mut self, sel: &QRegSel, other: &mut Doc) -> Result<(), Error> {
        match self.qreg(sel)?.kind {
            QRegKind::WorkingDir | QRegKind::Clipboard => {
                let own = self.qreg_get_string(sel)?;
                let other_text = other.text().as_bytes().to_vec();
                self.qreg_set_string(sel, &other_text)?;
                other.set_text(&utf8(&own)?);
                Ok(())
            }
            _ => {
                let was_current = self.is_current(sel);
                if was_current {
                    self.park_current();
                }
                self.qreg_mut(sel)?.doc.exchange(other);
                if was_current {
                    let mut doc = std::mem::take(&mut self.qreg_mut(sel)?.doc);
                    doc.mount(&mut self.view);
                }
                Ok(())
            }
        }
    }

    // ---- radix ----------------------------------------------------------

    /// Current numeric radix (the `^R` register of the innermost frame).
    pub fn current_radix(&self) -> Int {
        self.locals.get(RADIX_REG).map(|r| r.integer).unwrap_or(10)
    }

    pub fn set_radix(&mut self, value: Int) -> Result<(), Error> {
        let sel = QRegSel::local(RADIX_REG);
        self.qreg_undo_set_integer(&sel)?;
        self.qreg_set_integer(&sel, value)
    }

    // ---- macro execution ------------------------------------------------

    /// Execute a register's string as a macro (the `M` command). Without
    /// `colon`, the macro runs in a fresh local table that is freed
    /// afterwards.
    pub fn qreg_exec_macro(&mut self, sel: &QRegSel, colon: bool) -> Exec<()> {
        let code = self.qreg_get_string(sel)?;
        let result = if colon {
            self.execute_macro(&code)
        } else {
            self.execute_macro_with_locals(&code, QRegTable::new_locals(false))
        };
        result.map_err(|e| {
            add_frame(
                e,
                Frame::QReg {
                    name: sel.display(),
                },
            )
        })
    }

    // ---- ED hooks -------------------------------------------------------

    /// Invoke the ED hook macro for an event, isolated in a fresh brace
    /// scope and a fresh local table.
    pub fn ed_hook(&mut self, hook: EdHookType) -> Exec<()> {
        if !self.ed.contains(EdFlags::HOOKS) {
            return Ok(());
        }
        self.ed_hook_inner(hook)
            .map_err(|e| add_frame(e, Frame::EdHook { name: hook.name() }))
    }

    fn ed_hook_inner(&mut self, hook: EdHookType) -> Exec<()> {
        let sel = QRegSel::global(b"ED");
        if !self.qreg_exists(&sel) {
            return Err(Error::failed("Undefined ED-hook register (\"ED\")").into());
        }

        // The hook must see exactly one argument (the hook type) and must
        // not leak arguments back into the surrounding expression.
        self.brace_open();
        self.push_int(hook as Int);

        let code = self.qreg_get_string(&sel)?;
        self.execute_macro_with_locals(&code, QRegTable::new_locals(false))?;

        self.discard_args().map_err(Interrupt::from)?;
        self.brace_close().map_err(Interrupt::from)?;
        Ok(())
    }

    // ---- environment ----------------------------------------------------

    /// Import `NAME=VALUE` pairs as `$NAME` registers. Only safe at
    /// startup.
    pub fn environ_import(&mut self, environ: &[(String, String)]) -> Result<(), Error> {
        for (name, value) in environ {
            let mut reg_name = Vec::with_capacity(name.len() + 1);
            reg_name.push(b'$');
            reg_name.extend_from_slice(name.as_bytes());
            let sel = QRegSel::global(&reg_name);
            if !self.qreg_exists(&sel) {
                self.globals
                    .insert_unique(&reg_name, QReg::new(QRegKind::Plain));
            }
            self.qreg_set_string(&sel, value.as_bytes())?;
        }
        Ok(())
    }

    /// Export environment registers as `NAME=VALUE` strings, skipping the
    /// bare `$` register and names unusable as environment variables.
    pub fn environ_export(&mut self) -> Result<Vec<String>, Error> {
        let names: Vec<Vec<u8>> = self
            .globals
            .names()
            .filter(|n| n.first() == Some(&b'$'))
            .map(|n| n.to_vec())
            .collect();
        let mut out = Vec::new();
        for name in names {
            if name.len() == 1 || name.contains(&b'=') || name.contains(&0) {
                continue;
            }
            let sel = QRegSel::global(&name);
            let value = self.qreg_get_string(&sel)?;
            if value.contains(&0) {
                return Err(Error::failed(format!(
                    "Environment register \"{}\" must not contain null characters",
                    echo_bytes(&name)
                )));
            }
            out.push(format!(
                "{}={}",
                String::from_utf8_lossy(&name[1..]),
                String::from_utf8_lossy(&value)
            ));
        }
        Ok(out)
    }

    /// Warn helper used by goto label redefinition and others.
    pub(crate) fn warn(&mut self, text: &str) {
        self.iface.msg(MsgLevel::Warning, text);
    }
}

fn utf8(bytes: &[u8]) -> Result<String, Error> {
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::failed("String is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Interp;

    fn interp() -> Interp {
        Interp::new_for_test()
    }

    #[test]
    fn plain_integer_round_trip_with_undo() {
        let mut i = interp();
        let sel = QRegSel::global(b"A");
        i.undo.set_pc(1);
        i.qreg_undo_set_integer(&sel).unwrap();
        i.qreg_set_integer(&sel, 42).unwrap();
        assert_eq!(i.qreg_get_integer(&sel).unwrap(), 42);
        i.rubout_to(0);
        assert_eq!(i.qreg_get_integer(&sel).unwrap(), 0);
    }

    #[test]
    fn string_set_and_append() {
        let mut i = interp();
        let sel = QRegSel::global(b"B");
        i.qreg_set_string(&sel, b"hi").unwrap();
        i.qreg_append_string(&sel, b" there").unwrap();
        assert_eq!(i.qreg_get_string(&sel).unwrap(), b"hi there");
        assert_eq!(i.qreg_get_length(&sel).unwrap(), 8);
        assert_eq!(i.qreg_get_character(&sel, 0).unwrap(), 'h' as Int);
        assert_eq!(i.qreg_get_character(&sel, 99).unwrap(), -1);
        assert_eq!(i.qreg_get_character(&sel, -1).unwrap(), -1);
    }

    #[test]
    fn empty_append_pushes_no_undo() {
        let mut i = interp();
        let sel = QRegSel::global(b"C");
        i.undo.set_pc(1);
        let depth = i.undo.depth();
        i.qreg_append_string(&sel, b"").unwrap();
        assert_eq!(i.undo.depth(), depth);
    }

    #[test]
    fn radix_rejects_low_values() {
        let mut i = interp();
        assert!(i.set_radix(1).is_err());
        assert!(i.set_radix(0).is_err());
        assert_eq!(i.current_radix(), 10);
        i.set_radix(16).unwrap();
        assert_eq!(i.current_radix(), 16);
    }

    #[test]
    fn radix_undo_restores_value() {
        let mut i = interp();
        i.undo.set_pc(1);
        i.set_radix(8).unwrap();
        i.rubout_to(0);
        assert_eq!(i.current_radix(), 10);
    }

    #[test]
    fn dot_register_tracks_cursor() {
        let mut i = interp();
        i.view.insert("hello");
        let sel = QRegSel::global(b":");
        assert_eq!(i.qreg_get_integer(&sel).unwrap(), 5);
        i.qreg_set_integer(&sel, 2).unwrap();
        assert_eq!(i.view.dot(), 2);
        assert!(matches!(
            i.qreg_set_integer(&sel, 99),
            Err(Error {
                kind: crate::ErrorKind::Move,
                ..
            })
        ));
    }

    #[test]
    fn stack_push_pop_round_trip() {
        let mut i = interp();
        let a = QRegSel::global(b"A");
        let b = QRegSel::global(b"B");
        i.qreg_set_integer(&a, 7).unwrap();
        i.qreg_set_string(&a, b"alpha").unwrap();
        i.qreg_stack_push(&a).unwrap();
        i.qreg_stack_pop(&b).unwrap();
        assert_eq!(i.qreg_get_integer(&b).unwrap(), 7);
        assert_eq!(i.qreg_get_string(&b).unwrap(), b"alpha");
        assert!(i.qreg_stack_pop(&b).is_err());
    }

    #[test]
    fn stack_pop_undo_restores_both_sides() {
        let mut i = interp();
        let a = QRegSel::global(b"A");
        let b = QRegSel::global(b"B");
        i.qreg_set_string(&a, b"from-a").unwrap();
        i.qreg_set_string(&b, b"old-b").unwrap();
        i.qreg_set_integer(&b, 1).unwrap();
        i.qreg_stack_push(&a).unwrap();

        i.undo.set_pc(1);
        i.qreg_stack_pop(&b).unwrap();
        assert_eq!(i.qreg_get_string(&b).unwrap(), b"from-a");
        assert_eq!(i.qreg_stack_depth(), 0);

        i.rubout_to(0);
        assert_eq!(i.qreg_get_string(&b).unwrap(), b"old-b");
        assert_eq!(i.qreg_get_integer(&b).unwrap(), 1);
        assert_eq!(i.qreg_stack_depth(), 1);
    }

    #[test]
    fn clipboard_register_goes_through_interface() {
        let mut i = interp();
        let sel = QRegSel::global(b"~C");
        i.qreg_set_string(&sel, b"clip").unwrap();
        assert_eq!(i.qreg_get_string(&sel).unwrap(), b"clip");
    }

    #[test]
    fn bufferinfo_rejects_set_string() {
        let mut i = interp();
        let sel = QRegSel::global(b"*");
        assert!(i.qreg_set_string(&sel, b"x").is_err());
        assert!(i.qreg_append_string(&sel, b"x").is_err());
    }

    #[test]
    fn environ_import_export_round_trip() {
        let mut i = interp();
        i.environ_import(&[
            ("HOME".into(), "/home/u".into()),
            ("TERM".into(), "dumb".into()),
        ])
        .unwrap();
        assert_eq!(
            i.qreg_get_string(&QRegSel::global(b"$HOME")).unwrap(),
            b"/home/u"
        );
        let exported = i.environ_export().unwrap();
        assert!(exported.contains(&"HOME=/home/u".to_owned()));
        assert!(exported.contains(&"TERM=dumb".to_owned()));
        // the bare "$" working directory register is not exported
        assert!(!exported.iter().any(|e| e.starts_with('=')));
    }

    #[test]
    fn ed_hook_requires_register() {
        let mut i = interp();
        i.ed |= EdFlags::HOOKS;
        let err = i.ed_hook(EdHookType::Add).unwrap_err();
        match err {
            Interrupt::Error(e) => {
                assert!(e.msg.contains("ED-hook"));
                assert!(e.frames.contains(&Frame::EdHook { name: "ADD" }));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn ed_hook_disabled_without_flag() {
        let mut i = interp();
        i.ed.remove(EdFlags::HOOKS);
        assert!(i.ed_hook(EdHookType::Quit).is_ok());
    }

    #[test]
    fn qreg_create_is_undoable() {
        let mut i = interp();
        let sel = QRegSel::global(b"[new]");
        i.undo.set_pc(1);
        i.qreg_create(&sel);
        assert!(i.qreg_exists(&sel));
        i.rubout_to(0);
        assert!(!i.qreg_exists(&sel));
    }
}
