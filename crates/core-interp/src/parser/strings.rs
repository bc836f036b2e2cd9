//! String-argument collection.
//!
//! All string-expecting states share this machinery: the default delimiter
//! is escape, an `@`-modified command takes the next character as delimiter
//! instead (a `{` delimiter closes with a balanced `}`), and string building
//! runs over the collected bytes. Completion of the argument dispatches to
//! the command-specific handler.

use core_string::TecoString;

use crate::error::{Error, Exec};
use crate::parser::{ESC, Machine, State, StringCmd};
use crate::stringbuilding::StringBuildMachine;
use crate::{Interp, search};

#[derive(Clone, Default)]
pub struct ExpectString {
    pub(crate) text: TecoString,
    /// 0 until determined; escape unless `@`-modified.
    delimiter: u8,
    at_mod: bool,
    nesting: u32,
    build: bool,
    /// Bytes of `text` already delivered to a live consumer (the insert
    /// command feeds the buffer as the user types).
    inserted: usize,
    sb: StringBuildMachine,
}

impl ExpectString {
    pub fn new() -> Self {
        Self {
            build: true,
            ..Self::default()
        }
    }

    /// Bytes collected so far (for completion and word rub-out).
    pub fn text(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

/// Enter a string-expecting state for `cmd`.
pub(super) fn begin(m: &mut Machine, i: &mut Interp, cmd: StringCmd) -> Result<(), Error> {
    if m.must_undo {
        let old = std::mem::replace(&mut m.expectstring, ExpectString::new());
        i.undo
            .push(move |i: &mut Interp| i.machine.expectstring = old);
    } else {
        m.expectstring = ExpectString::new();
    }
    m.expectstring.at_mod = m.at_mod;
    m.at_mod = false;

    if matches!(cmd, StringCmd::Search | StringCmd::SearchAll) && m.mode.executing() {
        search::begin(m, i, cmd == StringCmd::SearchAll)?;
    }
    m.state = State::ExpectString(cmd);
    Ok(())
}

pub(super) fn input(m: &mut Machine, i: &mut Interp, chr: u8, cmd: StringCmd) -> Exec<()> {
    if m.must_undo {
        let len = m.expectstring.text.len();
        let sb = m.expectstring.sb.clone();
        let delimiter = m.expectstring.delimiter;
        let nesting = m.expectstring.nesting;
        let inserted = m.expectstring.inserted;
        i.undo.push(move |i: &mut Interp| {
            let es = &mut i.machine.expectstring;
            es.text.truncate(len.min(es.text.len()));
            es.sb = sb;
            es.delimiter = delimiter;
            es.nesting = nesting;
            es.inserted = inserted;
        });
    }

    {
        let es = &mut m.expectstring;
        if es.at_mod && es.delimiter == 0 {
            es.delimiter = chr;
            if chr == b'{' {
                es.nesting = 1;
            }
            return Ok(());
        }
    }

    let delimiter = if m.expectstring.delimiter == 0 {
        ESC
    } else {
        m.expectstring.delimiter
    };

    if m.expectstring.sb.is_start() {
        if delimiter == b'{' {
            match chr {
                b'{' => m.expectstring.nesting += 1,
                b'}' => {
                    m.expectstring.nesting -= 1;
                    if m.expectstring.nesting == 0 {
                        return finish(m, i, cmd);
                    }
                }
                _ => {}
            }
        } else if chr == delimiter {
            return finish(m, i, cmd);
        }
    }

    let executing = m.mode.executing();
    {
        let es = &mut m.expectstring;
        if es.build {
            let target = if executing { Some(&mut es.text) } else { None };
            es.sb.input(i, chr, target)?;
        } else if executing {
            es.text.push_byte(chr);
        }
    }

    if executing {
        match cmd {
            StringCmd::Search | StringCmd::SearchAll => search::interim(m, i)?,
            // insertion happens live, as the user types
            StringCmd::Insert => flush_insert(m, i)?,
            _ => {}
        }
    }
    Ok(())
}

/// Insert the not-yet-delivered complete UTF-8 prefix of the collected
/// string into the buffer (partial multi-byte sequences stay pending).
fn flush_insert(m: &mut Machine, i: &mut Interp) -> Result<(), Error> {
    let es = &mut m.expectstring;
    let pending = &es.text.as_bytes()[es.inserted..];
    if pending.is_empty() {
        return Ok(());
    }
    let valid_len = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => return Err(Error::failed("String argument is not valid UTF-8")),
    };
    if valid_len == 0 {
        return Ok(());
    }
    let chunk = std::str::from_utf8(&pending[..valid_len])
        .expect("validated prefix")
        .to_owned();
    es.inserted += valid_len;
    i.insert_at_dot(&chunk);
    Ok(())
}

fn finish(m: &mut Machine, i: &mut Interp, cmd: StringCmd) -> Exec<()> {
    let text = m.expectstring.text.take();
    let inserted = std::mem::take(&mut m.expectstring.inserted);
    m.state = State::Start;
    let colon = std::mem::take(&mut m.colon) > 0;
    if m.must_undo {
        // rubbing out the terminator reopens the argument with its text
        let snap = text.clone();
        i.undo.push(move |i: &mut Interp| {
            let es = &mut i.machine.expectstring;
            es.text = snap;
            es.inserted = inserted;
        });
    }
    if !m.mode.executing() {
        return Ok(());
    }

    match cmd {
        StringCmd::Insert => {
            if text.is_empty() {
                i.eval(false)?;
                let mut codes = Vec::new();
                while i.args() > 0 {
                    codes.push(i.pop_num(0));
                }
                codes.reverse();
                let mut s = String::new();
                for code in codes {
                    let chr = u32::try_from(code)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| Error::failed("Invalid character code for insertion"))?;
                    s.push(chr);
                }
                i.insert_at_dot(&s);
            } else if inserted < text.len() {
                // flush whatever the live path could not deliver
                i.insert_at_dot(&utf8(&TecoString::from_bytes(&text.as_bytes()[inserted..]))?);
            }
            Ok(())
        }

        StringCmd::CtlU => {
            let sel = take_pending_qreg(m, i)?;
            if colon {
                i.qreg_append_string(&sel, text.as_bytes())?;
            } else {
                i.qreg_undo_set_string(&sel)?;
                i.qreg_set_string(&sel, text.as_bytes())?;
            }
            Ok(())
        }

        StringCmd::Goto => {
            let value = i.pop_num_calc(1)?;
            m.goto_label_list(i, text.as_bytes(), value)?;
            Ok(())
        }

        StringCmd::EbFile => i.buffer_open(&utf8(&text)?),
        StringCmd::EwFile => {
            i.buffer_save(&utf8(&text)?)?;
            Ok(())
        }

        StringCmd::EqFile => {
            let sel = take_pending_qreg(m, i)?;
            let path = utf8(&text)?;
            if path.is_empty() {
                // no filename: mount the register itself for editing
                i.qreg_edit(&sel)?;
                return Ok(());
            }
            if path.contains('\0') {
                return Err(Error::failed("Filename contains null-character").into());
            }
            let content = std::fs::read(&path)
                .map_err(|e| Error::failed(format!("Cannot read \"{path}\": {e}")))?;
            i.qreg_undo_set_string(&sel)?;
            i.qreg_set_string(&sel, &content)?;
            Ok(())
        }
        StringCmd::EpFile => {
            let sel = take_pending_qreg(m, i)?;
            let path = utf8(&text)?;
            if path.contains('\0') {
                return Err(Error::failed("Filename contains null-character").into());
            }
            let content = i.qreg_get_string(&sel)?;
            std::fs::write(&path, &content)
                .map_err(|e| Error::failed(format!("Cannot write \"{path}\": {e}")))?;
            Ok(())
        }

        StringCmd::EsSymbols => {
            let name = utf8(&text)?;
            let id = i
                .symbols
                .lookup(&name)
                .ok_or_else(|| Error::failed(format!("Unknown symbol \"{name}\"")))?;
            i.push_int(id);
            Ok(())
        }

        StringCmd::Help => {
            let topic = text.as_bytes().to_vec();
            let Some((filename, pos)) = i.help.find(&topic) else {
                return Err(Error::failed(format!(
                    "Topic \"{}\" not found",
                    text.echo()
                ))
                .into());
            };
            i.buffer_open(&filename)?;
            let pos = i
                .view
                .glyphs_to_bytes(pos)
                .unwrap_or_else(|| i.view.len_bytes());
            i.goto_pos_undoable(pos)?;
            Ok(())
        }

        StringCmd::Search | StringCmd::SearchAll => search::done(m, i, text.as_bytes(), colon),
    }
}

fn take_pending_qreg(m: &mut Machine, i: &mut Interp) -> Result<crate::qreg::QRegSel, Error> {
    let sel = m
        .pending_qreg
        .take()
        .ok_or_else(|| Error::failed("Missing Q-Register for command"))?;
    if m.must_undo {
        let restore = sel.clone();
        i.undo
            .push(move |i: &mut Interp| i.machine.pending_qreg = Some(restore));
    }
    Ok(sel)
}

fn utf8(text: &TecoString) -> Result<String, Error> {
    String::from_utf8(text.as_bytes().to_vec())
        .map_err(|_| Error::failed("String argument is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use crate::Interp;
    use crate::qreg::QRegSel;

    fn exec(i: &mut Interp, code: &[u8]) {
        i.execute_macro(code).unwrap();
    }

    #[test]
    fn at_modifier_swaps_delimiter() {
        let mut i = Interp::new_for_test();
        exec(&mut i, b"@I/hi there/");
        assert_eq!(i.view.get_all(), "hi there");
    }

    #[test]
    fn brace_delimiters_nest() {
        let mut i = Interp::new_for_test();
        exec(&mut i, b"@I{a{b}c}");
        assert_eq!(i.view.get_all(), "a{b}c");
    }

    #[test]
    fn escape_is_the_default_delimiter() {
        let mut i = Interp::new_for_test();
        exec(&mut i, b"Iplain\x1b");
        assert_eq!(i.view.get_all(), "plain");
    }

    #[test]
    fn string_building_interpolates_registers() {
        let mut i = Interp::new_for_test();
        i.qreg_set_string(&QRegSel::global(b"A"), b"world").unwrap();
        exec(&mut i, b"Ihello ^EQA\x1b");
        assert_eq!(i.view.get_all(), "hello world");
    }

    #[test]
    fn numeric_insert() {
        let mut i = Interp::new_for_test();
        exec(&mut i, b"65I\x1b");
        assert_eq!(i.view.get_all(), "A");
    }

    #[test]
    fn ctl_u_sets_and_appends_register_string() {
        let mut i = Interp::new_for_test();
        exec(&mut i, b"\x15Aabc\x1b");
        assert_eq!(
            i.qreg_get_string(&QRegSel::global(b"A")).unwrap(),
            b"abc"
        );
        exec(&mut i, b":\x15Adef\x1b");
        assert_eq!(
            i.qreg_get_string(&QRegSel::global(b"A")).unwrap(),
            b"abcdef"
        );
    }

    #[test]
    fn es_resolves_widget_symbols() {
        let mut i = Interp::new_for_test();
        exec(&mut i, b"@ES/GETLENGTH/");
        let id = i.pop_num_calc(0).unwrap();
        assert!(id > 0);
    }

    #[test]
    fn eq_with_empty_filename_edits_the_register() {
        let mut i = Interp::new_for_test();
        i.view.insert("buffer");
        exec(&mut i, b"@\x15A/reg text/ @EQA//");
        assert_eq!(i.view.get_all(), "reg text");
    }

    #[test]
    fn skipped_string_arguments_do_not_execute() {
        let mut i = Interp::new_for_test();
        // the conditional is false: the insert must not run, and its
        // delimiter must not terminate the conditional
        exec(&mut i, b"0\"G @I/never '|' this/ ' Iok\x1b");
        assert_eq!(i.view.get_all(), "ok");
    }
}
