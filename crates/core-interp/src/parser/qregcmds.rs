//! Q-Register-expecting states: drive the spec sub-machine, then dispatch
//! the owning command once a register is resolved.

use crate::error::{Error, Exec};
use crate::parser::{Machine, QRegCmd, State, StringCmd};
use crate::qreg::QRegSel;
use crate::qregspec::{QRegSpecMode, QRegSpecStatus};
use crate::Interp;

fn spec_mode(cmd: QRegCmd) -> QRegSpecMode {
    match cmd {
        QRegCmd::SetInt
        | QRegCmd::CtlU
        | QRegCmd::Push
        | QRegCmd::SaveCmdline
        | QRegCmd::EqFile => QRegSpecMode::OptionalInit,
        QRegCmd::GetInt
        | QRegCmd::Increase
        | QRegCmd::GetString
        | QRegCmd::Extract
        | QRegCmd::Macro
        | QRegCmd::Pop
        | QRegCmd::EpFile => QRegSpecMode::Required,
    }
}

pub(super) fn begin(m: &mut Machine, cmd: QRegCmd) {
    m.qregspec.reset(spec_mode(cmd));
    m.state = State::ExpectQReg(cmd);
}

pub(super) fn input(m: &mut Machine, i: &mut Interp, chr: u8, cmd: QRegCmd) -> Exec<()> {
    if m.must_undo {
        let snap = m.qregspec.clone();
        i.undo
            .push(move |i: &mut Interp| i.machine.qregspec = snap);
    }

    let parse_only = !m.mode.executing();
    match m.qregspec.input(i, chr, parse_only)? {
        QRegSpecStatus::More => Ok(()),
        QRegSpecStatus::Done(sel) => {
            m.state = State::Start;
            match sel {
                Some(sel) => got_register(m, i, cmd, sel),
                None => {
                    // parse-only: two-stage commands still need their
                    // string argument consumed
                    match cmd {
                        QRegCmd::CtlU => super::strings::begin(m, i, StringCmd::CtlU)?,
                        QRegCmd::EqFile => super::strings::begin(m, i, StringCmd::EqFile)?,
                        QRegCmd::EpFile => super::strings::begin(m, i, StringCmd::EpFile)?,
                        _ => {}
                    }
                    Ok(())
                }
            }
        }
    }
}

fn got_register(m: &mut Machine, i: &mut Interp, cmd: QRegCmd, sel: QRegSel) -> Exec<()> {
    let colon = std::mem::take(&mut m.colon) > 0;

    match cmd {
        QRegCmd::SetInt => {
            i.eval(false)?;
            if i.args() == 0 {
                if colon {
                    // :U signals the missing argument instead of failing
                    i.push_int(crate::search::FAILURE);
                    return Ok(());
                }
                return Err(Error::failed("Missing argument for <U>").into());
            }
            let v = i.pop_num(0);
            i.qreg_undo_set_integer(&sel)?;
            i.qreg_set_integer(&sel, v)?;
            if colon {
                i.push_int(crate::search::SUCCESS);
            }
            Ok(())
        }

        QRegCmd::GetInt => {
            if colon {
                let len = i.qreg_get_length(&sel)?;
                i.push_int(len);
                return Ok(());
            }
            i.eval(false)?;
            if i.args() > 0 {
                let pos = i.pop_num(0);
                let chr = i.qreg_get_character(&sel, pos)?;
                i.push_int(chr);
            } else {
                let v = i.qreg_get_integer(&sel)?;
                i.push_int(v);
            }
            Ok(())
        }

        QRegCmd::Increase => {
            let n = i.pop_num_calc(1)?;
            let v = i.qreg_get_integer(&sel)?.wrapping_add(n);
            i.qreg_undo_set_integer(&sel)?;
            i.qreg_set_integer(&sel, v)?;
            i.push_int(v);
            Ok(())
        }

        QRegCmd::GetString => {
            let value = i.qreg_get_string(&sel)?;
            let text = String::from_utf8(value)
                .map_err(|_| Error::failed("Q-Register string is not valid UTF-8"))?;
            i.insert_at_dot(&text);
            Ok(())
        }

        QRegCmd::Extract => {
            let (from, to) = super::start::line_args(i)?;
            let text = i.view.get_range(from, to);
            if colon {
                i.qreg_append_string(&sel, text.as_bytes())?;
            } else {
                i.qreg_undo_set_string(&sel)?;
                i.qreg_set_string(&sel, text.as_bytes())?;
            }
            Ok(())
        }

        QRegCmd::Macro => i.qreg_exec_macro(&sel, colon),

        QRegCmd::Push => {
            i.qreg_stack_push(&sel)?;
            Ok(())
        }

        QRegCmd::Pop => {
            if i.qreg_stack_depth() == 0 && colon {
                i.push_int(crate::search::FAILURE);
                return Ok(());
            }
            i.qreg_stack_pop(&sel)?;
            if colon {
                i.push_int(crate::search::SUCCESS);
            }
            Ok(())
        }

        QRegCmd::SaveCmdline => {
            let last = i.last_cmdline.as_bytes().to_vec();
            i.qreg_undo_set_string(&sel)?;
            i.qreg_set_string(&sel, &last)?;
            Ok(())
        }

        QRegCmd::CtlU | QRegCmd::EqFile | QRegCmd::EpFile => {
            // second stage: a string argument follows
            if colon {
                // put the colon back; it belongs to the string command
                m.colon = 1;
            }
            if m.must_undo {
                let old = m.pending_qreg.clone();
                i.undo
                    .push(move |i: &mut Interp| i.machine.pending_qreg = old);
            }
            m.pending_qreg = Some(sel);
            let string_cmd = match cmd {
                QRegCmd::CtlU => StringCmd::CtlU,
                QRegCmd::EqFile => StringCmd::EqFile,
                _ => StringCmd::EpFile,
            };
            super::strings::begin(m, i, string_cmd)?;
            Ok(())
        }
    }
}
