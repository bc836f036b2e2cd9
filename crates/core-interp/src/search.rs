//! Search: pattern compilation and execution.
//!
//! The pattern language is translated to the host regex dialect. The
//! compiler must accept *incomplete* patterns silently (returning no regex)
//! because interactive search-as-you-type recompiles on every keystroke;
//! only definitely wrong constructs are errors.
//!
//! Success or failure of the last search is stored in the integer cell of
//! register `_`, and the pattern itself in its string cell so a subsequent
//! search with an empty pattern repeats it.

use regex::bytes::{Regex, RegexBuilder};

use crate::error::{Error, Exec};
use crate::parser::{Machine, SearchParams};
use crate::qreg::{QRegSel, SEARCH_MODE_REG, SEARCH_REG};
use crate::qregspec::{QRegSpecMachine, QRegSpecMode, QRegSpecStatus};
use crate::{Int, Interp};

pub const SUCCESS: Int = -1;
pub const FAILURE: Int = 0;

const CTL_S: u8 = b'S' & 0x1F;
const CTL_E: u8 = b'E' & 0x1F;
const CTL_N: u8 = b'N' & 0x1F;
const CTL_X: u8 = b'X' & 0x1F;

fn escape_byte(out: &mut String, chr: u8) {
    if chr.is_ascii_alphanumeric() {
        out.push(chr as char);
    } else {
        out.push_str(&format!("\\x{chr:02X}"));
    }
}

/// Convert one pattern character class to a regex class body.
///
/// Returns `Ok(None)` for incomplete specs (end of input inside `^E` or a
/// register name); invalid register specs are errors. `idx` is left after
/// the last byte consumed.
fn class2regexp(
    i: &mut Interp,
    pattern: &[u8],
    idx: &mut usize,
    escape_default: bool,
) -> Result<Option<String>, Error> {
    let mut qreg: Option<QRegSpecMachine> = None;

    while *idx < pattern.len() {
        let chr = pattern[*idx];

        if let Some(machine) = qreg.as_mut() {
            *idx += 1;
            match machine.input(i, chr, false)? {
                QRegSpecStatus::More => continue,
                QRegSpecStatus::Done(sel) => {
                    let sel = sel.expect("not parse-only");
                    let content = i.qreg_get_string(&sel)?;
                    let mut out = String::new();
                    for b in content {
                        escape_byte(&mut out, b);
                    }
                    return Ok(Some(out));
                }
            }
        }

        match chr {
            CTL_S => {
                *idx += 1;
                return Ok(Some("[:^alnum:]".to_owned()));
            }
            CTL_E => {
                *idx += 1;
                let Some(&class) = pattern.get(*idx) else {
                    return Ok(None);
                };
                match class.to_ascii_uppercase() {
                    b'A' => {
                        *idx += 1;
                        return Ok(Some("[:alpha:]".to_owned()));
                    }
                    // same as <CTRL/S>
                    b'B' => {
                        *idx += 1;
                        return Ok(Some("[:^alnum:]".to_owned()));
                    }
                    b'C' => {
                        *idx += 1;
                        return Ok(Some("[:alnum:].$".to_owned()));
                    }
                    b'D' => {
                        *idx += 1;
                        return Ok(Some("[:digit:]".to_owned()));
                    }
                    b'G' => {
                        *idx += 1;
                        qreg = Some(QRegSpecMachine::new(QRegSpecMode::Required, false));
                    }
                    b'L' => {
                        *idx += 1;
                        return Ok(Some("\\r\\n\\x0b\\x0c".to_owned()));
                    }
                    b'R' => {
                        *idx += 1;
                        return Ok(Some("[:alnum:]".to_owned()));
                    }
                    b'V' => {
                        *idx += 1;
                        return Ok(Some("[:lower:]".to_owned()));
                    }
                    b'W' => {
                        *idx += 1;
                        return Ok(Some("[:upper:]".to_owned()));
                    }
                    _ => {
                        // not a class; may still be a higher-level ^E form
                        *idx -= 1;
                        return Ok(None);
                    }
                }
            }
            _ => {
                if escape_default {
                    *idx += 1;
                    let mut out = String::new();
                    escape_byte(&mut out, chr);
                    return Ok(Some(out));
                }
                return Ok(None);
            }
        }
    }

    // end of input inside a class spec
    Ok(None)
}

/// Convert a pattern to a regex string. `single_expr` consumes exactly one
/// pattern element (used by `^EM` and alternatives).
fn pattern2regexp(
    i: &mut Interp,
    pattern: &[u8],
    idx: &mut usize,
    single_expr: bool,
) -> Result<Option<String>, Error> {
    #[derive(PartialEq)]
    enum St {
        Start,
        Not,
        CtlE,
        Many,
        Alt,
    }
    let mut state = St::Start;
    let mut re = String::new();
    let mut alt_depth = 0u32;

    loop {
        if state == St::Start {
            if let Some(class) = class2regexp(i, pattern, idx, false)? {
                re.push('[');
                re.push_str(&class);
                re.push(']');
                if single_expr && alt_depth == 0 {
                    return Ok(Some(re));
                }
                continue;
            }
        }

        let Some(&chr) = pattern.get(*idx) else {
            break;
        };

        match state {
            St::Start => match chr {
                CTL_X => {
                    re.push('.');
                    *idx += 1;
                }
                CTL_N => {
                    state = St::Not;
                    *idx += 1;
                }
                CTL_E => {
                    state = St::CtlE;
                    *idx += 1;
                }
                _ => {
                    escape_byte(&mut re, chr);
                    *idx += 1;
                }
            },

            St::Not => {
                state = St::Start;
                let Some(class) = class2regexp(i, pattern, idx, true)? else {
                    // a complete class is strictly required
                    return Ok(None);
                };
                re.push_str("[^");
                re.push_str(&class);
                re.push(']');
            }

            St::CtlE => {
                state = St::Start;
                match chr.to_ascii_uppercase() {
                    b'M' => {
                        state = St::Many;
                        *idx += 1;
                    }
                    b'S' => {
                        re.push_str("\\s+");
                        *idx += 1;
                    }
                    // same as <CTRL/X>
                    b'X' => {
                        re.push('.');
                        *idx += 1;
                    }
                    b'[' => {
                        re.push('(');
                        state = St::Alt;
                        alt_depth += 1;
                        *idx += 1;
                    }
                    _ => return Err(Error::syntax(chr)),
                }
            }

            St::Many => {
                // exactly one pattern element, one or more times
                let Some(inner) = pattern2regexp(i, pattern, idx, true)? else {
                    return Ok(None);
                };
                re.push('(');
                re.push_str(&inner);
                re.push_str(")+");
                state = St::Start;
            }

            St::Alt => match chr {
                b',' => {
                    re.push('|');
                    *idx += 1;
                }
                b']' => {
                    re.push(')');
                    state = St::Start;
                    alt_depth -= 1;
                    *idx += 1;
                }
                _ => {
                    let Some(inner) = pattern2regexp(i, pattern, idx, true)? else {
                        return Ok(None);
                    };
                    re.push_str(&inner);
                }
            },
        }

        if single_expr && state == St::Start && alt_depth == 0 {
            return Ok(Some(re));
        }
    }

    match state {
        // closing an open alternative automatically improves
        // search-as-you-type
        St::Alt => {
            re.push(')');
            Ok(Some(re))
        }
        St::Start => Ok(Some(re)),
        _ => Ok(None),
    }
}

/// Compile a pattern; `Ok(None)` for incomplete patterns.
pub fn compile(i: &mut Interp, pattern: &[u8]) -> Result<Option<Regex>, Error> {
    if pattern.is_empty() {
        return Ok(None);
    }
    let mut idx = 0;
    let Some(re) = pattern2regexp(i, pattern, &mut idx, false)? else {
        return Ok(None);
    };
    // case folding is controlled by the ^X search mode register
    let caseless = i
        .locals
        .get(SEARCH_MODE_REG)
        .map(|r| r.integer == 0)
        .unwrap_or(true);
    let regex = RegexBuilder::new(&re)
        .case_insensitive(caseless)
        .multi_line(true)
        .dot_matches_new_line(true)
        .unicode(false)
        .build()
        .map_err(|_| Error::failed("Invalid search pattern"))?;
    Ok(Some(regex))
}

/// Find a match in `hay` starting at `from`.
///
/// A positive count selects the n-th match; a negative count keeps the last
/// |n| matches in a circular stack and yields the oldest (the n-th from the
/// end). Returns the remaining count and the match range.
fn run(re: &Regex, hay: &[u8], from: usize, count: Int) -> (Int, Option<(usize, usize)>) {
    if count >= 0 {
        let mut count = count;
        for m in re.find_iter(&hay[from..]) {
            count -= 1;
            if count == 0 {
                return (0, Some((from + m.start(), from + m.end())));
            }
        }
        (count.max(0), None)
    } else {
        let keep = (-count) as usize;
        let mut ring: Vec<(usize, usize)> = vec![(0, 0); keep];
        let mut total: Int = 0;
        let mut at = 0usize;
        for m in re.find_iter(&hay[from..]) {
            ring[at] = (from + m.start(), from + m.end());
            total += 1;
            at = (total as usize) % keep;
        }
        let remaining = (count + total).min(0);
        if remaining == 0 {
            // `at` points at the stack bottom
            (0, Some(ring[at]))
        } else {
            (remaining, None)
        }
    }
}

/// Search-state entry: capture the count argument and the origin selection.
pub(crate) fn begin(m: &mut Machine, i: &mut Interp, multi_buffer: bool) -> Result<(), Error> {
    let count = i.pop_num_calc(1)?;
    m.search = Some(SearchParams {
        count,
        origin_dot: i.view.dot(),
        origin_anchor: i.view.anchor(),
        multi_buffer,
        origin_buffer: i.ring.current_id(),
    });
    Ok(())
}

fn select(i: &mut Interp, range: Option<(usize, usize)>, params: &SearchParams) {
    let old_dot = i.view.dot();
    let old_anchor = i.view.anchor();
    i.undo.push(move |i: &mut Interp| {
        i.view.set_sel(old_anchor, old_dot);
    });
    match range {
        Some((from, to)) => i.view.set_sel(from, to),
        None => i.view.set_sel(params.origin_anchor, params.origin_dot),
    }
}

/// As-you-type search over the current buffer; selection follows the match,
/// misses restore the origin.
pub(crate) fn interim(m: &mut Machine, i: &mut Interp) -> Result<(), Error> {
    let Some(params) = m.search else {
        return Ok(());
    };
    let pattern = m.expectstring.text().to_vec();
    let Some(re) = compile(i, &pattern)? else {
        return Ok(());
    };
    let hay = i.view.get_all().into_bytes();
    let (_, range) = run(&re, &hay, params.origin_dot, params.count.max(1));
    select(i, range, &params);
    Ok(())
}

/// Final verdict at the closing delimiter.
pub(crate) fn done(m: &mut Machine, i: &mut Interp, text: &[u8], colon: bool) -> Exec<()> {
    let params = m.search.take().unwrap_or(SearchParams {
        count: 1,
        origin_dot: i.view.dot(),
        origin_anchor: i.view.anchor(),
        multi_buffer: false,
        origin_buffer: i.ring.current_id(),
    });
    let search_reg = QRegSel::global(SEARCH_REG);

    // an empty pattern repeats the last one
    let pattern = if text.is_empty() {
        i.qreg_get_string(&search_reg)?
    } else {
        i.qreg_undo_set_string(&search_reg)?;
        i.qreg_set_string(&search_reg, text)?;
        text.to_vec()
    };

    let range = match compile(i, &pattern)? {
        Some(re) => {
            if params.multi_buffer {
                search_ring(i, &re, &params)?
            } else {
                let hay = i.view.get_all().into_bytes();
                let (_, range) = run(&re, &hay, params.origin_dot, params.count);
                range
            }
        }
        None => None,
    };

    select(i, range, &params);

    let verdict = if range.is_some() { SUCCESS } else { FAILURE };
    i.qreg_undo_set_integer(&search_reg)?;
    i.qreg_set_integer(&search_reg, verdict)?;

    if colon {
        i.push_int(verdict);
    } else if verdict == FAILURE && i.loop_stack.len() <= m.loop_base {
        // inside a loop the message is suppressed so the miss can break it
        i.warn("Search string not found");
    }
    Ok(())
}

/// `N`: search across the ring, wrapping once, stopping at the origin.
fn search_ring(
    i: &mut Interp,
    re: &Regex,
    params: &SearchParams,
) -> Result<Option<(usize, usize)>, Error> {
    let ids = i.ring.ids_from_current();
    for (pos, id) in ids.iter().copied().enumerate() {
        let (hay, from) = if pos == 0 {
            (i.view.get_all().into_bytes(), params.origin_dot)
        } else {
            let text = i
                .ring
                .doc_mut(id)
                .map(|d| d.text().as_bytes().to_vec())
                .unwrap_or_default();
            (text, 0)
        };
        let (_, range) = run(re, &hay, from, params.count);
        if let Some(range) = range {
            if pos != 0 {
                let prev = i.current_doc.clone();
                let prev_ring = i.ring.current_id();
                i.undo.push(move |i: &mut Interp| {
                    i.ring.set_current(prev_ring);
                    i.remount(prev);
                });
                i.ring_edit(id as Int)?;
            }
            return Ok(Some(range));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Interp;

    fn compile_str(i: &mut Interp, pattern: &[u8]) -> Option<Regex> {
        compile(i, pattern).unwrap()
    }

    #[test]
    fn plain_text_matches_literally() {
        let mut i = Interp::new_for_test();
        let re = compile_str(&mut i, b"a.c").unwrap();
        assert!(re.is_match(b"xxa.cxx"));
        assert!(!re.is_match(b"abc"));
    }

    #[test]
    fn ctl_x_is_any_character() {
        let mut i = Interp::new_for_test();
        let re = compile_str(&mut i, &[b'a', CTL_X, b'c']).unwrap();
        assert!(re.is_match(b"abc"));
        assert!(re.is_match(b"a\nc"));
    }

    #[test]
    fn ctl_e_classes() {
        let mut i = Interp::new_for_test();
        let re = compile_str(&mut i, &[CTL_E, b'D']).unwrap();
        assert!(re.is_match(b"7"));
        assert!(!re.is_match(b"x"));

        let re = compile_str(&mut i, &[CTL_E, b'A']).unwrap();
        assert!(re.is_match(b"x"));
        assert!(!re.is_match(b"7"));
    }

    #[test]
    fn negated_class() {
        let mut i = Interp::new_for_test();
        let re = compile_str(&mut i, &[CTL_N, CTL_E, b'D']).unwrap();
        assert!(re.is_match(b"x"));
        assert!(!re.is_match(b"5"));
    }

    #[test]
    fn many_construct() {
        let mut i = Interp::new_for_test();
        let re = compile_str(&mut i, &[CTL_E, b'M', b'a', b'b']).unwrap();
        assert!(re.is_match(b"aaab"));
        assert!(!re.is_match(b"b"));
    }

    #[test]
    fn alternation() {
        let mut i = Interp::new_for_test();
        let re = compile_str(&mut i, &[CTL_E, b'[', b'x', b',', b'y', b']']).unwrap();
        assert!(re.is_match(b"x"));
        assert!(re.is_match(b"y"));
        assert!(!re.is_match(b"z"));
    }

    #[test]
    fn incomplete_patterns_compile_to_nothing() {
        let mut i = Interp::new_for_test();
        assert!(compile_str(&mut i, &[CTL_E]).is_none());
        assert!(compile_str(&mut i, &[CTL_N]).is_none());
        assert!(compile_str(&mut i, &[CTL_E, b'M']).is_none());
        assert!(compile_str(&mut i, b"").is_none());
    }

    #[test]
    fn register_interpolation_is_escaped() {
        let mut i = Interp::new_for_test();
        i.qreg_set_string(&QRegSel::global(b"A"), b"a.c").unwrap();
        let re = compile_str(&mut i, &[CTL_E, b'G', b'A']).unwrap();
        assert!(re.is_match(b"a.c"));
        assert!(!re.is_match(b"abc"));
    }

    #[test]
    fn run_counts_forward() {
        let mut i = Interp::new_for_test();
        let re = compile_str(&mut i, b"ab").unwrap();
        let hay = b"ab ab ab";
        assert_eq!(run(&re, hay, 0, 1).1, Some((0, 2)));
        assert_eq!(run(&re, hay, 0, 2).1, Some((3, 5)));
        assert_eq!(run(&re, hay, 0, 4).1, None);
    }

    #[test]
    fn run_counts_from_the_end() {
        let mut i = Interp::new_for_test();
        let re = compile_str(&mut i, b"ab").unwrap();
        let hay = b"ab ab ab";
        assert_eq!(run(&re, hay, 0, -1).1, Some((6, 8)));
        assert_eq!(run(&re, hay, 0, -3).1, Some((0, 2)));
        assert_eq!(run(&re, hay, 0, -4).1, None);
    }

    #[test]
    fn search_command_selects_match_and_sets_register() {
        let mut i = Interp::new_for_test();
        i.execute_macro(b"Ifoo bar baz\x1b J @S/bar/").unwrap();
        assert_eq!(i.view.dot(), 7);
        assert_eq!(
            i.qreg_get_integer(&QRegSel::global(SEARCH_REG)).unwrap(),
            SUCCESS
        );
        // pattern remembered for empty re-search
        assert_eq!(
            i.qreg_get_string(&QRegSel::global(SEARCH_REG)).unwrap(),
            b"bar"
        );
    }

    #[test]
    fn search_miss_in_loop_breaks_without_message() {
        let mut i = Interp::new_for_test();
        i.execute_macro(b"Iaaa\x1b J <@S/xyz/ ; Inever\x1b>").unwrap();
        assert_eq!(
            i.qreg_get_integer(&QRegSel::global(SEARCH_REG)).unwrap(),
            FAILURE
        );
        assert!(!i.view.get_all().contains("never"));
    }

    #[test]
    fn colon_search_pushes_verdict() {
        let mut i = Interp::new_for_test();
        i.execute_macro(b"Iabc\x1b J :@S/b/").unwrap();
        assert_eq!(i.pop_num_calc(0).unwrap(), SUCCESS);
        i.execute_macro(b"J :@S/zz/").unwrap();
        assert_eq!(i.pop_num_calc(0).unwrap(), FAILURE);
    }

    #[test]
    fn multi_buffer_search_switches_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.txt");
        std::fs::write(&path, b"needle here").unwrap();
        let path = path.to_string_lossy().into_owned();

        let mut i = Interp::new_for_test();
        i.execute_macro(format!("@EB|{path}|").as_bytes()).unwrap();
        i.ring_edit(1).unwrap();
        i.execute_macro(b"Ihaystack only\x1b J @N/needle/").unwrap();
        assert_eq!(i.ring.current_filename_normalized().contains("other"), true);
        assert_eq!(
            i.qreg_get_integer(&QRegSel::global(SEARCH_REG)).unwrap(),
            SUCCESS
        );
    }
}
