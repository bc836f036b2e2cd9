//! End-to-end scenarios driven through the interactive keypress loop.

use core_interp::{Interp, KeyAction, qreg::QRegSel};
use core_view::{MsgLevel, SharedRecorder};

const ESC: u8 = 0x1B;
const RUBOUT: u8 = 0x08;

fn interp() -> Interp {
    Interp::new_for_test()
}

fn interp_with_recorder() -> (Interp, SharedRecorder) {
    let recorder = SharedRecorder::new();
    (Interp::new(Box::new(recorder.clone())), recorder)
}

fn type_bytes(i: &mut Interp, bytes: &[u8]) {
    for &b in bytes {
        assert_eq!(i.keypress(b), KeyAction::Continue);
    }
}

#[test]
fn arithmetic_display() {
    let (mut i, recorder) = interp_with_recorder();
    type_bytes(&mut i, b"5 8*=");
    let msgs = recorder.0.borrow().messages.clone();
    assert!(
        msgs.iter().any(|(_, m)| m == "40"),
        "expected 40 in {msgs:?}"
    );
}

#[test]
fn conditional_inserts_and_rubs_out_cleanly() {
    let mut i = interp();
    type_bytes(&mut i, b"2 3+4-1\"G Ihello\x1b '");
    assert_eq!(i.view.get_all(), "hello");

    // rubbing out the closing quote and everything backwards restores a
    // clean slate
    while i.cmdline.len > 0 {
        i.keypress(RUBOUT);
    }
    assert_eq!(i.view.get_all(), "");
    assert_eq!(i.undo.depth(), 0);
}

#[test]
fn qreg_round_trip() {
    let mut i = interp();
    type_bytes(&mut i, b"@\x15A/hi/ 0QA");
    assert_eq!(i.pop_num_calc(0).unwrap(), 'h' as i64);
    assert_eq!(
        i.qreg_get_string(&QRegSel::global(b"A")).unwrap(),
        b"hi"
    );
}

#[test]
fn goto_skip_forward() {
    let mut i = interp();
    type_bytes(&mut i, b"OskipEnd\x1b 99UA !other! !skipEnd! 7UA");
    // the intervening assignment never executed; the one after the label did
    assert_eq!(i.qreg_get_integer(&QRegSel::global(b"A")).unwrap(), 7);
}

#[test]
fn search_miss_breaks_loop_silently() {
    let (mut i, recorder) = interp_with_recorder();
    type_bytes(&mut i, b"Isome text\x1b J <@S/xyz/ ; Inever\x1b>");
    assert!(!i.view.get_all().contains("never"));
    // `_` carries the failure
    assert_eq!(i.qreg_get_integer(&QRegSel::global(b"_")).unwrap(), 0);
    // neither an error nor a warning was shown for the miss
    let msgs = recorder.0.borrow().messages.clone();
    assert!(
        !msgs
            .iter()
            .any(|(level, _)| matches!(level, MsgLevel::Error | MsgLevel::Warning)),
        "unexpected message: {msgs:?}"
    );
}

#[test]
fn command_line_replacement_round_trip() {
    let mut i = interp();
    // macro M: compute 1+2, format it into the buffer, extract it into the
    // replacement register, clean the buffer, and replace the command line
    type_bytes(&mut i, b"@\x15M/1+2\\ 0XB HK \x15\x1b^Q^EQB\x1b}/");
    type_bytes(&mut i, b"\x1b\x1b");
    // macro register survives command line termination
    type_bytes(&mut i, b"MM");
    assert_eq!(i.cmdline.committed(), b"3");

    // rubbing out the last (only) character undoes the replacement's work
    i.keypress(RUBOUT);
    assert_eq!(i.cmdline.committed(), b"");
    assert_eq!(i.args(), 0);
}

#[test]
fn multiple_rubout_reinsert_cycles_are_stable() {
    let mut i = interp();
    let script = b"Iab\x1b 2UA QA\"G Ic\x1b '";
    type_bytes(&mut i, script);
    let final_view = i.view.get_all();

    for _ in 0..3 {
        // rub out half, re-insert it via the modifier
        for _ in 0..6 {
            i.keypress(RUBOUT);
        }
        i.keypress(0x07); // modifier on
        for _ in 0..6 {
            i.keypress(RUBOUT); // re-insert
        }
        i.keypress(0x07); // modifier off again
        assert_eq!(i.view.get_all(), final_view);
        assert_eq!(i.cmdline.committed(), script.as_slice());
    }
}

#[test]
fn termination_discards_history_but_keeps_buffers() {
    let mut i = interp();
    type_bytes(&mut i, b"Ikept\x1b");
    type_bytes(&mut i, &[ESC, ESC]);
    assert_eq!(i.undo.depth(), 0);
    assert_eq!(i.view.get_all(), "kept");
    // rubout after termination is a no-op (history gone)
    i.keypress(RUBOUT);
    assert_eq!(i.view.get_all(), "kept");
}

#[test]
fn skip_mode_blocks_termination() {
    let mut i = interp();
    type_bytes(&mut i, b"Onever-defined\x1b");
    // in skip mode $$ must not terminate the command line
    type_bytes(&mut i, &[ESC, ESC]);
    assert_ne!(i.cmdline.len, 0);
}

#[test]
fn ed_hook_runs_in_isolated_scope() {
    let mut i = interp();
    // define an ED macro that records the hook type it received
    type_bytes(&mut i, b"@\x15[ED]/U.T Q.T UH/");
    type_bytes(&mut i, b"\x1b\x1b");
    i.ed |= core_interp::EdFlags::HOOKS;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hooked.txt");
    std::fs::write(&path, b"x").unwrap();
    let path = path.to_string_lossy().into_owned();

    i.execute_macro(format!("@EB|{path}|").as_bytes()).unwrap();
    // EB on a fresh file runs the ADD hook (type 1)
    assert_eq!(i.qreg_get_integer(&QRegSel::global(b"H")).unwrap(), 1);
    // and leaves no arguments behind
    assert_eq!(i.args(), 0);
}
