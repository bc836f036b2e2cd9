//! Terminal implementation of the interface seam.
//!
//! Renders message lines and the command line on stdout and keeps
//! clipboards in process memory (system clipboard IPC is a front-end
//! concern this build does not wire up).

use core_view::{Interface, MsgLevel, PopupKind, ViewError};
use crossterm::style::Stylize;
use std::collections::HashMap;
use std::io::Write;

pub struct TerminalInterface {
    popup: Vec<(PopupKind, Vec<u8>, bool)>,
    popup_shown: bool,
    clipboards: HashMap<String, Vec<u8>>,
}

impl TerminalInterface {
    pub fn new() -> Self {
        Self {
            popup: Vec::new(),
            popup_shown: false,
            clipboards: HashMap::new(),
        }
    }

    fn print_line(&self, text: &str) {
        let mut out = std::io::stdout();
        let _ = write!(out, "\r\n{text}\r\n");
        let _ = out.flush();
    }
}

impl Interface for TerminalInterface {
    fn msg(&mut self, level: MsgLevel, text: &str) {
        let rendered = match level {
            MsgLevel::Info => text.to_owned(),
            MsgLevel::Warning => format!("{}", text.yellow()),
            MsgLevel::Error => format!("{}", text.red()),
        };
        self.print_line(&rendered);
    }

    fn msg_clear(&mut self) {}

    fn popup_add(&mut self, kind: PopupKind, name: &[u8], is_buffer: bool) {
        self.popup.push((kind, name.to_vec(), is_buffer));
    }

    fn popup_show(&mut self) {
        self.popup_shown = true;
        let names: Vec<String> = self
            .popup
            .iter()
            .map(|(_, name, _)| String::from_utf8_lossy(name).into_owned())
            .collect();
        self.print_line(&names.join("  "));
    }

    fn popup_clear(&mut self) {
        self.popup.clear();
        self.popup_shown = false;
    }

    fn popup_is_shown(&self) -> bool {
        self.popup_shown
    }

    fn get_clipboard(&mut self, name: &str) -> Result<Vec<u8>, ViewError> {
        Ok(self.clipboards.get(name).cloned().unwrap_or_default())
    }

    fn set_clipboard(&mut self, name: &str, content: &[u8]) -> Result<(), ViewError> {
        self.clipboards.insert(name.to_owned(), content.to_vec());
        Ok(())
    }

    fn cmdline_update(&mut self, line: &[u8]) {
        let mut out = std::io::stdout();
        let echo = core_string::echo_bytes(line);
        let _ = write!(out, "\r\x1b[2K*{echo}");
        let _ = out.flush();
    }
}
