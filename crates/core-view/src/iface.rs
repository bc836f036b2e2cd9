//! User interface seam: message lines, completion popups and clipboards.
//!
//! The interpreter never talks to a terminal directly; everything
//! user-visible funnels through this trait. `RecordingInterface` is the
//! test double used throughout the interpreter's test suites.

use std::collections::HashMap;

use crate::ViewError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupKind {
    Plain,
    File,
    Directory,
}

pub trait Interface {
    fn msg(&mut self, level: MsgLevel, text: &str);
    fn msg_clear(&mut self);

    /// Queue a completion candidate for the popup.
    fn popup_add(&mut self, kind: PopupKind, name: &[u8], is_buffer: bool);
    /// Show queued candidates; called again while shown, cycles pages.
    fn popup_show(&mut self);
    fn popup_clear(&mut self);
    fn popup_is_shown(&self) -> bool;

    fn get_clipboard(&mut self, name: &str) -> Result<Vec<u8>, ViewError>;
    fn set_clipboard(&mut self, name: &str, content: &[u8]) -> Result<(), ViewError>;

    /// Title-bar update when another document is mounted.
    fn info_update(&mut self, _name: &str) {}

    /// Echo the command line after a keypress.
    fn cmdline_update(&mut self, _line: &[u8]) {}
}

/// In-memory interface capturing everything for inspection.
#[derive(Default)]
pub struct RecordingInterface {
    pub messages: Vec<(MsgLevel, String)>,
    pub popup: Vec<(PopupKind, Vec<u8>, bool)>,
    pub popup_shown: bool,
    pub clipboards: HashMap<String, Vec<u8>>,
}

impl RecordingInterface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_message(&self) -> Option<&(MsgLevel, String)> {
        self.messages.last()
    }
}

/// A shared handle around [`RecordingInterface`] so a test can keep reading
/// the recorder after handing the interface to the interpreter.
#[derive(Clone, Default)]
pub struct SharedRecorder(pub std::rc::Rc<std::cell::RefCell<RecordingInterface>>);

impl SharedRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Interface for SharedRecorder {
    fn msg(&mut self, level: MsgLevel, text: &str) {
        self.0.borrow_mut().msg(level, text);
    }

    fn msg_clear(&mut self) {
        self.0.borrow_mut().msg_clear();
    }

    fn popup_add(&mut self, kind: PopupKind, name: &[u8], is_buffer: bool) {
        self.0.borrow_mut().popup_add(kind, name, is_buffer);
    }

    fn popup_show(&mut self) {
        self.0.borrow_mut().popup_show();
    }

    fn popup_clear(&mut self) {
        self.0.borrow_mut().popup_clear();
    }

    fn popup_is_shown(&self) -> bool {
        self.0.borrow().popup_is_shown()
    }

    fn get_clipboard(&mut self, name: &str) -> Result<Vec<u8>, ViewError> {
        self.0.borrow_mut().get_clipboard(name)
    }

    fn set_clipboard(&mut self, name: &str, content: &[u8]) -> Result<(), ViewError> {
        self.0.borrow_mut().set_clipboard(name, content)
    }
}

impl Interface for RecordingInterface {
    fn msg(&mut self, level: MsgLevel, text: &str) {
        self.messages.push((level, text.to_owned()));
    }

    fn msg_clear(&mut self) {}

    fn popup_add(&mut self, kind: PopupKind, name: &[u8], is_buffer: bool) {
        self.popup.push((kind, name.to_vec(), is_buffer));
    }

    fn popup_show(&mut self) {
        self.popup_shown = true;
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
}
