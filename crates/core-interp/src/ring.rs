//! The buffer ring: numbered text buffers with filenames.
//!
//! Exactly one ring buffer (or Q-Register) is mounted in the shared view at
//! any time. The `*` register mirrors the ring: reading it yields the
//! current buffer id, writing it switches buffers. Ring iteration order is
//! creation order; multi-buffer search walks it from the current buffer,
//! wrapping once.

use core_view::{Doc, file};
use std::path::Path;
use tracing::trace;

use crate::error::{Error, Exec};
use crate::qreg::EdHookType;
use crate::{CurrentDoc, Int, Interp};

#[derive(Debug)]
pub struct RingBuffer {
    pub id: usize,
    pub filename: Option<String>,
    pub doc: Doc,
}

pub struct Ring {
    buffers: Vec<RingBuffer>,
    current: usize,
    next_id: usize,
}

impl Default for Ring {
    fn default() -> Self {
        Self::new()
    }
}

impl Ring {
    /// A ring always contains at least one (unnamed) buffer.
    pub fn new() -> Self {
        Self {
            buffers: vec![RingBuffer {
                id: 1,
                filename: None,
                doc: Doc::new(),
            }],
            current: 1,
            next_id: 2,
        }
    }

    pub fn current_id(&self) -> usize {
        self.current
    }

    /// Repoint the ring at a buffer id without mounting anything (undo
    /// actions and the ring editor handle mounting themselves).
    pub fn set_current(&mut self, id: usize) {
        self.current = id;
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn contains(&self, id: usize) -> bool {
        self.buffers.iter().any(|b| b.id == id)
    }

    pub fn doc_mut(&mut self, id: usize) -> Option<&mut Doc> {
        self.buffers.iter_mut().find(|b| b.id == id).map(|b| &mut b.doc)
    }

    pub fn filename_of(&self, id: usize) -> Option<String> {
        self.buffers
            .iter()
            .find(|b| b.id == id)
            .and_then(|b| b.filename.clone())
    }

    /// Normalized filename of the current buffer; empty when unnamed.
    pub fn current_filename_normalized(&self) -> String {
        self.filename_of(self.current)
            .map(|f| file::normalize_path(&f))
            .unwrap_or_default()
    }

    pub fn find_by_filename(&self, filename: &str) -> Option<usize> {
        self.buffers
            .iter()
            .find(|b| b.filename.as_deref() == Some(filename))
            .map(|b| b.id)
    }

    /// Buffer ids in ring order starting at the current buffer.
    pub fn ids_from_current(&self) -> Vec<usize> {
        let Some(start) = self.buffers.iter().position(|b| b.id == self.current) else {
            return Vec::new();
        };
        (0..self.buffers.len())
            .map(|i| self.buffers[(start + i) % self.buffers.len()].id)
            .collect()
    }

    fn create(&mut self, filename: Option<String>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.buffers.push(RingBuffer {
            id,
            filename,
            doc: Doc::new(),
        });
        id
    }

    fn remove(&mut self, id: usize) -> Option<(usize, RingBuffer)> {
        let pos = self.buffers.iter().position(|b| b.id == id)?;
        Some((pos, self.buffers.remove(pos)))
    }

    fn insert_at(&mut self, pos: usize, buffer: RingBuffer) {
        let pos = pos.min(self.buffers.len());
        self.buffers.insert(pos, buffer);
    }

    fn id_at(&self, pos: usize) -> usize {
        self.buffers[pos.min(self.buffers.len() - 1)].id
    }
}

impl Interp {
    /// Switch to a buffer by id (the `*` register's integer write).
    ///
    /// Undo is the caller's responsibility (a remount token registered
    /// before the switch).
    pub fn ring_edit(&mut self, id: Int) -> Result<(), Error> {
        let id = usize::try_from(id).ok().filter(|&i| self.ring.contains(i));
        let Some(id) = id else {
            return Err(Error::failed("Invalid buffer id"));
        };
        self.ring.current = id;
        self.mount(CurrentDoc::Buffer(id));
        let name = self.ring.current_filename_normalized();
        self.iface.info_update(&name);
        Ok(())
    }

    /// `EB`: edit a buffer by filename, creating and loading it when
    /// necessary. An empty filename with a numeric argument switches by id.
    pub fn buffer_open(&mut self, filename: &str) -> Exec<()> {
        if filename.contains('\0') {
            return Err(Error::failed("Filename contains null-character").into());
        }
        if let Some(id) = self.ring.find_by_filename(filename) {
            let prev = self.current_doc.clone();
            let prev_ring = self.ring.current;
            self.undo.push(move |i: &mut Interp| {
                i.ring.current = prev_ring;
                i.remount(prev);
            });
            self.ring_edit(id as Int)?;
            self.ed_hook(EdHookType::Edit)?;
            return Ok(());
        }

        // New buffer: load the file if it exists.
        let id = self.ring.create(Some(filename.to_owned()));
        if Path::new(filename).exists() {
            let mut view = core_view::View::new();
            view.load(Path::new(filename))
                .map_err(|e| Error::failed(e.to_string()))?;
            let doc = self.ring.doc_mut(id).expect("buffer just created");
            doc.park(&view);
        }
        trace!(target: "interp.ring", id, filename, "buffer added");

        self.undo.push(move |i: &mut Interp| {
            i.ring.remove(id);
        });
        let prev = self.current_doc.clone();
        let prev_ring = self.ring.current;
        self.undo.push(move |i: &mut Interp| {
            i.ring.current = prev_ring;
            i.remount(prev);
        });
        self.ring_edit(id as Int)?;
        self.ed_hook(EdHookType::Add)?;
        Ok(())
    }

    /// `EF`: close the current buffer and mount its ring neighbour (or a
    /// fresh unnamed buffer when it was the last one).
    pub fn buffer_close(&mut self) -> Exec<()> {
        self.ed_hook(EdHookType::Close)?;

        let id = self.ring.current_id();
        self.park_current();
        let Some((pos, buffer)) = self.ring.remove(id) else {
            return Err(Error::failed("No buffer to close").into());
        };
        if self.ring.is_empty() {
            self.ring.create(None);
        }
        let next_id = self.ring.id_at(pos);
        self.ring.current = next_id;
        self.current_doc = CurrentDoc::Buffer(next_id);
        if let Some(record) = self.ring.doc_mut(next_id) {
            let mut doc = std::mem::take(record);
            doc.mount(&mut self.view);
        }
        let name = self.ring.current_filename_normalized();
        self.iface.info_update(&name);

        self.undo.push(move |i: &mut Interp| {
            i.park_current();
            let id = buffer.id;
            i.ring.insert_at(pos, buffer);
            i.ring.current = id;
            i.current_doc = CurrentDoc::Buffer(id);
            if let Some(record) = i.ring.doc_mut(id) {
                let mut doc = std::mem::take(record);
                doc.mount(&mut i.view);
            }
        });
        Ok(())
    }

    /// `EW`: save the current buffer; an empty filename uses (and
    /// requires) the buffer's own.
    pub fn buffer_save(&mut self, filename: &str) -> Result<(), Error> {
        if filename.contains('\0') {
            return Err(Error::failed("Filename contains null-character"));
        }
        let target = if filename.is_empty() {
            self.ring
                .filename_of(self.ring.current_id())
                .ok_or_else(|| Error::failed("Buffer has no filename"))?
        } else {
            filename.to_owned()
        };
        self.view
            .save(Path::new(&target))
            .map_err(|e| Error::failed(e.to_string()))?;
        if !filename.is_empty() {
            let id = self.ring.current_id();
            if let Some(buf) = self.ring.buffers.iter_mut().find(|b| b.id == id) {
                let old = buf.filename.take();
                buf.filename = Some(target);
                self.undo.push(move |i: &mut Interp| {
                    let id = i.ring.current_id();
                    if let Some(buf) = i.ring.buffers.iter_mut().find(|b| b.id == id) {
                        buf.filename = old;
                    }
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Interp;

    #[test]
    fn fresh_ring_has_one_unnamed_buffer() {
        let ring = Ring::new();
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.current_id(), 1);
        assert_eq!(ring.current_filename_normalized(), "");
    }

    #[test]
    fn ids_from_current_wrap() {
        let mut ring = Ring::new();
        ring.create(Some("a".into()));
        ring.create(Some("b".into()));
        ring.current = 2;
        assert_eq!(ring.ids_from_current(), vec![2, 3, 1]);
    }

    #[test]
    fn buffer_open_and_switch_with_undo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"file body\n").unwrap();
        let path = path.to_string_lossy().into_owned();

        let mut i = Interp::new_for_test();
        i.view.insert("scratch");
        i.undo.set_pc(1);
        i.buffer_open(&path).unwrap();
        assert_eq!(i.view.get_all(), "file body\n");
        assert_eq!(i.ring.len(), 2);

        i.rubout_to(0);
        assert_eq!(i.view.get_all(), "scratch");
        assert_eq!(i.ring.len(), 1);
        assert_eq!(i.ring.current_id(), 1);
    }

    #[test]
    fn reopening_same_file_switches_instead_of_duplicating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"x").unwrap();
        let path = path.to_string_lossy().into_owned();

        let mut i = Interp::new_for_test();
        i.buffer_open(&path).unwrap();
        let id = i.ring.current_id();
        i.ring_edit(1).unwrap();
        i.buffer_open(&path).unwrap();
        assert_eq!(i.ring.current_id(), id);
        assert_eq!(i.ring.len(), 2);
    }

    #[test]
    fn closing_last_buffer_leaves_fresh_unnamed_one() {
        let mut i = Interp::new_for_test();
        i.view.insert("bye");
        i.buffer_close().unwrap();
        assert_eq!(i.ring.len(), 1);
        assert_eq!(i.view.get_all(), "");
    }

    #[test]
    fn close_undo_restores_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"body").unwrap();
        let path = path.to_string_lossy().into_owned();

        let mut i = Interp::new_for_test();
        i.buffer_open(&path).unwrap();
        i.undo.set_pc(1);
        i.buffer_close().unwrap();
        assert_eq!(i.ring.len(), 1);
        i.rubout_to(0);
        assert_eq!(i.ring.len(), 2);
        assert_eq!(i.view.get_all(), "body");
    }

    #[test]
    fn save_with_null_byte_is_rejected() {
        let mut i = Interp::new_for_test();
        assert!(i.buffer_save("bad\0name").is_err());
    }
}
