//! Seekable byte sources with named sub-regions.
//!
//! [`ByteSource`] is the capability the table decoder needs from whatever
//! produced the bytes. [`ChunkedBuffer`] is the owned in-memory adapter every
//! loader backend hands out.

use std::ops::Range;

use log::{debug, info};

use crate::chunk::{ChunkEntry, ChunkTable};
use crate::error::{Error, Result};

/// Cursor-based reader over an active window of bytes.
///
/// The active window is either the whole buffer or a chunk selected with
/// [`select_chunk`](ByteSource::select_chunk). Positions are relative to the
/// start of the active window.
pub trait ByteSource {
    /// Copy up to `dest.len()` bytes from the cursor and advance it.
    ///
    /// Returns the number of bytes copied. A short count means the end of the
    /// active window was reached; the end flag is then set. Never fails.
    fn read(&mut self, dest: &mut [u8]) -> usize;

    /// Move the cursor to an absolute position. Positions past the end are
    /// legal and leave the source at end-of-data.
    fn seek(&mut self, offset: usize);

    /// Move the cursor by `delta` bytes, saturating at zero.
    fn seek_relative(&mut self, delta: isize);

    /// Whether the cursor is at or past the end of the active window.
    fn is_eof(&self) -> bool;

    /// Cursor position within the active window.
    fn position(&self) -> usize;

    /// Size of the active window.
    fn size(&self) -> usize;

    /// Make the named chunk the active window and reset the cursor to 0.
    ///
    /// Returns `false` and leaves the window untouched when no chunk has that
    /// name.
    fn select_chunk(&mut self, name: &str) -> bool;

    /// The whole active window.
    fn active(&self) -> &[u8];

    /// Release the underlying storage. Idempotent.
    fn close(&mut self);

    /// Zero-copy view of the active window from the cursor to its end.
    fn bytes_at_cursor(&self) -> &[u8] {
        self.active().get(self.position()..).unwrap_or(&[])
    }

    /// Read exactly `len` bytes, failing with [`Error::Truncated`] if the
    /// window ends first. Nothing is allocated or consumed on failure.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let offset = self.position();
        let have = self.size().saturating_sub(offset);
        if len > have {
            return Err(Error::Truncated {
                offset,
                need: len,
                have,
            });
        }
        let mut buf = vec![0u8; len];
        let got = self.read(&mut buf);
        if got < len {
            return Err(Error::Truncated {
                offset,
                need: len,
                have: got,
            });
        }
        Ok(buf)
    }
}

/// Owned, fixed-capacity byte buffer with a cursor and a chunk table.
#[derive(Default)]
pub struct ChunkedBuffer {
    /// Backing storage; `None` once closed.
    storage: Option<Box<[u8]>>,
    /// Active window into `storage`.
    view: Range<usize>,
    pointer: usize,
    eof: bool,
    chunks: ChunkTable,
}

impl ChunkedBuffer {
    /// An empty, closed buffer. Call [`allocate`](Self::allocate) to use it.
    pub fn new() -> Self {
        Self {
            eof: true,
            ..Self::default()
        }
    }

    /// Take ownership of `data` as the full active window.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            storage: Some(data.into_boxed_slice()),
            view: 0..len,
            pointer: 0,
            eof: len == 0,
            chunks: ChunkTable::new(),
        }
    }

    /// Allocate zeroed storage of `capacity` bytes and return it for filling.
    ///
    /// Any previous storage and chunk table are released first. The whole
    /// buffer becomes the active window with the cursor at 0.
    pub fn allocate(&mut self, capacity: usize) -> &mut [u8] {
        self.close();
        self.view = 0..capacity;
        self.pointer = 0;
        self.eof = capacity == 0;
        &mut self.storage.insert(vec![0u8; capacity].into_boxed_slice())[..]
    }

    /// Register a named region of the underlying storage.
    ///
    /// `start` is absolute within the storage, not relative to the current
    /// active window.
    pub fn add_chunk(&mut self, name: impl Into<String>, start: usize, size: usize) -> Result<()> {
        let capacity = self.storage.as_ref().ok_or(Error::Closed)?.len();
        if start.checked_add(size).is_none_or(|end| end > capacity) {
            return Err(Error::OutOfBounds {
                offset: start,
                len: size,
                size: capacity,
            });
        }
        self.chunks.push(ChunkEntry::new(name, start, size));
        Ok(())
    }

    /// Registered chunks.
    pub fn chunks(&self) -> &ChunkTable {
        &self.chunks
    }

    /// Like [`select_chunk`](ByteSource::select_chunk), but a missing chunk is
    /// an error.
    pub fn select_chunk_or_err(&mut self, name: &str) -> Result<()> {
        if self.select_chunk(name) {
            Ok(())
        } else {
            Err(Error::ChunkNotFound {
                name: name.to_string(),
            })
        }
    }

    /// Total size of the underlying storage, independent of chunk selection.
    pub fn capacity(&self) -> usize {
        self.storage.as_ref().map_or(0, |s| s.len())
    }

    /// Whether the storage has been released.
    pub fn is_closed(&self) -> bool {
        self.storage.is_none()
    }
}

impl ByteSource for ChunkedBuffer {
    fn read(&mut self, dest: &mut [u8]) -> usize {
        if self.eof {
            return 0;
        }
        let size = self.size();
        let n = dest.len().min(size.saturating_sub(self.pointer));
        if n > 0 {
            let start = self.pointer;
            dest[..n].copy_from_slice(&self.active()[start..start + n]);
        }
        self.pointer += n;
        self.eof = self.pointer >= size;
        n
    }

    fn seek(&mut self, offset: usize) {
        self.pointer = offset;
        self.eof = self.pointer >= self.size();
    }

    fn seek_relative(&mut self, delta: isize) {
        self.pointer = self.pointer.saturating_add_signed(delta);
        self.eof = self.pointer >= self.size();
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn position(&self) -> usize {
        self.pointer
    }

    fn size(&self) -> usize {
        self.view.len()
    }

    fn select_chunk(&mut self, name: &str) -> bool {
        let Some(entry) = self.chunks.find(name) else {
            debug!("no chunk named {name:?}");
            return false;
        };
        self.view = entry.start..entry.end();
        self.pointer = 0;
        self.eof = self.view.is_empty();
        info!("selected chunk {name:?} ({} bytes at {:#x})", entry.size, entry.start);
        true
    }

    fn active(&self) -> &[u8] {
        match &self.storage {
            Some(storage) => &storage[self.view.clone()],
            None => &[],
        }
    }

    fn close(&mut self) {
        self.storage = None;
        self.view = 0..0;
        self.eof = true;
        self.chunks.clear();
    }
}

impl std::fmt::Debug for ChunkedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedBuffer")
            .field("capacity", &self.capacity())
            .field("view", &self.view)
            .field("pointer", &self.pointer)
            .field("eof", &self.eof)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> ChunkedBuffer {
        let mut buf = ChunkedBuffer::from_vec((0u8..16).collect());
        buf.add_chunk("HEAD", 0, 4).unwrap();
        buf.add_chunk("BODY", 4, 8).unwrap();
        buf
    }

    #[test]
    fn short_read_sets_eof_and_returns_remaining() {
        let mut buf = ChunkedBuffer::from_vec(vec![1, 2, 3]);
        let mut dest = [0u8; 8];
        assert_eq!(buf.read(&mut dest), 3);
        assert_eq!(&dest[..3], &[1, 2, 3]);
        assert!(buf.is_eof());
        assert_eq!(buf.read(&mut dest), 0);
    }

    #[test]
    fn exact_read_to_end_sets_eof() {
        let mut buf = ChunkedBuffer::from_vec(vec![1, 2]);
        let mut dest = [0u8; 2];
        assert_eq!(buf.read(&mut dest), 2);
        assert!(buf.is_eof());
    }

    #[test]
    fn seek_past_end_is_legal() {
        let mut buf = ChunkedBuffer::from_vec(vec![0; 4]);
        buf.seek(100);
        assert!(buf.is_eof());
        assert_eq!(buf.position(), 100);
        assert_eq!(buf.read(&mut [0u8; 1]), 0);
        assert!(buf.bytes_at_cursor().is_empty());

        buf.seek(1);
        assert!(!buf.is_eof());
        buf.seek_relative(2);
        assert_eq!(buf.position(), 3);
        buf.seek_relative(-10);
        assert_eq!(buf.position(), 0);
    }

    #[test]
    fn selecting_chunk_rebases_reads() {
        let mut buf = buffer();
        buf.seek(3);
        assert!(buf.select_chunk("BODY"));
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.size(), 8);
        assert_eq!(buf.active(), &[4, 5, 6, 7, 8, 9, 10, 11]);

        let mut dest = [0u8; 16];
        assert_eq!(buf.read(&mut dest), 8);
        assert_eq!(&dest[..8], &[4, 5, 6, 7, 8, 9, 10, 11]);
        assert!(buf.is_eof());
    }

    #[test]
    fn unknown_chunk_leaves_window_unchanged() {
        let mut buf = buffer();
        assert!(buf.select_chunk("HEAD"));
        let mut dest = [0u8; 2];
        buf.read(&mut dest);

        assert!(!buf.select_chunk("NOPE"));
        assert_eq!(buf.size(), 4);
        assert_eq!(buf.position(), 2);
        assert_eq!(buf.read(&mut dest), 2);
        assert_eq!(dest, [2, 3]);

        assert!(matches!(
            buf.select_chunk_or_err("NOPE"),
            Err(Error::ChunkNotFound { name }) if name == "NOPE"
        ));
    }

    #[test]
    fn chunk_must_fit_storage() {
        let mut buf = buffer();
        assert!(matches!(
            buf.add_chunk("TAIL", 12, 5),
            Err(Error::OutOfBounds { offset: 12, len: 5, size: 16 })
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let mut buf = buffer();
        buf.close();
        buf.close();
        assert!(buf.is_closed());
        assert!(buf.is_eof());
        assert!(buf.chunks().is_empty());
        assert!(buf.active().is_empty());
        assert!(matches!(buf.add_chunk("X", 0, 0), Err(Error::Closed)));
    }

    #[test]
    fn allocate_replaces_previous_storage() {
        let mut buf = buffer();
        buf.allocate(4).copy_from_slice(&[9, 9, 9, 9]);
        assert_eq!(buf.capacity(), 4);
        assert!(buf.chunks().is_empty());
        assert_eq!(buf.active(), &[9, 9, 9, 9]);
        assert!(!buf.is_eof());

        buf.allocate(0);
        assert!(buf.is_eof());
    }

    #[test]
    fn read_vec_reports_truncation() {
        let mut buf = ChunkedBuffer::from_vec(vec![0; 3]);
        assert!(matches!(
            buf.read_vec(4),
            Err(Error::Truncated { offset: 0, need: 4, have: 3 })
        ));
        // The failed read leaves the cursor where it was.
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.read_vec(3).unwrap(), vec![0; 3]);
    }

    #[test]
    fn read_vec_rejects_lengths_beyond_the_window_without_allocating() {
        let mut buf = ChunkedBuffer::from_vec(vec![0; 8]);
        buf.seek(6);
        assert!(matches!(
            buf.read_vec(usize::MAX),
            Err(Error::Truncated { offset: 6, need: usize::MAX, have: 2 })
        ));
        buf.seek(20);
        assert!(matches!(
            buf.read_vec(1),
            Err(Error::Truncated { offset: 20, need: 1, have: 0 })
        ));
    }
}
