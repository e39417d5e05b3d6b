use super::ReadMemory;
use crate::error::{Error, Result};

/// Read access to a byte range known to lie inside a single region.
///
/// Only [`RegionTable`](super::RegionTable) can create one, so holding a view
/// is proof that the range was validated.
#[derive(Debug)]
pub struct MemoryView<'a, R: ?Sized> {
    reader: &'a R,
    start: u32,
    len: u32,
}

impl<R: ?Sized> Clone for MemoryView<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: ?Sized> Copy for MemoryView<'_, R> {}

impl<'a, R: ReadMemory + ?Sized> MemoryView<'a, R> {
    pub(super) fn new(reader: &'a R, start: u32, len: u32) -> Self {
        Self { reader, start, len }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First address past the view
    pub fn end(&self) -> u32 {
        self.start + self.len
    }

    /// Read the byte at `offset` from the start of the view.
    pub fn byte(&self, offset: u32) -> Result<u8> {
        if offset >= self.len {
            return Err(Error::OutOfView {
                offset,
                len: self.len,
            });
        }
        self.reader.read_byte(self.start + offset)
    }
}
