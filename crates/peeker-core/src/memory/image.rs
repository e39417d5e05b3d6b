//! Simulated address space backed by byte segments
//!
//! Used to run the service off-device (the host CLI) and to drive tests with
//! known memory contents.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::ReadMemory;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct Segment {
    base: u32,
    bytes: Vec<u8>,
}

impl Segment {
    fn contains(&self, address: u32) -> bool {
        address >= self.base && ((address - self.base) as usize) < self.bytes.len()
    }
}

/// Sparse address space. Reads outside every segment fail.
#[derive(Debug, Clone, Default)]
pub struct ImageMemory {
    segments: Vec<Segment>,
}

impl ImageMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `bytes` at `base`. A later segment shadows earlier ones where they overlap.
    pub fn with_segment(mut self, base: u32, bytes: Vec<u8>) -> Self {
        self.map(base, bytes);
        self
    }

    /// Map `len` bytes of `fill` at `base`.
    pub fn with_fill(self, base: u32, len: usize, fill: u8) -> Self {
        self.with_segment(base, vec![fill; len])
    }

    pub fn map(&mut self, base: u32, bytes: Vec<u8>) {
        debug!(
            "Mapped segment 0x{:08x}..0x{:08x}",
            base,
            base as u64 + bytes.len() as u64
        );
        self.segments.push(Segment { base, bytes });
    }

    /// Map a file at `base`, padded with `fill` up to `len` bytes.
    ///
    /// Fails if the file is larger than `len`.
    pub fn map_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        base: u32,
        len: usize,
        fill: u8,
    ) -> Result<()> {
        let path = path.as_ref();
        let mut bytes = fs::read(path)?;
        if bytes.len() > len {
            return Err(Error::InvalidConfig(format!(
                "{} is {} bytes, larger than the {}-byte region at 0x{:08x}",
                path.display(),
                bytes.len(),
                len,
                base
            )));
        }
        bytes.resize(len, fill);
        self.map(base, bytes);
        Ok(())
    }

    /// Overwrite bytes inside an existing segment.
    pub fn poke(&mut self, address: u32, data: &[u8]) -> Result<()> {
        for (i, &byte) in data.iter().enumerate() {
            let addr = u32::try_from(i)
                .ok()
                .and_then(|i| address.checked_add(i))
                .ok_or(Error::MemoryReadFailed { address })?;
            let segment = self
                .segments
                .iter_mut()
                .rev()
                .find(|s| s.contains(addr))
                .ok_or(Error::MemoryReadFailed { address: addr })?;
            segment.bytes[(addr - segment.base) as usize] = byte;
        }
        Ok(())
    }
}

impl ReadMemory for ImageMemory {
    fn read_byte(&self, address: u32) -> Result<u8> {
        self.segments
            .iter()
            .rev()
            .find(|s| s.contains(address))
            .map(|s| s.bytes[(address - s.base) as usize])
            .ok_or(Error::MemoryReadFailed { address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_inside_segment() {
        let mem = ImageMemory::new().with_segment(0x2000_0000, vec![1, 2, 3]);
        assert_eq!(mem.read_byte(0x2000_0002).unwrap(), 3);
        assert_eq!(mem.read_bytes(0x2000_0000, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_read_unmapped_fails() {
        let mem = ImageMemory::new().with_segment(0x2000_0000, vec![1, 2, 3]);
        assert!(matches!(
            mem.read_byte(0x2000_0003),
            Err(Error::MemoryReadFailed {
                address: 0x2000_0003
            })
        ));
        assert!(mem.read_byte(0x1fff_ffff).is_err());
    }

    #[test]
    fn test_later_segment_shadows_earlier() {
        let mem = ImageMemory::new()
            .with_fill(0x1000, 16, 0xFF)
            .with_segment(0x1004, vec![0xAA]);
        assert_eq!(mem.read_byte(0x1003).unwrap(), 0xFF);
        assert_eq!(mem.read_byte(0x1004).unwrap(), 0xAA);
    }

    #[test]
    fn test_poke_updates_bytes() {
        let mut mem = ImageMemory::new().with_fill(0x100, 8, 0);
        mem.poke(0x102, &[0xDE, 0xAD]).unwrap();
        assert_eq!(mem.read_bytes(0x100, 4).unwrap(), vec![0, 0, 0xDE, 0xAD]);
        assert!(mem.poke(0x107, &[1, 2]).is_err());
    }

    #[test]
    fn test_poke_past_top_of_address_space_fails() {
        let mut mem = ImageMemory::new().with_fill(0xFFFF_FFFF, 1, 0);
        let err = mem.poke(0xFFFF_FFFF, &[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            Error::MemoryReadFailed {
                address: 0xFFFF_FFFF
            }
        ));
        assert_eq!(mem.read_byte(0xFFFF_FFFF).unwrap(), 1);
    }

    #[test]
    fn test_map_file_pads_with_fill() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Hello").unwrap();

        let mut mem = ImageMemory::new();
        mem.map_file(file.path(), 0x1000_0000, 8, 0xFF).unwrap();
        assert_eq!(
            mem.read_bytes(0x1000_0000, 8).unwrap(),
            b"Hello\xFF\xFF\xFF".to_vec()
        );
    }

    #[test]
    fn test_map_file_rejects_oversized_image() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 16]).unwrap();

        let mut mem = ImageMemory::new();
        let err = mem.map_file(file.path(), 0x1000_0000, 8, 0xFF).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
