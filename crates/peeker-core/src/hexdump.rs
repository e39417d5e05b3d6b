//! Hex + ASCII rendering of a bounded memory view.
//!
//! # Output Format
//!
//! ```text
//! Address:  00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F  ASCII
//! --------  -----------------------------------------------  ----------------
//! 20000000: 48 65 6c 6c 6f 00 00 00 00 00 00 00 00 00 00 00  Hello...........
//! ```
//!
//! Rows are produced lazily, one per [`Iterator::next`] call, and each row
//! reads its bytes straight from memory at that moment.

use std::fmt;

use crate::error::Result;
use crate::memory::{MemoryView, ReadMemory};

pub const BYTES_PER_ROW: usize = 16;

/// Column legend printed above the rows
pub const LEGEND: &str =
    "Address:  00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F  ASCII";
pub const RULE: &str =
    "--------  -----------------------------------------------  ----------------";

/// One rendered line of up to 16 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpRow {
    pub address: u32,
    bytes: [u8; BYTES_PER_ROW],
    len: usize,
}

impl DumpRow {
    /// Row holding the first 16 bytes of `bytes`
    pub fn new(address: u32, bytes: &[u8]) -> Self {
        let len = bytes.len().min(BYTES_PER_ROW);
        let mut row = Self {
            address,
            bytes: [0; BYTES_PER_ROW],
            len,
        };
        row.bytes[..len].copy_from_slice(&bytes[..len]);
        row
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Printable ASCII (32..=126) as itself, everything else as `.`
pub fn ascii_char(byte: u8) -> char {
    if (32..=126).contains(&byte) {
        byte as char
    } else {
        '.'
    }
}

impl fmt::Display for DumpRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}: ", self.address)?;

        for j in 0..BYTES_PER_ROW {
            match self.bytes().get(j) {
                Some(byte) => write!(f, "{:02x} ", byte)?,
                None => f.write_str("   ")?,
            }
        }

        f.write_str(" ")?;
        for &byte in self.bytes() {
            write!(f, "{}", ascii_char(byte))?;
        }
        Ok(())
    }
}

/// Lazy row sequence over a view. Stops after the first failed read.
#[derive(Debug)]
pub struct HexDump<'a, R: ?Sized> {
    view: MemoryView<'a, R>,
    offset: u32,
    failed: bool,
}

impl<'a, R: ReadMemory + ?Sized> HexDump<'a, R> {
    pub fn new(view: MemoryView<'a, R>) -> Self {
        Self {
            view,
            offset: 0,
            failed: false,
        }
    }

    pub fn address(&self) -> u32 {
        self.view.start()
    }

    pub fn len(&self) -> u32 {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }
}

impl<R: ReadMemory + ?Sized> Iterator for HexDump<'_, R> {
    type Item = Result<DumpRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.view.len() {
            return None;
        }

        let len = (self.view.len() - self.offset).min(BYTES_PER_ROW as u32) as usize;
        let mut row = DumpRow {
            address: self.view.start() + self.offset,
            bytes: [0; BYTES_PER_ROW],
            len,
        };

        for (i, slot) in row.bytes[..len].iter_mut().enumerate() {
            match self.view.byte(self.offset + i as u32) {
                Ok(byte) => *slot = byte,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }

        self.offset += len as u32;
        Some(Ok(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ImageMemory, RegionTable};

    fn rows(mem: &ImageMemory, address: u32, len: u32) -> Vec<DumpRow> {
        let table = RegionTable::default();
        let view = table.view(mem, address, len).unwrap();
        HexDump::new(view).collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_legend_and_rule_align() {
        assert_eq!(LEGEND.find("ASCII"), RULE.rfind("  ").map(|i| i + 2));
        assert_eq!(RULE.len(), LEGEND.len() + 11);
    }

    #[test]
    fn test_full_row() {
        let bytes: Vec<u8> = (0..16).collect();
        let mem = ImageMemory::new().with_segment(0x2000_0000, bytes);
        let rows = rows(&mem, 0x2000_0000, 16);

        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].to_string(),
            "20000000: 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f  ................"
        );
    }

    #[test]
    fn test_partial_row_is_padded() {
        let mem = ImageMemory::new().with_segment(0x2000_0000, b"Hi!\x7f".to_vec());
        let rows = rows(&mem, 0x2000_0000, 4);

        let expected = format!("20000000: 48 69 21 7f {} Hi!.", "   ".repeat(12));
        assert_eq!(rows[0].to_string(), expected);
    }

    #[test]
    fn test_round_trip_known_bytes() {
        let bytes: Vec<u8> = (0u8..=255).collect();
        let mem = ImageMemory::new().with_segment(0x1000_0000, bytes.clone());
        let rows = rows(&mem, 0x1000_0000, 40);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].address, 0x1000_0020);
        let collected: Vec<u8> = rows.iter().flat_map(|r| r.bytes().to_vec()).collect();
        assert_eq!(collected, bytes[..40]);

        let line = rows[2].to_string();
        assert_eq!(&line[59..], " !\"#$%&'");
    }

    #[test]
    fn test_non_printable_render_as_dot() {
        assert_eq!(ascii_char(0x1F), '.');
        assert_eq!(ascii_char(0x20), ' ');
        assert_eq!(ascii_char(b'~'), '~');
        assert_eq!(ascii_char(0x7F), '.');
        assert_eq!(ascii_char(0xFF), '.');
    }

    #[test]
    fn test_read_failure_stops_sequence() {
        let mem = ImageMemory::new().with_segment(0x2000_0000, vec![0xAA; 20]);
        let table = RegionTable::default();
        let view = table.view(&mem, 0x2000_0000, 48).unwrap();
        let mut dump = HexDump::new(view);

        assert!(dump.next().unwrap().is_ok());
        assert!(dump.next().unwrap().is_err());
        assert!(dump.next().is_none());
    }
}
