//! Typed commands and their rejections.
//!
//! A command line is turned into a [`Command`] by [`CommandParser`]. Every
//! validation failure is a [`Rejection`] whose `Display` text is what the
//! client sees after `ERROR: `.

pub mod hex;
mod parser;

use std::fmt;

use strum::{Display, IntoStaticStr};
use thiserror::Error;

use crate::memory::RegionKind;
use crate::memory::layout::limits::MAX_PATTERN_LEN;

pub use parser::CommandParser;

/// Region a search command scans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum SearchScope {
    #[strum(serialize = "SRAM")]
    Sram,
    #[strum(serialize = "FLASH")]
    Flash,
}

impl SearchScope {
    /// Label used in search responses ("SRAM", "FLASH")
    pub fn label(&self) -> &'static str {
        self.into()
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Sram => "SEARCH",
            Self::Flash => "SEARCHFLASH",
        }
    }

    pub fn region_kind(&self) -> RegionKind {
        match self {
            Self::Sram => RegionKind::Sram,
            Self::Flash => RegionKind::Flash,
        }
    }

    /// Command line searching this scope for `pattern`
    pub fn command_line(&self, pattern: &Pattern) -> String {
        format!("{}:{}", self.keyword(), pattern.to_hex())
    }

    /// Example shown after a missing-pattern error
    pub fn example(&self) -> &'static str {
        match self {
            Self::Sram => "SEARCH:DEADBEEF",
            Self::Flash => "SEARCHFLASH:48656C6C6F (search for 'Hello')",
        }
    }
}

/// Search pattern held in a fixed buffer of [`MAX_PATTERN_LEN`] bytes
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    buf: [u8; MAX_PATTERN_LEN],
    len: usize,
}

impl Pattern {
    /// Decode an even-length hex string of 1 to 64 bytes.
    ///
    /// Groups are decoded from their leading hex digits only; a malformed
    /// group becomes 0 instead of being rejected.
    pub fn from_hex(token: &str) -> Result<Self, Rejection> {
        let digits = token.as_bytes();
        if digits.len() % 2 != 0 {
            return Err(Rejection::OddDigitCount);
        }

        let len = digits.len() / 2;
        if len == 0 || len > MAX_PATTERN_LEN {
            return Err(Rejection::PatternLength {
                max: MAX_PATTERN_LEN,
            });
        }

        let mut buf = [0u8; MAX_PATTERN_LEN];
        for (slot, pair) in buf.iter_mut().zip(digits.chunks_exact(2)) {
            *slot = hex::decode_hex_pair(pair[0], pair[1]);
        }
        Ok(Self { buf, len })
    }

    /// Build a pattern from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Rejection> {
        if bytes.is_empty() || bytes.len() > MAX_PATTERN_LEN {
            return Err(Rejection::PatternLength {
                max: MAX_PATTERN_LEN,
            });
        }
        let mut buf = [0u8; MAX_PATTERN_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            buf,
            len: bytes.len(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Uppercase hex digits, as typed after `SEARCH:`
    pub fn to_hex(&self) -> String {
        self.as_bytes().iter().map(|b| format!("{:02X}", b)).collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({})", self)
    }
}

/// Lowercase bytes separated by single spaces, e.g. `de ad be ef`
impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Why a command line was not executed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Invalid command")]
    UnknownCommand,

    #[error("Missing search pattern")]
    MissingPattern { scope: SearchScope },

    #[error("Hex pattern must have even number of digits")]
    OddDigitCount,

    #[error("Pattern length must be 1-{max} bytes")]
    PatternLength { max: usize },

    #[error("Missing address")]
    MissingAddress,

    #[error("Invalid address: {token}")]
    MalformedAddress { token: String },

    #[error("Missing length")]
    MissingLength,

    #[error("Invalid length: {token}")]
    MalformedLength { token: String },

    #[error("Length must be 1-{max}")]
    LengthOutOfBounds { max: u32 },

    #[error("Address out of valid range")]
    AddressOutOfRange { address: u32 },

    #[error("Command too long (max {max} characters)")]
    LineTooLong { max: usize },
}

/// A validated operation, or the reason there is none
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Dump `length` bytes at `address`. `requested` differs from `length`
    /// when the read was clamped to the end of its region.
    ReadMemory {
        address: u32,
        length: u32,
        requested: u32,
    },
    SearchPattern {
        pattern: Pattern,
        scope: SearchScope,
    },
    ShowLandmarks,
    Invalid {
        reason: Rejection,
    },
}

impl Command {
    /// Original length of a clamped read
    pub fn clamped_from(&self) -> Option<u32> {
        match *self {
            Command::ReadMemory {
                length, requested, ..
            } if requested != length => Some(requested),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Command::Invalid { .. })
    }
}

impl From<Rejection> for Command {
    fn from(reason: Rejection) -> Self {
        Command::Invalid { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_from_hex() {
        let pattern = Pattern::from_hex("DEADBEEF").unwrap();
        assert_eq!(pattern.as_bytes(), &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(pattern.to_string(), "de ad be ef");
    }

    #[test]
    fn test_pattern_length_bounds() {
        assert_eq!(Pattern::from_hex("ABC"), Err(Rejection::OddDigitCount));
        assert_eq!(
            Pattern::from_hex(""),
            Err(Rejection::PatternLength { max: 64 })
        );
        assert!(Pattern::from_hex(&"ab".repeat(64)).is_ok());
        assert_eq!(
            Pattern::from_hex(&"ab".repeat(65)),
            Err(Rejection::PatternLength { max: 64 })
        );
    }

    #[test]
    fn test_pattern_non_hex_groups_decode_as_zero() {
        let pattern = Pattern::from_hex("zz4g").unwrap();
        assert_eq!(pattern.as_bytes(), &[0x00, 0x04]);
    }

    #[test]
    fn test_pattern_from_bytes() {
        let pattern = Pattern::from_bytes(b"Hello").unwrap();
        assert_eq!(pattern.len(), 5);
        assert!(Pattern::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_command_line_for_scope() {
        let pattern = Pattern::from_bytes(b"Hello").unwrap();
        assert_eq!(
            SearchScope::Flash.command_line(&pattern),
            "SEARCHFLASH:48656C6C6F"
        );
        let pattern = Pattern::from_bytes(&42i32.to_le_bytes()).unwrap();
        assert_eq!(SearchScope::Sram.command_line(&pattern), "SEARCH:2A000000");
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            Rejection::LengthOutOfBounds { max: 4096 }.to_string(),
            "Length must be 1-4096"
        );
        assert_eq!(
            Rejection::PatternLength { max: 64 }.to_string(),
            "Pattern length must be 1-64 bytes"
        );
        assert_eq!(
            Rejection::AddressOutOfRange {
                address: 0x9000_0000
            }
            .to_string(),
            "Address out of valid range"
        );
    }

    #[test]
    fn test_clamped_from() {
        let clamped = Command::ReadMemory {
            address: 0x2008_1FF0,
            length: 16,
            requested: 32,
        };
        assert_eq!(clamped.clamped_from(), Some(32));
        assert_eq!(Command::ShowLandmarks.clamped_from(), None);
    }
}
