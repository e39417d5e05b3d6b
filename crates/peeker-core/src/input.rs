//! Line discipline: turns a byte stream into command lines.
//!
//! ```text
//! Idle --byte--> Accumulating --\n or \r--> LineReady --take_line--> Idle
//! ```
//!
//! Terminators on an empty buffer are ignored, which also swallows the second
//! half of a `\r\n` pair. Once the buffer holds `capacity - 1` bytes the rest
//! of the line is dropped; when its terminator arrives the line is reported
//! as [`Assembled::TooLong`] instead of being dispatched truncated.

use tracing::warn;

use crate::memory::layout::limits::{LINE_CAPACITY, MAX_LINE_CAPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Idle,
    Accumulating,
    LineReady,
}

/// A finished line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembled {
    Line(String),
    /// The line overflowed the buffer; `dropped` bytes were discarded
    TooLong { dropped: usize },
}

#[derive(Debug)]
pub struct InputAssembler {
    buffer: Vec<u8>,
    capacity: usize,
    dropped: usize,
    state: LineState,
}

impl InputAssembler {
    pub fn new() -> Self {
        Self::with_capacity(LINE_CAPACITY)
    }

    /// `capacity` counts the terminator slot, so lines hold at most
    /// `capacity - 1` bytes. It is kept within `2..=MAX_LINE_CAPACITY`.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(2, MAX_LINE_CAPACITY);
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
            state: LineState::Idle,
        }
    }

    pub fn state(&self) -> LineState {
        self.state
    }

    /// Longest line that can be dispatched
    pub fn max_line_len(&self) -> usize {
        self.capacity - 1
    }

    /// Bytes currently buffered
    pub fn cursor(&self) -> usize {
        self.buffer.len()
    }

    /// Address range of the line buffer, for spotting search hits on the
    /// command being executed.
    pub fn buffer_span(&self) -> (usize, usize) {
        let start = self.buffer.as_ptr() as usize;
        (start, start + self.capacity)
    }

    /// Feed one byte and return the resulting state.
    ///
    /// While a line is ready further bytes are ignored until it is taken.
    pub fn push(&mut self, byte: u8) -> LineState {
        match self.state {
            LineState::LineReady => {}
            _ if byte == b'\n' || byte == b'\r' => {
                if !self.buffer.is_empty() || self.dropped > 0 {
                    self.state = LineState::LineReady;
                }
            }
            _ if !is_printable(byte) => {}
            _ if self.buffer.len() < self.max_line_len() => {
                self.buffer.push(byte);
                self.state = LineState::Accumulating;
            }
            _ => {
                if self.dropped == 0 {
                    warn!(
                        "Command line exceeds {} bytes, dropping input until end of line",
                        self.max_line_len()
                    );
                }
                self.dropped += 1;
            }
        }
        self.state
    }

    /// Take the ready line and return to `Idle`.
    pub fn take_line(&mut self) -> Option<Assembled> {
        if self.state != LineState::LineReady {
            return None;
        }

        let assembled = if self.dropped > 0 {
            Assembled::TooLong {
                dropped: self.dropped,
            }
        } else {
            Assembled::Line(String::from_utf8_lossy(&self.buffer).into_owned())
        };

        self.buffer.clear();
        self.dropped = 0;
        self.state = LineState::Idle;
        Some(assembled)
    }
}

impl Default for InputAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn is_printable(byte: u8) -> bool {
    byte == b'\t' || byte >= 0x20 && byte != 0x7F
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(assembler: &mut InputAssembler, bytes: &[u8]) -> Vec<Assembled> {
        let mut lines = Vec::new();
        for &b in bytes {
            if assembler.push(b) == LineState::LineReady {
                lines.extend(assembler.take_line());
            }
        }
        lines
    }

    #[test]
    fn test_initial_state() {
        let assembler = InputAssembler::new();
        assert_eq!(assembler.state(), LineState::Idle);
        assert_eq!(assembler.cursor(), 0);
        assert_eq!(assembler.max_line_len(), 127);
    }

    #[test]
    fn test_transitions() {
        let mut assembler = InputAssembler::new();
        assert_eq!(assembler.push(b'L'), LineState::Accumulating);
        assert_eq!(assembler.cursor(), 1);
        assert_eq!(assembler.push(b'\n'), LineState::LineReady);
        assert_eq!(
            assembler.take_line(),
            Some(Assembled::Line("L".to_string()))
        );
        assert_eq!(assembler.state(), LineState::Idle);
        assert_eq!(assembler.take_line(), None);
    }

    #[test]
    fn test_both_terminators_and_crlf() {
        let mut assembler = InputAssembler::new();
        let lines = feed(&mut assembler, b"LANDMARKS\r\nREAD:0x20000000:16\n");
        assert_eq!(
            lines,
            vec![
                Assembled::Line("LANDMARKS".to_string()),
                Assembled::Line("READ:0x20000000:16".to_string()),
            ]
        );
    }

    #[test]
    fn test_terminator_on_empty_buffer_is_ignored() {
        let mut assembler = InputAssembler::new();
        assert_eq!(assembler.push(b'\n'), LineState::Idle);
        assert_eq!(assembler.push(b'\r'), LineState::Idle);
        assert!(feed(&mut assembler, b"\n\n\r").is_empty());
    }

    #[test]
    fn test_control_bytes_are_skipped() {
        let mut assembler = InputAssembler::new();
        let lines = feed(&mut assembler, b"LAND\x00MARKS\x1b\n");
        assert_eq!(lines, vec![Assembled::Line("LANDMARKS".to_string())]);
    }

    #[test]
    fn test_overflow_reports_too_long() {
        let mut assembler = InputAssembler::with_capacity(8);
        let lines = feed(&mut assembler, b"0123456789\nLANDMARKS\n");

        assert_eq!(lines[0], Assembled::TooLong { dropped: 3 });
        // Line after the overflow is unaffected, but still bounded.
        assert_eq!(lines[1], Assembled::TooLong { dropped: 2 });

        let lines = feed(&mut assembler, b"READ\n");
        assert_eq!(lines, vec![Assembled::Line("READ".to_string())]);
    }

    #[test]
    fn test_capacity_is_bounded() {
        assert_eq!(InputAssembler::with_capacity(0).max_line_len(), 1);
        assert_eq!(
            InputAssembler::with_capacity(usize::MAX).max_line_len(),
            MAX_LINE_CAPACITY - 1
        );
    }

    #[test]
    fn test_line_at_capacity_minus_one_fits() {
        let mut assembler = InputAssembler::with_capacity(8);
        let lines = feed(&mut assembler, b"0123456\n");
        assert_eq!(lines, vec![Assembled::Line("0123456".to_string())]);
    }

    #[test]
    fn test_bytes_ignored_while_line_ready() {
        let mut assembler = InputAssembler::new();
        assembler.push(b'A');
        assembler.push(b'\n');
        assert_eq!(assembler.push(b'B'), LineState::LineReady);
        assert_eq!(
            assembler.take_line(),
            Some(Assembled::Line("A".to_string()))
        );
    }
}
