//! Exact byte-pattern search over a bounded view
//!
//! A plain sliding-window scan: every start offset is compared byte by byte.
//! Hits are yielded as they are found and the scan stops for good once the
//! hit cap is reached.

use crate::command::Pattern;
use crate::error::Result;
use crate::memory::layout::limits::MAX_SEARCH_HITS;
use crate::memory::{MemoryView, ReadMemory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    pub address: u32,
}

/// Lazy hit sequence. Not restartable; build a new one to search again.
#[derive(Debug)]
pub struct PatternSearch<'a, R: ?Sized> {
    view: MemoryView<'a, R>,
    pattern: Pattern,
    offset: u32,
    found: usize,
    max_hits: usize,
    capped: bool,
    done: bool,
}

impl<'a, R: ReadMemory + ?Sized> PatternSearch<'a, R> {
    pub fn new(view: MemoryView<'a, R>, pattern: Pattern) -> Self {
        Self {
            view,
            pattern,
            offset: 0,
            found: 0,
            max_hits: MAX_SEARCH_HITS,
            capped: false,
            done: false,
        }
    }

    pub fn with_max_hits(mut self, max_hits: usize) -> Self {
        self.max_hits = max_hits;
        self
    }

    pub fn view(&self) -> &MemoryView<'a, R> {
        &self.view
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Hits yielded so far
    pub fn hits(&self) -> usize {
        self.found
    }

    /// Whether the scan stopped because the hit cap was reached
    pub fn capped(&self) -> bool {
        self.capped
    }

    pub fn max_hits(&self) -> usize {
        self.max_hits
    }

    fn matches_at(&self, offset: u32) -> Result<bool> {
        for (i, &expected) in self.pattern.as_bytes().iter().enumerate() {
            if self.view.byte(offset + i as u32)? != expected {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<R: ReadMemory + ?Sized> Iterator for PatternSearch<'_, R> {
    type Item = Result<SearchHit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.found >= self.max_hits {
            self.capped = true;
            self.done = true;
            return None;
        }

        let pattern_len = self.pattern.len() as u32;
        let Some(last) = self.view.len().checked_sub(pattern_len) else {
            self.done = true;
            return None;
        };

        while self.offset <= last {
            let offset = self.offset;
            self.offset += 1;

            match self.matches_at(offset) {
                Ok(true) => {
                    self.found += 1;
                    if self.found >= self.max_hits {
                        self.capped = true;
                        self.done = true;
                    }
                    return Some(Ok(SearchHit {
                        address: self.view.start() + offset,
                    }));
                }
                Ok(false) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        self.done = true;
        None
    }
}
