//! Well-known addresses reported to orient raw dumps
//!
//! The embedding application registers the symbols it cares about (its
//! `main`, a few globals) and the service prints them on start-up and for
//! every `LANDMARKS` command.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::command::hex::format_hex_address;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: String,
    pub address: u32,
}

impl Landmark {
    pub fn new(name: impl Into<String>, address: u32) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }

    /// `name=0x20000000`
    pub fn line(&self) -> String {
        format!("{}={}", self.name, format_hex_address(self.address))
    }
}

/// Name under which the program's entry function is reported
pub const ENTRY_LANDMARK: &str = "main";

/// Device address of a pointer, or `None` when it does not fit in 32 bits
/// (any pointer on a 64-bit host outside the low 4GB).
pub fn pointer_address(ptr: usize) -> Option<u32> {
    u32::try_from(ptr).ok()
}

/// Ordered name → address table. Names are unique; re-adding a name moves
/// its address, not its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Landmarks {
    entries: Vec<Landmark>,
}

impl Landmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, address: u32) -> Self {
        self.insert(name, address);
        self
    }

    /// Register a pointer. Pointers wider than 32 bits are skipped.
    pub fn with_pointer(mut self, name: impl Into<String>, ptr: usize) -> Self {
        let name = name.into();
        match pointer_address(ptr) {
            Some(address) => self.insert(name, address),
            None => warn!("Landmark {} at {:#x} is not a 32-bit address, skipped", name, ptr),
        }
        self
    }

    /// Register the address of a static
    pub fn with_static<T>(self, name: impl Into<String>, value: &'static T) -> Self {
        self.with_pointer(name, value as *const T as usize)
    }

    pub fn insert(&mut self, name: impl Into<String>, address: u32) {
        let name = name.into();
        match self.entries.iter_mut().find(|l| l.name == name) {
            Some(existing) => existing.address = address,
            None => self.entries.push(Landmark { name, address }),
        }
    }

    /// Insert `name` at the head of the table, moving it if already present.
    pub fn insert_first(&mut self, name: impl Into<String>, address: u32) {
        let name = name.into();
        self.entries.retain(|l| l.name != name);
        self.entries.insert(0, Landmark { name, address });
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Landmark> for Landmarks {
    fn from_iter<I: IntoIterator<Item = Landmark>>(iter: I) -> Self {
        let mut landmarks = Landmarks::new();
        for landmark in iter {
            landmarks.insert(landmark.name, landmark.address);
        }
        landmarks
    }
}

impl Extend<Landmark> for Landmarks {
    fn extend<I: IntoIterator<Item = Landmark>>(&mut self, iter: I) {
        for landmark in iter {
            self.insert(landmark.name, landmark.address);
        }
    }
}
