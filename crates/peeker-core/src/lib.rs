//! # peeker-core
//!
//! Live memory inspection for RP2040/RP2350 boards.
//!
//! This crate provides:
//! - A fixed memory-region table and bounded views over a memory source
//! - A line-oriented command protocol (`READ`, `SEARCH`, `SEARCHFLASH`, `LANDMARKS`)
//! - Hex dump rendering and exact pattern search
//! - The inspection service loop and a spawn-once background launcher
//! - Decoding of captured service output
//! - A host-side client that sends one command and collects its response
//!
//! Memory is only ever read through a [`MemoryView`], and only a
//! [`RegionTable`] hands those out.

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod hexdump;
pub mod input;
pub mod landmark;
pub mod memory;
pub mod search;
pub mod service;
pub mod transcript;

pub use client::{PeekerClient, QuickAccess, Request};
pub use command::{Command, CommandParser, Pattern, Rejection, SearchScope};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{Error, Result};
pub use hexdump::{DumpRow, HexDump};
pub use input::{Assembled, InputAssembler, LineState};
pub use landmark::{Landmark, Landmarks};
pub use memory::{
    DeviceModel, ImageMemory, MemoryRegion, MemoryView, RawMemory, ReadMemory, RegionKind,
    RegionTable,
};
pub use search::{PatternSearch, SearchHit};
pub use service::{
    BufferTransport, ChannelTransport, InspectionService, Peeker, ShutdownSignal, Transport,
};
pub use transcript::{DisplayMode, DumpCapture, SearchCapture};
