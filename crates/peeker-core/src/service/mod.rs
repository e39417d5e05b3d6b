//! The inspection service.
//!
//! One [`InspectionService`] owns every piece of mutable state: the line
//! assembler, the landmark table and the transport. [`InspectionService::run`]
//! polls one byte at a time with a short interruptible wait in between, and
//! each complete line is parsed and executed to completion before the next
//! byte is looked at.
//!
//! # Example
//!
//! ```
//! use peeker_core::memory::ImageMemory;
//! use peeker_core::service::{BufferTransport, InspectionService};
//!
//! let memory = ImageMemory::new().with_segment(0x2000_0000, b"Hello".to_vec());
//! let transport = BufferTransport::with_input("READ:0x20000000:5\n");
//! let mut service = InspectionService::new(memory, transport);
//!
//! service.drain().unwrap();
//! let lines = service.transport().lines();
//! assert_eq!(lines[0], "=== HEX DUMP ===");
//! assert!(lines[5].ends_with("Hello"));
//! ```

mod launcher;
mod shutdown;
mod transport;

use std::ops::Range;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::command::{Command, CommandParser, Pattern, Rejection, SearchScope};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::hexdump::{HexDump, LEGEND, RULE};
use crate::input::{Assembled, InputAssembler, LineState};
use crate::landmark::{ENTRY_LANDMARK, Landmarks, pointer_address};
use crate::memory::{ReadMemory, RegionTable};
use crate::search::PatternSearch;

pub use launcher::Peeker;
pub use shutdown::ShutdownSignal;
pub use transport::{BufferTransport, ChannelTransport, Transport};

/// Usage text sent once on start-up, before the landmarks
pub const BANNER: &[&str] = &[
    "PicoPeeker ready!",
    "Commands:",
    "  READ:0xADDRESS:LENGTH   - Read memory",
    "  SEARCH:HEXPATTERN       - Search SRAM for hex pattern",
    "  SEARCHFLASH:HEXPATTERN  - Search Flash for hex pattern",
    "  LANDMARKS               - Show memory landmarks",
    "Examples:",
    "  READ:0x20000000:256",
    "  SEARCH:2A000000 (search for int 42 in SRAM)",
    "  SEARCHFLASH:48656C6C6F (search for 'Hello' in Flash)",
    "",
];

pub const END_MARKER: &str = "===END===";

const SELF_REFERENCE_NOTE: &str = " (Maybe Self-Referential - command buffer)";

pub struct InspectionService<R, T> {
    reader: R,
    transport: T,
    regions: RegionTable,
    landmarks: Landmarks,
    input: InputAssembler,
    max_read_len: u32,
    max_hits: usize,
    poll_interval: Duration,
}

impl<R: ReadMemory, T: Transport> InspectionService<R, T> {
    /// Service with the default configuration
    pub fn new(reader: R, transport: T) -> Self {
        Self::with_config(reader, transport, &ServiceConfig::default())
    }

    pub fn with_config(reader: R, transport: T, config: &ServiceConfig) -> Self {
        Self {
            reader,
            transport,
            regions: RegionTable::for_model(config.model),
            landmarks: config.landmark_table(),
            input: InputAssembler::with_capacity(config.line_capacity),
            max_read_len: config.max_read_len,
            max_hits: config.max_hits,
            poll_interval: config.poll_interval(),
        }
    }

    /// Report the program's entry function as `main`, ahead of every other
    /// landmark.
    ///
    /// Pass the function pointer as `main as usize`. A pointer wider than
    /// 32 bits cannot be a device address and is left out.
    ///
    /// ```
    /// use peeker_core::{BufferTransport, ImageMemory, InspectionService};
    ///
    /// let service = InspectionService::new(ImageMemory::new(), BufferTransport::new())
    ///     .with_landmark("counter", 0x2000_1000)
    ///     .with_entry(0x1000_0235);
    /// assert_eq!(service.landmarks().iter().next().unwrap().line(), "main=0x10000235");
    /// ```
    pub fn with_entry(mut self, ptr: usize) -> Self {
        match pointer_address(ptr) {
            Some(address) => self.landmarks.insert_first(ENTRY_LANDMARK, address),
            None => warn!("Entry point {:#x} is not a 32-bit address, not reported", ptr),
        }
        self
    }

    /// Register an extra landmark
    pub fn with_landmark(mut self, name: impl Into<String>, address: u32) -> Self {
        self.landmarks.insert(name, address);
        self
    }

    /// Register the address of a static as a landmark
    pub fn with_static<V>(mut self, name: impl Into<String>, value: &'static V) -> Self {
        self.landmarks = self.landmarks.with_static(name, value);
        self
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn line_state(&self) -> LineState {
        self.input.state()
    }

    /// Send the usage banner followed by the landmarks.
    pub fn announce(&mut self) -> Result<()> {
        for line in BANNER {
            self.send(line)?;
        }
        self.send_landmarks()
    }

    /// Consume at most one input byte, dispatching the line it completes.
    ///
    /// Returns whether a byte was available. Only transport failures are
    /// returned as errors; everything else becomes a response line.
    pub fn poll(&mut self) -> Result<bool> {
        let Some(byte) = self.transport.read_byte()? else {
            return Ok(false);
        };

        if self.input.push(byte) == LineState::LineReady {
            match self.input.take_line() {
                Some(Assembled::Line(line)) => self.handle_line(&line)?,
                Some(Assembled::TooLong { dropped }) => {
                    debug!("Discarded overlong line ({} bytes dropped)", dropped);
                    let reason = Rejection::LineTooLong {
                        max: self.input.max_line_len(),
                    };
                    self.execute(&Command::from(reason))?;
                }
                None => {}
            }
        }
        Ok(true)
    }

    /// Poll until no input is pending
    pub fn drain(&mut self) -> Result<()> {
        while self.poll()? {}
        Ok(())
    }

    /// Parse and execute one command line
    pub fn handle_line(&mut self, line: &str) -> Result<()> {
        let command = CommandParser::new(&self.regions)
            .with_max_read_len(self.max_read_len)
            .parse(line);
        debug!("{:?} -> {:?}", line, command);
        self.execute(&command)
    }

    pub fn execute(&mut self, command: &Command) -> Result<()> {
        match *command {
            Command::ReadMemory {
                address, length, ..
            } => {
                if let Some(requested) = command.clamped_from() {
                    self.send(&format!(
                        "WARNING: Length clamped from {} to {} bytes to stay within region bounds",
                        requested, length
                    ))?;
                }
                self.send_hex_dump(address, length)
            }
            Command::SearchPattern { pattern, scope } => self.send_search(pattern, scope),
            Command::ShowLandmarks => self.send_landmarks(),
            Command::Invalid { ref reason } => self.send_rejection(reason),
        }
    }

    /// Announce, then poll until `shutdown` is triggered or the transport fails.
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> Result<()> {
        info!(
            "Inspection service started ({}, {})",
            self.regions.model(),
            self.regions.model().chip()
        );

        if let Err(e) = self.announce() {
            warn!("Transport failed during start-up: {}", e);
            return Err(e);
        }

        loop {
            if let Err(e) = self.poll() {
                warn!("Transport failed: {}", e);
                return Err(e);
            }
            if shutdown.wait(self.poll_interval) {
                break;
            }
        }

        info!("Inspection service stopped");
        Ok(())
    }

    fn send(&mut self, line: &str) -> Result<()> {
        self.transport.write_line(line)?;
        Ok(())
    }

    fn send_rejection(&mut self, reason: &Rejection) -> Result<()> {
        self.send(&format!("ERROR: {}", reason))?;
        match reason {
            Rejection::MissingPattern { scope } => {
                self.send(&format!("Usage: {}:HEXPATTERN", scope.keyword()))?;
                self.send(&format!("Example: {}", scope.example()))?;
            }
            Rejection::AddressOutOfRange { .. } => {
                self.send("Valid ranges:")?;
                for region in self.regions.regions() {
                    self.transport.write_line(&format!(
                        "  {:<13}0x{:08x}-0x{:08x}",
                        format!("{}:", region.name()),
                        region.start,
                        region.end - 1
                    ))?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn send_landmarks(&mut self) -> Result<()> {
        self.transport.write_line("LANDMARKS:")?;
        for landmark in self.landmarks.iter() {
            self.transport.write_line(&landmark.line())?;
        }
        self.transport.write_line("END_LANDMARKS")?;
        self.transport.write_line("")?;
        Ok(())
    }

    fn send_hex_dump(&mut self, address: u32, length: u32) -> Result<()> {
        let view = match self.regions.view(&self.reader, address, length) {
            Ok(view) => view,
            Err(e) => {
                warn!("Refusing read: {}", e);
                return self.send_rejection(&Rejection::AddressOutOfRange { address });
            }
        };

        let out = &mut self.transport;
        out.write_line("=== HEX DUMP ===")?;
        out.write_line(&format!(
            "Address: 0x{:08x}, Length: {} bytes",
            address, length
        ))?;
        out.write_line("")?;
        out.write_line(LEGEND)?;
        out.write_line(RULE)?;

        for row in HexDump::new(view) {
            match row {
                Ok(row) => out.write_line(&row.to_string())?,
                Err(e) => {
                    warn!("Hex dump stopped: {}", e);
                    out.write_line(&format!("ERROR: {}", e))?;
                    break;
                }
            }
        }

        out.write_line("")?;
        out.write_line(END_MARKER)?;
        Ok(())
    }

    fn send_search(&mut self, pattern: Pattern, scope: SearchScope) -> Result<()> {
        let window = self.self_reference_window();
        let region = *self.regions.region(scope.region_kind());
        let label = scope.label();

        let out = &mut self.transport;
        out.write_line(&format!("=== SEARCHING {} ===", label))?;
        out.write_line(&format!(
            "Range: 0x{:08x} - 0x{:08x} ({} bytes)",
            region.start,
            region.end,
            region.size()
        ))?;
        out.write_line(&format!("Pattern: {} ({} bytes)", pattern, pattern.len()))?;
        out.write_line("")?;

        let view = self.regions.region_view(&self.reader, scope.region_kind());
        let mut search = PatternSearch::new(view, pattern).with_max_hits(self.max_hits);

        for hit in search.by_ref() {
            match hit {
                Ok(hit) => {
                    let note = match &window {
                        Some(w) if w.contains(&hit.address) => SELF_REFERENCE_NOTE,
                        _ => "",
                    };
                    out.write_line(&format!("FOUND: 0x{:08x}{}", hit.address, note))?;
                }
                Err(e) => {
                    warn!("Search of {} stopped: {}", label, e);
                    out.write_line(&format!("ERROR: {}", e))?;
                    break;
                }
            }
        }

        if search.capped() {
            out.write_line(&format!("(stopping after {} matches)", search.max_hits()))?;
        }
        out.write_line(&format!("Total matches in {}: {}", label, search.hits()))?;
        out.write_line("")?;
        out.write_line(END_MARKER)?;

        debug!("Search of {} found {} matches", label, search.hits());
        Ok(())
    }

    /// Device addresses of the line buffer, when the reader can see it.
    fn self_reference_window(&self) -> Option<Range<u32>> {
        let (start, end) = self.input.buffer_span();
        Some(self.reader.device_address(start)?..self.reader.device_address(end)?)
    }
}
