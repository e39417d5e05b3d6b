//! Memory map constants for the supported Raspberry Pi Pico devices
//!
//! Every range is half-open: `START` is the first address, `END` the first
//! address past the region.

/// Boot ROM, identical on both devices
pub mod rom {
    pub const START: u32 = 0x0000_0000;
    pub const END: u32 = 0x0000_4000; // 16KB
}

/// APB/AHB peripherals and SIO, identical on both devices
pub mod peripherals {
    pub const START: u32 = 0x4000_0000;
    pub const END: u32 = 0x6000_0000;
    /// RP2350 IO_BANK0 (GPIO control)
    pub const IO_BANK0: u32 = 0x4002_8000;
}

/// RP2350 (Pico 2)
pub mod rp2350 {
    pub const FLASH_START: u32 = 0x1000_0000;
    pub const FLASH_END: u32 = 0x1040_0000; // 4MB
    pub const SRAM_START: u32 = 0x2000_0000;
    pub const SRAM_END: u32 = 0x2008_2000; // 520KB
}

/// RP2040 (Pico 1)
pub mod rp2040 {
    pub const FLASH_START: u32 = 0x1000_0000;
    pub const FLASH_END: u32 = 0x1020_0000; // 2MB
    pub const SRAM_START: u32 = 0x2000_0000;
    pub const SRAM_END: u32 = 0x2004_2000; // 264KB
}

/// Limits applied to a single command
pub mod limits {
    /// Line buffer size including the slot the terminator would take
    pub const LINE_CAPACITY: usize = 128;
    /// Largest line buffer a configuration may ask for
    pub const MAX_LINE_CAPACITY: usize = 4096;
    /// Largest READ length in bytes
    pub const MAX_READ_LEN: u32 = 4096;
    /// Largest search pattern in bytes
    pub const MAX_PATTERN_LEN: usize = 64;
    /// Hits reported before a search stops early
    pub const MAX_SEARCH_HITS: usize = 100;
}

/// Timing constants for the polling loop
pub mod timing {
    /// Pause between two non-blocking reads of the transport (ms)
    pub const POLL_INTERVAL_MS: u64 = 1;
}
