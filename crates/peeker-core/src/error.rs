use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Memory read failed at 0x{address:08x}")]
    MemoryReadFailed { address: u32 },

    #[error("Address 0x{address:08x} is outside every known region")]
    Unclassified { address: u32 },

    #[error("Range 0x{start:08x}+{len} crosses the end of its region")]
    CrossesRegion { start: u32, len: u32 },

    #[error("Offset {offset} is outside a {len}-byte view")]
    OutOfView { offset: u32, len: u32 },

    #[error("Service thread panicked")]
    ServicePanicked,

    #[error("Malformed transcript: {0}")]
    Transcript(String),

    #[error("No response to {command} within {timeout:?}")]
    NoResponse { command: String, timeout: Duration },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error came from the transport rather than from memory or parsing
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}
