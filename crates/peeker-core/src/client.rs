//! Host side of the protocol
//!
//! [`PeekerClient`] sends one command over a byte stream (usually a serial
//! port opened by the CLI) and collects the response until its terminator
//! shows up or the command's time budget runs out.

use std::io::{self, Read, Write};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, warn};

use crate::command::hex::{format_hex_address, parse_hex_address};
use crate::command::{Pattern, SearchScope};
use crate::error::{Error, Result};
use crate::memory::layout::{peripherals, rom, rp2350};
use crate::service::END_MARKER;

/// USB CDC ignores it, but UART bridges need it
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Bytes moved by one step of the address stepper
pub const PAGE_SIZE: u32 = 256;

const LANDMARKS_END: &str = "END_LANDMARKS";
const CHUNK_SIZE: usize = 1024;
const STALE_CHUNK_SIZE: usize = 4096;
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// One command as the client sends it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Landmarks,
    Read { address: u32, length: u32 },
    Search { pattern: Pattern, scope: SearchScope },
}

impl Request {
    /// Command line, without the newline
    pub fn line(&self) -> String {
        match self {
            Self::Landmarks => "LANDMARKS".to_string(),
            Self::Read { address, length } => {
                format!("READ:{}:{}", format_hex_address(*address), length)
            }
            Self::Search { pattern, scope } => scope.command_line(pattern),
        }
    }

    /// Text that closes a complete response
    pub fn terminator(&self) -> &'static str {
        match self {
            Self::Landmarks => LANDMARKS_END,
            _ => END_MARKER,
        }
    }

    /// How long to wait for the terminator. Flash is eight times the size
    /// of SRAM and takes proportionally longer to scan.
    pub fn timeout(&self) -> Duration {
        match self {
            Self::Landmarks => Duration::from_secs(2),
            Self::Read { .. } => Duration::from_secs(5),
            Self::Search {
                scope: SearchScope::Sram,
                ..
            } => Duration::from_secs(30),
            Self::Search {
                scope: SearchScope::Flash,
                ..
            } => Duration::from_secs(120),
        }
    }
}

/// Sends requests over `port` and reads their responses.
///
/// `port` should time out its reads after a short interval; a timed-out
/// read counts as "nothing yet".
pub struct PeekerClient<P> {
    port: P,
}

impl<P: Read + Write> PeekerClient<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    pub fn get_ref(&self) -> &P {
        &self.port
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    /// Drop whatever the device sent before we started listening (the
    /// start-up banner, the tail of an earlier response).
    pub fn discard_pending(&mut self) -> Result<usize> {
        let mut stale = [0u8; STALE_CHUNK_SIZE];
        let n = match self.port.read(&mut stale) {
            Ok(n) => n,
            Err(e) if is_idle(&e) => 0,
            Err(e) => return Err(e.into()),
        };
        if n > 0 {
            debug!("Discarded {} stale bytes", n);
        }
        Ok(n)
    }

    /// Send `request` and wait up to its own timeout for the response
    pub fn request(&mut self, request: &Request) -> Result<String> {
        self.request_within(request, request.timeout())
    }

    /// Send `request` and collect its response.
    ///
    /// Stops at the terminator, or once an `ERROR:` response has gone quiet.
    /// At the deadline a partial response is returned as is; no response at
    /// all is [`Error::NoResponse`].
    pub fn request_within(&mut self, request: &Request, timeout: Duration) -> Result<String> {
        let line = request.line();
        debug!("Sending {}", line);
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;

        let terminator = request.terminator().as_bytes();
        let deadline = Instant::now() + timeout;
        let mut response = Vec::new();
        let mut chunk = [0u8; CHUNK_SIZE];

        while Instant::now() < deadline {
            let n = match self.port.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if is_idle(&e) => 0,
                Err(e) => return Err(e.into()),
            };

            if n == 0 {
                if is_rejection(&response) {
                    break;
                }
                thread::sleep(IDLE_BACKOFF);
                continue;
            }

            // The terminator may straddle two chunks
            let from = response.len().saturating_sub(terminator.len() - 1);
            response.extend_from_slice(&chunk[..n]);
            if contains(&response[from..], terminator) {
                debug!("{} answered with {} bytes", line, response.len());
                return Ok(String::from_utf8_lossy(&response).into_owned());
            }
        }

        if response.is_empty() {
            return Err(Error::NoResponse {
                command: line,
                timeout,
            });
        }
        if !is_rejection(&response) {
            warn!(
                "{} got {} bytes but no {} within {:?}",
                line,
                response.len(),
                request.terminator(),
                timeout
            );
        }
        Ok(String::from_utf8_lossy(&response).into_owned())
    }
}

fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn is_rejection(response: &[u8]) -> bool {
    response.starts_with(b"ERROR:") && response.ends_with(b"\n")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Reason the device gave for refusing a command, if it did
pub fn rejection(response: &str) -> Option<&str> {
    response
        .lines()
        .find_map(|l| l.trim_end().strip_prefix("ERROR: "))
}

/// Named starting points for a read (RP2350 map)
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum QuickAccess {
    Rom,
    Flash,
    Sram,
    Gpio,
}

impl QuickAccess {
    pub fn address(&self) -> u32 {
        match self {
            Self::Rom => rom::START,
            Self::Flash => rp2350::FLASH_START,
            Self::Sram => rp2350::SRAM_START,
            Self::Gpio => peripherals::IO_BANK0,
        }
    }
}

/// Read target given as a quick-access name (`sram`) or a hex address
pub fn resolve_address(token: &str) -> Option<u32> {
    QuickAccess::from_str(token)
        .map(|q| q.address())
        .ok()
        .or_else(|| parse_hex_address(token))
}

/// Move `address` by `pages` pages of [`PAGE_SIZE`], stopping at either end
/// of the address space.
pub fn step_address(address: u32, pages: i64) -> u32 {
    let target = i64::from(address).saturating_add(pages.saturating_mul(i64::from(PAGE_SIZE)));
    target.clamp(0, i64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays canned chunks, then times out like an idle serial port
    #[derive(Default)]
    struct ScriptedPort {
        incoming: VecDeque<Vec<u8>>,
        written: Vec<u8>,
    }

    impl ScriptedPort {
        fn replying(chunks: &[&str]) -> Self {
            Self {
                incoming: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
                written: Vec::new(),
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(mut chunk) = self.incoming.pop_front() else {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "idle"));
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.incoming.push_front(chunk.split_off(n));
            }
            Ok(n)
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sram_search(hex: &str) -> Request {
        Request::Search {
            pattern: Pattern::from_hex(hex).unwrap(),
            scope: SearchScope::Sram,
        }
    }

    #[test]
    fn test_request_lines() {
        assert_eq!(Request::Landmarks.line(), "LANDMARKS");
        assert_eq!(
            Request::Read {
                address: 0x2000_0000,
                length: 256
            }
            .line(),
            "READ:0x20000000:256"
        );
        assert_eq!(sram_search("DEADBEEF").line(), "SEARCH:DEADBEEF");
    }

    #[test]
    fn test_timeouts_per_command() {
        assert_eq!(Request::Landmarks.timeout(), Duration::from_secs(2));
        assert_eq!(
            Request::Read {
                address: 0,
                length: 1
            }
            .timeout(),
            Duration::from_secs(5)
        );
        assert_eq!(sram_search("00").timeout(), Duration::from_secs(30));
        let flash = Request::Search {
            pattern: Pattern::from_hex("00").unwrap(),
            scope: SearchScope::Flash,
        };
        assert_eq!(flash.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_reads_until_split_terminator() {
        let port = ScriptedPort::replying(&[
            "LANDMARKS:\nmain=0x10000235\nEND_LAND",
            "MARKS\n\n",
            "LANDMARKS:\n",
        ]);
        let mut client = PeekerClient::new(port);

        let response = client.request(&Request::Landmarks).unwrap();
        assert_eq!(response, "LANDMARKS:\nmain=0x10000235\nEND_LANDMARKS\n\n");

        let port = client.into_inner();
        assert_eq!(port.written, b"LANDMARKS\n");
        assert_eq!(port.incoming.len(), 1);
    }

    #[test]
    fn test_long_response_crosses_chunks() {
        let body = "20000000: 00\n".repeat(200);
        let reply = format!("=== HEX DUMP ===\n{}\n===END===\n", body);
        let mut client = PeekerClient::new(ScriptedPort::replying(&[&reply]));

        let response = client
            .request(&Request::Read {
                address: 0x2000_0000,
                length: 1,
            })
            .unwrap();
        assert_eq!(response, reply);
    }

    #[test]
    fn test_silence_is_no_response() {
        let mut client = PeekerClient::new(ScriptedPort::default());
        let err = client
            .request_within(&Request::Landmarks, Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, Error::NoResponse { ref command, .. } if command == "LANDMARKS"));
    }

    #[test]
    fn test_partial_response_returned_at_deadline() {
        let mut client = PeekerClient::new(ScriptedPort::replying(&["=== SEARCHING SRAM ===\n"]));
        let response = client
            .request_within(&sram_search("DEADBEEF"), Duration::from_millis(20))
            .unwrap();
        assert_eq!(response, "=== SEARCHING SRAM ===\n");
    }

    #[test]
    fn test_rejection_ends_wait_early() {
        let mut client = PeekerClient::new(ScriptedPort::replying(&[
            "ERROR: Length must be 1-4096\n",
        ]));
        let start = Instant::now();
        let response = client
            .request_within(
                &Request::Read {
                    address: 0x2000_0000,
                    length: 5000,
                },
                Duration::from_secs(10),
            )
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(rejection(&response), Some("Length must be 1-4096"));
    }

    #[test]
    fn test_stale_bytes_are_discarded() {
        let mut client = PeekerClient::new(ScriptedPort::replying(&[
            "=== PicoPeeker ready ===\n",
            "LANDMARKS:\nEND_LANDMARKS\n",
        ]));
        assert_eq!(client.discard_pending().unwrap(), 25);
        assert_eq!(client.discard_pending().unwrap(), 25);
        assert_eq!(client.discard_pending().unwrap(), 0);
    }

    #[test]
    fn test_rejection_text() {
        assert_eq!(rejection("ERROR: Invalid command\r\n"), Some("Invalid command"));
        assert_eq!(rejection("WARNING: Length clamped\n===END===\n"), None);
    }

    #[test]
    fn test_quick_access_addresses() {
        assert_eq!(resolve_address("rom"), Some(0x0000_0000));
        assert_eq!(resolve_address("Flash"), Some(0x1000_0000));
        assert_eq!(resolve_address("SRAM"), Some(0x2000_0000));
        assert_eq!(resolve_address("gpio"), Some(0x4002_8000));
        assert_eq!(resolve_address("0x20001000"), Some(0x2000_1000));
        assert_eq!(resolve_address("heap"), None);
    }

    #[test]
    fn test_step_address_saturates() {
        assert_eq!(step_address(0x2000_0000, 1), 0x2000_0100);
        assert_eq!(step_address(0x2000_0000, -2), 0x1FFF_FE00);
        assert_eq!(step_address(0x80, -1), 0);
        assert_eq!(step_address(0xFFFF_FF80, 1), u32::MAX);
        assert_eq!(step_address(0x1000, i64::MIN), 0);
    }
}
