//! Commands that talk to a board over its USB serial port.
//!
//! Each command opens the port, drops whatever the board printed before we
//! connected, sends one request and renders the response the same way
//! `decode` does.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use peeker_core::client::{DEFAULT_BAUD_RATE, rejection, resolve_address, step_address};
use peeker_core::memory::layout::limits::MAX_READ_LEN;
use peeker_core::transcript;
use peeker_core::{DisplayMode, PeekerClient, Request};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use tracing::{debug, info, warn};

use super::decode::{self, Decoded};
use super::pattern::PatternArgs;

/// Raspberry Pi USB vendor ID
const RASPBERRY_PI_VID: u16 = 0x2E8A;
/// Per-read timeout; the client treats a timed-out read as idle
const READ_TIMEOUT: Duration = Duration::from_millis(100);
/// Opening the port can reset a CDC device; let it finish printing its banner
const SETTLE_TIME: Duration = Duration::from_millis(200);

#[derive(Args, Debug, Clone)]
pub struct PortArgs {
    /// Serial device (first Raspberry Pi USB port if omitted)
    #[arg(short, long, env = "PEEKER_PORT")]
    pub port: Option<String>,

    /// Baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
}

pub struct ReadOptions {
    pub target: String,
    pub length: u32,
    pub step: i64,
    pub view: DisplayMode,
    pub json: bool,
}

/// Run the landmarks command
pub fn landmarks(port: &PortArgs, json: bool) -> Result<()> {
    let response = exchange(port, &Request::Landmarks)?;
    let landmarks = transcript::parse_landmarks(&response)?;
    if landmarks.is_empty() {
        warn!("Board reported no landmarks");
    }
    print(&Decoded::Landmarks(landmarks), DisplayMode::Bytes, json)
}

/// Run the read command
pub fn read(port: &PortArgs, options: &ReadOptions) -> Result<()> {
    let request = read_request(options)?;
    let response = exchange(port, &request)?;
    let capture = transcript::parse_hex_dump(&response)?;
    print(&Decoded::Dump(capture), options.view, options.json)
}

/// Run the search command
pub fn search(port: &PortArgs, pattern: &PatternArgs, json: bool) -> Result<()> {
    let request = Request::Search {
        pattern: pattern.pattern()?,
        scope: pattern.scope(),
    };
    info!("{} (waiting up to {:?})", request.line(), request.timeout());
    let response = exchange(port, &request)?;
    let capture = transcript::parse_search(&response);
    print(&Decoded::Search(capture), DisplayMode::Bytes, json)
}

fn read_request(options: &ReadOptions) -> Result<Request> {
    let Some(base) = resolve_address(&options.target) else {
        bail!(
            "Invalid address {:?}. Use hex or one of rom, flash, sram, gpio",
            options.target
        );
    };
    if !(1..=MAX_READ_LEN).contains(&options.length) {
        bail!("Length must be 1-{}", MAX_READ_LEN);
    }
    Ok(Request::Read {
        address: step_address(base, options.step),
        length: options.length,
    })
}

fn exchange(port: &PortArgs, request: &Request) -> Result<String> {
    let mut client = connect(port)?;
    let response = client.request(request)?;
    check(&response)?;
    Ok(response)
}

fn connect(args: &PortArgs) -> Result<PeekerClient<Box<dyn SerialPort>>> {
    let name = match &args.port {
        Some(name) => name.clone(),
        None => detect_port()?,
    };
    info!("Opening {} at {} baud", name, args.baud);

    let port = serialport::new(&name, args.baud)
        .timeout(READ_TIMEOUT)
        .open()
        .with_context(|| format!("Failed to open {}", name))?;
    thread::sleep(SETTLE_TIME);

    let mut client = PeekerClient::new(port);
    client.discard_pending()?;
    Ok(client)
}

fn detect_port() -> Result<String> {
    let ports = serialport::available_ports().context("Failed to list serial ports")?;
    let name = pick_port(&ports).context("No USB serial port found, pass --port")?;
    debug!("Detected {}", name);
    Ok(name)
}

/// Prefer a Raspberry Pi device, then any USB serial port
fn pick_port(ports: &[SerialPortInfo]) -> Option<String> {
    ports
        .iter()
        .find(|p| matches!(&p.port_type, SerialPortType::UsbPort(usb) if usb.vid == RASPBERRY_PI_VID))
        .or_else(|| {
            ports
                .iter()
                .find(|p| matches!(p.port_type, SerialPortType::UsbPort(_)))
        })
        .map(|p| p.port_name.clone())
}

/// Fail on a rejection; pass warnings on to the log
fn check(response: &str) -> Result<()> {
    if let Some(reason) = rejection(response) {
        bail!("Board rejected the command: {}", reason);
    }
    for line in response.lines().filter_map(|l| l.strip_prefix("WARNING: ")) {
        warn!("{}", line);
    }
    Ok(())
}

fn print(decoded: &Decoded, view: DisplayMode, json: bool) -> Result<()> {
    for line in decode::render(decoded, view, json)? {
        println!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn options(target: &str, length: u32, step: i64) -> ReadOptions {
        ReadOptions {
            target: target.to_string(),
            length,
            step,
            view: DisplayMode::Bytes,
            json: false,
        }
    }

    fn usb(name: &str, vid: u16) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid,
                pid: 0x000A,
                serial_number: None,
                manufacturer: None,
                product: None,
            }),
        }
    }

    #[test]
    fn test_read_request_resolves_quick_access() {
        assert_eq!(
            read_request(&options("gpio", 256, 0)).unwrap(),
            Request::Read {
                address: 0x4002_8000,
                length: 256
            }
        );
        assert_eq!(
            read_request(&options("0x20000100", 16, -1)).unwrap(),
            Request::Read {
                address: 0x2000_0000,
                length: 16
            }
        );
    }

    #[test]
    fn test_read_request_rejects_bad_input() {
        assert!(read_request(&options("heap", 16, 0)).is_err());
        assert!(read_request(&options("sram", 0, 0)).is_err());
        assert!(read_request(&options("sram", 4097, 0)).is_err());
        assert!(read_request(&options("sram", 4096, 0)).is_ok());
    }

    #[test]
    fn test_pick_port_prefers_raspberry_pi() {
        let ports = vec![
            SerialPortInfo {
                port_name: "/dev/ttyS0".to_string(),
                port_type: SerialPortType::Unknown,
            },
            usb("/dev/ttyUSB0", 0x0403),
            usb("/dev/ttyACM0", RASPBERRY_PI_VID),
        ];
        assert_eq!(pick_port(&ports).as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(pick_port(&ports[..2]).as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(pick_port(&ports[..1]), None);
    }

    #[test]
    fn test_check_fails_on_rejection() {
        let err = check("ERROR: Address out of valid range\nValid ranges:\n").unwrap_err();
        assert!(err.to_string().contains("Address out of valid range"));
        assert!(check("WARNING: Length clamped\n===END===\n").is_ok());
    }
}
