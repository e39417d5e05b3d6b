//! Decoding captured service output.
//!
//! A client that saved what the service printed can turn it back into data:
//! the bytes of a hex dump, the landmark table, or the hits of a search. A
//! recovered dump can be re-rendered as little-endian words or floats.

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

use crate::command::hex::parse_hex_address;
use crate::error::{Error, Result};
use crate::hexdump::{BYTES_PER_ROW, DumpRow, LEGEND, RULE};
use crate::landmark::Landmarks;
use crate::service::END_MARKER;

/// Bytes recovered from a hex dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpCapture {
    pub address: u32,
    pub bytes: Vec<u8>,
}

/// Hits recovered from a search response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchCapture {
    pub region: Option<String>,
    pub hits: Vec<u32>,
    pub capped: bool,
}

/// How a recovered dump is rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DisplayMode {
    /// The original hex + ASCII rows
    #[default]
    Bytes,
    /// 16-bit little-endian words
    U16,
    /// 32-bit little-endian words, signed and unsigned
    U32,
    /// 32-bit little-endian floats
    F32,
}

/// Split a dump row into its address and the hex byte column.
fn split_row(line: &str) -> Option<(u32, &str)> {
    let (address, rest) = line.split_once(": ")?;
    if address.len() != 8 || !address.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let address = u32::from_str_radix(address, 16).ok()?;
    // Hex column ends at the first double space; the ASCII column follows.
    let hex = rest.split("  ").next().unwrap_or(rest);
    Some((address, hex))
}

/// Recover the start address and bytes of a `READ` response.
///
/// The start address comes from the `Address: 0x..., Length: ...` header,
/// or from the first row when the header is missing.
pub fn parse_hex_dump(text: &str) -> Result<DumpCapture> {
    let mut header_address = None;
    let mut first_row = None;
    let mut bytes = Vec::new();

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("Address: 0x") {
            let token = rest.split(',').next().unwrap_or(rest);
            header_address = header_address.or_else(|| parse_hex_address(token));
            continue;
        }
        let Some((address, hex)) = split_row(line) else {
            continue;
        };
        first_row.get_or_insert(address);
        for token in hex.split_whitespace() {
            if token.len() != 2 {
                continue;
            }
            if let Ok(byte) = u8::from_str_radix(token, 16) {
                bytes.push(byte);
            }
        }
    }

    let address = header_address
        .or(first_row)
        .ok_or_else(|| Error::Transcript("no hex dump found".to_string()))?;
    if bytes.is_empty() {
        return Err(Error::Transcript("hex dump holds no bytes".to_string()));
    }
    Ok(DumpCapture { address, bytes })
}

/// Recover the table of a `LANDMARKS` response.
pub fn parse_landmarks(text: &str) -> Result<Landmarks> {
    let mut lines = text.lines().skip_while(|l| l.trim() != "LANDMARKS:");
    if lines.next().is_none() {
        return Err(Error::Transcript("no LANDMARKS section".to_string()));
    }

    let mut landmarks = Landmarks::new();
    for line in lines.take_while(|l| l.trim() != "END_LANDMARKS") {
        let Some((name, value)) = line.trim().split_once('=') else {
            continue;
        };
        if let Some(address) = parse_hex_address(value) {
            landmarks.insert(name, address);
        }
    }
    Ok(landmarks)
}

/// Recover the hits of a `SEARCH`/`SEARCHFLASH` response.
pub fn parse_search(text: &str) -> SearchCapture {
    let mut capture = SearchCapture {
        region: None,
        hits: Vec::new(),
        capped: false,
    };

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("=== SEARCHING ") {
            capture.region = rest.strip_suffix(" ===").map(str::to_string);
        } else if let Some(rest) = line.strip_prefix("FOUND: ") {
            let token = rest.split_whitespace().next().unwrap_or(rest);
            if let Some(address) = parse_hex_address(token) {
                capture.hits.push(address);
            }
        } else if line.starts_with("(stopping after ") {
            capture.capped = true;
        }
    }
    capture
}

fn bytes_column(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a dump in the chosen mode, one output line per element.
pub fn render(capture: &DumpCapture, mode: DisplayMode) -> Vec<String> {
    match mode {
        DisplayMode::Bytes => render_bytes(capture),
        DisplayMode::U16 => render_u16(capture),
        DisplayMode::U32 => render_u32(capture),
        DisplayMode::F32 => render_f32(capture),
    }
}

fn render_bytes(capture: &DumpCapture) -> Vec<String> {
    let mut lines = vec![
        "=== HEX DUMP ===".to_string(),
        format!(
            "Address: 0x{:08x}, Length: {} bytes",
            capture.address,
            capture.bytes.len()
        ),
        String::new(),
        LEGEND.to_string(),
        RULE.to_string(),
    ];
    for (i, chunk) in capture.bytes.chunks(BYTES_PER_ROW).enumerate() {
        let address = capture.address.wrapping_add((i * BYTES_PER_ROW) as u32);
        lines.push(DumpRow::new(address, chunk).to_string());
    }
    lines.push(String::new());
    lines.push(END_MARKER.to_string());
    lines
}

fn render_u16(capture: &DumpCapture) -> Vec<String> {
    let mut lines = vec![
        "=== 16-bit Word View (Little-Endian) ===".to_string(),
        String::new(),
        "Address:  Hex Bytes  Value      Decimal".to_string(),
        "--------  ---------  ------     --------".to_string(),
    ];

    let mut chunks = capture.bytes.chunks_exact(2);
    for (i, pair) in chunks.by_ref().enumerate() {
        let address = capture.address.wrapping_add((i * 2) as u32);
        let value = u16::from_le_bytes([pair[0], pair[1]]);
        lines.push(format!(
            "{:08x}: {:02x} {:02x}     0x{:04x}     {}",
            address, pair[0], pair[1], value, value as i16
        ));
    }
    if let &[byte] = chunks.remainder() {
        let address = capture
            .address
            .wrapping_add((capture.bytes.len() - 1) as u32);
        lines.push(format!(
            "{:08x}: {:02x}        0x{:02x}       {} (partial)",
            address, byte, byte, byte as i8
        ));
    }

    lines.push(String::new());
    lines.push(END_MARKER.to_string());
    lines
}

fn render_u32(capture: &DumpCapture) -> Vec<String> {
    let mut lines = vec![
        "=== 32-bit Word View (Little-Endian) ===".to_string(),
        String::new(),
        "Address:  Hex Bytes        Value       Decimal (signed)  Decimal (unsigned)".to_string(),
        "--------  ---------------  ----------  ----------------  ------------------".to_string(),
    ];

    let mut chunks = capture.bytes.chunks_exact(4);
    for (i, word) in chunks.by_ref().enumerate() {
        let address = capture.address.wrapping_add((i * 4) as u32);
        let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        lines.push(format!(
            "{:08x}: {}  0x{:08x}  {:<16}  {}",
            address,
            bytes_column(word),
            value,
            value as i32,
            value
        ));
    }
    push_partial(&mut lines, capture, chunks.remainder(), "(partial word)");

    lines.push(String::new());
    lines.push(END_MARKER.to_string());
    lines
}

fn render_f32(capture: &DumpCapture) -> Vec<String> {
    let mut lines = vec![
        "=== Float View (32-bit, Little-Endian) ===".to_string(),
        String::new(),
        "Address:  Hex Bytes        Float Value".to_string(),
        "--------  ---------------  -----------".to_string(),
    ];

    let mut chunks = capture.bytes.chunks_exact(4);
    for (i, word) in chunks.by_ref().enumerate() {
        let address = capture.address.wrapping_add((i * 4) as u32);
        let value = f32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        lines.push(format!(
            "{:08x}: {}  {:.6}",
            address,
            bytes_column(word),
            value
        ));
    }
    push_partial(&mut lines, capture, chunks.remainder(), "(partial float)");

    lines.push(String::new());
    lines.push(END_MARKER.to_string());
    lines
}

fn push_partial(lines: &mut Vec<String>, capture: &DumpCapture, rest: &[u8], note: &str) {
    if rest.is_empty() {
        return;
    }
    let address = capture
        .address
        .wrapping_add((capture.bytes.len() - rest.len()) as u32);
    lines.push(format!("{:08x}: {} {}", address, bytes_column(rest), note));
}
