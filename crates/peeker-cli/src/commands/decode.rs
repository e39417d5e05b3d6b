//! Decode command implementation.
//!
//! Reads a saved service response and shows what it contains. The kind of
//! response (hex dump, search, landmarks) is recognised from its header.

use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use peeker_core::transcript::{self, DumpCapture, SearchCapture};
use peeker_core::{DisplayMode, Landmarks};

pub(crate) enum Decoded {
    Dump(DumpCapture),
    Search(SearchCapture),
    Landmarks(Landmarks),
}

/// Run the decode command
pub fn run(input: Option<&Path>, view: DisplayMode, json: bool) -> Result<()> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    for line in render(&decode(&text)?, view, json)? {
        println!("{}", line);
    }
    Ok(())
}

fn decode(text: &str) -> Result<Decoded> {
    if text.contains("=== SEARCHING ") {
        return Ok(Decoded::Search(transcript::parse_search(text)));
    }
    if text.contains("LANDMARKS:") && !text.contains("=== HEX DUMP ===") {
        return Ok(Decoded::Landmarks(transcript::parse_landmarks(text)?));
    }
    Ok(Decoded::Dump(transcript::parse_hex_dump(text)?))
}

pub(crate) fn render(decoded: &Decoded, view: DisplayMode, json: bool) -> Result<Vec<String>> {
    if json {
        let value = match decoded {
            Decoded::Dump(capture) => serde_json::to_string_pretty(capture)?,
            Decoded::Search(capture) => serde_json::to_string_pretty(capture)?,
            Decoded::Landmarks(landmarks) => serde_json::to_string_pretty(landmarks)?,
        };
        return Ok(vec![value]);
    }

    let lines = match decoded {
        Decoded::Dump(capture) => transcript::render(capture, view),
        Decoded::Search(capture) => {
            let mut lines = vec![format!(
                "{} hits in {}{}",
                capture.hits.len(),
                capture.region.as_deref().unwrap_or("unknown region"),
                if capture.capped { " (capped)" } else { "" }
            )];
            lines.extend(capture.hits.iter().map(|a| format!("  0x{:08x}", a)));
            lines
        }
        Decoded::Landmarks(landmarks) => landmarks
            .iter()
            .map(|l| format!("{} @ 0x{:08x}", l.name, l.address))
            .collect(),
    };
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDMARKS: &str = "LANDMARKS:\nmain=0x10000235\nEND_LANDMARKS\n\n";
    const SEARCH: &str = "=== SEARCHING FLASH ===\nFOUND: 0x10000100\nTotal matches in FLASH: 1\n";
    const DUMP: &str = "Address: 0x20000000, Length: 4 bytes\n\
        20000000: 2a 00 00 00                                      *...\n";

    #[test]
    fn test_recognises_landmarks() {
        let lines = render(&decode(LANDMARKS).unwrap(), DisplayMode::Bytes, false).unwrap();
        assert_eq!(lines, vec!["main @ 0x10000235"]);
    }

    #[test]
    fn test_recognises_search() {
        let lines = render(&decode(SEARCH).unwrap(), DisplayMode::Bytes, false).unwrap();
        assert_eq!(lines, vec!["1 hits in FLASH", "  0x10000100"]);
    }

    #[test]
    fn test_dump_as_words() {
        let lines = render(&decode(DUMP).unwrap(), DisplayMode::U32, false).unwrap();
        assert!(lines.iter().any(|l| l.starts_with("20000000: 2a 00 00 00  0x0000002a  42")));
    }

    #[test]
    fn test_json_output() {
        let lines = render(&decode(DUMP).unwrap(), DisplayMode::Bytes, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["address"], 0x2000_0000u32);
        assert_eq!(value["bytes"][0], 42);
    }

    #[test]
    fn test_unrecognised_input() {
        assert!(decode("hello").is_err());
    }
}
