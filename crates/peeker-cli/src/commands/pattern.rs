//! Pattern command implementation.
//!
//! Turns a value into the `SEARCH:`/`SEARCHFLASH:` line that finds it.
//! Integers are encoded little-endian, as they sit in the target's memory.

use anyhow::{Result, bail};
use clap::Args;
use peeker_core::{Pattern, SearchScope};

/// A value to search for, shared by `pattern` and `search`
#[derive(Args, Debug, Clone, Default)]
pub struct PatternArgs {
    /// ASCII string
    #[arg(short, long)]
    pub string: Option<String>,

    /// 32-bit integer (little-endian)
    #[arg(long = "i32", allow_negative_numbers = true)]
    pub int32: Option<i32>,

    /// 16-bit integer (little-endian)
    #[arg(long = "i16", allow_negative_numbers = true)]
    pub int16: Option<i16>,

    /// Raw hex bytes, e.g. DEADBEEF or "de ad be ef"
    #[arg(long)]
    pub hex: Option<String>,

    /// Search Flash instead of SRAM
    #[arg(long)]
    pub flash: bool,
}

impl PatternArgs {
    pub fn pattern(&self) -> Result<Pattern> {
        let bytes = encode(
            self.string.as_deref(),
            self.int32,
            self.int16,
            self.hex.as_deref(),
        )?;
        Ok(Pattern::from_bytes(&bytes)?)
    }

    pub fn scope(&self) -> SearchScope {
        if self.flash {
            SearchScope::Flash
        } else {
            SearchScope::Sram
        }
    }
}

/// Run the pattern command
pub fn run(args: &PatternArgs) -> Result<()> {
    println!("{}", args.scope().command_line(&args.pattern()?));
    Ok(())
}

fn encode(
    string: Option<&str>,
    int32: Option<i32>,
    int16: Option<i16>,
    hex: Option<&str>,
) -> Result<Vec<u8>> {
    if let Some(s) = string {
        if s.is_empty() {
            bail!("ASCII string cannot be empty");
        }
        Ok(s.as_bytes().to_vec())
    } else if let Some(val) = int32 {
        Ok(val.to_le_bytes().to_vec())
    } else if let Some(val) = int16 {
        Ok(val.to_le_bytes().to_vec())
    } else if let Some(hex) = hex {
        parse_hex_bytes(hex)
    } else {
        bail!("Specify one of --string, --i32, --i16 or --hex");
    }
}

/// Parse hex digits, ignoring whitespace between bytes
fn parse_hex_bytes(hex: &str) -> Result<Vec<u8>> {
    let digits: String = hex.split_whitespace().collect();
    if digits.is_empty() {
        bail!("Hex pattern cannot be empty");
    }
    if digits.len() % 2 != 0 {
        bail!("Hex pattern must have even number of digits");
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("Invalid hex pattern {:?}. Use only 0-9 and A-F", hex);
    }

    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for i in (0..digits.len()).step_by(2) {
        bytes.push(u8::from_str_radix(&digits[i..i + 2], 16)?);
    }
    Ok(bytes)
}
