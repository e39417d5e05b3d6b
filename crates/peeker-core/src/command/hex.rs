//! Hex and decimal field parsing for command tokens.

/// Parse a hex address (with or without 0x prefix).
///
/// Returns `None` for an empty token, a non-hex character, or a value wider
/// than 32 bits.
///
/// # Examples
///
/// ```
/// use peeker_core::command::hex::parse_hex_address;
///
/// assert_eq!(parse_hex_address("0x20000000"), Some(0x2000_0000));
/// assert_eq!(parse_hex_address("20000000"), Some(0x2000_0000));
/// assert_eq!(parse_hex_address("0X1000"), Some(0x1000));
/// assert_eq!(parse_hex_address("zz"), None);
/// ```
pub fn parse_hex_address(s: &str) -> Option<u32> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Parse an unsigned decimal field.
///
/// A digits-only value too large for `u32` saturates so that callers report
/// it as out of bounds rather than malformed.
pub fn parse_decimal(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(s.parse::<u32>().unwrap_or(u32::MAX))
}

/// Decode one two-character group as a byte.
///
/// Only the leading hex digits count: `"4g"` is `0x04` and `"g4"` is `0`.
pub fn decode_hex_pair(hi: u8, lo: u8) -> u8 {
    let Some(h) = hex_value(hi) else {
        return 0;
    };
    match hex_value(lo) {
        Some(l) => (h << 4) | l,
        None => h,
    }
}

fn hex_value(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

/// Format an address the way every response line shows it.
///
/// # Examples
///
/// ```
/// use peeker_core::command::hex::format_hex_address;
///
/// assert_eq!(format_hex_address(0x1000), "0x00001000");
/// ```
pub fn format_hex_address(addr: u32) -> String {
    format!("0x{:08x}", addr)
}
