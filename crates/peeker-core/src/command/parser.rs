use tracing::warn;

use super::hex::{parse_decimal, parse_hex_address};
use super::{Command, Pattern, Rejection, SearchScope};
use crate::memory::RegionTable;
use crate::memory::layout::limits::MAX_READ_LEN;

/// Turns one command line into a [`Command`].
///
/// Fields are separated by `:`; empty fields are skipped, so `READ::10`
/// sees `10` as the address. Keywords are matched exactly and are
/// case-sensitive.
#[derive(Debug, Clone)]
pub struct CommandParser<'a> {
    regions: &'a RegionTable,
    max_read_len: u32,
}

impl<'a> CommandParser<'a> {
    pub fn new(regions: &'a RegionTable) -> Self {
        Self {
            regions,
            max_read_len: MAX_READ_LEN,
        }
    }

    pub fn with_max_read_len(mut self, max_read_len: u32) -> Self {
        self.max_read_len = max_read_len;
        self
    }

    pub fn parse(&self, line: &str) -> Command {
        if line == "LANDMARKS" {
            return Command::ShowLandmarks;
        }

        let mut fields = line.split(':').filter(|f| !f.is_empty());
        let result = match fields.next() {
            Some("SEARCH") => Self::parse_search(fields.next(), SearchScope::Sram),
            Some("SEARCHFLASH") => Self::parse_search(fields.next(), SearchScope::Flash),
            Some("READ") => self.parse_read(fields.next(), fields.next()),
            _ => Err(Rejection::UnknownCommand),
        };

        result.unwrap_or_else(Command::from)
    }

    fn parse_search(token: Option<&str>, scope: SearchScope) -> Result<Command, Rejection> {
        let token = token.ok_or(Rejection::MissingPattern { scope })?;
        let pattern = Pattern::from_hex(token)?;
        Ok(Command::SearchPattern { pattern, scope })
    }

    fn parse_read(
        &self,
        address: Option<&str>,
        length: Option<&str>,
    ) -> Result<Command, Rejection> {
        let address_token = address.ok_or(Rejection::MissingAddress)?;
        let length_token = length.ok_or(Rejection::MissingLength)?;

        let address =
            parse_hex_address(address_token).ok_or_else(|| Rejection::MalformedAddress {
                token: address_token.to_string(),
            })?;
        let requested = parse_decimal(length_token).ok_or_else(|| Rejection::MalformedLength {
            token: length_token.to_string(),
        })?;

        if requested == 0 || requested > self.max_read_len {
            return Err(Rejection::LengthOutOfBounds {
                max: self.max_read_len,
            });
        }

        let region_end = self
            .regions
            .bounds_for(address)
            .ok_or(Rejection::AddressOutOfRange { address })?;

        let length = if address as u64 + requested as u64 > region_end as u64 {
            let clamped = region_end - address;
            warn!(
                "Clamped read at 0x{:08x} from {} to {} bytes",
                address, requested, clamped
            );
            clamped
        } else {
            requested
        };

        Ok(Command::ReadMemory {
            address,
            length,
            requested,
        })
    }
}
