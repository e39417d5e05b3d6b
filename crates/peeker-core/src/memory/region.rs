//! Fixed classification of the device address space

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use super::layout::{peripherals, rom, rp2040, rp2350};
use super::{MemoryView, ReadMemory};
use crate::error::{Error, Result};

/// Supported target devices
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceModel {
    /// RP2040
    Pico1,
    /// RP2350
    #[default]
    Pico2,
}

impl DeviceModel {
    pub fn chip(&self) -> &'static str {
        match self {
            Self::Pico1 => "RP2040",
            Self::Pico2 => "RP2350",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, Display)]
pub enum RegionKind {
    #[strum(serialize = "ROM")]
    Rom,
    #[strum(serialize = "Flash")]
    Flash,
    #[strum(serialize = "SRAM")]
    Sram,
    #[strum(serialize = "Peripherals")]
    Peripherals,
}

impl RegionKind {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// A named half-open address range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub kind: RegionKind,
    pub start: u32,
    pub end: u32,
}

impl MemoryRegion {
    pub const fn new(kind: RegionKind, start: u32, end: u32) -> Self {
        Self { kind, start, end }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn contains(&self, address: u32) -> bool {
        address >= self.start && address < self.end
    }

    pub fn size(&self) -> u32 {
        self.end - self.start
    }
}

/// The regions of one device, non-overlapping and in address order
#[derive(Debug, Clone)]
pub struct RegionTable {
    model: DeviceModel,
    regions: [MemoryRegion; 4],
}

impl RegionTable {
    pub fn for_model(model: DeviceModel) -> Self {
        let (flash_start, flash_end, sram_start, sram_end) = match model {
            DeviceModel::Pico1 => (
                rp2040::FLASH_START,
                rp2040::FLASH_END,
                rp2040::SRAM_START,
                rp2040::SRAM_END,
            ),
            DeviceModel::Pico2 => (
                rp2350::FLASH_START,
                rp2350::FLASH_END,
                rp2350::SRAM_START,
                rp2350::SRAM_END,
            ),
        };

        Self {
            model,
            regions: [
                MemoryRegion::new(RegionKind::Rom, rom::START, rom::END),
                MemoryRegion::new(RegionKind::Flash, flash_start, flash_end),
                MemoryRegion::new(RegionKind::Sram, sram_start, sram_end),
                MemoryRegion::new(
                    RegionKind::Peripherals,
                    peripherals::START,
                    peripherals::END,
                ),
            ],
        }
    }

    pub fn model(&self) -> DeviceModel {
        self.model
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    /// Find the region containing `address`
    pub fn classify(&self, address: u32) -> Option<&MemoryRegion> {
        self.regions.iter().find(|r| r.contains(address))
    }

    /// End of the region containing `address`, if any
    pub fn bounds_for(&self, address: u32) -> Option<u32> {
        self.classify(address).map(|r| r.end)
    }

    pub fn region(&self, kind: RegionKind) -> &MemoryRegion {
        // Regions are stored in RegionKind declaration order.
        &self.regions[kind as usize]
    }

    /// Bounded view of `len` bytes at `address`.
    ///
    /// Fails unless the whole range lies inside one region. This is the only
    /// way to obtain read access to device memory.
    pub fn view<'a, R: ReadMemory + ?Sized>(
        &self,
        reader: &'a R,
        address: u32,
        len: u32,
    ) -> Result<MemoryView<'a, R>> {
        let region = self
            .classify(address)
            .ok_or(Error::Unclassified { address })?;
        if address as u64 + len as u64 > region.end as u64 {
            return Err(Error::CrossesRegion {
                start: address,
                len,
            });
        }
        Ok(MemoryView::new(reader, address, len))
    }

    /// View covering an entire region
    pub fn region_view<'a, R: ReadMemory + ?Sized>(
        &self,
        reader: &'a R,
        kind: RegionKind,
    ) -> MemoryView<'a, R> {
        let region = self.region(kind);
        MemoryView::new(reader, region.start, region.size())
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::for_model(DeviceModel::default())
    }
}
