use crate::error::{Error, Result};
use crate::landmark::pointer_address;

/// A source of bytes addressed by 32-bit device addresses.
///
/// Implementations never write. Callers outside this module do not read
/// through a source directly; they go through a [`MemoryView`] handed out by
/// [`RegionTable`], which guarantees the range lies inside one region.
///
/// [`MemoryView`]: super::MemoryView
/// [`RegionTable`]: super::RegionTable
pub trait ReadMemory {
    fn read_byte(&self, address: u32) -> Result<u8>;

    /// Device address at which this source shows the host pointer `host`.
    ///
    /// `None` unless the source is the running program's own address space.
    fn device_address(&self, _host: usize) -> Option<u32> {
        None
    }

    fn read_bytes(&self, address: u32, len: usize) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(len);
        for i in 0..len {
            let addr = address
                .checked_add(i as u32)
                .ok_or(Error::MemoryReadFailed { address })?;
            bytes.push(self.read_byte(addr)?);
        }
        Ok(bytes)
    }
}

impl<R: ReadMemory + ?Sized> ReadMemory for &R {
    fn read_byte(&self, address: u32) -> Result<u8> {
        (**self).read_byte(address)
    }

    fn device_address(&self, host: usize) -> Option<u32> {
        (**self).device_address(host)
    }
}

/// The live address space of the device this code runs on.
///
/// Reads are volatile and unsynchronized: a value the host application is
/// rewriting at the same moment may be observed half-updated.
#[derive(Debug)]
pub struct RawMemory {
    _private: (),
}

impl RawMemory {
    /// # Safety
    ///
    /// Only sound on the target device, where every address inside the
    /// [`RegionTable`](super::RegionTable) ranges is readable without
    /// faulting. On a host operating system these addresses are not mapped.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl ReadMemory for RawMemory {
    fn read_byte(&self, address: u32) -> Result<u8> {
        let ptr = address as usize as *const u8;
        // SAFETY: construction of RawMemory asserts that region addresses are
        // mapped, and views only reach this call with region-checked addresses.
        Ok(unsafe { core::ptr::read_volatile(ptr) })
    }

    fn device_address(&self, host: usize) -> Option<u32> {
        pointer_address(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ImageMemory;

    #[test]
    fn test_images_do_not_alias_host_pointers() {
        let image = ImageMemory::new().with_fill(0x2000_0000, 16, 0);
        assert_eq!(image.device_address(0x2000_0004), None);
        assert_eq!((&image).device_address(0x2000_0004), None);
    }

    #[test]
    fn test_raw_memory_maps_pointers_one_to_one() {
        // SAFETY: no read goes through this instance.
        let raw = unsafe { RawMemory::new() };
        assert_eq!(raw.device_address(0x2000_0004), Some(0x2000_0004));
    }

    #[test]
    fn test_read_bytes_stops_at_address_space_end() {
        let image = ImageMemory::new().with_fill(0xFFFF_FFF0, 16, 0xAB);
        assert_eq!(image.read_bytes(0xFFFF_FFFC, 4).unwrap(), vec![0xAB; 4]);
        assert!(matches!(
            image.read_bytes(0xFFFF_FFFC, 5),
            Err(Error::MemoryReadFailed { .. })
        ));
    }
}
