pub mod layout;
mod image;
mod reader;
mod region;
mod view;

pub use image::ImageMemory;
pub use reader::{RawMemory, ReadMemory};
pub use region::{DeviceModel, MemoryRegion, RegionKind, RegionTable};
pub use view::MemoryView;
