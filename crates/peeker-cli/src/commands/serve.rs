//! Serve command implementation.
//!
//! Hosts the inspection service on this machine: stdin carries commands,
//! stdout carries responses, and the target's memory is simulated from image
//! files.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;

use anyhow::{Context, Result, bail};
use peeker_core::command::hex::parse_hex_address;
use peeker_core::{
    ChannelTransport, DeviceModel, ImageMemory, InspectionService, Peeker, RegionKind,
    RegionTable, ServiceConfig,
};
use tracing::{debug, info};

use crate::stdio;

/// Erased flash reads as all ones
const FLASH_FILL: u8 = 0xFF;
const SRAM_FILL: u8 = 0x00;

pub struct ServeOptions {
    pub config: Option<PathBuf>,
    pub model: Option<DeviceModel>,
    pub flash: Option<PathBuf>,
    pub sram: Option<PathBuf>,
    pub entry: Option<String>,
    pub landmarks: Vec<String>,
    pub max_hits: Option<usize>,
}

/// Run the serve command
pub fn run(options: ServeOptions) -> Result<()> {
    let config = build_config(&options)?;
    let memory = build_memory(&config, &options)?;

    let peeker = Peeker::new();
    let shutdown = peeker.shutdown_signal();

    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping...");
        shutdown_ctrlc.trigger();
    })?;

    let (tx, rx) = mpsc::channel();
    stdio::spawn_stdin_reader(tx);

    peeker.start(move || {
        let transport = ChannelTransport::new(rx, io::stdout()).stop_on_disconnect(shutdown);
        InspectionService::with_config(memory, transport, &config)
    });

    peeker.join()?;
    Ok(())
}

fn build_config(options: &ServeOptions) -> Result<ServiceConfig> {
    let base = match &options.config {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServiceConfig::default(),
    };

    let mut builder = ServiceConfig::builder().base(base);
    if let Some(model) = options.model {
        builder = builder.model(model);
    }
    if let Some(max_hits) = options.max_hits {
        builder = builder.max_hits(max_hits);
    }
    if let Some(entry) = &options.entry {
        let address = parse_hex_address(entry)
            .with_context(|| format!("Invalid entry address {:?}", entry))?;
        builder = builder.entry(address);
    }
    for arg in &options.landmarks {
        let (name, address) = parse_landmark(arg)?;
        builder = builder.landmark(name, address);
    }

    Ok(builder.build()?)
}

fn build_memory(config: &ServiceConfig, options: &ServeOptions) -> Result<ImageMemory> {
    let regions = RegionTable::for_model(config.model);
    let mut memory = ImageMemory::new();

    for (kind, image, fill) in [
        (RegionKind::Flash, &options.flash, FLASH_FILL),
        (RegionKind::Sram, &options.sram, SRAM_FILL),
    ] {
        let region = regions.region(kind);
        let len = region.size() as usize;
        match image {
            Some(path) => {
                memory.map_file(path, region.start, len, fill)?;
                info!("Loaded {} image from {}", region.name(), path.display());
            }
            None => {
                memory.map(region.start, vec![fill; len]);
                debug!("{} left blank (0x{:02x})", region.name(), fill);
            }
        }
    }

    Ok(memory)
}

/// Parse `NAME=0xADDRESS`
fn parse_landmark(arg: &str) -> Result<(&str, u32)> {
    let Some((name, value)) = arg.split_once('=') else {
        bail!("Invalid landmark {:?}, expected NAME=0xADDRESS", arg);
    };
    if name.is_empty() {
        bail!("Landmark name must not be empty: {:?}", arg);
    }
    let address = parse_hex_address(value)
        .with_context(|| format!("Invalid landmark address {:?}", value))?;
    Ok((name, address))
}
