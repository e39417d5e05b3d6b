use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::landmark::{ENTRY_LANDMARK, Landmark, Landmarks};
use crate::memory::DeviceModel;
use crate::memory::layout::limits::{
    LINE_CAPACITY, MAX_LINE_CAPACITY, MAX_READ_LEN, MAX_SEARCH_HITS,
};
use crate::memory::layout::timing::POLL_INTERVAL_MS;

/// Configuration for the inspection service
///
/// ```toml
/// model = "pico1"
/// max_hits = 50
/// entry = 0x10000235
///
/// [[landmarks]]
/// name = "frame_counter"
/// address = 0x20001000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Target device, selects the Flash and SRAM bounds
    pub model: DeviceModel,
    /// Line buffer size including the terminator slot
    pub line_capacity: usize,
    /// Largest accepted READ length
    pub max_read_len: u32,
    /// Search hit cap
    pub max_hits: usize,
    /// Wait between polls, in milliseconds
    pub poll_interval_ms: u64,
    /// Address of the program's entry function, reported first as `main`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<u32>,
    /// Extra landmarks reported after the entry point
    pub landmarks: Vec<Landmark>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model: DeviceModel::default(),
            line_capacity: LINE_CAPACITY,
            max_read_len: MAX_READ_LEN,
            max_hits: MAX_SEARCH_HITS,
            poll_interval_ms: POLL_INTERVAL_MS,
            entry: None,
            landmarks: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Create a new configuration builder
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Read a TOML file. Keys that are absent keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: ServiceConfig = toml::from_str(&content)?;
        config.validate()?;
        debug!("Loaded service config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(2..=MAX_LINE_CAPACITY).contains(&self.line_capacity) {
            return Err(Error::InvalidConfig(format!(
                "line_capacity must be 2-{}, got {}",
                MAX_LINE_CAPACITY, self.line_capacity
            )));
        }
        if self.max_read_len == 0 {
            return Err(Error::InvalidConfig(
                "max_read_len must be at least 1".to_string(),
            ));
        }
        if self.max_hits == 0 {
            return Err(Error::InvalidConfig(
                "max_hits must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The entry point, if known, followed by the configured landmarks
    pub fn landmark_table(&self) -> Landmarks {
        let mut table: Landmarks = self.landmarks.iter().cloned().collect();
        if let Some(entry) = self.entry {
            table.insert_first(ENTRY_LANDMARK, entry);
        }
        table
    }
}

/// Builder for ServiceConfig
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    base: Option<ServiceConfig>,
    model: Option<DeviceModel>,
    line_capacity: Option<usize>,
    max_read_len: Option<u32>,
    max_hits: Option<usize>,
    poll_interval_ms: Option<u64>,
    entry: Option<u32>,
    landmarks: Vec<Landmark>,
}

impl ServiceConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from disk)
    /// instead of the defaults
    pub fn base(mut self, config: ServiceConfig) -> Self {
        self.base = Some(config);
        self
    }

    pub fn model(mut self, model: DeviceModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn line_capacity(mut self, capacity: usize) -> Self {
        self.line_capacity = Some(capacity);
        self
    }

    pub fn max_read_len(mut self, len: u32) -> Self {
        self.max_read_len = Some(len);
        self
    }

    pub fn max_hits(mut self, hits: usize) -> Self {
        self.max_hits = Some(hits);
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = Some(ms);
        self
    }

    /// Address reported as `main`
    pub fn entry(mut self, address: u32) -> Self {
        self.entry = Some(address);
        self
    }

    /// Add a landmark
    pub fn landmark(mut self, name: impl Into<String>, address: u32) -> Self {
        self.landmarks.push(Landmark::new(name, address));
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ServiceConfig> {
        let base = self.base.unwrap_or_default();
        let mut landmarks = base.landmarks;
        landmarks.extend(self.landmarks);

        let config = ServiceConfig {
            model: self.model.unwrap_or(base.model),
            line_capacity: self.line_capacity.unwrap_or(base.line_capacity),
            max_read_len: self.max_read_len.unwrap_or(base.max_read_len),
            max_hits: self.max_hits.unwrap_or(base.max_hits),
            poll_interval_ms: self.poll_interval_ms.unwrap_or(base.poll_interval_ms),
            entry: self.entry.or(base.entry),
            landmarks,
        };
        config.validate()?;
        Ok(config)
    }
}
