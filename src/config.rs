//! Aggregated runtime configuration.

use crate::capture::StreamConfig;
use crate::control::ControlConfig;
use crate::detection::{DetectorConfig, FilterConfig};
use crate::dispatch::DeviceConfig;
use crate::error::ConfigError;
use crate::tracker::{AssociationConfig, TrackManagerConfig};

/// Everything a rover run needs, passed explicitly to each component.
#[derive(Debug, Clone, PartialEq)]
pub struct RoverConfig {
    pub stream: StreamConfig,
    pub detector: DetectorConfig,
    pub filter: FilterConfig,
    pub association: AssociationConfig,
    pub tracking: TrackManagerConfig,
    pub control: ControlConfig,
    pub device: DeviceConfig,
    /// Pending commands the bus holds before dropping
    pub bus_capacity: usize,
    /// Start with automatic centering enabled
    pub auto_control: bool,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            detector: DetectorConfig::default(),
            filter: FilterConfig::default(),
            association: AssociationConfig::default(),
            tracking: TrackManagerConfig::default(),
            control: ControlConfig::default(),
            device: DeviceConfig::default(),
            bus_capacity: 8,
            auto_control: true,
        }
    }
}

impl RoverConfig {
    /// Defaults pointed at the vehicle at `host`, for both video and commands.
    pub fn for_device(host: &str) -> Self {
        Self {
            stream: StreamConfig::for_device(host),
            device: DeviceConfig {
                host: host.to_string(),
                ..DeviceConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.stream.url.starts_with("http://") && !self.stream.url.starts_with("https://") {
            return Err(ConfigError::Url(self.stream.url.clone()));
        }
        self.detector.validate()?;
        self.filter.validate()?;
        self.association.validate()?;
        self.tracking.validate()?;
        self.control.validate()?;
        self.device.validate()?;
        if self.bus_capacity == 0 {
            return Err(ConfigError::Zero {
                name: "bus_capacity",
            });
        }
        Ok(())
    }
}
