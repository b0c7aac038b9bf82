//! Confidence and class-of-interest filtering of raw detector output.

use crate::detection::Detection;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// Minimum confidence kept (inclusive)
    pub confidence_threshold: f32,
    /// Keep only this class when set
    pub class_of_interest: Option<u32>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            class_of_interest: None,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::OutOfUnitRange {
                name: "confidence_threshold",
                value: self.confidence_threshold,
            });
        }
        Ok(())
    }
}

/// Stateless filter; the same input always yields the same, order-preserved output.
#[derive(Debug, Clone, Default)]
pub struct DetectionFilter {
    config: FilterConfig,
}

impl DetectionFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.confidence >= self.config.confidence_threshold
            && self
                .config
                .class_of_interest
                .is_none_or(|class_id| detection.class_id == class_id)
    }

    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections.into_iter().filter(|d| self.accepts(d)).collect()
    }
}
