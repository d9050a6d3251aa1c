//! Simulation configuration
//!
//! Everything a driver supplies to build and run a simulation. The defaults
//! match a mid-sized city that most vehicles can cross within the default
//! tick budget.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default grid width and height in cells
pub const DEFAULT_CITY_SIZE: usize = 100;

/// Default chance that a vehicle advances on an otherwise legal sub-step
pub const DEFAULT_MOVE_CHANCE: f64 = 0.9;

/// Raised when a configuration cannot produce a usable simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    pub reason: String,
}

impl ConfigurationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid simulation configuration: {}", self.reason)
    }
}

impl std::error::Error for ConfigurationError {}

/// Parameters of the road network generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Inclusive (min, max) step between consecutive base roads on an axis
    pub axis_spacing_range: (usize, usize),
    pub base_road_width: usize,
    pub collector_width: usize,
    pub highway_width: usize,
    pub highway_count: usize,
    pub collector_count: usize,
    /// Chance that a plain local segment between two base roads is removed
    pub segment_removal_probability: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            axis_spacing_range: (10, 30),
            base_road_width: 2,
            collector_width: 4,
            highway_width: 6,
            highway_count: 1,
            collector_count: 3,
            segment_removal_probability: 0.2,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        let (min, max) = self.axis_spacing_range;
        if min == 0 {
            return Err(ConfigurationError::new("axis spacing must be at least one cell").into());
        }
        if min > max {
            return Err(ConfigurationError::new(format!(
                "axis spacing range ({min}, {max}) is inverted"
            ))
            .into());
        }
        if self.base_road_width == 0 || self.collector_width == 0 || self.highway_width == 0 {
            return Err(ConfigurationError::new("road widths must be non-zero").into());
        }
        check_probability("segment removal probability", self.segment_removal_probability)
    }
}

/// Full configuration of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub width: usize,
    pub height: usize,
    #[serde(flatten)]
    pub network: NetworkConfig,
    pub vehicle_count: usize,
    /// Lights flip on every tick that is a multiple of this interval
    pub light_toggle_interval: u64,
    /// Chance per sub-step that a vehicle holds back from a legal move
    pub hesitation_probability: f64,
    pub tick_count: u64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_CITY_SIZE,
            height: DEFAULT_CITY_SIZE,
            network: NetworkConfig::default(),
            vehicle_count: 20,
            light_toggle_interval: 10,
            hesitation_probability: 1.0 - DEFAULT_MOVE_CHANCE,
            tick_count: 500,
            seed: 0,
        }
    }
}

impl SimConfig {
    /// Generator parameters for this run.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Chance a vehicle actually takes an otherwise legal sub-step.
    pub fn move_probability(&self) -> f64 {
        1.0 - self.hesitation_probability
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigurationError::new(format!(
                "grid must be non-empty, got {}x{}",
                self.width, self.height
            ))
            .into());
        }
        if self.light_toggle_interval == 0 {
            return Err(ConfigurationError::new("light toggle interval must be non-zero").into());
        }
        check_probability("hesitation probability", self.hesitation_probability)?;
        self.network.validate()
    }
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigurationError::new(format!("{name} {value} is outside [0, 1]")).into());
    }
    Ok(())
}
