//! Traffic light control for the intersections of a cell grid
//!
//! Every intersection flips phase on the same tick. The A/B light groups
//! assigned by the network generator decide which half of a junction is
//! green at any moment.

use anyhow::Result;
use log::trace;

use super::config::ConfigurationError;
use super::grid::CellGrid;

/// Flips every intersection light on a fixed tick interval
#[derive(Debug, Clone)]
pub struct TrafficLightController {
    /// Ticks between toggles, never zero
    interval: u64,
    /// Number of toggles applied so far
    toggles: u64,
}

impl TrafficLightController {
    pub fn new(interval: u64) -> Result<Self> {
        if interval == 0 {
            return Err(ConfigurationError::new("light toggle interval must be non-zero").into());
        }
        Ok(Self {
            interval,
            toggles: 0,
        })
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Lights toggle on every tick that is a multiple of the interval.
    pub fn should_toggle(&self, tick: u64) -> bool {
        tick % self.interval == 0
    }

    /// Flip the phase of every intersection cell.
    pub fn toggle(&mut self, grid: &mut CellGrid) {
        let mut flipped = 0;
        for cell in grid.intersections_mut() {
            let green = !cell.is_green();
            cell.set_light_phase(green);
            flipped += 1;
        }
        self.toggles += 1;
        trace!("Toggle #{} flipped {} intersection lights", self.toggles, flipped);
    }

    pub fn toggles(&self) -> u64 {
        self.toggles
    }
}
