//! Simulation statistics
//!
//! Per-vehicle and per-cell results of a run, plus batch runs that average
//! arrival times over several sets of trips on one network.

use anyhow::Result;
use log::info;
use serde::Serialize;
use sorted_vec::SortedVec;

use super::config::SimConfig;
use super::grid::RoadCell;
use super::types::{CellKind, CellPos, VehicleId};
use super::vehicle::SimVehicle;
use super::world::SimWorld;

/// Outcome of one vehicle's trip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleReport {
    pub id: VehicleId,
    pub source: CellPos,
    pub destination: CellPos,
    pub position: CellPos,
    pub reached: bool,
    pub stranded: bool,
    pub ticks_elapsed: u64,
    pub cells_traveled: u64,
    pub path_failure_count: u32,
}

impl From<&SimVehicle> for VehicleReport {
    fn from(vehicle: &SimVehicle) -> Self {
        Self {
            id: vehicle.id,
            source: vehicle.source,
            destination: vehicle.destination,
            position: vehicle.position,
            reached: vehicle.reached(),
            stranded: vehicle.is_stranded(),
            ticks_elapsed: vehicle.ticks_elapsed,
            cells_traveled: vehicle.cells_traveled,
            path_failure_count: vehicle.path_failure_count,
        }
    }
}

/// Traffic through one road cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellReport {
    pub pos: CellPos,
    pub kind: CellKind,
    pub pass_count: u64,
    pub dwell_log: Vec<u64>,
}

impl CellReport {
    /// Average ticks a vehicle spent here.
    pub fn mean_dwell(&self) -> Option<f64> {
        if self.dwell_log.is_empty() {
            return None;
        }
        Some(self.dwell_log.iter().sum::<u64>() as f64 / self.dwell_log.len() as f64)
    }

    /// Upper median of the dwell log.
    pub fn median_dwell(&self) -> Option<u64> {
        let sorted = SortedVec::from_unsorted(self.dwell_log.clone());
        sorted.get(sorted.len() / 2).copied()
    }
}

impl From<&RoadCell> for CellReport {
    fn from(cell: &RoadCell) -> Self {
        Self {
            pos: cell.pos(),
            kind: cell.kind(),
            pass_count: cell.pass_count(),
            dwell_log: cell.dwell_log().to_vec(),
        }
    }
}

/// Everything a driver needs after a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub ticks: u64,
    pub vehicles: Vec<VehicleReport>,
    pub cells: Vec<CellReport>,
}

impl SimulationReport {
    pub fn from_world(world: &SimWorld) -> Self {
        Self {
            ticks: world.tick(),
            vehicles: world.vehicles().iter().map(VehicleReport::from).collect(),
            cells: world.grid().cells().map(CellReport::from).collect(),
        }
    }

    pub fn arrived_count(&self) -> usize {
        self.vehicles.iter().filter(|v| v.reached).count()
    }

    pub fn stranded_count(&self) -> usize {
        self.vehicles.iter().filter(|v| v.stranded).count()
    }

    /// Share of vehicles that arrived, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.vehicles.is_empty() {
            return 0.0;
        }
        self.arrived_count() as f64 / self.vehicles.len() as f64 * 100.0
    }

    /// Travel times of the vehicles that arrived.
    pub fn arrival_times(&self) -> Vec<u64> {
        self.vehicles
            .iter()
            .filter(|v| v.reached)
            .map(|v| v.ticks_elapsed)
            .collect()
    }

    pub fn average_arrival_ticks(&self) -> Option<f64> {
        average(&self.arrival_times())
    }

    /// The `count` cells with the most traffic, busiest first.
    pub fn busiest_cells(&self, count: usize) -> Vec<&CellReport> {
        let mut cells: Vec<&CellReport> = self.cells.iter().filter(|c| c.pass_count > 0).collect();
        cells.sort_by(|a, b| b.pass_count.cmp(&a.pass_count).then(a.pos.cmp(&b.pos)));
        cells.truncate(count);
        cells
    }

    pub fn log_summary(&self) {
        info!("=== SIMULATION COMPLETE ===");
        info!("Ticks simulated: {}", self.ticks);
        info!("Total vehicles: {}", self.vehicles.len());
        info!("Vehicles arrived: {}", self.arrived_count());
        info!("Vehicles stranded: {}", self.stranded_count());
        info!("Success rate: {:.1}%", self.success_rate());
        match self.average_arrival_ticks() {
            Some(avg) => info!("Average arrival time: {:.2} ticks", avg),
            None => info!("Average arrival time: no vehicle arrived"),
        }
    }
}

/// Result of several runs on one network
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub trials: usize,
    pub total_vehicles: usize,
    pub total_arrived: usize,
    /// Mean over every arrival of every trial
    pub average_arrival_ticks: Option<f64>,
    pub per_trial_average: Vec<Option<f64>>,
}

/// Build the network once, then run `trials` independent sets of trips on
/// it, resetting vehicles between runs.
pub fn run_batch(config: &SimConfig, trials: usize) -> Result<BatchSummary> {
    let mut world = SimWorld::build(config.clone())?;
    let mut all_arrivals = Vec::new();
    let mut per_trial_average = Vec::with_capacity(trials);
    let mut total_vehicles = 0;

    for trial in 0..trials {
        if trial > 0 {
            world.reset()?;
        }
        let report = world.run()?;
        let arrivals = report.arrival_times();
        info!(
            "Trial {}/{}: {} of {} vehicles arrived",
            trial + 1,
            trials,
            arrivals.len(),
            report.vehicles.len()
        );
        per_trial_average.push(average(&arrivals));
        total_vehicles += report.vehicles.len();
        all_arrivals.extend(arrivals);
    }

    Ok(BatchSummary {
        trials,
        total_vehicles,
        total_arrived: all_arrivals.len(),
        average_arrival_ticks: average(&all_arrivals),
        per_trial_average,
    })
}

fn average(values: &[u64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<u64>() as f64 / values.len() as f64)
}
