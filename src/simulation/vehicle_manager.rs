//! Vehicle spawning and per-tick arbitration
//!
//! Spawning picks random trips over the navigable cells; arbitration plans
//! every waiting vehicle first, then moves vehicles one at a time in id
//! order so earlier vehicles win contested cells.

use anyhow::Result;
use log::{debug, warn};
use rand::seq::IndexedRandom;
use rand::Rng;

use super::grid::CellGrid;
use super::pathfinding::PathPlanner;
use super::types::{CellPos, VehicleId};
use super::vehicle::{SimVehicle, VehicleUpdate};

/// Spawn `count` vehicles with random trips.
///
/// Sources are drawn from cells that do not already hold a vehicle, so no
/// two vehicles ever start on the same cell; destinations are redrawn until
/// they differ from the source. Spawning stops early once every cell is
/// taken. Needs at least two navigable cells unless `count` is zero or the
/// grid has no roads at all.
pub fn spawn_random_vehicles<R: Rng + ?Sized>(
    count: usize,
    first_id: usize,
    move_probability: f64,
    grid: &mut CellGrid,
    rng: &mut R,
    tick: u64,
) -> Result<Vec<SimVehicle>> {
    let navigable: Vec<CellPos> = grid.cells().map(|cell| cell.pos()).collect();
    let mut free: Vec<CellPos> = grid
        .cells()
        .filter(|cell| !cell.occupied_by_vehicle())
        .map(|cell| cell.pos())
        .collect();

    let mut vehicles = Vec::with_capacity(count);
    if navigable.len() < 2 {
        return Ok(vehicles);
    }

    for offset in 0..count {
        if free.is_empty() {
            warn!(
                "Only {} of {} vehicles spawned: no free road cells left",
                vehicles.len(),
                count
            );
            break;
        }

        let source = free.swap_remove(rng.random_range(0..free.len()));
        let destination = loop {
            match navigable.choose(rng) {
                Some(&candidate) if candidate != source => break candidate,
                _ => continue,
            }
        };

        let vehicle = SimVehicle::new(
            VehicleId(first_id + offset),
            source,
            destination,
            move_probability,
            grid,
            tick,
        )?;
        vehicles.push(vehicle);
    }

    debug!("Spawned {} vehicles", vehicles.len());
    Ok(vehicles)
}

/// Run the planner for every vehicle still waiting for a route.
///
/// Planning only reads static topology, and it finishes for all vehicles
/// before any of them moves.
pub fn plan_routes(
    vehicles: &mut [SimVehicle],
    planner: &mut PathPlanner,
    grid: &mut CellGrid,
    tick: u64,
) {
    for vehicle in vehicles.iter_mut().filter(|vehicle| vehicle.needs_path()) {
        vehicle.plan(planner, grid, tick);
    }
}

/// Update all vehicles in ascending id order.
///
/// Returns the vehicles that arrived this tick.
pub fn update_vehicles<R: Rng + ?Sized>(
    vehicles: &mut [SimVehicle],
    tick: u64,
    grid: &mut CellGrid,
    rng: &mut R,
) -> Result<Vec<VehicleId>> {
    let mut arrivals = Vec::new();

    for vehicle in vehicles.iter_mut() {
        if let VehicleUpdate::Arrived = vehicle.update(tick, grid, rng)? {
            debug!(
                "Vehicle {:?} reached {:?} after {} ticks",
                vehicle.id, vehicle.destination, vehicle.ticks_elapsed
            );
            arrivals.push(vehicle.id);
        }
    }

    Ok(arrivals)
}
