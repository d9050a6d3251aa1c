//! Vehicle movement logic for the traffic simulation
//!
//! Each vehicle owns its route and walks it cell by cell, claiming and
//! releasing grid occupancy as it goes.

use anyhow::{ensure, Context, Result};
use log::{debug, warn};
use rand::Rng;

use super::grid::CellGrid;
use super::pathfinding::PathPlanner;
use super::types::{CellKind, CellPos, Direction, VehicleId};

/// Lifecycle of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleState {
    /// No route yet; the planner runs on the next planning phase
    AwaitingPath,
    Moving,
    /// At the destination and inert
    Arrived,
    /// The planner found no route; permanently idle without arriving
    Stranded,
}

/// Why a vehicle stopped short this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    WrongLane,
    Hesitated,
    RedLight,
    Occupied,
    AwaitingPath,
}

/// Result of a vehicle update indicating what happened this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleUpdate {
    /// Arrived or stranded vehicles do nothing
    Idle,
    /// Advanced this many cells (may have stopped early)
    Moved(usize),
    /// Did not move at all
    Blocked(BlockReason),
    /// Reached the destination this tick
    Arrived,
}

/// A vehicle in the traffic simulation
#[derive(Debug, Clone)]
pub struct SimVehicle {
    pub id: VehicleId,
    pub source: CellPos,
    pub destination: CellPos,
    pub position: CellPos,
    /// Direction of the last move, used for turn legality in intersections
    pub heading: Option<Direction>,
    /// Route excluding the starting cell
    pub path: Vec<CellPos>,
    /// Index of the next cell to enter in `path`
    pub path_cursor: usize,
    pub move_probability: f64,
    pub ticks_elapsed: u64,
    pub cells_traveled: u64,
    pub path_failure_count: u32,
    state: VehicleState,
    /// Whether this vehicle still holds occupancy of `position`
    holds_cell: bool,
}

impl SimVehicle {
    /// Place a vehicle on `source`, claiming the cell at `tick`.
    ///
    /// A vehicle whose source is its destination arrives immediately.
    pub fn new(
        id: VehicleId,
        source: CellPos,
        destination: CellPos,
        move_probability: f64,
        grid: &mut CellGrid,
        tick: u64,
    ) -> Result<Self> {
        let cell = grid
            .cell_mut(source)
            .with_context(|| format!("Source {:?} is not a road cell", source))?;
        ensure!(
            !cell.occupied_by_vehicle(),
            "Source {:?} already holds a vehicle",
            source
        );
        cell.enter(tick, id);

        let mut vehicle = Self {
            id,
            source,
            destination,
            position: source,
            heading: None,
            path: Vec::new(),
            path_cursor: 0,
            move_probability,
            ticks_elapsed: 0,
            cells_traveled: 0,
            path_failure_count: 0,
            state: VehicleState::AwaitingPath,
            holds_cell: true,
        };

        if source == destination {
            vehicle.state = VehicleState::Arrived;
            vehicle.release(grid, tick);
        }

        Ok(vehicle)
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    pub fn reached(&self) -> bool {
        self.state == VehicleState::Arrived
    }

    pub fn is_stranded(&self) -> bool {
        self.state == VehicleState::Stranded
    }

    /// Arrived or stranded: no further movement will happen.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, VehicleState::Arrived | VehicleState::Stranded)
    }

    pub fn needs_path(&self) -> bool {
        self.state == VehicleState::AwaitingPath
    }

    /// Whether the vehicle currently occupies `position` on the grid.
    pub fn holds_cell(&self) -> bool {
        self.holds_cell
    }

    /// Cells of the route not yet entered.
    pub fn remaining_path(&self) -> &[CellPos] {
        &self.path[self.path_cursor.min(self.path.len())..]
    }

    /// Cells per tick, from the kind of cell currently occupied.
    pub fn speed(&self, grid: &CellGrid) -> usize {
        grid.kind(self.position).speed()
    }

    /// Ask the planner for a route. A failure strands the vehicle for good.
    pub fn plan(&mut self, planner: &mut PathPlanner, grid: &mut CellGrid, tick: u64) {
        if !self.needs_path() {
            return;
        }

        match planner.compute(self.position, self.destination, grid) {
            Some(path) if !path.is_empty() => {
                debug!(
                    "Vehicle {:?} routed {:?} -> {:?} over {} cells ({} expanded)",
                    self.id,
                    self.position,
                    self.destination,
                    path.len(),
                    planner.expanded()
                );
                self.path = path;
                self.path_cursor = 0;
                self.state = VehicleState::Moving;
            }
            _ => {
                self.path_failure_count += 1;
                self.state = VehicleState::Stranded;
                self.release(grid, tick);
                warn!(
                    "Vehicle {:?} found no path from {:?} to {:?}",
                    self.id, self.position, self.destination
                );
            }
        }
    }

    /// Give up occupancy of the current cell. Only the first call has an effect.
    pub fn release(&mut self, grid: &mut CellGrid, tick: u64) {
        if !self.holds_cell {
            return;
        }
        if let Some(cell) = grid.cell_mut(self.position) {
            cell.leave(tick);
        }
        self.holds_cell = false;
    }

    /// Advance up to `speed` cells along the route.
    ///
    /// Every sub-step checks, in order: the target is a road cell next to us,
    /// the lane allows the move, the hesitation draw, a green light when
    /// entering an intersection from outside, and that no vehicle holds the
    /// target. The first failing check ends movement for this tick.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        tick: u64,
        grid: &mut CellGrid,
        rng: &mut R,
    ) -> Result<VehicleUpdate> {
        match self.state {
            VehicleState::Arrived | VehicleState::Stranded => {
                self.release(grid, tick);
                return Ok(VehicleUpdate::Idle);
            }
            VehicleState::AwaitingPath => {
                self.ticks_elapsed += 1;
                return Ok(VehicleUpdate::Blocked(BlockReason::AwaitingPath));
            }
            VehicleState::Moving => {}
        }

        let mut moved = 0;
        let mut blocked = None;

        for _ in 0..self.speed(grid) {
            let Some(&target) = self.path.get(self.path_cursor) else {
                break;
            };

            ensure!(
                grid.is_navigable(target),
                "Vehicle {:?} routed onto non-road cell {:?}",
                self.id,
                target
            );
            let direction = Direction::between(self.position, target).with_context(|| {
                format!(
                    "Vehicle {:?} route jumps from {:?} to {:?}",
                    self.id, self.position, target
                )
            })?;

            if !grid.is_legal_move(self.position, direction, self.heading) {
                blocked = Some(BlockReason::WrongLane);
                break;
            }

            if !rng.random_bool(self.move_probability) {
                blocked = Some(BlockReason::Hesitated);
                break;
            }

            let current_kind = grid.kind(self.position);
            let target_cell = grid.cell(target).context("Target cell vanished")?;

            if target_cell.is_intersection()
                && current_kind != CellKind::Intersection
                && !target_cell.is_green()
            {
                blocked = Some(BlockReason::RedLight);
                break;
            }

            if target_cell.occupied_by_vehicle() {
                blocked = Some(BlockReason::Occupied);
                break;
            }

            grid.cell_mut(self.position)
                .context("Current cell vanished")?
                .leave(tick);
            grid.cell_mut(target)
                .context("Target cell vanished")?
                .enter(tick, self.id);

            self.path_cursor += 1;
            self.position = target;
            self.heading = Some(direction);
            self.cells_traveled += 1;
            moved += 1;

            if self.position == self.destination {
                break;
            }
        }

        self.ticks_elapsed += 1;

        if self.position == self.destination {
            self.state = VehicleState::Arrived;
            self.release(grid, tick);
            return Ok(VehicleUpdate::Arrived);
        }

        if let Some(reason) = blocked {
            debug!(
                "Vehicle {:?} at {:?} stopped: {:?}",
                self.id, self.position, reason
            );
        }

        Ok(match (moved, blocked) {
            (0, Some(reason)) => VehicleUpdate::Blocked(reason),
            (cells, _) => VehicleUpdate::Moved(cells),
        })
    }
}
