//! Standalone traffic simulation module
//!
//! Road network generation, the cell grid, lane-aware route planning,
//! traffic lights and the tick loop that moves vehicles across the city.

mod config;
mod grid;
mod intersection;
mod pathfinding;
mod road_network;
mod stats;
mod types;
mod vehicle;
mod vehicle_manager;
mod world;

pub use config::{
    ConfigurationError, NetworkConfig, SimConfig, DEFAULT_CITY_SIZE, DEFAULT_MOVE_CHANCE,
};
pub use grid::{scan_lane_flow, scan_lane_moves, CellGrid, RoadCell, Slot};
pub use intersection::TrafficLightController;
pub use pathfinding::PathPlanner;
pub use road_network::RoadNetwork;
pub use stats::{run_batch, BatchSummary, CellReport, SimulationReport, VehicleReport};
pub use types::{Axis, CellKind, CellPos, Direction, DirectionSet, LightGroup, VehicleId};
pub use vehicle::{BlockReason, SimVehicle, VehicleState, VehicleUpdate};
pub use vehicle_manager::{plan_routes, spawn_random_vehicles, update_vehicles};
pub use world::SimWorld;
