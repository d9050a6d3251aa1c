//! Shared fixtures for the integration tests

#![allow(dead_code)]

use city_traffic::simulation::{Axis, CellGrid, CellKind, CellPos, Direction, RoadNetwork, SimConfig};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 10x10 city with a two-lane road on rows 4-5 crossing one on columns 4-5
pub fn crossing_network() -> RoadNetwork {
    let mut network = RoadNetwork::new(10, 10);
    network.lay_stripe(Axis::Horizontal, 4, 2, CellKind::LocalRoad);
    network.lay_stripe(Axis::Vertical, 4, 2, CellKind::LocalRoad);
    network.finish();
    network
}

/// 10x10 city with one-lane roads on row 4 and column 4 meeting at a single
/// intersection cell (4, 4)
pub fn single_crossing_network() -> RoadNetwork {
    let mut network = RoadNetwork::new(10, 10);
    network.lay_stripe(Axis::Horizontal, 4, 1, CellKind::LocalRoad);
    network.lay_stripe(Axis::Vertical, 4, 1, CellKind::LocalRoad);
    network.finish();
    network
}

/// Two parallel horizontal roads that never meet
pub fn split_network() -> RoadNetwork {
    let mut network = RoadNetwork::new(10, 10);
    network.lay_stripe(Axis::Horizontal, 1, 2, CellKind::LocalRoad);
    network.lay_stripe(Axis::Horizontal, 6, 2, CellKind::LocalRoad);
    network.finish();
    network
}

/// Deterministic movement: no hesitation, lights flip every tick, no random vehicles
pub fn scenario_config() -> SimConfig {
    SimConfig {
        vehicle_count: 0,
        light_toggle_interval: 1,
        hesitation_probability: 0.0,
        tick_count: 100,
        ..SimConfig::default()
    }
}

/// A small generated city with plenty of roads
pub fn dense_config(seed: u64) -> SimConfig {
    let mut config = SimConfig {
        width: 60,
        height: 60,
        vehicle_count: 60,
        light_toggle_interval: 3,
        tick_count: 150,
        seed,
        ..SimConfig::default()
    };
    config.network.axis_spacing_range = (6, 12);
    config
}

/// Check every step of `path` (which excludes `source`) is a legal move,
/// carrying the heading forward the way a vehicle does.
pub fn assert_path_legal(grid: &CellGrid, source: CellPos, path: &[CellPos]) {
    let mut pos = source;
    let mut heading = None;
    for next in path {
        let direction = Direction::between(pos, *next)
            .unwrap_or_else(|| panic!("path jumps from {:?} to {:?}", pos, next));
        assert!(
            grid.is_legal_move(pos, direction, heading),
            "illegal move {:?} from {:?} (heading {:?})",
            direction,
            pos,
            heading
        );
        pos = *next;
        heading = Some(direction);
    }
}
