mod common;

use std::collections::HashSet;

use city_traffic::simulation::{
    run_batch, Axis, CellKind, CellPos, ConfigurationError, NetworkConfig, RoadNetwork,
    SimConfig, SimWorld, VehicleId, VehicleState,
};
use common::{
    assert_path_legal, crossing_network, dense_config, init_logging, scenario_config,
    single_crossing_network, split_network,
};

fn crossing_world() -> SimWorld {
    SimWorld::from_network(crossing_network(), scenario_config()).expect("crossing world")
}

/// Check the occupancy bookkeeping of every vehicle against the grid
fn assert_occupancy_consistent(world: &SimWorld) {
    let mut held = HashSet::new();
    for vehicle in world.vehicles() {
        if !vehicle.holds_cell() {
            continue;
        }
        assert!(
            held.insert(vehicle.position),
            "two vehicles hold {:?}",
            vehicle.position
        );
        assert_eq!(
            world.grid().occupant(vehicle.position),
            Some(vehicle.id),
            "grid disagrees about {:?}",
            vehicle.id
        );
        assert!(world.grid().is_occupied(vehicle.position));
    }

    for cell in world.grid().cells() {
        if let Some(id) = cell.occupant() {
            let vehicle = world.vehicle(id).expect("occupant exists");
            assert!(vehicle.holds_cell());
            assert_eq!(vehicle.position, cell.pos());
        }
    }
}

/// Test that two vehicles meeting at a one-cell junction never share it
#[test]
fn test_single_cell_junction_is_never_shared() {
    init_logging();
    let junction = CellPos::new(4, 4);
    let mut world = SimWorld::from_network(single_crossing_network(), scenario_config())
        .expect("single crossing world");
    assert_eq!(world.network().intersection_count(), 1);
    assert!(world.network().is_intersection(junction));

    let eastbound = world
        .spawn_vehicle(CellPos::new(4, 0), CellPos::new(4, 9))
        .expect("spawn eastbound");
    let southbound = world
        .spawn_vehicle(CellPos::new(0, 4), CellPos::new(9, 4))
        .expect("spawn southbound");

    let mut visited_junction = [false, false];
    while !world.all_idle() && world.tick() < 100 {
        world.step().expect("step");
        assert_occupancy_consistent(&world);

        let inside: Vec<bool> = [eastbound, southbound]
            .iter()
            .map(|id| {
                let vehicle = world.vehicle(*id).expect("vehicle exists");
                vehicle.holds_cell() && vehicle.position == junction
            })
            .collect();
        assert!(
            !(inside[0] && inside[1]),
            "both vehicles inside the junction at tick {}",
            world.tick() - 1
        );
        visited_junction[0] |= inside[0];
        visited_junction[1] |= inside[1];
    }

    for id in [eastbound, southbound] {
        let vehicle = world.vehicle(id).expect("vehicle exists");
        assert!(vehicle.reached(), "{:?} did not arrive", id);
        assert_eq!(vehicle.cells_traveled, 9);
    }
    assert_eq!(visited_junction, [true, true]);
    assert_eq!(world.grid().cell(junction).map(|cell| cell.pass_count()), Some(2));
}

/// Test that two crossing vehicles both get through a 2x2 signalled junction
///
/// The junction block has four cells, so both vehicles may be inside the
/// block on the same tick; only each single cell is exclusive.
#[test]
fn test_crossing_vehicles_arrive() {
    init_logging();
    let mut world = crossing_world();
    let eastbound = world
        .spawn_vehicle(CellPos::new(5, 0), CellPos::new(5, 9))
        .expect("spawn eastbound");
    let southbound = world
        .spawn_vehicle(CellPos::new(0, 4), CellPos::new(9, 4))
        .expect("spawn southbound");

    while world.tick() < 100 {
        world.step().expect("step");
        assert_occupancy_consistent(&world);
    }
    let report = world.report();

    for id in [eastbound, southbound] {
        let vehicle = world.vehicle(id).expect("vehicle exists");
        assert!(vehicle.reached(), "{:?} did not arrive", id);
        assert!(!vehicle.holds_cell());
        assert_eq!(vehicle.position, vehicle.destination);
        assert_eq!(vehicle.cells_traveled, 9);
        assert!(vehicle.ticks_elapsed >= 9 && vehicle.ticks_elapsed <= 20);
    }
    assert_eq!(report.arrived_count(), 2);
    assert_eq!(report.success_rate(), 100.0);
    assert_eq!(world.light_toggles(), 100);
    assert!(world.all_idle());
}

/// Test that a city too sparse for any road yields an empty run
#[test]
fn test_roadless_city_has_no_vehicles() {
    let mut config = SimConfig {
        width: 10,
        height: 10,
        vehicle_count: 5,
        tick_count: 10,
        ..SimConfig::default()
    };
    config.network.axis_spacing_range = (50, 60);

    let mut world = SimWorld::build(config).expect("empty city is valid");
    assert_eq!(world.network().navigable_count(), 0);
    assert!(world.vehicles().is_empty());

    let report = world.run().expect("simulation runs");
    assert_eq!(report.ticks, 10);
    assert_eq!(report.success_rate(), 0.0);
    assert_eq!(report.average_arrival_ticks(), None);
}

/// Test that a single road cell cannot host random trips
#[test]
fn test_single_road_cell_is_a_configuration_error() {
    let mut network = RoadNetwork::new(5, 5);
    network.lay_stripe(Axis::Horizontal, 2, 1, CellKind::LocalRoad);
    assert!(network.erase_segment(Axis::Horizontal, 2, 1, 1, 5));
    network.finish();
    assert_eq!(network.navigable_count(), 1);

    let config = SimConfig {
        vehicle_count: 1,
        ..SimConfig::default()
    };
    let err = SimWorld::from_network(network.clone(), config)
        .err()
        .expect("one cell is not enough");
    assert!(err.downcast_ref::<ConfigurationError>().is_some(), "{err:#}");

    // Without vehicles the same network is fine
    assert!(SimWorld::from_network(network, scenario_config()).is_ok());
}

/// Test that a vehicle that always hesitates never leaves its source
#[test]
fn test_hesitating_vehicle_stays_put() {
    let config = SimConfig {
        hesitation_probability: 1.0,
        ..scenario_config()
    };
    let mut world = SimWorld::from_network(crossing_network(), config).expect("world");
    let source = CellPos::new(5, 0);
    let id = world
        .spawn_vehicle(source, CellPos::new(5, 9))
        .expect("spawn");

    world.run().expect("simulation runs");

    let vehicle = world.vehicle(id).expect("vehicle exists");
    assert!(!vehicle.reached());
    assert_eq!(vehicle.state(), VehicleState::Moving);
    assert_eq!(vehicle.position, source);
    assert_eq!(vehicle.ticks_elapsed, 100);
    assert_eq!(vehicle.cells_traveled, 0);
    assert_eq!(world.grid().occupant(source), Some(id));
}

/// Test that a trip to the starting cell is over before it begins
#[test]
fn test_trip_to_own_cell_arrives_immediately() {
    let mut world = crossing_world();
    let pos = CellPos::new(4, 7);
    let id = world.spawn_vehicle(pos, pos).expect("spawn");

    let vehicle = world.vehicle(id).expect("vehicle exists");
    assert!(vehicle.reached());
    assert_eq!(vehicle.ticks_elapsed, 0);
    assert!(!world.grid().is_occupied(pos));

    world.run_ticks(5).expect("steps");
    let vehicle = world.vehicle(id).expect("vehicle exists");
    assert_eq!(vehicle.ticks_elapsed, 0);
    assert_eq!(vehicle.cells_traveled, 0);
}

/// Test that vehicles cannot be stacked or sent off-road
#[test]
fn test_spawn_rejects_bad_trips() {
    let mut world = crossing_world();
    world
        .spawn_vehicle(CellPos::new(5, 1), CellPos::new(5, 8))
        .expect("first spawn");

    assert!(world
        .spawn_vehicle(CellPos::new(5, 1), CellPos::new(5, 9))
        .is_err());
    assert!(world
        .spawn_vehicle(CellPos::new(0, 0), CellPos::new(5, 9))
        .is_err());
    assert!(world
        .spawn_vehicle(CellPos::new(5, 2), CellPos::new(0, 0))
        .is_err());
    assert_eq!(world.vehicles().len(), 1);
}

/// Test that the lower id wins a contested cell
#[test]
fn test_lower_id_wins_contested_cell() {
    let mut world = crossing_world();
    let first = world
        .spawn_vehicle(CellPos::new(5, 3), CellPos::new(5, 9))
        .expect("spawn first");
    let second = world
        .spawn_vehicle(CellPos::new(4, 4), CellPos::new(9, 4))
        .expect("spawn second");

    // Tick 0 turns group B green, so (5, 4) is open to both
    world.step().expect("step");

    let first = world.vehicle(first).expect("first");
    let second = world.vehicle(second).expect("second");
    assert_eq!(first.position, CellPos::new(5, 4));
    assert_eq!(second.position, CellPos::new(4, 4));
    assert_eq!(second.ticks_elapsed, 1);
    assert_eq!(world.grid().occupant(CellPos::new(5, 4)), Some(first.id));
    assert_occupancy_consistent(&world);
}

/// Test that a vehicle with no route is stranded and frees its cell
#[test]
fn test_unreachable_destination_strands_vehicle() {
    let mut world =
        SimWorld::from_network(split_network(), scenario_config()).expect("split world");
    let source = CellPos::new(2, 0);
    let id = world
        .spawn_vehicle(source, CellPos::new(7, 5))
        .expect("spawn");
    assert!(world.grid().is_occupied(source));

    world.step().expect("step");

    let vehicle = world.vehicle(id).expect("vehicle exists");
    assert!(vehicle.is_stranded());
    assert!(!vehicle.reached());
    assert_eq!(vehicle.path_failure_count, 1);
    assert_eq!(vehicle.ticks_elapsed, 0);
    assert!(!world.grid().is_occupied(source));

    world.run_ticks(5).expect("steps");
    let vehicle = world.vehicle(id).expect("vehicle exists");
    assert_eq!(vehicle.path_failure_count, 1);
    assert_eq!(world.report().stranded_count(), 1);
}

/// Test the movement invariants of a busy random city on every tick
#[test]
fn test_random_city_keeps_invariants() {
    init_logging();
    let mut world = SimWorld::build(dense_config(5)).expect("world");
    assert_eq!(world.vehicles().len(), 60);
    assert_occupancy_consistent(&world);

    for _ in 0..150 {
        let before: Vec<(CellPos, usize)> = world
            .vehicles()
            .iter()
            .map(|vehicle| (vehicle.position, vehicle.path_cursor))
            .collect();

        world.step().expect("step");
        assert_occupancy_consistent(&world);
        for cell in world.grid().intersections() {
            assert!(
                cell.is_green() || cell.is_occupied(),
                "red light at {:?} does not block entry",
                cell.pos()
            );
        }

        for (vehicle, (start, cursor)) in world.vehicles().iter().zip(before) {
            let entered = &vehicle.path[cursor..vehicle.path_cursor];
            assert!(entered.len() <= world.grid().kind(start).speed().max(1));
            assert_eq!(entered.last().copied().unwrap_or(start), vehicle.position);

            let mut from = start;
            for &to in entered {
                let target = world.grid().cell(to).expect("entered a road cell");
                if target.is_intersection() && world.grid().kind(from) != CellKind::Intersection {
                    assert!(target.is_green(), "{:?} ran a red light at {:?}", vehicle.id, to);
                }
                from = to;
            }
        }
    }

    for vehicle in world.vehicles() {
        if !vehicle.path.is_empty() {
            assert_path_legal(world.grid(), vehicle.source, &vehicle.path);
        }
        if vehicle.reached() {
            assert_eq!(vehicle.position, vehicle.destination);
            assert_eq!(vehicle.cells_traveled as usize, vehicle.path.len());
        }
    }
    assert_eq!(world.light_toggles(), 50);
}

/// Test that every cell entry and exit is accounted for
#[test]
fn test_cell_traffic_counts_add_up() {
    let mut world = SimWorld::build(dense_config(8)).expect("world");
    let report = world.run().expect("simulation runs");

    let passes: u64 = report.cells.iter().map(|cell| cell.pass_count).sum();
    let entries: u64 = world
        .vehicles()
        .iter()
        .map(|vehicle| 1 + vehicle.cells_traveled)
        .sum();
    assert_eq!(passes, entries);

    for cell in &report.cells {
        let present = u64::from(world.grid().occupant(cell.pos).is_some());
        assert_eq!(cell.dwell_log.len() as u64 + present, cell.pass_count);
        if let (Some(mean), Some(median)) = (cell.mean_dwell(), cell.median_dwell()) {
            assert!(mean >= 0.0);
            assert!(cell.dwell_log.contains(&median));
        }
    }

    let busiest = report.busiest_cells(5);
    assert!(busiest.len() <= 5);
    assert!(busiest
        .windows(2)
        .all(|pair| pair[0].pass_count >= pair[1].pass_count));
}

/// Test that the same seed replays the same simulation
#[test]
fn test_seeded_runs_are_reproducible() {
    let first = SimWorld::build(dense_config(21))
        .and_then(|mut world| world.run())
        .expect("first run");
    let second = SimWorld::build(dense_config(21))
        .and_then(|mut world| world.run())
        .expect("second run");

    assert_eq!(first, second);
    assert!(first.arrived_count() > 0, "nobody arrived in a dense city");
}

/// Test that reset replaces the trips but keeps the city
#[test]
fn test_reset_spawns_fresh_trips() {
    let mut world = SimWorld::build(dense_config(13)).expect("world");
    let road_cells = world.network().navigable_count();
    world.run().expect("first run");

    world.reset().expect("reset");
    assert_eq!(world.tick(), 0);
    assert_eq!(world.network().navigable_count(), road_cells);
    assert_eq!(world.vehicles().len(), 60);
    assert!(world
        .vehicles()
        .iter()
        .all(|vehicle| vehicle.state() == VehicleState::AwaitingPath && vehicle.ticks_elapsed == 0));
    assert_eq!(
        world.grid().cells().map(|cell| cell.pass_count()).sum::<u64>(),
        60
    );
    assert_eq!(world.light_toggles(), 0);
    assert_occupancy_consistent(&world);
    assert_eq!(world.vehicle(VehicleId(59)).map(|vehicle| vehicle.id), Some(VehicleId(59)));
}

/// Test that batch runs aggregate every trial
#[test]
fn test_batch_run_averages_trials() {
    init_logging();
    let config = SimConfig {
        tick_count: 80,
        ..dense_config(3)
    };
    let summary = run_batch(&config, 3).expect("batch runs");

    assert_eq!(summary.trials, 3);
    assert_eq!(summary.per_trial_average.len(), 3);
    assert_eq!(summary.total_vehicles, 180);
    assert!(summary.total_arrived <= summary.total_vehicles);
    assert_eq!(summary.average_arrival_ticks.is_some(), summary.total_arrived > 0);
    if let Some(average) = summary.average_arrival_ticks {
        assert!(average >= 1.0 && average <= 80.0);
    }
}

/// Test that reports serialize for external tooling
#[test]
fn test_report_serializes_to_json() {
    let mut world = crossing_world();
    world
        .spawn_vehicle(CellPos::new(5, 0), CellPos::new(5, 9))
        .expect("spawn");
    let report = world.run().expect("simulation runs");

    let json = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(json["ticks"], 100);
    assert_eq!(json["vehicles"][0]["reached"], true);
    assert_eq!(json["vehicles"].as_array().map(Vec::len), Some(1));

    // The generator settings round-trip through the config format
    let config = SimConfig {
        network: NetworkConfig {
            highway_count: 2,
            segment_removal_probability: 0.5,
            ..NetworkConfig::default()
        },
        hesitation_probability: 0.25,
        ..SimConfig::default()
    };
    let text = serde_json::to_string(&config).expect("config serializes");
    let parsed: SimConfig = serde_json::from_str(&text).expect("config parses");
    assert_eq!(parsed, config);
}
