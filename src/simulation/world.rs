//! Main simulation world that ties everything together
//!
//! This is the entry point for building a city, placing vehicles and
//! stepping the simulation tick by tick.

use anyhow::{ensure, Context, Result};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::config::{ConfigurationError, SimConfig};
use super::grid::CellGrid;
use super::intersection::TrafficLightController;
use super::pathfinding::PathPlanner;
use super::road_network::RoadNetwork;
use super::stats::SimulationReport;
use super::types::{CellPos, VehicleId};
use super::vehicle::SimVehicle;
use super::vehicle_manager;

/// The main simulation world
pub struct SimWorld {
    pub config: SimConfig,

    /// Static topology the grid was built from
    network: RoadNetwork,

    /// Cell state: occupancy, lights, dwell accounting
    grid: CellGrid,

    planner: PathPlanner,

    lights: TrafficLightController,

    /// All vehicles, in ascending id order
    vehicles: Vec<SimVehicle>,

    /// Next tick to simulate
    tick: u64,

    /// Seeded RNG shared by generation, spawning and movement
    rng: StdRng,
}

impl SimWorld {
    /// Generate a city from `config` and spawn its vehicles.
    pub fn build(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let network = RoadNetwork::generate(config.width, config.height, config.network(), &mut rng)
            .context("Failed to generate road network")?;
        Self::assemble(network, config, rng)
    }

    /// Use a prebuilt network (its dimensions override the configured ones).
    pub fn from_network(network: RoadNetwork, mut config: SimConfig) -> Result<Self> {
        config.width = network.width();
        config.height = network.height();
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Self::assemble(network, config, rng)
    }

    fn assemble(network: RoadNetwork, config: SimConfig, rng: StdRng) -> Result<Self> {
        let mut world = Self {
            grid: CellGrid::from_network(&network),
            lights: TrafficLightController::new(config.light_toggle_interval)?,
            planner: PathPlanner::new(),
            vehicles: Vec::new(),
            tick: 0,
            network,
            config,
            rng,
        };
        world.populate()?;
        Ok(world)
    }

    /// Spawn the configured number of random vehicles on a fresh grid.
    fn populate(&mut self) -> Result<()> {
        let navigable = self.network.navigable_count();
        if self.config.vehicle_count > 0 && navigable == 1 {
            return Err(ConfigurationError::new(
                "vehicles need at least two navigable cells, the network has one",
            )
            .into());
        }

        self.vehicles = vehicle_manager::spawn_random_vehicles(
            self.config.vehicle_count,
            0,
            self.config.move_probability(),
            &mut self.grid,
            &mut self.rng,
            self.tick,
        )?;

        info!(
            "World ready: {}x{} grid, {} road cells, {} intersections, {} vehicles",
            self.network.width(),
            self.network.height(),
            navigable,
            self.network.intersection_count(),
            self.vehicles.len()
        );
        Ok(())
    }

    /// Discard all vehicles and cell history, then spawn a new set of trips
    /// on the same network.
    pub fn reset(&mut self) -> Result<()> {
        self.grid = CellGrid::from_network(&self.network);
        self.lights = TrafficLightController::new(self.config.light_toggle_interval)?;
        self.tick = 0;
        self.populate()
    }

    /// Place a vehicle with an explicit trip. The source must be a free road cell.
    pub fn spawn_vehicle(&mut self, source: CellPos, destination: CellPos) -> Result<VehicleId> {
        ensure!(
            self.grid.is_navigable(destination),
            "Destination {:?} is not a road cell",
            destination
        );
        let id = VehicleId(self.vehicles.len());
        let vehicle = SimVehicle::new(
            id,
            source,
            destination,
            self.config.move_probability(),
            &mut self.grid,
            self.tick,
        )?;
        self.vehicles.push(vehicle);
        Ok(id)
    }

    /// Simulate one tick: lights, then planning, then movement in id order.
    pub fn step(&mut self) -> Result<()> {
        let tick = self.tick;

        if self.lights.should_toggle(tick) {
            self.lights.toggle(&mut self.grid);
        }

        vehicle_manager::plan_routes(&mut self.vehicles, &mut self.planner, &mut self.grid, tick);

        let arrivals =
            vehicle_manager::update_vehicles(&mut self.vehicles, tick, &mut self.grid, &mut self.rng)
                .with_context(|| format!("Vehicle update failed at tick {}", tick))?;

        if !arrivals.is_empty() {
            info!("Tick {}: {} vehicle(s) arrived", tick, arrivals.len());
        }

        self.tick += 1;
        Ok(())
    }

    /// Step `ticks` times.
    pub fn run_ticks(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Run until the configured tick count and report the outcome.
    pub fn run(&mut self) -> Result<SimulationReport> {
        let remaining = self.config.tick_count.saturating_sub(self.tick);
        self.run_ticks(remaining)?;
        Ok(self.report())
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport::from_world(self)
    }

    /// Next tick to be simulated (equals ticks simulated so far).
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn vehicles(&self) -> &[SimVehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&SimVehicle> {
        self.vehicles.get(id.0)
    }

    pub fn light_toggles(&self) -> u64 {
        self.lights.toggles()
    }

    /// True once every vehicle has arrived or been stranded.
    pub fn all_idle(&self) -> bool {
        self.vehicles.iter().all(SimVehicle::is_idle)
    }
}
