//! Procedural road network
//!
//! A dense grid of road stripes laid along both axes, with derived run masks,
//! the intersection mask and the A/B light-group partition. Topology is fixed
//! once [`RoadNetwork::finish`] has run.

use anyhow::Result;
use log::{debug, info};
use petgraph::graphmap::UnGraphMap;
use petgraph::visit::Bfs;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::config::NetworkConfig;
use super::types::{Axis, CellKind, CellPos, Direction, LightGroup};

/// Static road topology of a city grid
#[derive(Debug, Clone)]
pub struct RoadNetwork {
    width: usize,
    height: usize,

    /// Stripe kind per cell; never `Intersection`
    kinds: Vec<CellKind>,

    /// Cells covered by a horizontal stripe
    horizontal: Vec<bool>,

    /// Cells covered by a vertical stripe
    vertical: Vec<bool>,

    /// horizontal && vertical, filled by `finish`
    intersections: Vec<bool>,

    light_groups: Vec<Option<LightGroup>>,

    /// Base road positions chosen by the generator (rows, then columns)
    horizontal_bases: Vec<usize>,
    vertical_bases: Vec<usize>,
}

impl RoadNetwork {
    /// An empty `width` x `height` grid with no roads.
    pub fn new(width: usize, height: usize) -> Self {
        let len = width * height;
        Self {
            width,
            height,
            kinds: vec![CellKind::Empty; len],
            horizontal: vec![false; len],
            vertical: vec![false; len],
            intersections: vec![false; len],
            light_groups: vec![None; len],
            horizontal_bases: Vec::new(),
            vertical_bases: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, pos: CellPos) -> bool {
        pos.row < self.height && pos.col < self.width
    }

    pub fn index(&self, pos: CellPos) -> usize {
        pos.row * self.width + pos.col
    }

    pub fn position(&self, index: usize) -> CellPos {
        CellPos::new(index / self.width, index % self.width)
    }

    /// Effective kind of a cell, with intersections reported as such.
    /// Out-of-bounds positions are `Empty`.
    pub fn kind(&self, pos: CellPos) -> CellKind {
        if !self.contains(pos) {
            return CellKind::Empty;
        }
        let index = self.index(pos);
        if self.intersections[index] {
            CellKind::Intersection
        } else {
            self.kinds[index]
        }
    }

    /// Kind of the highest-priority stripe covering the cell.
    pub fn stripe_kind(&self, pos: CellPos) -> CellKind {
        if !self.contains(pos) {
            return CellKind::Empty;
        }
        self.kinds[self.index(pos)]
    }

    pub fn is_navigable(&self, pos: CellPos) -> bool {
        self.kind(pos).is_navigable()
    }

    pub fn is_horizontal_run(&self, pos: CellPos) -> bool {
        self.contains(pos) && self.horizontal[self.index(pos)]
    }

    pub fn is_vertical_run(&self, pos: CellPos) -> bool {
        self.contains(pos) && self.vertical[self.index(pos)]
    }

    pub fn is_intersection(&self, pos: CellPos) -> bool {
        self.contains(pos) && self.intersections[self.index(pos)]
    }

    pub fn light_group(&self, pos: CellPos) -> Option<LightGroup> {
        if !self.contains(pos) {
            return None;
        }
        self.light_groups[self.index(pos)]
    }

    pub fn horizontal_bases(&self) -> &[usize] {
        &self.horizontal_bases
    }

    pub fn vertical_bases(&self) -> &[usize] {
        &self.vertical_bases
    }

    /// All navigable positions in row-major order.
    pub fn navigable_cells(&self) -> Vec<CellPos> {
        (0..self.kinds.len())
            .map(|index| self.position(index))
            .filter(|pos| self.is_navigable(*pos))
            .collect()
    }

    pub fn navigable_count(&self) -> usize {
        self.kinds.iter().filter(|kind| kind.is_navigable()).count()
    }

    pub fn intersection_count(&self) -> usize {
        self.intersections.iter().filter(|is| **is).count()
    }

    /// Lay a stripe of `thickness` rows (horizontal) or columns (vertical)
    /// starting at `start` across the whole grid. A cell only changes kind
    /// when `kind` outranks what is already there; run membership is always
    /// recorded.
    pub fn lay_stripe(&mut self, axis: Axis, start: usize, thickness: usize, kind: CellKind) {
        let axis_len = match axis {
            Axis::Horizontal => self.height,
            Axis::Vertical => self.width,
        };
        let end = (start + thickness).min(axis_len);
        let span = match axis {
            Axis::Horizontal => self.width,
            Axis::Vertical => self.height,
        };

        for line in start..end {
            for along in 0..span {
                let pos = match axis {
                    Axis::Horizontal => CellPos::new(line, along),
                    Axis::Vertical => CellPos::new(along, line),
                };
                let index = self.index(pos);
                if kind.priority() > self.kinds[index].priority() {
                    self.kinds[index] = kind;
                }
                match axis {
                    Axis::Horizontal => self.horizontal[index] = true,
                    Axis::Vertical => self.vertical[index] = true,
                }
            }
        }
    }

    /// Cells of the block between `from` (inclusive) and `to` (exclusive)
    /// along a stripe of `thickness` lines starting at `start`.
    fn segment_cells(
        &self,
        axis: Axis,
        start: usize,
        thickness: usize,
        from: usize,
        to: usize,
    ) -> Vec<CellPos> {
        let (axis_len, span) = match axis {
            Axis::Horizontal => (self.height, self.width),
            Axis::Vertical => (self.width, self.height),
        };
        let end = (start + thickness).min(axis_len);
        let to = to.min(span);

        let mut cells = Vec::new();
        for line in start..end {
            for along in from..to {
                cells.push(match axis {
                    Axis::Horizontal => CellPos::new(line, along),
                    Axis::Vertical => CellPos::new(along, line),
                });
            }
        }
        cells
    }

    /// True when the segment exists and every cell in it is still plain local road.
    pub fn is_plain_local_segment(
        &self,
        axis: Axis,
        start: usize,
        thickness: usize,
        from: usize,
        to: usize,
    ) -> bool {
        let cells = self.segment_cells(axis, start, thickness, from, to);
        !cells.is_empty()
            && cells
                .iter()
                .all(|pos| self.kinds[self.index(*pos)] == CellKind::LocalRoad)
    }

    /// Remove a plain local segment. Segments touching any collector or
    /// highway cell are left alone. Returns whether anything was erased.
    pub fn erase_segment(
        &mut self,
        axis: Axis,
        start: usize,
        thickness: usize,
        from: usize,
        to: usize,
    ) -> bool {
        if !self.is_plain_local_segment(axis, start, thickness, from, to) {
            return false;
        }
        for pos in self.segment_cells(axis, start, thickness, from, to) {
            let index = self.index(pos);
            self.kinds[index] = CellKind::Empty;
            self.horizontal[index] = false;
            self.vertical[index] = false;
        }
        true
    }

    /// Derive the intersection mask and assign light groups.
    pub fn finish(&mut self) {
        for index in 0..self.kinds.len() {
            self.intersections[index] =
                self.kinds[index].is_navigable() && self.horizontal[index] && self.vertical[index];
        }
        self.assign_light_groups();
    }

    /// Checkerboard the A/B groups around the bounding-box midpoint of every
    /// 4-connected cluster of intersections.
    fn assign_light_groups(&mut self) {
        self.light_groups.iter_mut().for_each(|group| *group = None);

        let mut graph: UnGraphMap<CellPos, ()> = UnGraphMap::new();
        let junctions: Vec<CellPos> = (0..self.kinds.len())
            .filter(|index| self.intersections[*index])
            .map(|index| self.position(index))
            .collect();

        for pos in &junctions {
            graph.add_node(*pos);
            for direction in [Direction::South, Direction::East] {
                if let Some(next) = pos.step(direction, self.width, self.height) {
                    if self.is_intersection(next) {
                        graph.add_edge(*pos, next, ());
                    }
                }
            }
        }

        let mut visited = vec![false; self.kinds.len()];
        let mut components = 0;
        for start in junctions {
            if visited[self.index(start)] {
                continue;
            }
            components += 1;

            let mut component = Vec::new();
            let mut bfs = Bfs::new(&graph, start);
            while let Some(pos) = bfs.next(&graph) {
                visited[self.index(pos)] = true;
                component.push(pos);
            }

            let min_row = component.iter().map(|p| p.row).min().unwrap_or(start.row);
            let max_row = component.iter().map(|p| p.row).max().unwrap_or(start.row);
            let min_col = component.iter().map(|p| p.col).min().unwrap_or(start.col);
            let max_col = component.iter().map(|p| p.col).max().unwrap_or(start.col);

            for pos in component {
                // Compare doubled coordinates against min + max to stay in integers
                let top = pos.row * 2 <= min_row + max_row;
                let left = pos.col * 2 <= min_col + max_col;
                let group = if top == left { LightGroup::A } else { LightGroup::B };
                let index = self.index(pos);
                self.light_groups[index] = Some(group);
            }
        }
        debug!("Assigned light groups to {} intersection clusters", components);
    }

    /// Build a random city with the given generator parameters.
    pub fn generate<R: Rng + ?Sized>(
        width: usize,
        height: usize,
        config: &NetworkConfig,
        rng: &mut R,
    ) -> Result<RoadNetwork> {
        config.validate()?;

        let mut network = RoadNetwork::new(width, height);
        let base_width = config.base_road_width;

        let horizontal_bases =
            spaced_positions(height, base_width, config.axis_spacing_range, rng);
        let vertical_bases = spaced_positions(width, base_width, config.axis_spacing_range, rng);

        for row in &horizontal_bases {
            network.lay_stripe(Axis::Horizontal, *row, base_width, CellKind::LocalRoad);
        }
        for col in &vertical_bases {
            network.lay_stripe(Axis::Vertical, *col, base_width, CellKind::LocalRoad);
        }

        let highway_axis = match (horizontal_bases.is_empty(), vertical_bases.is_empty()) {
            (false, false) => Some(if rng.random_bool(0.5) {
                Axis::Horizontal
            } else {
                Axis::Vertical
            }),
            (false, true) => Some(Axis::Horizontal),
            (true, false) => Some(Axis::Vertical),
            (true, true) => None,
        };

        if let Some(axis) = highway_axis {
            let (same, orthogonal) = match axis {
                Axis::Horizontal => (&horizontal_bases, &vertical_bases),
                Axis::Vertical => (&vertical_bases, &horizontal_bases),
            };

            let highways: Vec<usize> = same
                .choose_multiple(rng, config.highway_count)
                .copied()
                .collect();
            for base in &highways {
                let start = centered_start(*base, base_width, config.highway_width);
                network.lay_stripe(axis, start, config.highway_width, CellKind::Highway);
            }

            let (collector_axis, candidates) = if orthogonal.is_empty() {
                let remaining: Vec<usize> = same
                    .iter()
                    .copied()
                    .filter(|base| !highways.contains(base))
                    .collect();
                (axis, remaining)
            } else {
                (axis.orthogonal(), orthogonal.clone())
            };

            let collectors: Vec<usize> = candidates
                .choose_multiple(rng, config.collector_count)
                .copied()
                .collect();
            for base in collectors {
                let start = centered_start(base, base_width, config.collector_width);
                network.lay_stripe(
                    collector_axis,
                    start,
                    config.collector_width,
                    CellKind::CollectorRoad,
                );
            }

            debug!(
                "Placed {} highways on {:?} axis, collectors on {:?} axis",
                highways.len(),
                axis,
                collector_axis
            );
        }

        let mut removed = 0;
        for (axis, bases, crossings) in [
            (Axis::Horizontal, &horizontal_bases, &vertical_bases),
            (Axis::Vertical, &vertical_bases, &horizontal_bases),
        ] {
            for base in bases {
                for pair in crossings.windows(2) {
                    let from = pair[0] + base_width;
                    let to = pair[1];
                    if network.is_plain_local_segment(axis, *base, base_width, from, to)
                        && rng.random_bool(config.segment_removal_probability)
                        && network.erase_segment(axis, *base, base_width, from, to)
                    {
                        removed += 1;
                    }
                }
            }
        }

        network.horizontal_bases = horizontal_bases;
        network.vertical_bases = vertical_bases;
        network.finish();

        info!(
            "Generated {}x{} road network: {} horizontal / {} vertical base roads, {} segments removed, {} road cells, {} intersections",
            width,
            height,
            network.horizontal_bases.len(),
            network.vertical_bases.len(),
            removed,
            network.navigable_count(),
            network.intersection_count()
        );

        Ok(network)
    }
}

/// Base road offsets along an axis of `length` cells. The first road sits a
/// random step in; roads keep coming while a full base stripe still fits.
fn spaced_positions<R: Rng + ?Sized>(
    length: usize,
    base_width: usize,
    (min_step, max_step): (usize, usize),
    rng: &mut R,
) -> Vec<usize> {
    let mut positions = Vec::new();
    let Some(limit) = length.checked_sub(base_width) else {
        return positions;
    };

    let mut pos = rng.random_range(min_step..=max_step);
    while pos < limit {
        positions.push(pos);
        pos += rng.random_range(min_step..=max_step);
    }
    positions
}

/// First line of a `width`-wide stripe centred on a base road at `base`.
fn centered_start(base: usize, base_width: usize, width: usize) -> usize {
    (base + base_width / 2).saturating_sub(width / 2)
}
