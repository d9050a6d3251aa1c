//! Cell grid materialized from a road network
//!
//! Every navigable position becomes a [`RoadCell`] carrying its lane moves,
//! light phase and occupancy. The grid is the only shared mutable state of a
//! running simulation.

use super::road_network::RoadNetwork;
use super::types::{CellKind, CellPos, Direction, DirectionSet, LightGroup, VehicleId};

/// One navigable grid position
#[derive(Debug, Clone)]
pub struct RoadCell {
    pos: CellPos,
    kind: CellKind,
    /// Directions traffic flows along this lane
    flow: DirectionSet,
    /// Legal exits for a straight road cell: the flow plus any dead-end shift
    moves: DirectionSet,
    light_group: Option<LightGroup>,
    light_green: bool,
    /// Odd diagonal of the intersection footprint
    odd_footprint: bool,
    occupant: Option<VehicleId>,
    /// Blocks entry; set while a vehicle is present or the light is red
    occupied: bool,
    entry_tick: u64,
    dwell_log: Vec<u64>,
    pass_count: u64,
}

impl RoadCell {
    pub fn pos(&self) -> CellPos {
        self.pos
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn is_intersection(&self) -> bool {
        self.kind == CellKind::Intersection
    }

    /// The single direction this lane carries, if it is one-way.
    pub fn lane_direction(&self) -> Option<Direction> {
        let mut flow = self.flow.iter();
        match (flow.next(), flow.next()) {
            (Some(direction), None) => Some(direction),
            _ => None,
        }
    }

    pub fn flow(&self) -> DirectionSet {
        self.flow
    }

    pub fn moves(&self) -> DirectionSet {
        self.moves
    }

    pub fn light_group(&self) -> Option<LightGroup> {
        self.light_group
    }

    /// Light phase; only meaningful on intersections.
    pub fn is_green(&self) -> bool {
        self.light_green
    }

    pub fn occupant(&self) -> Option<VehicleId> {
        self.occupant
    }

    pub fn occupied_by_vehicle(&self) -> bool {
        self.occupant.is_some()
    }

    /// Movement-blocking flag: a vehicle is present or the stop line is red.
    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    pub fn entry_tick(&self) -> u64 {
        self.entry_tick
    }

    pub fn dwell_log(&self) -> &[u64] {
        &self.dwell_log
    }

    pub fn pass_count(&self) -> u64 {
        self.pass_count
    }

    /// A vehicle claims this cell.
    pub fn enter(&mut self, tick: u64, vehicle: VehicleId) {
        self.occupant = Some(vehicle);
        self.occupied = true;
        self.entry_tick = tick;
        self.pass_count += 1;
    }

    /// The occupant leaves. A red intersection keeps blocking entry.
    pub fn leave(&mut self, tick: u64) {
        self.dwell_log.push(tick.saturating_sub(self.entry_tick));
        self.occupant = None;
        self.occupied = self.is_intersection() && !self.light_green;
    }

    pub fn set_light_phase(&mut self, green: bool) {
        if !self.is_intersection() {
            return;
        }
        self.light_green = green;
        self.occupied = if green { self.occupant.is_some() } else { true };
    }
}

/// Dense grid position: either absent or a road cell
#[derive(Debug, Clone)]
pub enum Slot {
    Absent,
    Road(RoadCell),
}

/// Materialized cells of one road network
#[derive(Debug, Clone)]
pub struct CellGrid {
    width: usize,
    height: usize,
    slots: Vec<Slot>,
    /// Indices of intersection slots, row-major
    intersections: Vec<usize>,
}

impl CellGrid {
    /// Materialize every navigable position. Group A lights start green.
    pub fn from_network(network: &RoadNetwork) -> Self {
        let width = network.width();
        let height = network.height();
        let mut slots = Vec::with_capacity(width * height);
        let mut intersections = Vec::new();

        for index in 0..width * height {
            let pos = network.position(index);
            let kind = network.kind(pos);
            if !kind.is_navigable() {
                slots.push(Slot::Absent);
                continue;
            }

            let light_group = network.light_group(pos);
            let (flow, moves, odd_footprint) = if kind == CellKind::Intersection {
                intersections.push(index);
                (DirectionSet::EMPTY, DirectionSet::EMPTY, footprint_is_odd(network, pos))
            } else {
                let flow = scan_lane_flow(network, pos);
                (flow, scan_lane_moves(network, pos), false)
            };
            let light_green = light_group == Some(LightGroup::A);

            slots.push(Slot::Road(RoadCell {
                pos,
                kind,
                flow,
                moves,
                light_group,
                light_green,
                odd_footprint,
                occupant: None,
                occupied: kind == CellKind::Intersection && !light_green,
                entry_tick: 0,
                dwell_log: Vec::new(),
                pass_count: 0,
            }));
        }

        Self {
            width,
            height,
            slots,
            intersections,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn index(&self, pos: CellPos) -> Option<usize> {
        (pos.row < self.height && pos.col < self.width).then(|| pos.row * self.width + pos.col)
    }

    pub fn position(&self, index: usize) -> CellPos {
        CellPos::new(index / self.width, index % self.width)
    }

    pub fn cell(&self, pos: CellPos) -> Option<&RoadCell> {
        match self.slots.get(self.index(pos)?)? {
            Slot::Road(cell) => Some(cell),
            Slot::Absent => None,
        }
    }

    pub fn cell_mut(&mut self, pos: CellPos) -> Option<&mut RoadCell> {
        let index = self.index(pos)?;
        match self.slots.get_mut(index)? {
            Slot::Road(cell) => Some(cell),
            Slot::Absent => None,
        }
    }

    pub fn kind(&self, pos: CellPos) -> CellKind {
        self.cell(pos).map_or(CellKind::Empty, RoadCell::kind)
    }

    pub fn is_navigable(&self, pos: CellPos) -> bool {
        self.cell(pos).is_some()
    }

    pub fn is_occupied(&self, pos: CellPos) -> bool {
        self.cell(pos).is_some_and(RoadCell::is_occupied)
    }

    pub fn occupant(&self, pos: CellPos) -> Option<VehicleId> {
        self.cell(pos).and_then(RoadCell::occupant)
    }

    /// All road cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &RoadCell> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Road(cell) => Some(cell),
            Slot::Absent => None,
        })
    }

    pub fn intersections(&self) -> impl Iterator<Item = &RoadCell> {
        self.intersections
            .iter()
            .filter_map(|index| match &self.slots[*index] {
                Slot::Road(cell) => Some(cell),
                Slot::Absent => None,
            })
    }

    /// Same cells as [`CellGrid::intersections`], walked through the cached
    /// (ascending) index list.
    pub fn intersections_mut(&mut self) -> impl Iterator<Item = &mut RoadCell> {
        let mut wanted = self.intersections.iter().copied().peekable();
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(move |(index, slot)| {
                wanted.next_if_eq(&index)?;
                match slot {
                    Slot::Road(cell) => Some(cell),
                    Slot::Absent => None,
                }
            })
    }

    /// Whether a vehicle on `from`, which arrived travelling `heading`, may
    /// step one cell in `direction`.
    ///
    /// Straight cells allow their lane flow plus dead-end shifts. Inside an
    /// intersection straight-on and right turns are fine, U-turns never are,
    /// and left turns only from the footprint diagonal matching the incoming
    /// axis. Leaving an intersection requires the lane entered to flow away
    /// from it.
    pub fn is_legal_move(
        &self,
        from: CellPos,
        direction: Direction,
        heading: Option<Direction>,
    ) -> bool {
        let Some(to) = from.step(direction, self.width, self.height) else {
            return false;
        };
        let (Some(source), Some(target)) = (self.cell(from), self.cell(to)) else {
            return false;
        };

        if !source.is_intersection() {
            return source.moves.contains(direction);
        }

        if let Some(incoming) = heading {
            if direction == incoming.opposite() {
                return false;
            }
            if direction == incoming.rotate_left()
                && !left_turn_diagonal(incoming, source.odd_footprint)
            {
                return false;
            }
        }

        target.is_intersection() || target.flow.contains(direction)
    }
}

/// Horizontal traffic turns left on the even diagonal, vertical on the odd one.
fn left_turn_diagonal(incoming: Direction, odd_footprint: bool) -> bool {
    match incoming {
        Direction::East | Direction::West => !odd_footprint,
        Direction::North | Direction::South => odd_footprint,
    }
}

/// First and last cell of the contiguous navigable run through `pos`,
/// walking `back` and then `forward`.
fn contiguous_run(
    network: &RoadNetwork,
    pos: CellPos,
    back: Direction,
    forward: Direction,
) -> (CellPos, CellPos) {
    let (width, height) = (network.width(), network.height());
    let mut first = pos;
    while let Some(next) = first.step(back, width, height) {
        if !network.is_navigable(next) {
            break;
        }
        first = next;
    }
    let mut last = pos;
    while let Some(next) = last.step(forward, width, height) {
        if !network.is_navigable(next) {
            break;
        }
        last = next;
    }
    (first, last)
}

/// Intersections only make sense for the straight-road scan
fn is_horizontal_road(network: &RoadNetwork, pos: CellPos) -> bool {
    network.is_horizontal_run(pos) && !network.is_vertical_run(pos)
}

/// Direction(s) a straight road cell carries, from the lanes beside it.
///
/// On a horizontal road the half of the lanes nearest the top runs west and
/// the lower half runs east; on a vertical road the left half runs south and
/// the right half north. A single-lane road is two-way.
pub fn scan_lane_flow(network: &RoadNetwork, pos: CellPos) -> DirectionSet {
    if !network.is_navigable(pos) || network.is_intersection(pos) {
        return DirectionSet::EMPTY;
    }

    if is_horizontal_road(network, pos) {
        let (top, bottom) = contiguous_run(network, pos, Direction::North, Direction::South);
        let run = bottom.row - top.row + 1;
        let offset = pos.row - top.row;
        if run == 1 {
            [Direction::East, Direction::West].into_iter().collect()
        } else if offset * 2 >= run {
            [Direction::East].into_iter().collect()
        } else {
            [Direction::West].into_iter().collect()
        }
    } else {
        let (left, right) = contiguous_run(network, pos, Direction::West, Direction::East);
        let run = right.col - left.col + 1;
        let offset = pos.col - left.col;
        if run == 1 {
            [Direction::North, Direction::South].into_iter().collect()
        } else if offset * 2 >= run {
            [Direction::North].into_iter().collect()
        } else {
            [Direction::South].into_iter().collect()
        }
    }
}

/// Lane flow plus the lane shift offered where the road dead-ends, which
/// lets traffic swap onto the opposite lane and turn back. The shift is only
/// offered when a road cell lies on that side.
pub fn scan_lane_moves(network: &RoadNetwork, pos: CellPos) -> DirectionSet {
    let mut moves = scan_lane_flow(network, pos);
    if moves.is_empty() {
        return moves;
    }

    let (shifts, (first, last)) = if is_horizontal_road(network, pos) {
        (
            [Direction::South, Direction::North],
            contiguous_run(network, pos, Direction::West, Direction::East),
        )
    } else {
        (
            [Direction::West, Direction::East],
            contiguous_run(network, pos, Direction::North, Direction::South),
        )
    };

    for (end, shift) in [first, last].into_iter().zip(shifts) {
        let lands_on_road = pos
            .step(shift, network.width(), network.height())
            .is_some_and(|next| network.is_navigable(next));
        if pos == end && lands_on_road {
            moves.insert(shift);
        }
    }
    moves
}

/// Parity of the cell's offset inside its block of contiguous intersections.
fn footprint_is_odd(network: &RoadNetwork, pos: CellPos) -> bool {
    let (width, height) = (network.width(), network.height());
    let mut top = pos;
    while let Some(next) = top.step(Direction::North, width, height) {
        if !network.is_intersection(next) {
            break;
        }
        top = next;
    }
    let mut left = pos;
    while let Some(next) = left.step(Direction::West, width, height) {
        if !network.is_intersection(next) {
            break;
        }
        left = next;
    }
    ((pos.row - top.row) + (pos.col - left.col)) % 2 == 1
}
