//! Core types for the traffic simulation
//!
//! Coordinates, directions and cell kinds shared by every component.

use serde::{Deserialize, Serialize};

/// A unique identifier for a vehicle.
/// Vehicles are stored in ascending id order, which is also their update order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub usize);

/// A grid coordinate. Row grows southwards, column grows eastwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

impl CellPos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// The neighbouring coordinate in `direction`, or `None` when it would
    /// leave a `width` x `height` grid.
    pub fn step(self, direction: Direction, width: usize, height: usize) -> Option<CellPos> {
        let (dr, dc) = direction.delta();
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        (row < height && col < width).then_some(CellPos { row, col })
    }

    /// Straight-line distance, used as the planner heuristic.
    pub fn euclidean(self, other: CellPos) -> f64 {
        let dr = self.row as f64 - other.row as f64;
        let dc = self.col as f64 - other.col as f64;
        (dr * dr + dc * dc).sqrt()
    }
}

/// The four cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    West,
    East,
}

impl Direction {
    /// Expansion order used by the planner.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// (row, col) delta of a single step.
    pub const fn delta(self) -> (isize, isize) {
        match self {
            Direction::North => (-1, 0),
            Direction::South => (1, 0),
            Direction::West => (0, -1),
            Direction::East => (0, 1),
        }
    }

    pub const fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }

    /// Quarter turn counter-clockwise (the driver's left).
    pub const fn rotate_left(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
        }
    }

    /// Quarter turn clockwise (the driver's right).
    pub const fn rotate_right(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    pub const fn axis(self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::Vertical,
            Direction::West | Direction::East => Axis::Horizontal,
        }
    }

    /// Direction of a single step from `from` to `to`, if they are 4-adjacent.
    pub fn between(from: CellPos, to: CellPos) -> Option<Direction> {
        Direction::ALL.into_iter().find(|direction| {
            let (dr, dc) = direction.delta();
            from.row.checked_add_signed(dr) == Some(to.row)
                && from.col.checked_add_signed(dc) == Some(to.col)
        })
    }

    const fn bit(self) -> u8 {
        match self {
            Direction::North => 0b0001,
            Direction::South => 0b0010,
            Direction::West => 0b0100,
            Direction::East => 0b1000,
        }
    }
}

/// A small set of directions, used for the moves a cell offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DirectionSet(u8);

impl DirectionSet {
    pub const EMPTY: DirectionSet = DirectionSet(0);

    pub fn insert(&mut self, direction: Direction) {
        self.0 |= direction.bit();
    }

    pub fn contains(self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL
            .into_iter()
            .filter(move |direction| self.contains(*direction))
    }
}

impl FromIterator<Direction> for DirectionSet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut set = DirectionSet::EMPTY;
        for direction in iter {
            set.insert(direction);
        }
        set
    }
}

/// Orientation of a road stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Rows laid across the full width (traffic runs east/west)
    Horizontal,
    /// Columns laid across the full height (traffic runs north/south)
    Vertical,
}

impl Axis {
    pub const fn orthogonal(self) -> Axis {
        match self {
            Axis::Horizontal => Axis::Vertical,
            Axis::Vertical => Axis::Horizontal,
        }
    }
}

/// What occupies a grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellKind {
    /// Not navigable (city block or removed segment)
    #[default]
    Empty,
    LocalRoad,
    CollectorRoad,
    Highway,
    Intersection,
}

impl CellKind {
    pub fn is_navigable(self) -> bool {
        !matches!(self, CellKind::Empty)
    }

    /// Overwrite priority when stripes overlap. Higher never gets downgraded.
    pub fn priority(self) -> u8 {
        match self {
            CellKind::Empty => 0,
            CellKind::LocalRoad => 1,
            CellKind::CollectorRoad => 2,
            CellKind::Highway => 3,
            // Never laid as a stripe, only derived from the run masks
            CellKind::Intersection => 0,
        }
    }

    /// Cells a vehicle may advance per tick while standing on this kind.
    pub fn speed(self) -> usize {
        match self {
            CellKind::Empty => 0,
            CellKind::LocalRoad | CellKind::Intersection => 1,
            CellKind::CollectorRoad => 2,
            CellKind::Highway => 3,
        }
    }
}

/// One of the two mutually exclusive light phase groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightGroup {
    A,
    B,
}
