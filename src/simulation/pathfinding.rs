//! Lane-aware A* route planning over the cell grid
//!
//! The planner owns its scratch buffers and clears them on every call, so a
//! single planner can serve every vehicle in turn without leaking state.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::grid::CellGrid;
use super::types::{CellPos, Direction};

/// Open-set entry; ordered by f, then by insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OpenEntry {
    f: OrderedFloat<f64>,
    order: u64,
    index: usize,
}

/// A* planner with per-call scratch state
#[derive(Debug, Default)]
pub struct PathPlanner {
    g: Vec<f64>,
    h: Vec<f64>,
    f: Vec<f64>,
    parent: Vec<Option<usize>>,
    closed: Vec<bool>,
    open: BinaryHeap<Reverse<OpenEntry>>,
    next_order: u64,
    /// Cells expanded by the most recent search
    expanded: usize,
}

impl PathPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells closed during the last call to [`PathPlanner::compute`].
    pub fn expanded(&self) -> usize {
        self.expanded
    }

    fn reset(&mut self, len: usize) {
        self.g.clear();
        self.g.resize(len, f64::INFINITY);
        self.h.clear();
        self.h.resize(len, f64::INFINITY);
        self.f.clear();
        self.f.resize(len, f64::INFINITY);
        self.parent.clear();
        self.parent.resize(len, None);
        self.closed.clear();
        self.closed.resize(len, false);
        self.open.clear();
        self.next_order = 0;
        self.expanded = 0;
    }

    fn push(&mut self, f: f64, index: usize) {
        self.open.push(Reverse(OpenEntry {
            f: OrderedFloat(f),
            order: self.next_order,
            index,
        }));
        self.next_order += 1;
    }

    /// Route from `source` to `destination`, excluding the source cell.
    ///
    /// Returns `None` when the open set runs dry. The incoming direction used
    /// for intersection legality comes from the search's own parent links.
    pub fn compute(
        &mut self,
        source: CellPos,
        destination: CellPos,
        grid: &CellGrid,
    ) -> Option<Vec<CellPos>> {
        self.reset(grid.len());

        if source == destination {
            return Some(Vec::new());
        }
        if !grid.is_navigable(source) || !grid.is_navigable(destination) {
            return None;
        }

        let start = grid.index(source)?;
        self.g[start] = 0.0;
        self.h[start] = source.euclidean(destination);
        self.f[start] = self.h[start];
        self.push(self.f[start], start);

        while let Some(Reverse(entry)) = self.open.pop() {
            let current = entry.index;
            if self.closed[current] {
                continue;
            }
            self.closed[current] = true;
            self.expanded += 1;

            let pos = grid.position(current);
            let heading = self.parent[current]
                .and_then(|parent| Direction::between(grid.position(parent), pos));

            for direction in Direction::ALL {
                let Some(next_pos) = pos.step(direction, grid.width(), grid.height()) else {
                    continue;
                };
                if !grid.is_navigable(next_pos) {
                    continue;
                }
                if !grid.is_legal_move(pos, direction, heading) {
                    continue;
                }
                let Some(next) = grid.index(next_pos) else {
                    continue;
                };

                if next_pos == destination {
                    self.parent[next] = Some(current);
                    return self.trace(grid, start, next);
                }

                if self.closed[next] {
                    continue;
                }

                let g_new = self.g[current] + 1.0;
                let h_new = next_pos.euclidean(destination);
                let f_new = g_new + h_new;

                if self.f[next] > f_new {
                    self.g[next] = g_new;
                    self.h[next] = h_new;
                    self.f[next] = f_new;
                    self.parent[next] = Some(current);
                    self.push(f_new, next);
                }
            }
        }

        None
    }

    /// Walk parent links back from `end` to `start`.
    fn trace(&self, grid: &CellGrid, start: usize, end: usize) -> Option<Vec<CellPos>> {
        let mut path = Vec::new();
        let mut cursor = end;
        while cursor != start {
            path.push(grid.position(cursor));
            cursor = self.parent[cursor]?;
        }
        path.reverse();
        Some(path)
    }
}
