//! A* pathfinding over the 4-connected walkable grid.
//!
//! Cost is 1 per step, the heuristic is Manhattan distance, and the
//! search gives up once it has explored `max_depth` nodes. Only the
//! first step of the path is returned since callers re-plan every tick.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use crate::maps::MapRegistry;
use crate::repository::Heading;
use crate::spatial::SpatialIndex;

/// Default node budget during AI pursuit.
pub const DEFAULT_MAX_DEPTH: usize = 20;

const DIRECTIONS: [(i32, i32, Heading); 4] = [
    (0, -1, Heading::North),
    (1, 0, Heading::East),
    (0, 1, Heading::South),
    (-1, 0, Heading::West),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Node {
    f_score: i32,
    order: u32,
    x: i32,
    y: i32,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior; `order` breaks ties
        // deterministically.
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct Pathfinder {
    registry: Arc<MapRegistry>,
    spatial: Arc<SpatialIndex>,
}

impl Pathfinder {
    pub fn new(registry: Arc<MapRegistry>, spatial: Arc<SpatialIndex>) -> Self {
        Self { registry, spatial }
    }

    /// A tile is traversable iff the registry allows it and nobody
    /// occupies it. The goal tile is exempt from the occupancy check so
    /// a pursuit can terminate on its (occupied) target; callers stop
    /// one step short anyway.
    fn traversable(&self, map_id: i32, x: i32, y: i32, target: (i32, i32)) -> bool {
        if !self.registry.can_move_to(map_id, x, y) {
            return false;
        }
        (x, y) == target || !self.spatial.is_tile_occupied(map_id, x, y)
    }

    /// First step toward `(target_x, target_y)`, or `None` when already
    /// there, the target is blocked, or the depth cap fires first.
    pub fn next_step(
        &self,
        map_id: i32,
        start_x: i32,
        start_y: i32,
        target_x: i32,
        target_y: i32,
        max_depth: usize,
    ) -> Option<(i32, i32, Heading)> {
        if start_x == target_x && start_y == target_y {
            return None;
        }
        if !self.registry.can_move_to(map_id, target_x, target_y) {
            return None;
        }

        let path = self.astar(map_id, start_x, start_y, target_x, target_y, max_depth)?;
        let (next_x, next_y) = *path.get(1)?;

        let heading = match (next_x - start_x, next_y - start_y) {
            (0, -1) => Heading::North,
            (1, 0) => Heading::East,
            (0, 1) => Heading::South,
            _ => Heading::West,
        };
        Some((next_x, next_y, heading))
    }

    fn astar(
        &self,
        map_id: i32,
        start_x: i32,
        start_y: i32,
        target_x: i32,
        target_y: i32,
        max_depth: usize,
    ) -> Option<Vec<(i32, i32)>> {
        let start = (start_x, start_y);
        let target = (target_x, target_y);

        let mut order = 0u32;
        let mut open_set = BinaryHeap::new();
        open_set.push(Node {
            f_score: 0,
            order,
            x: start_x,
            y: start_y,
        });

        let mut came_from: HashMap<(i32, i32), (i32, i32)> = HashMap::new();
        let mut g_score: HashMap<(i32, i32), i32> = HashMap::from([(start, 0)]);
        let mut closed: HashSet<(i32, i32)> = HashSet::new();
        let mut explored = 0usize;

        while let Some(current) = open_set.pop() {
            let pos = (current.x, current.y);
            if pos == target {
                return Some(reconstruct_path(&came_from, pos));
            }
            if !closed.insert(pos) {
                continue;
            }
            explored += 1;
            if explored > max_depth {
                log::debug!("pathfinding depth cap hit ({max_depth} nodes)");
                return None;
            }

            for (dx, dy, _) in DIRECTIONS {
                let neighbor = (current.x + dx, current.y + dy);
                if closed.contains(&neighbor) {
                    continue;
                }
                if !self.traversable(map_id, neighbor.0, neighbor.1, target) {
                    continue;
                }

                let tentative = g_score[&pos] + 1;
                if tentative < *g_score.get(&neighbor).unwrap_or(&i32::MAX) {
                    came_from.insert(neighbor, pos);
                    g_score.insert(neighbor, tentative);
                    order += 1;
                    open_set.push(Node {
                        f_score: tentative + manhattan(neighbor, target),
                        order,
                        x: neighbor.0,
                        y: neighbor.1,
                    });
                }
            }
        }

        log::debug!(
            "pathfinding: no path ({start_x},{start_y}) -> ({target_x},{target_y}) on map {map_id}"
        );
        None
    }
}

fn manhattan(a: (i32, i32), b: (i32, i32)) -> i32 {
    (a.0 - b.0).abs() + (a.1 - b.1).abs()
}

fn reconstruct_path(
    came_from: &HashMap<(i32, i32), (i32, i32)>,
    mut current: (i32, i32),
) -> Vec<(i32, i32)> {
    let mut path = vec![current];
    while let Some(&previous) = came_from.get(&current) {
        current = previous;
        path.push(current);
    }
    path.reverse();
    path
}
