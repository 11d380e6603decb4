//! Map registry: baked tile grids, tile classification, signs, and
//! per-edge transitions. The binary `.map` importer is an external tool;
//! the server consumes its JSON output.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use game_core::constants::EDGE_THRESHOLD;

use crate::error::GameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileClass {
    Open,
    Blocked,
    Water,
    Tree,
    Mine,
    Anvil,
    Forge,
    Sign,
    Door,
    Transition,
}

impl TileClass {
    /// Static resources and water block movement regardless of the
    /// walkable flag.
    pub fn blocks_movement(self) -> bool {
        matches!(
            self,
            Self::Blocked | Self::Water | Self::Tree | Self::Mine | Self::Anvil | Self::Forge
        )
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Tile {
    pub walkable: bool,
    #[serde(default = "default_tile_class")]
    pub class: TileClass,
}

fn default_tile_class() -> TileClass {
    TileClass::Open
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    North,
    South,
    East,
    West,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MapTransition {
    pub edge: Edge,
    pub to_map: i32,
    pub to_x: i32,
    pub to_y: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapData {
    pub id: i32,
    pub width: i32,
    pub height: i32,
    /// Row-major, `width * height` entries.
    pub tiles: Vec<Tile>,
    #[serde(default)]
    pub signs: Vec<SignData>,
    #[serde(default)]
    pub transitions: Vec<MapTransition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignData {
    pub x: i32,
    pub y: i32,
    pub text: String,
}

impl MapData {
    /// Fully-open map; tests and tools carve obstacles into it.
    pub fn open(id: i32, width: i32, height: i32) -> Self {
        Self {
            id,
            width,
            height,
            tiles: vec![
                Tile {
                    walkable: true,
                    class: TileClass::Open,
                };
                (width * height) as usize
            ],
            signs: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn set_tile(&mut self, x: i32, y: i32, tile: Tile) {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            self.tiles[(x + y * self.width) as usize] = tile;
        }
    }

    pub fn block(&mut self, x: i32, y: i32) {
        self.set_tile(
            x,
            y,
            Tile {
                walkable: false,
                class: TileClass::Blocked,
            },
        );
    }

    pub fn add_transition(&mut self, transition: MapTransition) {
        self.transitions.retain(|t| t.edge != transition.edge);
        self.transitions.push(transition);
    }

    fn tile(&self, x: i32, y: i32) -> Option<Tile> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some(self.tiles[(x + y * self.width) as usize])
    }
}

#[derive(Debug, Default)]
pub struct MapRegistry {
    maps: HashMap<i32, MapData>,
}

impl MapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_maps(maps: Vec<MapData>) -> Self {
        Self {
            maps: maps.into_iter().map(|m| (m.id, m)).collect(),
        }
    }

    /// Reads every `*.json` baked map in a directory.
    pub fn load_dir(path: &Path) -> Result<Self, GameError> {
        let mut maps = Vec::new();
        let entries = fs::read_dir(path)
            .map_err(|e| GameError::Storage(format!("reading {}: {e}", path.display())))?;
        for entry in entries {
            let entry = entry.map_err(|e| GameError::Storage(e.to_string()))?;
            if entry.path().extension().map(|e| e == "json") != Some(true) {
                continue;
            }
            let raw = fs::read_to_string(entry.path())
                .map_err(|e| GameError::Storage(format!("{}: {e}", entry.path().display())))?;
            let map: MapData = serde_json::from_str(&raw).map_err(|e| {
                GameError::InvalidInput(format!("bad map {}: {e}", entry.path().display()))
            })?;
            maps.push(map);
        }
        log::info!("loaded {} baked map(s) from {}", maps.len(), path.display());
        Ok(Self::from_maps(maps))
    }

    pub fn insert(&mut self, map: MapData) {
        self.maps.insert(map.id, map);
    }

    pub fn get(&self, map_id: i32) -> Option<&MapData> {
        self.maps.get(&map_id)
    }

    pub fn contains(&self, map_id: i32) -> bool {
        self.maps.contains_key(&map_id)
    }

    /// True iff the tile exists, is walkable, and no static resource
    /// blocks it. Live occupancy is the spatial index's concern.
    pub fn can_move_to(&self, map_id: i32, x: i32, y: i32) -> bool {
        match self.maps.get(&map_id).and_then(|m| m.tile(x, y)) {
            Some(tile) => tile.walkable && !tile.class.blocks_movement(),
            None => false,
        }
    }

    pub fn classify(&self, map_id: i32, x: i32, y: i32) -> Option<TileClass> {
        self.maps.get(&map_id).and_then(|m| m.tile(x, y)).map(|t| t.class)
    }

    pub fn sign_text(&self, map_id: i32, x: i32, y: i32) -> Option<&str> {
        self.maps.get(&map_id).and_then(|m| {
            m.signs
                .iter()
                .find(|s| s.x == x && s.y == y)
                .map(|s| s.text.as_str())
        })
    }

    pub fn transition(&self, map_id: i32, edge: Edge) -> Option<MapTransition> {
        self.maps
            .get(&map_id)
            .and_then(|m| m.transitions.iter().find(|t| t.edge == edge).copied())
    }

    /// Whether `(x, y)` sits inside the transition border of an edge.
    pub fn is_border(&self, map_id: i32, x: i32, y: i32, edge: Edge) -> bool {
        let Some(map) = self.maps.get(&map_id) else {
            return false;
        };
        match edge {
            Edge::North => y <= EDGE_THRESHOLD,
            Edge::South => y >= map.height - 1 - EDGE_THRESHOLD,
            Edge::West => x <= EDGE_THRESHOLD,
            Edge::East => x >= map.width - 1 - EDGE_THRESHOLD,
        }
    }

    pub fn in_bounds(&self, map_id: i32, x: i32, y: i32) -> bool {
        self.maps
            .get(&map_id)
            .map(|m| x >= 0 && y >= 0 && x < m.width && y < m.height)
            .unwrap_or(false)
    }
}
