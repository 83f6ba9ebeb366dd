//! Synthetic tile trees for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use butterfly_tiles::formats::graph_header::{COUNTS_OFFSET, COUNTS_WORD_SIZE};
use butterfly_tiles::formats::TileCounts;
use butterfly_tiles::TileCoord;

/// Tile bytes with `edges` directed edges recorded in the header; the rest
/// is a pattern derived from `seed` so tiles are distinguishable.
pub fn tile_bytes(edges: u32, len: usize, seed: u8) -> Vec<u8> {
    let len = len.max(COUNTS_OFFSET + COUNTS_WORD_SIZE);
    let mut bytes: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_add(seed)).collect();
    let counts = TileCounts {
        node_count: 3,
        directed_edge_count: edges,
        predicted_speeds_count: 0,
    };
    bytes[COUNTS_OFFSET..COUNTS_OFFSET + COUNTS_WORD_SIZE]
        .copy_from_slice(&counts.to_word().to_le_bytes());
    bytes
}

pub struct TestTile {
    pub coord: TileCoord,
    pub edges: u32,
    pub len: usize,
}

impl TestTile {
    pub fn new(level: u32, index: u64, edges: u32, len: usize) -> Self {
        Self {
            coord: TileCoord::new(level, index),
            edges,
            len,
        }
    }

    pub fn path(&self) -> String {
        self.coord.to_path().unwrap()
    }

    pub fn bytes(&self) -> Vec<u8> {
        tile_bytes(self.edges, self.len, self.coord.index as u8)
    }
}

/// Write `tiles` under `root/tiles` and return that directory
pub fn write_tile_dir(root: &Path, tiles: &[TestTile]) -> PathBuf {
    let dir = root.join("tiles");
    fs::create_dir_all(&dir).unwrap();
    for tile in tiles {
        let full = dir.join(tile.path());
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, tile.bytes()).unwrap();
    }
    dir
}

/// Tiles around Brussels plus one far away in the southern hemisphere.
/// Level 2 (0.25°) index = row * 1440 + col.
pub fn brussels_tiles() -> Vec<TestTile> {
    vec![
        // (4.0..4.25, 50.75..51.0)
        TestTile::new(2, 563 * 1440 + 736, 5, 300),
        // (4.25..4.5, 50.75..51.0)
        TestTile::new(2, 563 * 1440 + 737, 2, 120),
        // (4.0..5.0, 50.0..51.0), level 1 has 360 columns
        TestTile::new(1, 140 * 360 + 184, 7, 512),
        // (-58.5..-58.25, -34.75..-34.5), Buenos Aires
        TestTile::new(2, 221 * 1440 + 486, 1, 64),
    ]
}

/// Square polygon as a GeoJSON Feature
pub fn square_feature(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> String {
    format!(
        r#"{{"type": "Feature", "properties": {{}}, "geometry": {{"type": "Polygon", "coordinates": [[[{min_x}, {min_y}], [{max_x}, {min_y}], [{max_x}, {max_y}], [{min_x}, {max_y}], [{min_x}, {min_y}]]]}}}}"#
    )
}
