//! Tile identifiers
//!
//! A tile on disk lives at `<level>/<index split in 3-digit groups>.gph`,
//! e.g. `2/000/818/660.gph`. The same tile is identified in indexes by a single
//! integer packing the level into the low 3 bits: `level | (index << 3)`.

use butterfly_common::{Error, Result};

/// File extension of routing graph tiles
pub const TILE_EXTENSION: &str = ".gph";

/// Tile edge length in degrees, by hierarchy level
const LEVEL_TILE_SIZES: [f64; 4] = [4.0, 1.0, 0.25, 0.25];

/// Packed tile identifier: `level | (index << 3)`
pub type TileId = u64;

/// Pack a `(level, index)` pair into a [`TileId`]
pub fn to_tile_id(level: u32, index: u64) -> TileId {
    u64::from(level) | (index << 3)
}

/// Tile edge length in degrees for `level`
pub fn tile_size(level: u32) -> Result<f64> {
    LEVEL_TILE_SIZES
        .get(level as usize)
        .copied()
        .ok_or(Error::Lookup(level))
}

/// Number of tiles covering the globe at `level`
pub fn tile_count(level: u32) -> Result<u64> {
    let size = tile_size(level)?;
    let columns = (360.0 / size) as u64;
    let rows = (180.0 / size) as u64;
    Ok(columns * rows)
}

/// Geographic extent in degrees: `(min_x, min_y, max_x, max_y)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// True when `other` lies strictly outside `self` on one axis.
    /// Boxes sharing only an edge or corner are not disjoint.
    pub fn is_disjoint(&self, other: &BoundingBox) -> bool {
        other.max_x < self.min_x
            || other.min_x > self.max_x
            || other.max_y < self.min_y
            || other.min_y > self.max_y
    }

    pub fn to_rect(&self) -> geo::Rect<f64> {
        geo::Rect::new(
            geo::coord! { x: self.min_x, y: self.min_y },
            geo::coord! { x: self.max_x, y: self.max_y },
        )
    }
}

/// A tile's position in the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub level: u32,
    pub index: u64,
}

impl TileCoord {
    pub fn new(level: u32, index: u64) -> Self {
        Self { level, index }
    }

    /// Recover level and index from a packed id
    pub fn from_tile_id(id: TileId) -> Self {
        Self {
            level: (id & 0x7) as u32,
            index: id >> 3,
        }
    }

    pub fn tile_id(self) -> TileId {
        to_tile_id(self.level, self.index)
    }

    /// Extent of this tile, derived from the per-level tile size
    pub fn bounding_box(self) -> Result<BoundingBox> {
        let size = tile_size(self.level)?;
        if self.index >= tile_count(self.level)? {
            return Err(Error::format(
                format!("{}/{}", self.level, self.index),
                "index outside the level grid",
            ));
        }
        let per_row = (360.0 / size) as u64;
        let row = self.index / per_row;
        let col = self.index % per_row;
        let base_x = col as f64 * size - 180.0;
        let base_y = row as f64 * size - 90.0;
        Ok(BoundingBox::new(base_x, base_y, base_x + size, base_y + size))
    }

    /// Relative tile path, the inverse of [`decode_path`]
    ///
    /// The index is zero padded to a multiple of 3 digits, wide enough for the
    /// largest index of the level, then split into directory groups.
    pub fn to_path(self) -> Result<String> {
        let max_index = tile_count(self.level)? - 1;
        let digits = max_index.to_string().len();
        let width = digits.div_ceil(3) * 3;
        let padded = format!("{:0width$}", self.index, width = width);

        let groups: Vec<&str> = padded
            .as_bytes()
            .chunks(3)
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
            .collect();
        Ok(format!("{}/{}{}", self.level, groups.join("/"), TILE_EXTENSION))
    }
}

/// Decode a relative tile path (`2/000/818/660.gph`) into its coordinates
///
/// Strips the 4-character extension, splits level from index on the first
/// `/`, and drops the remaining separators from the index.
pub fn decode_path(path: &str) -> Result<TileCoord> {
    let ext_len = TILE_EXTENSION.len();
    if path.len() < ext_len || !path.is_char_boundary(path.len() - ext_len) {
        return Err(Error::format(path, "too short to carry a tile extension"));
    }
    let stem = &path[..path.len() - ext_len];

    let (level, rest) = stem
        .split_once('/')
        .ok_or_else(|| Error::format(path, "missing level directory"))?;
    let index: String = rest.chars().filter(|c| *c != '/').collect();

    let level = level
        .parse::<u32>()
        .map_err(|e| Error::format(path, format!("bad level '{level}': {e}")))?;
    let index = index
        .parse::<u64>()
        .map_err(|e| Error::format(path, format!("bad index '{index}': {e}")))?;

    // Unknown levels are left to `bounding_box`, which reports them as lookups
    if let Ok(count) = tile_count(level) {
        if index >= count {
            return Err(Error::format(
                path,
                format!("index {index} outside the {count} tiles of level {level}"),
            ));
        }
    }

    Ok(TileCoord::new(level, index))
}
