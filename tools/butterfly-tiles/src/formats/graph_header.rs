//! Partial decoding of the routing graph tile header
//!
//! Only the element counts are read. Layout (little-endian):
//!   bytes 0..40:  opaque (base coordinate, ids, version string)
//!   bytes 40..48: packed u64, from the least significant bit:
//!     nodecount              21 bits
//!     directededgecount      21 bits
//!     predictedspeeds_count  21 bits
//!     spare                   1 bit

use byteorder::{ByteOrder, LittleEndian};

/// Opaque header prefix preceding the counts word
pub const COUNTS_OFFSET: usize = 40;

/// Width of the packed counts word
pub const COUNTS_WORD_SIZE: usize = 8;

const FIELD_BITS: u32 = 21;
const FIELD_MASK: u64 = (1 << FIELD_BITS) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileCounts {
    pub node_count: u32,
    pub directed_edge_count: u32,
    pub predicted_speeds_count: u32,
}

impl TileCounts {
    pub fn from_word(word: u64) -> Self {
        Self {
            node_count: (word & FIELD_MASK) as u32,
            directed_edge_count: ((word >> FIELD_BITS) & FIELD_MASK) as u32,
            predicted_speeds_count: ((word >> (2 * FIELD_BITS)) & FIELD_MASK) as u32,
        }
    }

    /// Pack the counts back into a header word; values wider than 21 bits are masked
    pub fn to_word(self) -> u64 {
        (u64::from(self.node_count) & FIELD_MASK)
            | ((u64::from(self.directed_edge_count) & FIELD_MASK) << FIELD_BITS)
            | ((u64::from(self.predicted_speeds_count) & FIELD_MASK) << (2 * FIELD_BITS))
    }

    /// Read the counts from the start of a tile. `None` when the tile is shorter
    /// than the header prefix plus the counts word.
    pub fn parse(tile: &[u8]) -> Option<Self> {
        let word = tile.get(COUNTS_OFFSET..COUNTS_OFFSET + COUNTS_WORD_SIZE)?;
        Some(Self::from_word(LittleEndian::read_u64(word)))
    }
}

#[cfg(test)]
pub(crate) fn synthetic_tile(directed_edge_count: u32, len: usize) -> Vec<u8> {
    let mut tile = vec![0xAB; len.max(COUNTS_OFFSET + COUNTS_WORD_SIZE)];
    let counts = TileCounts {
        node_count: 11,
        directed_edge_count,
        predicted_speeds_count: 0,
    };
    tile[COUNTS_OFFSET..COUNTS_OFFSET + COUNTS_WORD_SIZE]
        .copy_from_slice(&counts.to_word().to_le_bytes());
    tile
}
