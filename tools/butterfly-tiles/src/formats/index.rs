//! index.bin - tile id to archive offset lookup
//!
//! Format (little-endian), one 16-byte record per tile, in archive order:
//!   offset:  u64  // byte offset of the tile payload in the archive
//!   tile_id: u32  // level | (index << 3)
//!   size:    u32  // payload length in bytes
//!
//! The index is the first archive member, so readers find it at a fixed
//! offset without parsing the container.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{self, Read, Write};

use butterfly_common::{Error, Result};

use crate::tile_id::TileId;

/// Member name of the index inside every extract
pub const INDEX_FILE: &str = "index.bin";

/// Size of one encoded [`IndexEntry`]
pub const INDEX_ENTRY_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub offset: u64,
    pub tile_id: u32,
    pub size: u32,
}

impl IndexEntry {
    /// Build an entry, failing when the id or size overflow their 32-bit fields
    pub fn new(offset: u64, tile_id: TileId, size: u64) -> Result<Self> {
        let tile_id = u32::try_from(tile_id).map_err(|_| {
            Error::consistency(format!("tile id {tile_id} does not fit in 32 bits"))
        })?;
        let size = u32::try_from(size).map_err(|_| {
            Error::consistency(format!("tile {tile_id} is {size} bytes, over the 4 GiB limit"))
        })?;
        Ok(Self {
            offset,
            tile_id,
            size,
        })
    }

    pub fn to_bytes(&self) -> [u8; INDEX_ENTRY_SIZE] {
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        LittleEndian::write_u64(&mut buf[0..8], self.offset);
        LittleEndian::write_u32(&mut buf[8..12], self.tile_id);
        LittleEndian::write_u32(&mut buf[12..16], self.size);
        buf
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            offset: reader.read_u64::<LittleEndian>()?,
            tile_id: reader.read_u32::<LittleEndian>()?,
            size: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Byte length of an index holding `count` entries
pub fn index_size(count: usize) -> u64 {
    (count * INDEX_ENTRY_SIZE) as u64
}

pub fn encode(entries: &[IndexEntry]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(entries.len() * INDEX_ENTRY_SIZE);
    for entry in entries {
        buf.extend_from_slice(&entry.to_bytes());
    }
    buf
}

pub fn decode(bytes: &[u8]) -> Result<Vec<IndexEntry>> {
    if bytes.len() % INDEX_ENTRY_SIZE != 0 {
        return Err(Error::consistency(format!(
            "{INDEX_FILE} is {} bytes, not a multiple of {INDEX_ENTRY_SIZE}",
            bytes.len()
        )));
    }

    let mut cursor = bytes;
    let mut entries = Vec::with_capacity(bytes.len() / INDEX_ENTRY_SIZE);
    while !cursor.is_empty() {
        let entry = IndexEntry::read_from(&mut cursor)
            .map_err(|e| Error::consistency(format!("truncated {INDEX_FILE}: {e}")))?;
        entries.push(entry);
    }
    Ok(entries)
}
