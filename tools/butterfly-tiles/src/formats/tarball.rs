//! Tar container helpers shared by the extract and traffic builders

use std::fs::Metadata;
use std::io::{self, Read, Seek, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use tar::{Archive, Builder, EntryType, Header, HeaderMode};

use super::index::{index_size, INDEX_FILE};

/// Tar block size; the first member's payload starts one block in
pub const TAR_BLOCK_SIZE: u64 = 512;

const MEMBER_MODE: u32 = 0o644;

/// A regular file inside a tar archive
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    pub name: String,
    /// Absolute offset of the payload in the archive file
    pub data_offset: u64,
    pub size: u64,
    pub header: Header,
}

impl ArchiveMember {
    pub fn data_range(&self) -> std::ops::Range<usize> {
        self.data_offset as usize..(self.data_offset + self.size) as usize
    }
}

/// List the regular files of an archive in physical order
pub fn list_members<R: Read + Seek>(reader: R) -> io::Result<Vec<ArchiveMember>> {
    let mut archive = Archive::new(reader);
    let mut members = Vec::new();

    for entry in archive.entries_with_seek()? {
        let entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().replace('\\', "/");
        members.push(ArchiveMember {
            name,
            data_offset: entry.raw_file_position(),
            size: entry.size(),
            header: entry.header().clone(),
        });
    }

    Ok(members)
}

/// Header for a freshly generated member
pub fn new_header(size: u64, mtime: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(size);
    header.set_mode(MEMBER_MODE);
    header.set_mtime(mtime);
    header.set_uid(0);
    header.set_gid(0);
    header
}

/// Header for a file copied from disk: its mtime and mode, no owner or access times
pub fn file_header(meta: &Metadata) -> Header {
    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(meta, HeaderMode::Deterministic);
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs());
    header.set_mtime(mtime);
    header
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Write the zero-filled `index.bin` placeholder sized for `tile_count` entries.
/// Must be the first member so its payload sits at [`TAR_BLOCK_SIZE`].
pub fn append_index_placeholder<W: Write>(
    builder: &mut Builder<W>,
    tile_count: usize,
) -> io::Result<u64> {
    let size = index_size(tile_count);
    let mut header = new_header(size, unix_now());
    builder.append_data(&mut header, INDEX_FILE, io::repeat(0).take(size))?;
    Ok(size)
}
