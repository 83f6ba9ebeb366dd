//! Tile extract builder
//!
//! An extract is a tar archive whose first member is `index.bin`, followed by
//! the selected tiles in write order. The index cannot be known until the
//! tiles are written, so it is reserved as zeros and patched in place:
//!
//!   Empty -> IndexReserved -> TilesWritten -> IndexPatched -> Done
//!
//! Tiles are clustered by path order only; no spatial reordering is done.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use butterfly_common::{Error, IoResultExt, Result};
use tar::Builder;
use tracing::{debug, info, warn};

use crate::formats::index::{self, index_size};
use crate::formats::tarball::{append_index_placeholder, list_members};
use crate::formats::{IndexEntry, INDEX_FILE, TAR_BLOCK_SIZE};
use crate::source::TileResolver;
use crate::tile_id::{decode_path, TileId};

/// Progress callback: `(tiles_written, tiles_total)`
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Behavior when the output file already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwriteBehavior {
    /// Fail before writing anything
    #[default]
    NeverOverwrite,
    /// Replace the existing file
    Force,
}

impl From<bool> for OverwriteBehavior {
    fn from(overwrite: bool) -> Self {
        if overwrite {
            OverwriteBehavior::Force
        } else {
            OverwriteBehavior::NeverOverwrite
        }
    }
}

/// Options shared by the extract and traffic builders
#[derive(Clone, Default)]
pub struct BuildOptions {
    pub overwrite: OverwriteBehavior,
    pub progress: Option<ProgressCallback>,
}

impl BuildOptions {
    pub(crate) fn report(&self, done: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(done as u64, total as u64);
        }
    }
}

/// Result of a finished archive
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub index_size: u64,
    /// Final index, in archive order
    pub entries: Vec<IndexEntry>,
}

impl ArchiveSummary {
    pub fn tile_count(&self) -> usize {
        self.entries.len()
    }
}

/// Fail with [`Error::OutputExists`] unless the path is free or overwriting is allowed
pub fn check_overwrite_permission(path: &Path, behavior: OverwriteBehavior) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    match behavior {
        OverwriteBehavior::Force => {
            warn!(path = %path.display(), "overwriting existing file");
            Ok(())
        }
        OverwriteBehavior::NeverOverwrite => Err(Error::OutputExists(path.to_path_buf())),
    }
}

/// An output file that is deleted on drop unless committed
pub(crate) struct PendingOutput {
    path: PathBuf,
    committed: bool,
}

impl PendingOutput {
    /// Create parent directories and the (truncated) file
    pub(crate) fn create(path: &Path) -> Result<(Self, File)> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_path(parent)?;
        }
        let file = File::create(path).with_path(path)?;
        Ok((
            Self {
                path: path.to_path_buf(),
                committed: false,
            },
            file,
        ))
    }

    pub(crate) fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingOutput {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "could not remove partial output");
            }
        }
    }
}

/// Write the resolver's matched tiles into a new extract at `output`
pub fn build_archive(
    resolver: &TileResolver,
    output: &Path,
    options: &BuildOptions,
) -> Result<ArchiveSummary> {
    let tiles = resolver.unique_matches();
    if tiles.is_empty() {
        return Err(Error::EmptyInput);
    }

    // Decode every id up front so a malformed path fails before any write
    let expected = tiles
        .iter()
        .map(|path| Ok((path.to_string(), decode_path(path)?.tile_id())))
        .collect::<Result<Vec<_>>>()?;

    check_overwrite_permission(output, options.overwrite)?;
    let (pending, file) = PendingOutput::create(output)?;
    info!(
        output = %output.display(),
        tiles = tiles.len(),
        duplicates = resolver.matched().len() - tiles.len(),
        "writing tile extract"
    );

    let mut builder = Builder::new(BufWriter::new(file));
    let reserved = append_index_placeholder(&mut builder, tiles.len()).with_path(output)?;
    debug!(bytes = reserved, "reserved {INDEX_FILE}");

    for (i, tile) in tiles.iter().enumerate() {
        resolver.source().add_to_archive(tile, &mut builder)?;
        options.report(i + 1, tiles.len());
    }
    finish(builder, output)?;

    let entries = patch_index(output, &expected)?;
    pending.commit();

    info!(output = %output.display(), tiles = entries.len(), "tile extract complete");
    Ok(ArchiveSummary {
        path: output.to_path_buf(),
        index_size: reserved,
        entries,
    })
}

/// Write the end-of-archive marker and flush to disk
pub(crate) fn finish(builder: Builder<BufWriter<File>>, path: &Path) -> Result<()> {
    let writer = builder.into_inner().with_path(path)?;
    let file = writer
        .into_inner()
        .map_err(|e| Error::io(path, e.into_error()))?;
    file.sync_all().with_path(path)
}

/// Overwrite the reserved index of a finished archive with real entries
///
/// `expected` lists `(member name, tile id)` in the order the tiles were
/// written. The archive is re-read to recover each payload offset and size.
pub fn patch_index(path: &Path, expected: &[(String, TileId)]) -> Result<Vec<IndexEntry>> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_path(path)?;
    let members = list_members(&mut file).with_path(path)?;

    let Some((index_member, tiles)) = members.split_first() else {
        return Err(Error::consistency(format!("{} is empty", path.display())));
    };
    if index_member.name != INDEX_FILE || index_member.data_offset != TAR_BLOCK_SIZE {
        return Err(Error::consistency(format!(
            "first member of {} is '{}' at offset {}, expected {INDEX_FILE} at {TAR_BLOCK_SIZE}",
            path.display(),
            index_member.name,
            index_member.data_offset
        )));
    }
    if tiles.len() != expected.len() {
        return Err(Error::consistency(format!(
            "{} holds {} tiles, expected {}",
            path.display(),
            tiles.len(),
            expected.len()
        )));
    }

    let mut entries = Vec::with_capacity(tiles.len());
    for (member, (name, tile_id)) in tiles.iter().zip(expected) {
        if member.name != *name {
            return Err(Error::consistency(format!(
                "member '{}' found where '{name}' was written",
                member.name
            )));
        }
        entries.push(IndexEntry::new(member.data_offset, *tile_id, member.size)?);
    }

    let bytes = index::encode(&entries);
    if bytes.len() as u64 != index_member.size {
        return Err(Error::consistency(format!(
            "{INDEX_FILE} reserved {} bytes but {} entries need {}",
            index_member.size,
            entries.len(),
            index_size(entries.len())
        )));
    }

    file.seek(SeekFrom::Start(index_member.data_offset))
        .with_path(path)?;
    file.write_all(&bytes).with_path(path)?;
    file.sync_all().with_path(path)?;
    debug!(path = %path.display(), entries = entries.len(), "patched {INDEX_FILE}");

    Ok(entries)
}

/// Read `index.bin` back from an extract
pub fn read_index(path: &Path) -> Result<Vec<IndexEntry>> {
    let mut file = File::open(path).with_path(path)?;
    let members = list_members(&mut file).with_path(path)?;
    let index_member = members
        .first()
        .filter(|m| m.name == INDEX_FILE)
        .ok_or_else(|| {
            Error::consistency(format!("{} does not start with {INDEX_FILE}", path.display()))
        })?;

    file.seek(SeekFrom::Start(index_member.data_offset))
        .with_path(path)?;
    let mut bytes = vec![0u8; index_member.size as usize];
    file.read_exact(&mut bytes).with_path(path)?;
    index::decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::graph_header::synthetic_tile;
    use crate::formats::tarball::new_header;
    use crate::tile_id::TileCoord;
    use tempfile::tempdir;

    fn tile_dir(root: &Path, tiles: &[(TileCoord, usize)]) {
        for (coord, len) in tiles {
            let full = root.join(coord.to_path().unwrap());
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, synthetic_tile(4, *len)).unwrap();
        }
    }

    #[test]
    fn test_build_round_trip() {
        let dir = tempdir().unwrap();
        let tiles = dir.path().join("tiles");
        let coords = [
            (TileCoord::new(0, 3015), 100),
            (TileCoord::new(1, 51305), 777),
            (TileCoord::new(2, 818_660), 2048),
        ];
        tile_dir(&tiles, &coords);

        let mut resolver = TileResolver::open(&tiles).unwrap();
        resolver.match_all();
        let output = dir.path().join("out/tiles.tar");
        let summary = build_archive(&resolver, &output, &BuildOptions::default()).unwrap();

        assert_eq!(summary.tile_count(), 3);
        assert_eq!(summary.index_size, 48);

        let entries = read_index(&output).unwrap();
        assert_eq!(entries, summary.entries);
        let bytes = fs::read(&output).unwrap();
        for (entry, (coord, len)) in entries.iter().zip(coords) {
            assert_eq!(u64::from(entry.tile_id), coord.tile_id());
            assert_eq!(entry.size as usize, len);
            let start = entry.offset as usize;
            assert_eq!(&bytes[start..start + len], synthetic_tile(4, len).as_slice());
        }
    }

    #[test]
    fn test_duplicates_written_once_in_first_seen_order() {
        let dir = tempdir().unwrap();
        let tiles = dir.path().join("tiles");
        let a = TileCoord::new(0, 1);
        let b = TileCoord::new(0, 2);
        let c = TileCoord::new(0, 3);
        tile_dir(&tiles, &[(a, 64), (b, 64), (c, 64)]);

        let mut resolver = TileResolver::open(&tiles).unwrap();
        for coord in [c, a, c, b, a] {
            resolver.push_match(coord.to_path().unwrap());
        }
        let output = dir.path().join("tiles.tar");
        let summary = build_archive(&resolver, &output, &BuildOptions::default()).unwrap();

        let ids: Vec<u64> = summary.entries.iter().map(|e| u64::from(e.tile_id)).collect();
        assert_eq!(ids, vec![c.tile_id(), a.tile_id(), b.tile_id()]);
        assert!(summary.entries.windows(2).all(|w| w[0].offset < w[1].offset));
    }

    #[test]
    fn test_empty_selection_writes_nothing() {
        let dir = tempdir().unwrap();
        let resolver = TileResolver::open(dir.path()).unwrap();
        let output = dir.path().join("tiles.tar");

        let result = build_archive(&resolver, &output, &BuildOptions::default());
        assert!(matches!(result, Err(Error::EmptyInput)));
        assert!(!output.exists());
    }

    #[test]
    fn test_existing_output_requires_overwrite() {
        let dir = tempdir().unwrap();
        let tiles = dir.path().join("tiles");
        tile_dir(&tiles, &[(TileCoord::new(0, 0), 64)]);
        let output = dir.path().join("tiles.tar");
        fs::write(&output, b"keep me").unwrap();

        let mut resolver = TileResolver::open(&tiles).unwrap();
        resolver.match_all();
        let result = build_archive(&resolver, &output, &BuildOptions::default());
        assert!(matches!(result, Err(Error::OutputExists(_))));
        assert_eq!(fs::read(&output).unwrap(), b"keep me");

        let options = BuildOptions {
            overwrite: OverwriteBehavior::Force,
            ..Default::default()
        };
        build_archive(&resolver, &output, &options).unwrap();
        assert_eq!(read_index(&output).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_path_fails_before_writing() {
        let dir = tempdir().unwrap();
        let tiles = dir.path().join("tiles");
        fs::create_dir_all(tiles.join("x")).unwrap();
        fs::write(tiles.join("x/abc.gph"), synthetic_tile(1, 64)).unwrap();

        let mut resolver = TileResolver::open(&tiles).unwrap();
        resolver.match_all();
        let output = dir.path().join("tiles.tar");
        assert!(matches!(
            build_archive(&resolver, &output, &BuildOptions::default()),
            Err(Error::Format { .. })
        ));
        assert!(!output.exists());
    }

    #[test]
    fn test_patch_detects_count_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.tar");
        {
            let mut builder = Builder::new(File::create(&path).unwrap());
            append_index_placeholder(&mut builder, 2).unwrap();
            let tile = synthetic_tile(1, 64);
            let mut header = new_header(tile.len() as u64, 0);
            builder
                .append_data(&mut header, "0/000/001.gph", tile.as_slice())
                .unwrap();
            builder.finish().unwrap();
        }

        let expected = vec![
            ("0/000/001.gph".to_string(), 8),
            ("0/000/002.gph".to_string(), 16),
        ];
        assert!(matches!(
            patch_index(&path, &expected),
            Err(Error::Consistency(_))
        ));
        assert!(matches!(
            patch_index(&path, &expected[..1]),
            Err(Error::Consistency(_))
        ));
    }

    #[test]
    fn test_progress_reports_each_tile() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let dir = tempdir().unwrap();
        let tiles = dir.path().join("tiles");
        tile_dir(&tiles, &[(TileCoord::new(0, 0), 64), (TileCoord::new(0, 1), 64)]);
        let mut resolver = TileResolver::open(&tiles).unwrap();
        resolver.match_all();

        let last = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&last);
        let options = BuildOptions {
            progress: Some(Arc::new(move |done, total| {
                assert_eq!(total, 2);
                seen.store(done, Ordering::SeqCst);
            })),
            ..Default::default()
        };
        build_archive(&resolver, &dir.path().join("t.tar"), &options).unwrap();
        assert_eq!(last.load(Ordering::SeqCst), 2);
    }
}
