//! Traffic skeleton generator
//!
//! Mirrors a finished tile extract: for every tile member a same-named member
//! holding a [`TrafficHeader`] and one zeroed speed slot per directed edge.

use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;

use butterfly_common::{Error, IoResultExt, Result};
use memmap2::Mmap;
use tar::Builder;
use tracing::{debug, info};

use crate::archive::{
    check_overwrite_permission, finish, patch_index, ArchiveSummary, BuildOptions, PendingOutput,
};
use crate::formats::tarball::{append_index_placeholder, list_members, new_header};
use crate::formats::{TileCounts, TrafficHeader, INDEX_FILE};
use crate::tile_id::{decode_path, TILE_EXTENSION};

/// Build the traffic extract for the tile extract at `extract`
pub fn build_traffic_archive(
    extract: &Path,
    output: &Path,
    options: &BuildOptions,
) -> Result<ArchiveSummary> {
    let file = File::open(extract).with_path(extract)?;
    // SAFETY: the extract is not modified while the map is alive
    let mmap = unsafe { Mmap::map(&file) }.with_path(extract)?;

    let tiles: Vec<_> = list_members(Cursor::new(&mmap[..]))
        .with_path(extract)?
        .into_iter()
        .filter(|m| m.name != INDEX_FILE && m.name.ends_with(TILE_EXTENSION))
        .collect();
    if tiles.is_empty() {
        return Err(Error::EmptyInput);
    }

    let expected = tiles
        .iter()
        .map(|m| Ok((m.name.clone(), decode_path(&m.name)?.tile_id())))
        .collect::<Result<Vec<_>>>()?;

    check_overwrite_permission(output, options.overwrite)?;
    let (pending, out) = PendingOutput::create(output)?;
    info!(
        source = %extract.display(),
        output = %output.display(),
        tiles = tiles.len(),
        "writing traffic extract"
    );

    let mut builder = Builder::new(BufWriter::new(out));
    let reserved = append_index_placeholder(&mut builder, tiles.len()).with_path(output)?;

    for (i, (member, (name, tile_id))) in tiles.iter().zip(&expected).enumerate() {
        let counts = mmap
            .get(member.data_range())
            .and_then(TileCounts::parse)
            .ok_or_else(|| Error::MalformedTile {
                path: name.clone(),
                reason: format!("{} bytes is too short for a graph tile header", member.size),
            })?;

        let payload = TrafficHeader::new(*tile_id, counts.directed_edge_count).to_payload();
        let mut header = new_header(payload.len() as u64, member.header.mtime().unwrap_or(0));
        builder
            .append_data(&mut header, name, payload.as_slice())
            .with_path(output)?;
        debug!(tile = %name, edges = counts.directed_edge_count, "traffic tile");
        options.report(i + 1, tiles.len());
    }
    finish(builder, output)?;

    let entries = patch_index(output, &expected)?;
    pending.commit();

    info!(output = %output.display(), tiles = entries.len(), "traffic extract complete");
    Ok(ArchiveSummary {
        path: output.to_path_buf(),
        index_size: reserved,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{build_archive, read_index, OverwriteBehavior};
    use crate::formats::graph_header::synthetic_tile;
    use crate::formats::TRAFFIC_HEADER_SIZE;
    use crate::source::TileResolver;
    use crate::tile_id::TileCoord;
    use std::fs;
    use tempfile::tempdir;

    fn extract_with(root: &Path, tiles: &[(TileCoord, Vec<u8>)]) -> std::path::PathBuf {
        let dir = root.join("tiles");
        for (coord, bytes) in tiles {
            let full = dir.join(coord.to_path().unwrap());
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, bytes).unwrap();
        }
        let mut resolver = TileResolver::open(&dir).unwrap();
        resolver.match_all();
        let extract = root.join("tiles.tar");
        build_archive(&resolver, &extract, &BuildOptions::default()).unwrap();
        extract
    }

    #[test]
    fn test_payload_sized_by_edge_count() {
        let dir = tempdir().unwrap();
        let coord = TileCoord::new(2, 818_660);
        let extract = extract_with(dir.path(), &[(coord, synthetic_tile(5, 300))]);
        let output = dir.path().join("traffic.tar");

        let summary = build_traffic_archive(&extract, &output, &BuildOptions::default()).unwrap();
        assert_eq!(summary.tile_count(), 1);
        assert_eq!(summary.entries[0].size, 72);
        assert_eq!(u64::from(summary.entries[0].tile_id), coord.tile_id());

        let bytes = fs::read(&output).unwrap();
        let start = summary.entries[0].offset as usize;
        let header = TrafficHeader::from_bytes(&bytes[start..]).unwrap();
        assert_eq!(header, TrafficHeader::new(coord.tile_id(), 5));
        assert!(bytes[start + TRAFFIC_HEADER_SIZE..start + 72]
            .iter()
            .all(|b| *b == 0));
    }

    #[test]
    fn test_index_follows_extract_order() {
        let dir = tempdir().unwrap();
        let coords = [TileCoord::new(0, 3015), TileCoord::new(1, 51305)];
        let extract = extract_with(
            dir.path(),
            &[(coords[0], synthetic_tile(2, 64)), (coords[1], synthetic_tile(0, 64))],
        );
        let output = dir.path().join("traffic.tar");
        build_traffic_archive(&extract, &output, &BuildOptions::default()).unwrap();

        let entries = read_index(&output).unwrap();
        let ids: Vec<u64> = entries.iter().map(|e| u64::from(e.tile_id)).collect();
        assert_eq!(ids, vec![coords[0].tile_id(), coords[1].tile_id()]);
        assert_eq!(entries[0].size, 32 + 16);
        assert_eq!(entries[1].size, 32);
    }

    #[test]
    fn test_short_tile_aborts_and_removes_output() {
        let dir = tempdir().unwrap();
        let extract = extract_with(
            dir.path(),
            &[
                (TileCoord::new(0, 1), synthetic_tile(1, 64)),
                (TileCoord::new(0, 2), vec![0u8; 20]),
            ],
        );
        let output = dir.path().join("traffic.tar");

        match build_traffic_archive(&extract, &output, &BuildOptions::default()) {
            Err(Error::MalformedTile { path, .. }) => assert_eq!(path, "0/000/002.gph"),
            other => panic!("Expected malformed tile error, got {other:?}"),
        }
        assert!(!output.exists());
        assert!(extract.exists());
    }

    #[test]
    fn test_existing_traffic_output_kept_without_overwrite() {
        let dir = tempdir().unwrap();
        let extract = extract_with(dir.path(), &[(TileCoord::new(0, 1), synthetic_tile(1, 64))]);
        let output = dir.path().join("traffic.tar");
        fs::write(&output, b"old").unwrap();

        assert!(matches!(
            build_traffic_archive(&extract, &output, &BuildOptions::default()),
            Err(Error::OutputExists(_))
        ));
        assert_eq!(fs::read(&output).unwrap(), b"old");

        let options = BuildOptions {
            overwrite: OverwriteBehavior::Force,
            ..Default::default()
        };
        assert!(build_traffic_archive(&extract, &output, &options).is_ok());
    }
}
