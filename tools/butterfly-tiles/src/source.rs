//! Tile sources: a directory tree of `.gph` files or an existing extract
//!
//! Both variants hand out the same relative path strings (`2/000/818/660.gph`)
//! so filtering and index building do not care where the bytes come from.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use butterfly_common::{Error, IoResultExt, Result};
use tar::Builder;
use tracing::debug;
use walkdir::WalkDir;

use crate::formats::tarball::{file_header, list_members};
use crate::formats::ArchiveMember;
use crate::tile_id::TILE_EXTENSION;

/// Where tiles are read from, chosen once from the input path
pub enum TileSource {
    /// Loose tiles under a root directory
    Directory { root: PathBuf },
    /// Members of an existing tar extract; the handle closes on drop
    Archive {
        path: PathBuf,
        file: File,
        members: HashMap<String, ArchiveMember>,
    },
}

impl TileSource {
    /// Open `path` as a directory source if it is a directory, else as an archive
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(TileSource::Directory {
                root: path.to_path_buf(),
            });
        }
        if !path.is_file() {
            return Err(Error::validation(format!(
                "tile source {} is neither a directory nor an archive",
                path.display()
            )));
        }

        let mut file = File::open(path).with_path(path)?;
        let members = list_members(&mut file)
            .with_path(path)?
            .into_iter()
            .filter(|m| m.name.ends_with(TILE_EXTENSION))
            .map(|m| (m.name.clone(), m))
            .collect();

        Ok(TileSource::Archive {
            path: path.to_path_buf(),
            file,
            members,
        })
    }

    pub fn path(&self) -> &Path {
        match self {
            TileSource::Directory { root } => root,
            TileSource::Archive { path, .. } => path,
        }
    }

    /// All tile paths, relative and `/`-separated, sorted lexicographically
    pub fn enumerate(&self) -> Result<Vec<String>> {
        let mut paths = match self {
            TileSource::Directory { root } => {
                let mut paths = Vec::new();
                for entry in WalkDir::new(root).follow_links(true) {
                    let entry = entry.map_err(|e| {
                        let path = e.path().unwrap_or(root).to_path_buf();
                        Error::io(path, e.into())
                    })?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let Some(relative) = relative_tile_path(root, entry.path()) else {
                        continue;
                    };
                    paths.push(relative);
                }
                paths
            }
            TileSource::Archive { members, .. } => members.keys().cloned().collect(),
        };
        paths.sort();
        Ok(paths)
    }

    /// Read a whole tile
    pub fn read_bytes(&self, tile: &str) -> Result<Vec<u8>> {
        match self {
            TileSource::Directory { root } => {
                let full = root.join(tile);
                std::fs::read(&full).with_path(&full)
            }
            TileSource::Archive {
                path,
                file,
                members,
            } => {
                let member = find_member(path, members, tile)?;
                let mut handle = file;
                handle
                    .seek(SeekFrom::Start(member.data_offset))
                    .with_path(path)?;
                let mut buf = vec![0u8; member.size as usize];
                handle.read_exact(&mut buf).with_path(path)?;
                Ok(buf)
            }
        }
    }

    /// Copy a tile verbatim into `builder`, keeping its mode and mtime
    pub fn add_to_archive<W: Write>(&self, tile: &str, builder: &mut Builder<W>) -> Result<()> {
        match self {
            TileSource::Directory { root } => {
                let full = root.join(tile);
                let mut file = File::open(&full).with_path(&full)?;
                let meta = file.metadata().with_path(&full)?;
                let mut header = file_header(&meta);
                builder
                    .append_data(&mut header, tile, &mut file)
                    .with_path(&full)
            }
            TileSource::Archive {
                path,
                file,
                members,
            } => {
                let member = find_member(path, members, tile)?;
                let mut handle = file;
                handle
                    .seek(SeekFrom::Start(member.data_offset))
                    .with_path(path)?;
                let mut header = member.header.clone();
                builder
                    .append_data(&mut header, tile, handle.take(member.size))
                    .with_path(path)
            }
        }
    }
}

fn find_member<'a>(
    archive: &Path,
    members: &'a HashMap<String, ArchiveMember>,
    tile: &str,
) -> Result<&'a ArchiveMember> {
    members.get(tile).ok_or_else(|| {
        Error::consistency(format!("{tile} is not a member of {}", archive.display()))
    })
}

/// `root/2/000/818/660.gph` -> `2/000/818/660.gph`; `None` for non-tiles
fn relative_tile_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let joined = parts.join("/");
    joined.ends_with(TILE_EXTENSION).then_some(joined)
}

/// Enumerated tiles of one source plus the subset selected for packing
pub struct TileResolver {
    source: TileSource,
    paths: Vec<String>,
    matched: Vec<String>,
}

impl TileResolver {
    /// Open the source and enumerate its tiles. Nothing is matched yet.
    pub fn open(path: &Path) -> Result<Self> {
        let source = TileSource::open(path)?;
        let paths = source.enumerate()?;
        debug!(source = %path.display(), tiles = paths.len(), "enumerated tile source");
        Ok(Self {
            source,
            paths,
            matched: Vec::new(),
        })
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Selected tiles in match order, duplicates included
    pub fn matched(&self) -> &[String] {
        &self.matched
    }

    pub fn push_match(&mut self, path: String) {
        self.matched.push(path);
    }

    pub fn match_all(&mut self) {
        self.matched = self.paths.clone();
    }

    /// Selected tiles with duplicates removed, keeping first-seen order
    pub fn unique_matches(&self) -> Vec<&str> {
        let mut seen = HashSet::with_capacity(self.matched.len());
        self.matched
            .iter()
            .filter(|p| seen.insert(p.as_str()))
            .map(String::as_str)
            .collect()
    }
}
