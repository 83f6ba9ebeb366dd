//! # Butterfly-tiles
//!
//! Packs a tree of routing graph tiles into a single tar extract whose first
//! member, `index.bin`, maps every tile id to its byte offset and size, so a
//! router can memory-map the extract and find tiles without unpacking it.
//! Optionally derives a traffic extract with an empty live-speed slot per
//! directed edge.
//!
//! ```no_run
//! use std::path::Path;
//! use butterfly_tiles::{pipeline, Config, Diagnostics, PipelineOptions};
//!
//! let config = Config::from_file(Path::new("valhalla.json"))?;
//! let options = PipelineOptions {
//!     config: config.mjolnir,
//!     bbox: Some("4.2,50.7,4.5,50.9".into()),
//!     ..Default::default()
//! };
//! let report = pipeline::run(&options, &Diagnostics::default())?;
//! println!("{} tiles", report.extract.map_or(0, |e| e.tile_count()));
//! # Ok::<(), butterfly_tiles::Error>(())
//! ```

pub mod archive;
pub mod config;
pub mod diagnostics;
pub mod filter;
pub mod formats;
pub mod pipeline;
pub mod source;
pub mod tile_id;
pub mod traffic;

pub use archive::{
    build_archive, patch_index, read_index, ArchiveSummary, BuildOptions, OverwriteBehavior,
    ProgressCallback,
};
pub use butterfly_common::{Error, Result};
pub use config::{Config, ConfigOverrides, MjolnirConfig};
pub use diagnostics::Diagnostics;
pub use filter::Selection;
pub use pipeline::{PipelineOptions, PipelineReport};
pub use source::{TileResolver, TileSource};
pub use tile_id::{decode_path, to_tile_id, BoundingBox, TileCoord, TileId};
pub use traffic::build_traffic_archive;
