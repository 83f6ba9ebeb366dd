//! Binary layouts read and written by the extract builder
//!
//! All multi-byte fields are little-endian with no padding.

pub mod graph_header;
pub mod index;
pub mod tarball;
pub mod traffic_header;

pub use graph_header::TileCounts;
pub use index::{IndexEntry, INDEX_ENTRY_SIZE, INDEX_FILE};
pub use tarball::{ArchiveMember, TAR_BLOCK_SIZE};
pub use traffic_header::{TrafficHeader, TRAFFIC_HEADER_SIZE, TRAFFIC_SPEED_SIZE};
