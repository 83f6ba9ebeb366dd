//! Traffic tile header
//!
//! Format (little-endian, 32 bytes):
//!   tile_id:             u64
//!   last_update:         u64  // seconds since epoch, 0 until filled
//!   directed_edge_count: u32
//!   version:             u32 = 3
//!   spare2:              u32 = 0
//!   spare3:              u32 = 0
//!
//! followed by one 8-byte speed slot per directed edge.

use byteorder::{ByteOrder, LittleEndian};

pub const TRAFFIC_TILE_VERSION: u32 = 3;
pub const TRAFFIC_HEADER_SIZE: usize = 32;

/// One live-speed slot per directed edge
pub const TRAFFIC_SPEED_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficHeader {
    pub tile_id: u64,
    pub last_update: u64,
    pub directed_edge_count: u32,
    pub version: u32,
    pub spare2: u32,
    pub spare3: u32,
}

impl TrafficHeader {
    pub fn new(tile_id: u64, directed_edge_count: u32) -> Self {
        Self {
            tile_id,
            last_update: 0,
            directed_edge_count,
            version: TRAFFIC_TILE_VERSION,
            spare2: 0,
            spare3: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; TRAFFIC_HEADER_SIZE] {
        let mut buf = [0u8; TRAFFIC_HEADER_SIZE];
        LittleEndian::write_u64(&mut buf[0..8], self.tile_id);
        LittleEndian::write_u64(&mut buf[8..16], self.last_update);
        LittleEndian::write_u32(&mut buf[16..20], self.directed_edge_count);
        LittleEndian::write_u32(&mut buf[20..24], self.version);
        LittleEndian::write_u32(&mut buf[24..28], self.spare2);
        LittleEndian::write_u32(&mut buf[28..32], self.spare3);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..TRAFFIC_HEADER_SIZE)?;
        Some(Self {
            tile_id: LittleEndian::read_u64(&bytes[0..8]),
            last_update: LittleEndian::read_u64(&bytes[8..16]),
            directed_edge_count: LittleEndian::read_u32(&bytes[16..20]),
            version: LittleEndian::read_u32(&bytes[20..24]),
            spare2: LittleEndian::read_u32(&bytes[24..28]),
            spare3: LittleEndian::read_u32(&bytes[28..32]),
        })
    }

    /// Header plus zeroed speed slots
    pub fn payload_len(&self) -> usize {
        TRAFFIC_HEADER_SIZE + TRAFFIC_SPEED_SIZE * self.directed_edge_count as usize
    }

    /// Full member payload: header followed by zeroed speed slots
    pub fn to_payload(&self) -> Vec<u8> {
        let mut payload = vec![0u8; self.payload_len()];
        payload[..TRAFFIC_HEADER_SIZE].copy_from_slice(&self.to_bytes());
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = TrafficHeader::new(0x1122_3344, 5);
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..8], &0x1122_3344u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &[0u8; 8]);
        assert_eq!(&bytes[16..20], &5u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &3u32.to_le_bytes());
        assert_eq!(&bytes[24..32], &[0u8; 8]);
    }

    #[test]
    fn test_payload_sized_by_edges() {
        let header = TrafficHeader::new(42, 5);
        let payload = header.to_payload();

        assert_eq!(payload.len(), TRAFFIC_HEADER_SIZE + 8 * 5);
        assert!(payload[TRAFFIC_HEADER_SIZE..].iter().all(|b| *b == 0));
        assert_eq!(TrafficHeader::from_bytes(&payload), Some(header));
    }

    #[test]
    fn test_zero_edges() {
        let header = TrafficHeader::new(7, 0);
        assert_eq!(header.to_payload().len(), TRAFFIC_HEADER_SIZE);
    }

    #[test]
    fn test_from_bytes_short() {
        assert_eq!(TrafficHeader::from_bytes(&[0u8; 31]), None);
    }
}
