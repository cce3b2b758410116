//! Sector 0 of a binary pack.
//!
//! Layout (512 bytes, little-endian):
//! ```text
//! [0..8]     magic            b"SPACKBIN"
//! [8..10]    layout           u16 = 1
//! [10..12]   flags            u16
//! [12..28]   uuid             entry stage id
//! [28..32]   version          u32
//! [32..34]   stage_count      u16
//! [34..36]   action_count     u16
//! [36..38]   asset_count      u16
//! [38..40]   entry_index      u16
//! [40..42]   title_len        u16
//! [42..44]   description_len  u16
//! [44..48]   thumbnail_len    u32
//! [48..52]   stage_sector     u32
//! [52..56]   action_sector    u32
//! [56..60]   index_sector     u32
//! [60..64]   data_sector      u32
//! [64..68]   total_sectors    u32
//! [68..72]   action_bytes     u32
//! [72..76]   index_bytes      u32
//! [76..108]  body_blake3      BLAKE3 of everything after sector 0
//! [108..512] zero
//! ```

use std::io::{self, Read, Write};

use uuid::Uuid;

use crate::sector::SECTOR_SIZE;

pub const MAGIC: &[u8; 8] = b"SPACKBIN";
pub const LAYOUT_VERSION: u16 = 1;
pub const HEADER_LEN: usize = SECTOR_SIZE as usize;

pub const FLAG_FACTORY_DISABLED: u16 = 1 << 0;
pub const FLAG_NIGHT_MODE: u16 = 1 << 1;
pub const FLAG_HAS_TITLE: u16 = 1 << 2;
pub const FLAG_HAS_DESCRIPTION: u16 = 1 << 3;
pub const FLAG_HAS_THUMBNAIL: u16 = 1 << 4;

/// Metadata block always starts right after the header.
pub const METADATA_SECTOR: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackHeader {
    pub flags: u16,
    pub uuid: Uuid,
    pub version: u32,
    pub stage_count: u16,
    pub action_count: u16,
    pub asset_count: u16,
    pub entry_index: u16,
    pub title_len: u16,
    pub description_len: u16,
    pub thumbnail_len: u32,
    pub stage_sector: u32,
    pub action_sector: u32,
    pub index_sector: u32,
    pub data_sector: u32,
    pub total_sectors: u32,
    pub action_bytes: u32,
    pub index_bytes: u32,
    pub body_blake3: [u8; 32],
}

impl PackHeader {
    pub fn has(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    /// Bytes of the metadata block before sector padding.
    pub fn metadata_len(&self) -> u64 {
        u64::from(self.title_len) + u64::from(self.description_len) + u64::from(self.thumbnail_len)
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..8].copy_from_slice(MAGIC);
        buf[8..10].copy_from_slice(&LAYOUT_VERSION.to_le_bytes());
        buf[10..12].copy_from_slice(&self.flags.to_le_bytes());
        buf[12..28].copy_from_slice(self.uuid.as_bytes());
        buf[28..32].copy_from_slice(&self.version.to_le_bytes());
        buf[32..34].copy_from_slice(&self.stage_count.to_le_bytes());
        buf[34..36].copy_from_slice(&self.action_count.to_le_bytes());
        buf[36..38].copy_from_slice(&self.asset_count.to_le_bytes());
        buf[38..40].copy_from_slice(&self.entry_index.to_le_bytes());
        buf[40..42].copy_from_slice(&self.title_len.to_le_bytes());
        buf[42..44].copy_from_slice(&self.description_len.to_le_bytes());
        buf[44..48].copy_from_slice(&self.thumbnail_len.to_le_bytes());
        buf[48..52].copy_from_slice(&self.stage_sector.to_le_bytes());
        buf[52..56].copy_from_slice(&self.action_sector.to_le_bytes());
        buf[56..60].copy_from_slice(&self.index_sector.to_le_bytes());
        buf[60..64].copy_from_slice(&self.data_sector.to_le_bytes());
        buf[64..68].copy_from_slice(&self.total_sectors.to_le_bytes());
        buf[68..72].copy_from_slice(&self.action_bytes.to_le_bytes());
        buf[72..76].copy_from_slice(&self.index_bytes.to_le_bytes());
        buf[76..108].copy_from_slice(&self.body_blake3);
        buf
    }

    pub fn decode(buf: &[u8; HEADER_LEN]) -> io::Result<Self> {
        if &buf[0..8] != MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad pack magic"));
        }
        let layout = le16(&buf[8..10]);
        if layout != LAYOUT_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported pack layout {layout}"),
            ));
        }
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&buf[12..28]);
        let mut body_blake3 = [0u8; 32];
        body_blake3.copy_from_slice(&buf[76..108]);
        Ok(Self {
            flags: le16(&buf[10..12]),
            uuid: Uuid::from_bytes(uuid),
            version: le32(&buf[28..32]),
            stage_count: le16(&buf[32..34]),
            action_count: le16(&buf[34..36]),
            asset_count: le16(&buf[36..38]),
            entry_index: le16(&buf[38..40]),
            title_len: le16(&buf[40..42]),
            description_len: le16(&buf[42..44]),
            thumbnail_len: le32(&buf[44..48]),
            stage_sector: le32(&buf[48..52]),
            action_sector: le32(&buf[52..56]),
            index_sector: le32(&buf[56..60]),
            data_sector: le32(&buf[60..64]),
            total_sectors: le32(&buf[64..68]),
            action_bytes: le32(&buf[68..72]),
            index_bytes: le32(&buf[72..76]),
            body_blake3,
        })
    }

    pub fn write_to(&self, mut w: impl Write) -> io::Result<()> {
        w.write_all(&self.encode())
    }

    pub fn read_from(mut r: impl Read) -> io::Result<Self> {
        let mut buf = [0u8; HEADER_LEN];
        r.read_exact(&mut buf)?;
        Self::decode(&buf)
    }
}

// Callers always pass fixed-width slices cut from a HEADER_LEN buffer.
#[inline]
fn le16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}

#[inline]
fn le32(x: &[u8]) -> u32 {
    u32::from_le_bytes([x[0], x[1], x[2], x[3]])
}
