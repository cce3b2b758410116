//! Storage geometry of the target device: everything is counted in 512-byte sectors.

use std::io::{self, Write};

pub const SECTOR_SIZE: u64 = 512;

const ZEROES: [u8; SECTOR_SIZE as usize] = [0u8; SECTOR_SIZE as usize];

/// Number of sectors occupied by `len` bytes (`ceil(len / 512)`).
#[inline]
pub fn sector_count(len: u64) -> u64 {
    len.div_ceil(SECTOR_SIZE)
}

/// Bytes needed to bring `len` up to the next sector boundary.
#[inline]
pub fn padding_for(len: u64) -> u64 {
    sector_count(len) * SECTOR_SIZE - len
}

/// Write zeroes until `written` reaches a sector boundary. Returns the pad length.
pub fn pad_to_sector<W: Write + ?Sized>(w: &mut W, written: u64) -> io::Result<u64> {
    let pad = padding_for(written);
    w.write_all(&ZEROES[..pad as usize])?;
    Ok(pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_count_boundaries() {
        assert_eq!(sector_count(0), 0);
        assert_eq!(sector_count(1), 1);
        assert_eq!(sector_count(511), 1);
        assert_eq!(sector_count(512), 1);
        assert_eq!(sector_count(513), 2);
        assert_eq!(sector_count(1024), 2);
    }

    #[test]
    fn padding_fills_to_boundary() {
        let mut buf = vec![7u8; 700];
        let pad = pad_to_sector(&mut buf, 700).unwrap();
        assert_eq!(pad, 324);
        assert_eq!(buf.len(), 1024);
        assert!(buf[700..].iter().all(|&b| b == 0));
    }

    #[test]
    fn aligned_input_needs_no_padding() {
        let mut buf = Vec::new();
        assert_eq!(pad_to_sector(&mut buf, 1536).unwrap(), 0);
        assert!(buf.is_empty());
    }
}
