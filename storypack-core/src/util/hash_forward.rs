use std::io::{Result, Write};

use crate::sector::pad_to_sector;

/// Forwards writes while hashing them and tracking the sector position.
pub struct HashingForward<W: Write> {
    inner: W,
    hasher: blake3::Hasher,
    written: u64,
}

impl<W: Write> HashingForward<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Zero-fill to the next sector boundary (hashed like any other byte).
    pub fn pad_to_sector(&mut self) -> Result<u64> {
        let written = self.written;
        pad_to_sector(self, written)
    }

    pub fn finish(self) -> (W, [u8; 32]) {
        (self.inner, *self.hasher.finalize().as_bytes())
    }
}

impl<W: Write> Write for HashingForward<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }
    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
