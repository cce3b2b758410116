use std::io::{Read, Seek, Write};

use crate::error::Result;
use crate::metadata::PackMetadata;
use crate::story::pack::StoryPack;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PackFormat {
    /// Portable zip container.
    Archive,
    /// Sector-aligned container the device reads.
    Binary,
    Unknown,
}

pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek + ?Sized> ReadSeek for T {}

pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek + ?Sized> WriteSeek for T {}

pub trait PackCodec: Send + Sync {
    fn format(&self) -> PackFormat;

    /// Identity and descriptive fields only; media is never materialized.
    fn read_metadata(&self, src: &mut dyn ReadSeek) -> Result<PackMetadata>;

    fn read(&self, src: &mut dyn ReadSeek) -> Result<StoryPack>;

    /// Serialize `pack`, returning the number of bytes written.
    fn write(&self, pack: &StoryPack, dst: &mut dyn WriteSeek) -> Result<u64>;
}

pub mod archive;
pub mod binary;

pub use archive::ArchiveCodec;
pub use binary::BinaryCodec;

static ARCHIVE: ArchiveCodec = ArchiveCodec;
static BINARY: BinaryCodec = BinaryCodec;

pub fn codec_for(format: PackFormat) -> Option<&'static dyn PackCodec> {
    match format {
        PackFormat::Archive => Some(&ARCHIVE),
        PackFormat::Binary => Some(&BINARY),
        PackFormat::Unknown => None,
    }
}
