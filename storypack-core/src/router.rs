//! Picks the codec for a pack file and drives archive→binary conversion.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec::{ArchiveCodec, BinaryCodec, PackCodec, PackFormat, codec_for};
use crate::container::header::MAGIC;
use crate::error::{PackError, Result};
use crate::metadata::PackMetadata;
use crate::story::pack::StoryPack;

pub const ARCHIVE_EXT: &str = "zip";
pub const BINARY_EXT: &str = "pack";

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8; 4] = b"PK\x05\x06";

/// Classify by extension alone (ASCII case-insensitive).
pub fn classify(path: &Path) -> PackFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(ARCHIVE_EXT) => PackFormat::Archive,
        Some(ext) if ext.eq_ignore_ascii_case(BINARY_EXT) => PackFormat::Binary,
        _ => PackFormat::Unknown,
    }
}

/// Classify the first bytes of a file.
pub fn sniff(head: &[u8]) -> PackFormat {
    if head.starts_with(MAGIC) {
        PackFormat::Binary
    } else if head.starts_with(ZIP_MAGIC) || head.starts_with(ZIP_EMPTY_MAGIC) {
        PackFormat::Archive
    } else {
        PackFormat::Unknown
    }
}

/// Extension first; files without one are recognised by their magic bytes.
pub fn detect(path: &Path) -> Result<PackFormat> {
    if path.extension().is_some() {
        return Ok(classify(path));
    }
    let mut head = Vec::with_capacity(MAGIC.len());
    File::open(path)?
        .take(MAGIC.len() as u64)
        .read_to_end(&mut head)?;
    Ok(sniff(&head))
}

fn codec(path: &Path) -> Result<&'static dyn PackCodec> {
    codec_for(detect(path)?).ok_or_else(|| PackError::UnsupportedFormat(path.to_path_buf()))
}

pub fn read_metadata(path: &Path) -> Result<PackMetadata> {
    let codec = codec(path)?;
    debug!(path = %path.display(), format = ?codec.format(), "reading pack metadata");
    let mut src = BufReader::new(File::open(path)?);
    codec.read_metadata(&mut src)
}

pub fn read_pack(path: &Path) -> Result<StoryPack> {
    let codec = codec(path)?;
    let mut src = BufReader::new(File::open(path)?);
    codec.read(&mut src)
}

/// A file ready to be sent to the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferFile {
    /// Already binary; the library file itself.
    Original(PathBuf),
    /// Freshly converted temporary file. The caller owns and deletes it.
    Converted(PathBuf),
}

impl TransferFile {
    pub fn path(&self) -> &Path {
        match self {
            TransferFile::Original(p) | TransferFile::Converted(p) => p,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, TransferFile::Converted(_))
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            TransferFile::Original(p) | TransferFile::Converted(p) => p,
        }
    }
}

/// Binary files pass through untouched; archives are transcoded into `temp_dir`.
/// Conversion only ever goes archive→binary.
pub fn convert(path: &Path, temp_dir: &Path) -> Result<TransferFile> {
    match detect(path)? {
        PackFormat::Binary => Ok(TransferFile::Original(path.to_path_buf())),
        PackFormat::Archive => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "pack".to_string());

            let mut tmp = tempfile::Builder::new()
                .prefix(&format!("{stem}-"))
                .suffix(".pack")
                .tempfile_in(temp_dir)?;
            warn!(
                path = %path.display(),
                tmp = %tmp.path().display(),
                "pack is in archive format; converting to binary"
            );

            let pack = {
                let mut src = BufReader::new(File::open(path)?);
                ArchiveCodec.read(&mut src)?
            };
            // On error `tmp` is dropped and removed; nothing half-written survives.
            let written = BinaryCodec.write(&pack, &mut tmp)?;
            tmp.as_file().sync_all()?;
            let (_, out) = tmp.keep().map_err(|e| e.error)?;

            info!(uuid = %pack.uuid(), bytes = written, tmp = %out.display(), "converted pack");
            Ok(TransferFile::Converted(out))
        }
        PackFormat::Unknown => Err(unsupported(path)),
    }
}

fn unsupported(path: &Path) -> PackError {
    PackError::UnsupportedFormat(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_extension() {
        assert_eq!(classify(Path::new("a/b/story.zip")), PackFormat::Archive);
        assert_eq!(classify(Path::new("story.ZIP")), PackFormat::Archive);
        assert_eq!(classify(Path::new("story.pack")), PackFormat::Binary);
        assert_eq!(classify(Path::new("notes.txt")), PackFormat::Unknown);
        assert_eq!(classify(Path::new("README")), PackFormat::Unknown);
        assert_eq!(classify(Path::new("story.pack.bak")), PackFormat::Unknown);
    }

    #[test]
    fn sniff_magic() {
        assert_eq!(sniff(b"SPACKBIN\x01\x00"), PackFormat::Binary);
        assert_eq!(sniff(b"PK\x03\x04rest"), PackFormat::Archive);
        assert_eq!(sniff(b"PK\x05\x06"), PackFormat::Archive);
        assert_eq!(sniff(b"hello"), PackFormat::Unknown);
        assert_eq!(sniff(b""), PackFormat::Unknown);
    }

    #[test]
    fn transfer_file_accessors() {
        let t = TransferFile::Converted(PathBuf::from("/tmp/x.pack"));
        assert!(t.is_converted());
        assert_eq!(t.path(), Path::new("/tmp/x.pack"));
        assert!(!TransferFile::Original(PathBuf::from("a.pack")).is_converted());
    }
}
