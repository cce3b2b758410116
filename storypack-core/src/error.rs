use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header or descriptor missing, truncated or unparsable.
    #[error("Malformed container: {0}")]
    Malformed(String),

    #[error("Unsupported pack format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Invalid story graph: {0}")]
    InvalidGraph(String),

    #[error("Zip error: {0}")]
    Zip(zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no library root: set an override or a home directory")]
    NoLibraryRoot,
}

impl PackError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        PackError::Malformed(msg.into())
    }

    pub fn invalid_graph(msg: impl Into<String>) -> Self {
        PackError::InvalidGraph(msg.into())
    }

    /// Unknown formats are skipped silently while listing a library.
    pub fn is_skippable(&self) -> bool {
        matches!(self, PackError::UnsupportedFormat(_))
    }
}

impl From<zip::result::ZipError> for PackError {
    fn from(e: zip::result::ZipError) -> Self {
        use zip::result::ZipError;
        match e {
            ZipError::Io(io) => PackError::Io(io),
            ZipError::FileNotFound => PackError::malformed("missing zip entry"),
            other @ (ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_)) => {
                PackError::Malformed(other.to_string())
            }
            other => PackError::Zip(other),
        }
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, PackError>;
