#![forbid(unsafe_code)]

pub mod error;
pub mod metadata;
pub mod sector;

pub mod util {
    pub mod hash_forward;
}

pub mod story {
    pub mod graph;
    pub mod pack;
}

pub mod container {
    pub mod descriptor;
    pub mod header;
    pub mod records;
}

pub mod codec;

pub mod catalog;
pub mod config;
pub mod library;
pub mod router;

// Re-exports: stable API surface
pub use catalog::{CatalogEntry, CatalogLookup, InMemCatalog, NoCatalog};
pub use codec::{ArchiveCodec, BinaryCodec, PackCodec, PackFormat};
pub use config::LibraryOptions;
pub use error::{PackError, Result};
pub use library::{Library, LibraryInfo, PackImage, PackListing};
pub use metadata::PackMetadata;
pub use router::{TransferFile, convert, read_metadata, read_pack};
pub use story::graph::{ActionNode, ControlSettings, SlotRole, StageNode, StoryGraph, Transition};
pub use story::pack::{Asset, AssetKind, StoryPack};
