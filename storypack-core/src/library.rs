//! Local pack library: listing with catalog enrichment, and transfer preparation.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::catalog::CatalogLookup;
use crate::config::LibraryOptions;
use crate::error::{PackError, Result};
use crate::metadata::PackMetadata;
use crate::router::{self, TransferFile};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PackImage {
    /// Raw bytes embedded in the container.
    Embedded(Vec<u8>),
    /// Catalog-supplied URL or data URI.
    Linked(String),
}

/// One row of a library listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackListing {
    pub uuid: Uuid,
    pub version: u32,
    /// Relative to the library root, `/`-separated.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<PackImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub official: Option<bool>,
}

impl PackListing {
    /// Catalog entries replace title, description and image wholesale and add `official`.
    pub fn merge(meta: PackMetadata, path: String, catalog: &dyn CatalogLookup) -> Self {
        let base = Self {
            uuid: meta.uuid,
            version: meta.version,
            path,
            title: meta.title,
            description: meta.description,
            image: meta.thumbnail.map(PackImage::Embedded),
            sector_size: meta.sector_size,
            official: None,
        };
        match catalog.lookup(&meta.uuid) {
            Some(entry) => Self {
                title: entry.title,
                description: entry.description,
                image: entry.thumbnail.map(PackImage::Linked),
                official: Some(entry.official),
                ..base
            },
            None => base,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LibraryInfo {
    pub path: PathBuf,
}

pub struct Library {
    root: PathBuf,
    temp_dir: PathBuf,
    catalog: Arc<dyn CatalogLookup>,
}

impl Library {
    pub fn new(options: &LibraryOptions, catalog: Arc<dyn CatalogLookup>) -> Result<Self> {
        Ok(Self {
            root: options.resolve_root()?,
            temp_dir: options.resolve_temp_dir(),
            catalog,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Make sure the root exists and report where it is.
    pub fn info(&self) -> Result<LibraryInfo> {
        self.ensure_root()?;
        Ok(LibraryInfo {
            path: self.root.clone(),
        })
    }

    /// Every readable pack under the root, enriched from the catalog.
    ///
    /// Unknown and unreadable files are skipped; only failing to create or
    /// open the root aborts the listing.
    pub fn list_packs(&self) -> Result<Vec<PackListing>> {
        self.ensure_root()?;

        let mut files = Vec::new();
        for e in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
        {
            match e {
                Ok(e) if e.file_type().is_file() => files.push(e.into_path()),
                Ok(_) => {}
                Err(err) if err.depth() == 0 => {
                    return Err(PackError::Io(err.into()));
                }
                Err(err) => warn!(error = %err, "skipping unreadable library entry"),
            }
        }

        // Indexed parallel collect keeps walk order.
        let read: Vec<Option<(PathBuf, PackMetadata)>> = files
            .par_iter()
            .map(|path| match router::read_metadata(path) {
                Ok(meta) => Some((path.clone(), meta)),
                Err(e) if e.is_skippable() => {
                    debug!(path = %path.display(), "ignoring non-pack file");
                    None
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable pack");
                    None
                }
            })
            .collect();

        let listing: Vec<PackListing> = read
            .into_iter()
            .flatten()
            .map(|(path, meta)| {
                let rel = self.relative(&path);
                PackListing::merge(meta, rel, self.catalog.as_ref())
            })
            .collect();

        info!(
            root = %self.root.display(),
            files = files.len(),
            packs = listing.len(),
            "listed library"
        );
        Ok(listing)
    }

    /// Resolve `pack_path` under the root and make it device-ready.
    ///
    /// Archives are converted into a new temporary file that the caller must
    /// clean up; binary packs are returned as-is.
    pub fn fetch_transfer_file(&self, pack_path: &str) -> Result<TransferFile> {
        let path = safe_join(&self.root, pack_path)?;
        if !path.is_file() {
            return Err(PackError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such pack: {pack_path}"),
            )));
        }
        router::convert(&path, &self.temp_dir)
    }

    fn ensure_root(&self) -> Result<()> {
        if !self.root.is_dir() {
            info!(root = %self.root.display(), "creating library folder");
            fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn safe_join(root: &Path, rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);
    let escapes = p
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if rel.is_empty() || escapes {
        return Err(PackError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("unsafe pack path: {rel}"),
        )));
    }
    Ok(root.join(p))
}
