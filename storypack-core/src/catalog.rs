//! Externally maintained descriptive overrides, keyed by pack uuid.

use std::collections::HashMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// URL or data URI, already in transport form.
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub official: bool,
}

/// Read-only lookup injected into the library; must tolerate concurrent queries.
pub trait CatalogLookup: Send + Sync {
    fn lookup(&self, uuid: &Uuid) -> Option<CatalogEntry>;
}

/// Catalog with no entries: listings carry container fields only.
pub struct NoCatalog;

impl CatalogLookup for NoCatalog {
    fn lookup(&self, _uuid: &Uuid) -> Option<CatalogEntry> {
        None
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemCatalog {
    entries: HashMap<Uuid, CatalogEntry>,
}

impl InMemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object mapping uuid strings to entries.
    pub fn from_json_reader(r: impl Read) -> Result<Self> {
        let entries: HashMap<Uuid, CatalogEntry> = serde_json::from_reader(r)?;
        Ok(Self { entries })
    }

    pub fn insert(&mut self, uuid: Uuid, entry: CatalogEntry) -> Option<CatalogEntry> {
        self.entries.insert(uuid, entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CatalogLookup for InMemCatalog {
    fn lookup(&self, uuid: &Uuid) -> Option<CatalogEntry> {
        self.entries.get(uuid).cloned()
    }
}
