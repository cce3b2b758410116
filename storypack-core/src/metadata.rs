use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sector::sector_count;

/// Identity and descriptive fields of a pack, read without decoding its graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackMetadata {
    pub uuid: Uuid,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Vec<u8>>,
    /// Sectors occupied on the device; only ever set for binary containers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector_size: Option<u64>,
}

impl PackMetadata {
    pub fn new(uuid: Uuid, version: u32) -> Self {
        Self {
            uuid,
            version,
            title: None,
            description: None,
            thumbnail: None,
            sector_size: None,
        }
    }

    /// Recompute `sector_size` from the container's current byte length.
    pub fn with_file_len(mut self, len: u64) -> Self {
        self.sector_size = Some(sector_count(len));
        self
    }
}

impl PartialEq for PackMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for PackMetadata {}

impl Hash for PackMetadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}
