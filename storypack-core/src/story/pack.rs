use std::collections::HashMap;

use uuid::Uuid;

use crate::container::records::{MAX_STAGE_NAME, NONE};
use crate::error::{PackError, Result};
use crate::metadata::PackMetadata;
use crate::story::graph::StoryGraph;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image = 1,
    Audio = 2,
}

impl AssetKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(AssetKind::Image),
            2 => Some(AssetKind::Audio),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub kind: AssetKind,
    pub data: Vec<u8>,
}

/// Full content of a pack: graph, media and pack-level settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoryPack {
    pub version: u32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<Vec<u8>>,
    pub factory_disabled: bool,
    pub night_mode: bool,
    pub graph: StoryGraph,
    pub assets: Vec<Asset>,
}

impl StoryPack {
    pub fn new(version: u32, graph: StoryGraph) -> Self {
        Self {
            version,
            title: None,
            description: None,
            thumbnail: None,
            factory_disabled: false,
            night_mode: false,
            graph,
            assets: Vec::new(),
        }
    }

    /// A pack is identified by its entry stage.
    pub fn uuid(&self) -> Uuid {
        self.graph.entry()
    }

    pub fn metadata(&self) -> PackMetadata {
        PackMetadata {
            uuid: self.uuid(),
            version: self.version,
            title: self.title.clone(),
            description: self.description.clone(),
            thumbnail: self.thumbnail.clone(),
            sector_size: None,
        }
    }

    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn asset_index(&self, name: &str) -> Option<usize> {
        self.assets.iter().position(|a| a.name == name)
    }

    /// Structure, asset references and the size limits of the device layout,
    /// so that every valid pack can be written in both containers.
    pub fn validate(&self) -> Result<()> {
        self.graph.validate()?;
        self.check_limits()?;

        let mut names: HashMap<&str, AssetKind> = HashMap::with_capacity(self.assets.len());
        for a in &self.assets {
            check_asset_name(&a.name)?;
            if names.insert(a.name.as_str(), a.kind).is_some() {
                return Err(PackError::invalid_graph(format!(
                    "duplicate asset {}",
                    a.name
                )));
            }
        }

        for stage in self.graph.stages() {
            let refs = [
                (stage.image.as_deref(), AssetKind::Image),
                (stage.audio.as_deref(), AssetKind::Audio),
            ];
            for (name, want) in refs {
                let Some(name) = name else { continue };
                match names.get(name) {
                    Some(kind) if *kind == want => {}
                    Some(kind) => {
                        return Err(PackError::invalid_graph(format!(
                            "stage {} uses {kind:?} asset {name} as {want:?}",
                            stage.id
                        )));
                    }
                    None => {
                        return Err(PackError::invalid_graph(format!(
                            "stage {} references missing asset {name}",
                            stage.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_limits(&self) -> Result<()> {
        let graph = &self.graph;
        for (count, what) in [
            (graph.stages().len(), "stages"),
            (graph.actions().len(), "action nodes"),
            (self.assets.len(), "assets"),
        ] {
            if count >= usize::from(NONE) {
                return Err(PackError::invalid_graph(format!("too many {what}: {count}")));
            }
        }
        for (text, what) in [
            (self.title.as_deref(), "title"),
            (self.description.as_deref(), "description"),
        ] {
            let len = text.map_or(0, str::len);
            if len > usize::from(u16::MAX) {
                return Err(PackError::invalid_graph(format!("{what} is {len} bytes")));
            }
        }
        if self
            .thumbnail
            .as_ref()
            .is_some_and(|t| u32::try_from(t.len()).is_err())
        {
            return Err(PackError::invalid_graph("thumbnail too large"));
        }
        for s in graph.stages() {
            let len = s.name.as_deref().map_or(0, str::len);
            if len > MAX_STAGE_NAME {
                return Err(PackError::invalid_graph(format!(
                    "stage {} name is {len} bytes, at most {MAX_STAGE_NAME} allowed",
                    s.id
                )));
            }
        }
        for a in graph.actions() {
            let len = a.name.as_deref().map_or(0, str::len);
            if len >= usize::from(NONE) {
                return Err(PackError::invalid_graph(format!(
                    "action {} name is {len} bytes",
                    a.id
                )));
            }
            if a.options.len() > usize::from(u16::MAX) {
                return Err(PackError::invalid_graph(format!(
                    "action {} has {} options",
                    a.id,
                    a.options.len()
                )));
            }
        }
        for a in &self.assets {
            if a.name.len() > usize::from(u16::MAX) {
                return Err(PackError::invalid_graph(format!("asset name {} too long", a.name)));
            }
            if u32::try_from(a.data.len()).is_err() {
                return Err(PackError::invalid_graph(format!("asset {} too large", a.name)));
            }
        }
        Ok(())
    }
}

/// Asset names become archive entry names; keep them flat and relative.
pub(crate) fn check_asset_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".."
    {
        return Err(PackError::invalid_graph(format!("unsafe asset name: {name:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::graph::StageNode;

    fn pack_with_image(kind: AssetKind) -> StoryPack {
        let mut stage = StageNode::new(Uuid::new_v4());
        stage.image = Some("cover.png".into());
        let mut p = StoryPack::new(1, StoryGraph::new(stage));
        p.assets.push(Asset {
            name: "cover.png".into(),
            kind,
            data: vec![1, 2, 3],
        });
        p
    }

    #[test]
    fn uuid_is_entry_stage() {
        let p = pack_with_image(AssetKind::Image);
        assert_eq!(p.uuid(), p.graph.entry());
        assert_eq!(p.metadata().uuid, p.uuid());
        assert_eq!(p.metadata().sector_size, None);
    }

    #[test]
    fn validate_checks_asset_kind() {
        pack_with_image(AssetKind::Image).validate().unwrap();
        assert!(pack_with_image(AssetKind::Audio).validate().is_err());
    }

    #[test]
    fn validate_enforces_device_limits() {
        let mut p = pack_with_image(AssetKind::Image);
        let mut stage = p.graph.stages()[0].clone();
        stage.name = Some("x".repeat(MAX_STAGE_NAME));
        p.graph = StoryGraph::new(stage.clone());
        p.validate().unwrap();

        stage.name = Some("x".repeat(MAX_STAGE_NAME + 1));
        p.graph = StoryGraph::new(stage);
        assert!(matches!(p.validate(), Err(PackError::InvalidGraph(_))));

        let mut p = pack_with_image(AssetKind::Image);
        p.title = Some("t".repeat(usize::from(u16::MAX) + 1));
        assert!(p.validate().is_err());
    }

    #[test]
    fn validate_rejects_path_like_names() {
        let mut p = pack_with_image(AssetKind::Image);
        p.assets.push(Asset {
            name: "../escape.mp3".into(),
            kind: AssetKind::Audio,
            data: vec![],
        });
        assert!(p.validate().is_err());
    }
}
