use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DESCRIPTOR_ENTRY: &str = "story.json";
pub const THUMBNAIL_ENTRY: &str = "thumbnail.png";
pub const ASSET_DIR: &str = "assets/";
pub const FORMAT_TAG: &str = "storypack/v1";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotDesc {
    Ok,
    Home,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetKindDesc {
    Image,
    Audio,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlDesc {
    pub wheel: bool,
    pub ok: bool,
    pub home: bool,
    pub pause: bool,
    pub autoplay: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDesc {
    pub action_node: Uuid,
    pub option_index: u16,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StageNodeDesc {
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub square_one: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default)]
    pub slots: Vec<SlotDesc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok_transition: Option<TransitionDesc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_transition: Option<TransitionDesc>,
    #[serde(default)]
    pub control_settings: ControlDesc,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ActionNodeDesc {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub options: Vec<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AssetDesc {
    pub name: String,
    pub kind: AssetKindDesc,
}

/// Full `story.json` document.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub format: String,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub night_mode_available: bool,
    #[serde(default)]
    pub factory_disabled: bool,
    pub stage_nodes: Vec<StageNodeDesc>,
    #[serde(default)]
    pub action_nodes: Vec<ActionNodeDesc>,
    #[serde(default)]
    pub assets: Vec<AssetDesc>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StageHead {
    pub uuid: Uuid,
    #[serde(default)]
    pub square_one: bool,
}

/// Identity view of `story.json`; everything else in the document is skipped.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorHead {
    pub format: String,
    pub version: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub stage_nodes: Vec<StageHead>,
}

/// The single stage flagged `squareOne`, if exactly one is.
pub fn square_one<T>(stages: &[T], flag: impl Fn(&T) -> bool) -> Option<&T> {
    let mut it = stages.iter().filter(|s| flag(s));
    match (it.next(), it.next()) {
        (Some(s), None) => Some(s),
        _ => None,
    }
}
