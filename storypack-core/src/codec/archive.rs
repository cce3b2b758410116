//! Portable zip pack: `story.json` plus one `assets/<name>` entry per asset.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Seek, Write};

use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{PackCodec, PackFormat, ReadSeek, WriteSeek};
use crate::container::descriptor::{
    ASSET_DIR, ActionNodeDesc, AssetDesc, AssetKindDesc, ControlDesc, DESCRIPTOR_ENTRY,
    Descriptor, DescriptorHead, FORMAT_TAG, SlotDesc, StageNodeDesc, THUMBNAIL_ENTRY,
    TransitionDesc, square_one,
};
use crate::error::{PackError, Result};
use crate::metadata::PackMetadata;
use crate::story::graph::{
    ActionNode, ControlSettings, SlotRole, StageNode, StoryGraph, Transition,
};
use crate::story::pack::{Asset, AssetKind, StoryPack, check_asset_name};

pub struct ArchiveCodec;

impl PackCodec for ArchiveCodec {
    fn format(&self) -> PackFormat {
        PackFormat::Archive
    }

    fn read_metadata(&self, src: &mut dyn ReadSeek) -> Result<PackMetadata> {
        let mut zip = ZipArchive::new(src)?;
        let head: DescriptorHead = read_descriptor(&mut zip)?;
        check_format(&head.format)?;
        let entry = square_one(&head.stage_nodes, |s| s.square_one)
            .ok_or_else(|| PackError::malformed("story.json needs exactly one squareOne stage"))?;

        Ok(PackMetadata {
            uuid: entry.uuid,
            version: head.version,
            title: head.title,
            description: head.description,
            thumbnail: read_entry(&mut zip, THUMBNAIL_ENTRY)?,
            sector_size: None,
        })
    }

    fn read(&self, src: &mut dyn ReadSeek) -> Result<StoryPack> {
        let mut zip = ZipArchive::new(src)?;
        let desc: Descriptor = read_descriptor(&mut zip)?;
        check_format(&desc.format)?;

        let mut assets = Vec::with_capacity(desc.assets.len());
        for a in &desc.assets {
            check_asset_name(&a.name).map_err(to_malformed)?;
            let path = format!("{ASSET_DIR}{}", a.name);
            let data = read_entry(&mut zip, &path)?
                .ok_or_else(|| PackError::malformed(format!("missing asset entry {path}")))?;
            assets.push(Asset {
                name: a.name.clone(),
                kind: match a.kind {
                    AssetKindDesc::Image => AssetKind::Image,
                    AssetKindDesc::Audio => AssetKind::Audio,
                },
                data,
            });
        }
        let thumbnail = read_entry(&mut zip, THUMBNAIL_ENTRY)?;

        let pack = pack_from_descriptor(desc, assets, thumbnail).map_err(to_malformed)?;
        debug!(uuid = %pack.uuid(), assets = pack.assets.len(), "read archive pack");
        Ok(pack)
    }

    fn write(&self, pack: &StoryPack, dst: &mut dyn WriteSeek) -> Result<u64> {
        pack.validate()?;
        let start = dst.stream_position()?;
        let desc = descriptor_from_pack(pack);

        let mut zw = ZipWriter::new(&mut *dst);
        zw.start_file(DESCRIPTOR_ENTRY, entry_options(CompressionMethod::Deflated))?;
        serde_json::to_writer_pretty(&mut zw, &desc)?;
        if let Some(thumb) = &pack.thumbnail {
            zw.start_file(THUMBNAIL_ENTRY, entry_options(CompressionMethod::Stored))?;
            zw.write_all(thumb)?;
        }
        for a in &pack.assets {
            // Media is already compressed.
            zw.start_file(
                format!("{ASSET_DIR}{}", a.name),
                entry_options(CompressionMethod::Stored),
            )?;
            zw.write_all(&a.data)?;
        }
        let out = zw.finish()?;
        out.flush()?;
        let end = out.stream_position()?;
        debug!(uuid = %pack.uuid(), bytes = end - start, "wrote archive pack");
        Ok(end - start)
    }
}

fn entry_options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(method)
}

fn read_descriptor<R, T>(zip: &mut ZipArchive<R>) -> Result<T>
where
    R: Read + Seek,
    T: serde::de::DeserializeOwned,
{
    let entry = match zip.by_name(DESCRIPTOR_ENTRY) {
        Ok(e) => e,
        Err(ZipError::FileNotFound) => {
            return Err(PackError::malformed(format!("missing {DESCRIPTOR_ENTRY}")));
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_reader(entry)
        .map_err(|e| PackError::malformed(format!("{DESCRIPTOR_ENTRY}: {e}")))
}

fn read_entry<R: Read + Seek>(zip: &mut ZipArchive<R>, name: &str) -> Result<Option<Vec<u8>>> {
    match zip.by_name(name) {
        Ok(mut f) => {
            // Declared sizes are untrusted; grow with the data actually inflated.
            let mut buf = Vec::new();
            f.read_to_end(&mut buf)?;
            Ok(Some(buf))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn check_format(tag: &str) -> Result<()> {
    if tag != FORMAT_TAG {
        return Err(PackError::malformed(format!(
            "unsupported descriptor format {tag:?}"
        )));
    }
    Ok(())
}

fn to_malformed(e: PackError) -> PackError {
    match e {
        PackError::InvalidGraph(msg) => PackError::Malformed(msg),
        other => other,
    }
}

fn pack_from_descriptor(
    desc: Descriptor,
    assets: Vec<Asset>,
    thumbnail: Option<Vec<u8>>,
) -> Result<StoryPack> {
    let entry = square_one(&desc.stage_nodes, |s| s.square_one)
        .map(|s| s.uuid)
        .ok_or_else(|| PackError::invalid_graph("story.json needs exactly one squareOne stage"))?;

    let mut transitions = BTreeMap::new();
    let mut stages = Vec::with_capacity(desc.stage_nodes.len());
    for s in desc.stage_nodes {
        for (role, t) in [(SlotRole::Ok, s.ok_transition), (SlotRole::Home, s.home_transition)] {
            if let Some(t) = t {
                transitions.insert(
                    (s.uuid, role),
                    Transition {
                        action: t.action_node,
                        option: t.option_index,
                    },
                );
            }
        }
        stages.push(StageNode {
            id: s.uuid,
            name: s.name,
            image: s.image,
            audio: s.audio,
            controls: ControlSettings {
                wheel: s.control_settings.wheel,
                ok: s.control_settings.ok,
                home: s.control_settings.home,
                pause: s.control_settings.pause,
                autoplay: s.control_settings.autoplay,
            },
            slots: s
                .slots
                .iter()
                .map(|d| match d {
                    SlotDesc::Ok => SlotRole::Ok,
                    SlotDesc::Home => SlotRole::Home,
                })
                .collect::<BTreeSet<_>>(),
        });
    }

    let actions = desc
        .action_nodes
        .into_iter()
        .map(|a| ActionNode {
            id: a.id,
            name: a.name,
            options: a.options,
        })
        .collect();

    let pack = StoryPack {
        version: desc.version,
        title: desc.title,
        description: desc.description,
        thumbnail,
        factory_disabled: desc.factory_disabled,
        night_mode: desc.night_mode_available,
        graph: StoryGraph::from_parts(stages, actions, transitions, entry)?,
        assets,
    };
    pack.validate()?;
    Ok(pack)
}

fn descriptor_from_pack(pack: &StoryPack) -> Descriptor {
    let graph = &pack.graph;
    let transition = |stage, role| {
        graph.transition(stage, role).map(|t| TransitionDesc {
            action_node: t.action,
            option_index: t.option,
        })
    };

    let stage_nodes = graph
        .stages()
        .iter()
        .map(|s| StageNodeDesc {
            uuid: s.id,
            name: s.name.clone(),
            square_one: s.id == graph.entry(),
            image: s.image.clone(),
            audio: s.audio.clone(),
            slots: s
                .slots
                .iter()
                .map(|r| match r {
                    SlotRole::Ok => SlotDesc::Ok,
                    SlotRole::Home => SlotDesc::Home,
                })
                .collect(),
            ok_transition: transition(s.id, SlotRole::Ok),
            home_transition: transition(s.id, SlotRole::Home),
            control_settings: ControlDesc {
                wheel: s.controls.wheel,
                ok: s.controls.ok,
                home: s.controls.home,
                pause: s.controls.pause,
                autoplay: s.controls.autoplay,
            },
        })
        .collect();

    let action_nodes = graph
        .actions()
        .iter()
        .map(|a| ActionNodeDesc {
            id: a.id,
            name: a.name.clone(),
            options: a.options.clone(),
        })
        .collect();

    let assets = pack
        .assets
        .iter()
        .map(|a| AssetDesc {
            name: a.name.clone(),
            kind: match a.kind {
                AssetKind::Image => AssetKindDesc::Image,
                AssetKind::Audio => AssetKindDesc::Audio,
            },
        })
        .collect();

    Descriptor {
        format: FORMAT_TAG.to_string(),
        version: pack.version,
        title: pack.title.clone(),
        description: pack.description.clone(),
        night_mode_available: pack.night_mode,
        factory_disabled: pack.factory_disabled,
        stage_nodes,
        action_nodes,
        assets,
    }
}
