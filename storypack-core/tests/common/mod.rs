//! Shared fixtures for the integration tests.

#![allow(dead_code)] // Not every test binary uses every fixture

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use storypack_core::{
    ActionNode, ArchiveCodec, Asset, AssetKind, BinaryCodec, PackCodec, SlotRole, StageNode,
    StoryGraph, StoryPack, Transition,
};
use uuid::Uuid;

/// Cover → menu → two chapters, each chapter homing back to the menu.
pub fn sample_pack() -> StoryPack {
    let cover = Uuid::new_v4();
    let ch1 = Uuid::new_v4();
    let ch2 = Uuid::new_v4();
    let menu = Uuid::new_v4();
    let end = Uuid::new_v4();

    let mut cover_stage = StageNode::new(cover).with_slots(&[SlotRole::Ok]);
    cover_stage.name = Some("Cover".into());
    cover_stage.image = Some("cover.png".into());
    cover_stage.audio = Some("cover.mp3".into());
    cover_stage.controls.wheel = true;
    cover_stage.controls.ok = true;

    let mut graph = StoryGraph::new(cover_stage);
    for (id, audio) in [(ch1, "ch1.mp3"), (ch2, "ch2.mp3")] {
        let mut s = StageNode::new(id).with_slots(&[SlotRole::Ok, SlotRole::Home]);
        s.audio = Some(audio.into());
        s.controls.pause = true;
        s.controls.autoplay = true;
        graph.add_stage(s).expect("add chapter");
    }
    graph
        .add_action(ActionNode {
            id: menu,
            name: Some("Pick a chapter".into()),
            options: vec![ch1, ch2],
        })
        .expect("add menu");
    graph
        .add_action(ActionNode {
            id: end,
            name: None,
            options: vec![],
        })
        .expect("add end");

    let to_menu = Transition { action: menu, option: 0 };
    graph.connect(cover, SlotRole::Ok, to_menu).expect("cover ok");
    graph
        .connect(ch1, SlotRole::Ok, Transition { action: menu, option: 1 })
        .expect("ch1 ok");
    graph.connect(ch1, SlotRole::Home, to_menu).expect("ch1 home");
    graph
        .connect(ch2, SlotRole::Ok, Transition { action: end, option: 0 })
        .expect("ch2 ok");
    graph.connect(ch2, SlotRole::Home, to_menu).expect("ch2 home");

    let mut pack = StoryPack::new(3, graph);
    pack.title = Some("The Lantern Fox".into());
    pack.description = Some("Two short chapters.".into());
    pack.thumbnail = Some(b"\x89PNG thumb".to_vec());
    pack.night_mode = true;
    pack.assets = vec![
        asset("cover.png", AssetKind::Image, 700),
        asset("cover.mp3", AssetKind::Audio, 1024),
        asset("ch1.mp3", AssetKind::Audio, 0),
        asset("ch2.mp3", AssetKind::Audio, 33),
    ];
    pack.validate().expect("fixture is valid");
    pack
}

pub fn asset(name: &str, kind: AssetKind, len: usize) -> Asset {
    Asset {
        name: name.to_string(),
        kind,
        data: (0..len).map(|i| (i % 251) as u8).collect(),
    }
}

pub fn binary_bytes(pack: &StoryPack) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    BinaryCodec.write(pack, &mut out).expect("binary write");
    out.into_inner()
}

pub fn archive_bytes(pack: &StoryPack) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    ArchiveCodec.write(pack, &mut out).expect("archive write");
    out.into_inner()
}

pub fn write_file(dir: &Path, rel: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(&path, bytes).expect("write fixture");
    path
}

/// A pack holding only its entry stage: no title, description, thumbnail or assets.
pub fn minimal_pack() -> StoryPack {
    StoryPack::new(1, StoryGraph::new(StageNode::new(Uuid::new_v4())))
}

/// Entry stage named `name` with both slots declared but left unconnected.
pub fn named_entry_pack(name: &str) -> StoryPack {
    let mut stage = StageNode::new(Uuid::new_v4()).with_slots(&[SlotRole::Ok, SlotRole::Home]);
    stage.name = Some(name.to_string());
    StoryPack::new(1, StoryGraph::new(stage))
}

/// Patch the uncompressed size recorded in the central directory for `entry`.
pub fn patch_declared_size(zip: &mut [u8], entry: &str, size: u32) {
    let mut i = 0;
    while i + 46 <= zip.len() {
        if zip[i..i + 4] == *b"PK\x01\x02" {
            let name_len = u16::from_le_bytes([zip[i + 28], zip[i + 29]]) as usize;
            if zip.get(i + 46..i + 46 + name_len) == Some(entry.as_bytes()) {
                zip[i + 24..i + 28].copy_from_slice(&size.to_le_bytes());
                return;
            }
        }
        i += 1;
    }
    panic!("no central directory entry for {entry}");
}
