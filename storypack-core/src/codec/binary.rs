//! Device-native pack: a header sector followed by sector-aligned regions.
//!
//! ```text
//! sector 0            PackHeader
//! sector 1..          metadata block (title | description | thumbnail)
//! stage_sector..      one StageRecord per sector
//! action_sector..     packed ActionRecords
//! index_sector..      packed AssetEntries
//! data_sector..       asset bytes, each starting on a sector boundary
//! ```
//!
//! Every region is zero-padded to a sector. Region offsets come from
//! [`Layout::plan`], which both directions share; the reader rejects any
//! header that disagrees with it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{self, SeekFrom, Write};

use tracing::debug;
use uuid::Uuid;

use super::{PackCodec, PackFormat, ReadSeek, WriteSeek};
use crate::container::header::{
    FLAG_FACTORY_DISABLED, FLAG_HAS_DESCRIPTION, FLAG_HAS_THUMBNAIL, FLAG_HAS_TITLE,
    FLAG_NIGHT_MODE, HEADER_LEN, METADATA_SECTOR, PackHeader,
};
use crate::container::records::{
    ActionRecord, AssetEntry, CTRL_AUTOPLAY, CTRL_HOME, CTRL_OK, CTRL_PAUSE, CTRL_WHEEL, NONE,
    SLOT_HOME, SLOT_OK, STAGE_RECORD_LEN, SlotRef, StageRecord,
};
use crate::error::{PackError, Result};
use crate::metadata::PackMetadata;
use crate::sector::{SECTOR_SIZE, sector_count};
use crate::story::graph::{ActionNode, ControlSettings, SlotRole, StageNode, StoryGraph, Transition};
use crate::story::pack::{Asset, AssetKind, StoryPack};
use crate::util::hash_forward::HashingForward;

pub struct BinaryCodec;

impl PackCodec for BinaryCodec {
    fn format(&self) -> PackFormat {
        PackFormat::Binary
    }

    fn read_metadata(&self, src: &mut dyn ReadSeek) -> Result<PackMetadata> {
        let start = src.stream_position()?;
        let end = src.seek(SeekFrom::End(0))?;
        src.seek(SeekFrom::Start(start))?;

        let header = PackHeader::read_from(&mut *src).map_err(malformed_io)?;
        let available = end.saturating_sub(start).saturating_sub(HEADER_LEN as u64);
        if header.metadata_len() > available {
            return Err(PackError::malformed(format!(
                "metadata block is {} bytes, only {available} follow the header",
                header.metadata_len()
            )));
        }
        let mut block = vec![0u8; usize_of(header.metadata_len())?];
        src.read_exact(&mut block).map_err(malformed_io)?;
        let (title, description, thumbnail) = split_metadata(&header, &block)?;

        Ok(PackMetadata {
            uuid: header.uuid,
            version: header.version,
            title,
            description,
            thumbnail,
            sector_size: None,
        }
        .with_file_len(end.saturating_sub(start)))
    }

    fn read(&self, src: &mut dyn ReadSeek) -> Result<StoryPack> {
        let header = PackHeader::read_from(&mut *src).map_err(malformed_io)?;
        let mut body = Vec::new();
        src.read_to_end(&mut body)?;
        decode_body(&header, &body)
    }

    fn write(&self, pack: &StoryPack, dst: &mut dyn WriteSeek) -> Result<u64> {
        let bytes = encode(pack)?;
        dst.write_all(&bytes)?;
        dst.flush()?;
        debug!(uuid = %pack.uuid(), bytes = bytes.len(), "wrote binary pack");
        Ok(bytes.len() as u64)
    }
}

/// Sector numbers (absolute, counting the header as sector 0) of every region.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Layout {
    stage_sector: u32,
    action_sector: u32,
    index_sector: u32,
    data_sector: u32,
    asset_sectors: Vec<u32>,
    total_sectors: u32,
}

impl Layout {
    fn plan(
        metadata_len: u64,
        stage_count: u64,
        action_bytes: u64,
        index_bytes: u64,
        asset_lens: &[u64],
    ) -> io::Result<Self> {
        let stage_sector = u64::from(METADATA_SECTOR) + sector_count(metadata_len);
        let action_sector = stage_sector + stage_count;
        let index_sector = action_sector + sector_count(action_bytes);
        let data_sector = index_sector + sector_count(index_bytes);
        let mut cursor = data_sector;
        let mut asset_sectors = Vec::with_capacity(asset_lens.len());
        for len in asset_lens {
            asset_sectors.push(sector_u32(cursor)?);
            cursor += sector_count(*len);
        }
        Ok(Self {
            stage_sector: sector_u32(stage_sector)?,
            action_sector: sector_u32(action_sector)?,
            index_sector: sector_u32(index_sector)?,
            data_sector: sector_u32(data_sector)?,
            asset_sectors,
            total_sectors: sector_u32(cursor)?,
        })
    }

    fn body_len(&self) -> u64 {
        (u64::from(self.total_sectors) - 1) * SECTOR_SIZE
    }
}

fn sector_u32(s: u64) -> io::Result<u32> {
    u32::try_from(s)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pack exceeds addressable sectors"))
}

/// Serialize a pack into its complete on-disk bytes.
pub fn encode(pack: &StoryPack) -> Result<Vec<u8>> {
    pack.validate()?;
    let graph = &pack.graph;

    let stage_idx: HashMap<Uuid, u16> = index_map(graph.stages().iter().map(|s| s.id), "stages")?;
    let action_idx: HashMap<Uuid, u16> =
        index_map(graph.actions().iter().map(|a| a.id), "action nodes")?;
    let asset_idx: HashMap<&str, u16> =
        index_map(pack.assets.iter().map(|a| a.name.as_str()), "assets")?;

    let title = pack.title.as_deref().map(str::as_bytes);
    let description = pack.description.as_deref().map(str::as_bytes);
    let thumbnail = pack.thumbnail.as_deref();
    let title_len = len_u16(title.map_or(0, <[u8]>::len), "title")?;
    let description_len = len_u16(description.map_or(0, <[u8]>::len), "description")?;
    let thumbnail_len = u32::try_from(thumbnail.map_or(0, <[u8]>::len))
        .map_err(|_| PackError::invalid_graph("thumbnail too large"))?;

    let mut stages = Vec::with_capacity(graph.stages().len());
    for s in graph.stages() {
        let slot_ref = |role: SlotRole| {
            graph.transition(s.id, role).map(|t| SlotRef {
                action: action_idx[&t.action],
                option: t.option,
            })
        };
        stages.push(StageRecord {
            uuid: s.id,
            slots: slot_bits(&s.slots),
            controls: control_bits(&s.controls),
            image: s.image.as_deref().map(|n| asset_idx[n]),
            audio: s.audio.as_deref().map(|n| asset_idx[n]),
            ok: slot_ref(SlotRole::Ok),
            home: slot_ref(SlotRole::Home),
            name: s.name.clone(),
        });
    }

    let actions: Vec<ActionRecord> = graph
        .actions()
        .iter()
        .map(|a| ActionRecord {
            uuid: a.id,
            name: a.name.clone(),
            options: a.options.iter().map(|o| stage_idx[o]).collect(),
        })
        .collect();

    let mut entries = Vec::with_capacity(pack.assets.len());
    for a in &pack.assets {
        entries.push(AssetEntry {
            kind: a.kind as u8,
            start_sector: 0, // patched once the layout is known
            byte_len: u32::try_from(a.data.len())
                .map_err(|_| PackError::invalid_graph(format!("asset {} too large", a.name)))?,
            name: a.name.clone(),
        });
    }

    let action_bytes: usize = actions.iter().map(ActionRecord::encoded_len).sum();
    let index_bytes: usize = entries.iter().map(AssetEntry::encoded_len).sum();
    let asset_lens: Vec<u64> = pack.assets.iter().map(|a| a.data.len() as u64).collect();
    let layout = Layout::plan(
        u64::from(title_len) + u64::from(description_len) + u64::from(thumbnail_len),
        stages.len() as u64,
        action_bytes as u64,
        index_bytes as u64,
        &asset_lens,
    )?;
    for (e, start) in entries.iter_mut().zip(&layout.asset_sectors) {
        e.start_sector = *start;
    }

    let mut body = HashingForward::new(Vec::with_capacity(usize_of(layout.body_len())?));

    for part in [title, description, thumbnail].into_iter().flatten() {
        body.write_all(part)?;
    }
    body.pad_to_sector()?;
    expect_sector(&body, layout.stage_sector, "stage table")?;

    for rec in &stages {
        let bytes = rec
            .encode()
            .map_err(|e| PackError::invalid_graph(format!("stage {}: {e}", rec.uuid)))?;
        body.write_all(&bytes)?;
    }
    expect_sector(&body, layout.action_sector, "action table")?;

    for rec in &actions {
        rec.write_to(&mut body)
            .map_err(|e| PackError::invalid_graph(format!("action {}: {e}", rec.uuid)))?;
    }
    body.pad_to_sector()?;
    expect_sector(&body, layout.index_sector, "asset index")?;

    for e in &entries {
        e.write_to(&mut body)?;
    }
    body.pad_to_sector()?;
    expect_sector(&body, layout.data_sector, "asset data")?;

    for (a, start) in pack.assets.iter().zip(&layout.asset_sectors) {
        expect_sector(&body, *start, &a.name)?;
        body.write_all(&a.data)?;
        body.pad_to_sector()?;
    }
    expect_sector(&body, layout.total_sectors, "end of pack")?;

    let (body, body_blake3) = body.finish();

    let mut flags = 0u16;
    if pack.factory_disabled {
        flags |= FLAG_FACTORY_DISABLED;
    }
    if pack.night_mode {
        flags |= FLAG_NIGHT_MODE;
    }
    if title.is_some() {
        flags |= FLAG_HAS_TITLE;
    }
    if description.is_some() {
        flags |= FLAG_HAS_DESCRIPTION;
    }
    if thumbnail.is_some() {
        flags |= FLAG_HAS_THUMBNAIL;
    }

    let header = PackHeader {
        flags,
        uuid: pack.uuid(),
        version: pack.version,
        stage_count: stages.len() as u16,
        action_count: actions.len() as u16,
        asset_count: entries.len() as u16,
        entry_index: stage_idx[&graph.entry()],
        title_len,
        description_len,
        thumbnail_len,
        stage_sector: layout.stage_sector,
        action_sector: layout.action_sector,
        index_sector: layout.index_sector,
        data_sector: layout.data_sector,
        total_sectors: layout.total_sectors,
        action_bytes: u32::try_from(action_bytes)
            .map_err(|_| PackError::invalid_graph("action table too large"))?,
        index_bytes: u32::try_from(index_bytes)
            .map_err(|_| PackError::invalid_graph("asset index too large"))?,
        body_blake3,
    };

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    header.write_to(&mut out)?;
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode_body(header: &PackHeader, body: &[u8]) -> Result<StoryPack> {
    if header.total_sectors == 0 {
        return Err(PackError::malformed("pack declares no sectors"));
    }
    let expected = (u64::from(header.total_sectors) - 1) * SECTOR_SIZE;
    if body.len() as u64 != expected {
        return Err(PackError::malformed(format!(
            "pack body is {} bytes, header declares {expected}",
            body.len()
        )));
    }
    let digest = blake3::hash(body);
    if digest.as_bytes() != &header.body_blake3 {
        return Err(PackError::malformed(format!(
            "body checksum mismatch: header {} computed {}",
            hex::encode(header.body_blake3),
            digest.to_hex()
        )));
    }

    let meta_len = usize_of(header.metadata_len())?;
    let block = region(body, METADATA_SECTOR, meta_len)?;
    let (title, description, thumbnail) = split_metadata(header, block)?;

    let stage_count = usize::from(header.stage_count);
    let stage_region = region(body, header.stage_sector, stage_count * STAGE_RECORD_LEN)?;
    let records: Vec<StageRecord> = stage_region
        .chunks_exact(STAGE_RECORD_LEN)
        .map(StageRecord::decode)
        .collect::<io::Result<_>>()
        .map_err(malformed_io)?;

    let mut cur = region(body, header.action_sector, usize_of(u64::from(header.action_bytes))?)?;
    let mut action_recs = Vec::with_capacity(usize::from(header.action_count));
    for _ in 0..header.action_count {
        action_recs.push(ActionRecord::read_from(&mut cur).map_err(malformed_io)?);
    }
    if !cur.is_empty() {
        return Err(PackError::malformed("trailing bytes in action table"));
    }

    let mut cur = region(body, header.index_sector, usize_of(u64::from(header.index_bytes))?)?;
    let mut entries = Vec::with_capacity(usize::from(header.asset_count));
    for _ in 0..header.asset_count {
        entries.push(AssetEntry::read_from(&mut cur).map_err(malformed_io)?);
    }
    if !cur.is_empty() {
        return Err(PackError::malformed("trailing bytes in asset index"));
    }

    let asset_lens: Vec<u64> = entries.iter().map(|e| u64::from(e.byte_len)).collect();
    let layout = Layout::plan(
        header.metadata_len(),
        stage_count as u64,
        u64::from(header.action_bytes),
        u64::from(header.index_bytes),
        &asset_lens,
    )
    .map_err(malformed_io)?;
    let declared = Layout {
        stage_sector: header.stage_sector,
        action_sector: header.action_sector,
        index_sector: header.index_sector,
        data_sector: header.data_sector,
        asset_sectors: entries.iter().map(|e| e.start_sector).collect(),
        total_sectors: header.total_sectors,
    };
    if layout != declared {
        return Err(PackError::malformed(format!(
            "region offsets disagree with layout: declared {declared:?}, planned {layout:?}"
        )));
    }

    let mut assets = Vec::with_capacity(entries.len());
    for e in entries {
        let kind = AssetKind::from_u8(e.kind)
            .ok_or_else(|| PackError::malformed(format!("asset {} has kind {}", e.name, e.kind)))?;
        let data = region(body, e.start_sector, usize_of(u64::from(e.byte_len))?)?.to_vec();
        assets.push(Asset {
            name: e.name,
            kind,
            data,
        });
    }

    let asset_name = |idx: Option<u16>| -> Result<Option<String>> {
        idx.map(|i| {
            assets
                .get(usize::from(i))
                .map(|a| a.name.clone())
                .ok_or_else(|| PackError::malformed(format!("asset index {i} out of range")))
        })
        .transpose()
    };
    let stage_id = |i: u16| -> Result<Uuid> {
        records
            .get(usize::from(i))
            .map(|r| r.uuid)
            .ok_or_else(|| PackError::malformed(format!("stage index {i} out of range")))
    };
    let action_id = |i: u16| -> Result<Uuid> {
        action_recs
            .get(usize::from(i))
            .map(|r| r.uuid)
            .ok_or_else(|| PackError::malformed(format!("action index {i} out of range")))
    };

    let mut stages = Vec::with_capacity(records.len());
    let mut transitions = BTreeMap::new();
    for r in &records {
        for (role, slot) in [(SlotRole::Ok, r.ok), (SlotRole::Home, r.home)] {
            if let Some(slot) = slot {
                transitions.insert(
                    (r.uuid, role),
                    Transition {
                        action: action_id(slot.action)?,
                        option: slot.option,
                    },
                );
            }
        }
        stages.push(StageNode {
            id: r.uuid,
            name: r.name.clone(),
            image: asset_name(r.image)?,
            audio: asset_name(r.audio)?,
            controls: controls_from(r.controls)?,
            slots: slots_from(r.slots)?,
        });
    }

    let mut actions = Vec::with_capacity(action_recs.len());
    for a in &action_recs {
        actions.push(ActionNode {
            id: a.uuid,
            name: a.name.clone(),
            options: a.options.iter().map(|&o| stage_id(o)).collect::<Result<_>>()?,
        });
    }

    let entry = stage_id(header.entry_index)?;
    if entry != header.uuid {
        return Err(PackError::malformed(format!(
            "header uuid {} does not match entry stage {entry}",
            header.uuid
        )));
    }

    let graph = StoryGraph::from_parts(stages, actions, transitions, entry).map_err(to_malformed)?;
    let pack = StoryPack {
        version: header.version,
        title,
        description,
        thumbnail,
        factory_disabled: header.has(FLAG_FACTORY_DISABLED),
        night_mode: header.has(FLAG_NIGHT_MODE),
        graph,
        assets,
    };
    pack.validate().map_err(to_malformed)?;
    Ok(pack)
}

type MetadataFields = (Option<String>, Option<String>, Option<Vec<u8>>);

fn split_metadata(header: &PackHeader, block: &[u8]) -> Result<MetadataFields> {
    let tl = usize::from(header.title_len);
    let dl = usize::from(header.description_len);
    let (t, rest) = block.split_at(tl);
    let (d, thumb) = rest.split_at(dl);
    let text = |b: &[u8], what: &str| {
        String::from_utf8(b.to_vec())
            .map_err(|e| PackError::malformed(format!("{what} is not utf-8: {e}")))
    };
    let title = header.has(FLAG_HAS_TITLE).then(|| text(t, "title")).transpose()?;
    let description = header
        .has(FLAG_HAS_DESCRIPTION)
        .then(|| text(d, "description"))
        .transpose()?;
    let thumbnail = header.has(FLAG_HAS_THUMBNAIL).then(|| thumb.to_vec());
    Ok((title, description, thumbnail))
}

/// Bytes of `body` starting at absolute `sector`.
fn region(body: &[u8], sector: u32, len: usize) -> Result<&[u8]> {
    let start = u64::from(sector)
        .checked_sub(1)
        .map(|s| s * SECTOR_SIZE)
        .ok_or_else(|| PackError::malformed("region points into the header"))?;
    let start = usize_of(start)?;
    body.get(start..start.saturating_add(len))
        .ok_or_else(|| PackError::malformed(format!("region at sector {sector} overruns pack")))
}

fn expect_sector<W: Write>(body: &HashingForward<W>, sector: u32, what: &str) -> Result<()> {
    // Body positions are offset by the header sector.
    let at = body.written() / SECTOR_SIZE + 1;
    if body.written() % SECTOR_SIZE != 0 || at != u64::from(sector) {
        return Err(PackError::Io(io::Error::other(format!(
            "layout drift at {what}: at byte {} of body, planned sector {sector}",
            body.written()
        ))));
    }
    Ok(())
}

fn index_map<K: std::hash::Hash + Eq>(
    keys: impl Iterator<Item = K>,
    what: &str,
) -> Result<HashMap<K, u16>> {
    let mut map = HashMap::new();
    for (i, k) in keys.enumerate() {
        let i = u16::try_from(i)
            .ok()
            .filter(|&i| i != NONE)
            .ok_or_else(|| PackError::invalid_graph(format!("too many {what}")))?;
        map.insert(k, i);
    }
    Ok(map)
}

fn len_u16(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| PackError::invalid_graph(format!("{what} too long")))
}

fn usize_of(v: u64) -> Result<usize> {
    usize::try_from(v).map_err(|_| PackError::malformed("length exceeds address space"))
}

fn slot_bits(slots: &BTreeSet<SlotRole>) -> u8 {
    slots.iter().fold(0, |acc, s| {
        acc | match s {
            SlotRole::Ok => SLOT_OK,
            SlotRole::Home => SLOT_HOME,
        }
    })
}

fn slots_from(bits: u8) -> Result<BTreeSet<SlotRole>> {
    if bits & !(SLOT_OK | SLOT_HOME) != 0 {
        return Err(PackError::malformed(format!("unknown slot bits {bits:#04x}")));
    }
    let mut out = BTreeSet::new();
    if bits & SLOT_OK != 0 {
        out.insert(SlotRole::Ok);
    }
    if bits & SLOT_HOME != 0 {
        out.insert(SlotRole::Home);
    }
    Ok(out)
}

fn control_bits(c: &ControlSettings) -> u8 {
    let mut bits = 0;
    for (on, bit) in [
        (c.wheel, CTRL_WHEEL),
        (c.ok, CTRL_OK),
        (c.home, CTRL_HOME),
        (c.pause, CTRL_PAUSE),
        (c.autoplay, CTRL_AUTOPLAY),
    ] {
        if on {
            bits |= bit;
        }
    }
    bits
}

fn controls_from(bits: u8) -> Result<ControlSettings> {
    let known = CTRL_WHEEL | CTRL_OK | CTRL_HOME | CTRL_PAUSE | CTRL_AUTOPLAY;
    if bits & !known != 0 {
        return Err(PackError::malformed(format!("unknown control bits {bits:#04x}")));
    }
    Ok(ControlSettings {
        wheel: bits & CTRL_WHEEL != 0,
        ok: bits & CTRL_OK != 0,
        home: bits & CTRL_HOME != 0,
        pause: bits & CTRL_PAUSE != 0,
        autoplay: bits & CTRL_AUTOPLAY != 0,
    })
}

/// Truncation and bad data mean a malformed container; anything else is real I/O.
fn malformed_io(e: io::Error) -> PackError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
            PackError::Malformed(e.to_string())
        }
        _ => PackError::Io(e),
    }
}

fn to_malformed(e: PackError) -> PackError {
    match e {
        PackError::InvalidGraph(msg) => PackError::Malformed(msg),
        other => other,
    }
}
