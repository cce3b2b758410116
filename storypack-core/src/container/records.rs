//! Fixed and packed records of the binary pack body.
//!
//! Indices refer to positions in the stage, action and asset tables; `NONE`
//! marks an absent reference or an absent name.

use std::io::{self, Write};

use uuid::Uuid;

use crate::sector::SECTOR_SIZE;

pub const NONE: u16 = 0xFFFF;

pub const STAGE_RECORD_LEN: usize = SECTOR_SIZE as usize;
const STAGE_NAME_OFF: usize = 32;
pub const MAX_STAGE_NAME: usize = STAGE_RECORD_LEN - STAGE_NAME_OFF;

pub const SLOT_OK: u8 = 1 << 0;
pub const SLOT_HOME: u8 = 1 << 1;

pub const CTRL_WHEEL: u8 = 1 << 0;
pub const CTRL_OK: u8 = 1 << 1;
pub const CTRL_HOME: u8 = 1 << 2;
pub const CTRL_PAUSE: u8 = 1 << 3;
pub const CTRL_AUTOPLAY: u8 = 1 << 4;

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Reference from a stage slot to an action node, by table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    pub action: u16,
    pub option: u16,
}

/// One sector per stage.
///
/// ```text
/// [0..16]   uuid
/// [16]      slot bits
/// [17]      control bits
/// [18..20]  image asset index
/// [20..22]  audio asset index
/// [22..24]  ok action index      [24..26] ok option
/// [26..28]  home action index    [28..30] home option
/// [30..32]  name length (NONE = no name)
/// [32..]    name, utf-8
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub uuid: Uuid,
    pub slots: u8,
    pub controls: u8,
    pub image: Option<u16>,
    pub audio: Option<u16>,
    pub ok: Option<SlotRef>,
    pub home: Option<SlotRef>,
    pub name: Option<String>,
}

impl StageRecord {
    pub fn encode(&self) -> io::Result<[u8; STAGE_RECORD_LEN]> {
        let mut buf = [0u8; STAGE_RECORD_LEN];
        buf[0..16].copy_from_slice(self.uuid.as_bytes());
        buf[16] = self.slots;
        buf[17] = self.controls;
        put16(&mut buf[18..20], self.image.unwrap_or(NONE));
        put16(&mut buf[20..22], self.audio.unwrap_or(NONE));
        let (ok_a, ok_o) = split_ref(self.ok);
        put16(&mut buf[22..24], ok_a);
        put16(&mut buf[24..26], ok_o);
        let (home_a, home_o) = split_ref(self.home);
        put16(&mut buf[26..28], home_a);
        put16(&mut buf[28..30], home_o);
        match &self.name {
            Some(name) => {
                let bytes = name.as_bytes();
                if bytes.len() > MAX_STAGE_NAME {
                    return Err(invalid(format!(
                        "stage name is {} bytes, record holds {MAX_STAGE_NAME}",
                        bytes.len()
                    )));
                }
                put16(&mut buf[30..32], bytes.len() as u16);
                buf[STAGE_NAME_OFF..STAGE_NAME_OFF + bytes.len()].copy_from_slice(bytes);
            }
            None => put16(&mut buf[30..32], NONE),
        }
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> io::Result<Self> {
        if buf.len() != STAGE_RECORD_LEN {
            return Err(invalid(format!(
                "stage record is {} bytes, expected {STAGE_RECORD_LEN}",
                buf.len()
            )));
        }
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&buf[0..16]);
        let name_len = get16(&buf[30..32]);
        let name = if name_len == NONE {
            None
        } else {
            let n = usize::from(name_len);
            if n > MAX_STAGE_NAME {
                return Err(invalid("stage name overruns its record"));
            }
            Some(utf8(&buf[STAGE_NAME_OFF..STAGE_NAME_OFF + n])?)
        };
        Ok(Self {
            uuid: Uuid::from_bytes(uuid),
            slots: buf[16],
            controls: buf[17],
            image: opt(get16(&buf[18..20])),
            audio: opt(get16(&buf[20..22])),
            ok: join_ref(get16(&buf[22..24]), get16(&buf[24..26])),
            home: join_ref(get16(&buf[26..28]), get16(&buf[28..30])),
            name,
        })
    }
}

/// Packed action record: `uuid | name_len u16 | name | option_count u16 | stage index u16 *`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub uuid: Uuid,
    pub name: Option<String>,
    pub options: Vec<u16>,
}

impl ActionRecord {
    pub fn encoded_len(&self) -> usize {
        16 + 2 + self.name.as_ref().map_or(0, |n| n.len()) + 2 + 2 * self.options.len()
    }

    pub fn write_to(&self, mut w: impl Write) -> io::Result<()> {
        w.write_all(self.uuid.as_bytes())?;
        write_name(&mut w, self.name.as_deref())?;
        let count = u16::try_from(self.options.len())
            .map_err(|_| invalid("too many options on one action node"))?;
        w.write_all(&count.to_le_bytes())?;
        for o in &self.options {
            w.write_all(&o.to_le_bytes())?;
        }
        Ok(())
    }

    /// Decode one record and advance `r` past it.
    pub fn read_from(r: &mut &[u8]) -> io::Result<Self> {
        let uuid = Uuid::from_bytes(take::<16>(r)?);
        let name = read_name(r)?;
        let count = u16::from_le_bytes(take::<2>(r)?);
        let mut options = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            options.push(u16::from_le_bytes(take::<2>(r)?));
        }
        Ok(Self {
            uuid,
            name,
            options,
        })
    }
}

/// Packed asset index entry: `kind u8 | reserved u8 | name_len u16 | start_sector u32 | byte_len u32 | name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub kind: u8,
    pub start_sector: u32,
    pub byte_len: u32,
    pub name: String,
}

impl AssetEntry {
    pub fn encoded_len(&self) -> usize {
        12 + self.name.len()
    }

    pub fn write_to(&self, mut w: impl Write) -> io::Result<()> {
        let name_len = u16::try_from(self.name.len())
            .map_err(|_| invalid("asset name too long"))?;
        w.write_all(&[self.kind, 0])?;
        w.write_all(&name_len.to_le_bytes())?;
        w.write_all(&self.start_sector.to_le_bytes())?;
        w.write_all(&self.byte_len.to_le_bytes())?;
        w.write_all(self.name.as_bytes())?;
        Ok(())
    }

    pub fn read_from(r: &mut &[u8]) -> io::Result<Self> {
        let [kind, _] = take::<2>(r)?;
        let name_len = usize::from(u16::from_le_bytes(take::<2>(r)?));
        let start_sector = u32::from_le_bytes(take::<4>(r)?);
        let byte_len = u32::from_le_bytes(take::<4>(r)?);
        let name = utf8(take_slice(r, name_len)?)?;
        Ok(Self {
            kind,
            start_sector,
            byte_len,
            name,
        })
    }
}

fn write_name(w: &mut impl Write, name: Option<&str>) -> io::Result<()> {
    match name {
        Some(n) => {
            let len = u16::try_from(n.len())
                .ok()
                .filter(|&l| l != NONE)
                .ok_or_else(|| invalid("node name too long"))?;
            w.write_all(&len.to_le_bytes())?;
            w.write_all(n.as_bytes())
        }
        None => w.write_all(&NONE.to_le_bytes()),
    }
}

fn read_name(r: &mut &[u8]) -> io::Result<Option<String>> {
    let len = u16::from_le_bytes(take::<2>(r)?);
    if len == NONE {
        return Ok(None);
    }
    Ok(Some(utf8(take_slice(r, usize::from(len))?)?))
}

fn take<const N: usize>(r: &mut &[u8]) -> io::Result<[u8; N]> {
    let s = take_slice(r, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(s);
    Ok(out)
}

fn take_slice<'a>(r: &mut &'a [u8], n: usize) -> io::Result<&'a [u8]> {
    if r.len() < n {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("record truncated: need {n} bytes, have {}", r.len()),
        ));
    }
    let (head, tail) = r.split_at(n);
    *r = tail;
    Ok(head)
}

fn utf8(b: &[u8]) -> io::Result<String> {
    String::from_utf8(b.to_vec()).map_err(|e| invalid(format!("invalid utf-8 name: {e}")))
}

#[inline]
fn put16(dst: &mut [u8], v: u16) {
    dst.copy_from_slice(&v.to_le_bytes());
}

#[inline]
fn get16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}

fn opt(v: u16) -> Option<u16> {
    (v != NONE).then_some(v)
}

fn split_ref(r: Option<SlotRef>) -> (u16, u16) {
    r.map_or((NONE, NONE), |r| (r.action, r.option))
}

fn join_ref(action: u16, option: u16) -> Option<SlotRef> {
    (action != NONE).then_some(SlotRef { action, option })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_record_layout() {
        let rec = StageRecord {
            uuid: Uuid::from_bytes([1; 16]),
            slots: SLOT_OK,
            controls: CTRL_WHEEL | CTRL_OK,
            image: Some(0),
            audio: None,
            ok: Some(SlotRef { action: 2, option: 1 }),
            home: None,
            name: Some("Cover".into()),
        };
        let buf = rec.encode().unwrap();
        assert_eq!(buf[16], 1);
        assert_eq!(buf[17], 0b11);
        assert_eq!(&buf[18..22], &[0, 0, 0xFF, 0xFF]);
        assert_eq!(&buf[22..26], &[2, 0, 1, 0]);
        assert_eq!(&buf[26..30], &[0xFF; 4]);
        assert_eq!(&buf[30..32], &[5, 0]);
        assert_eq!(&buf[32..37], b"Cover");
        assert_eq!(StageRecord::decode(&buf).unwrap(), rec);
    }

    #[test]
    fn oversized_stage_name_is_rejected() {
        let rec = StageRecord {
            uuid: Uuid::nil(),
            slots: 0,
            controls: 0,
            image: None,
            audio: None,
            ok: None,
            home: None,
            name: Some("x".repeat(MAX_STAGE_NAME + 1)),
        };
        assert!(rec.encode().is_err());
    }

    #[test]
    fn packed_records_advance_cursor() {
        let a = ActionRecord {
            uuid: Uuid::from_bytes([3; 16]),
            name: None,
            options: vec![0, 4],
        };
        let e = AssetEntry {
            kind: 2,
            start_sector: 12,
            byte_len: 900,
            name: "song.mp3".into(),
        };
        let mut buf = Vec::new();
        a.write_to(&mut buf).unwrap();
        e.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), a.encoded_len() + e.encoded_len());

        let mut r = &buf[..];
        assert_eq!(ActionRecord::read_from(&mut r).unwrap(), a);
        assert_eq!(AssetEntry::read_from(&mut r).unwrap(), e);
        assert!(r.is_empty());
    }

    #[test]
    fn truncated_record_is_eof() {
        let mut r: &[u8] = &[1, 2, 3];
        let err = ActionRecord::read_from(&mut r).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
