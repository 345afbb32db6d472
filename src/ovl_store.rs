//! Binary overlap-store records.
//!
//! A store file is a flat array of fixed 24-byte little-endian records:
//!
//! | bytes  | field        |
//! |--------|--------------|
//! | 0..4   | a_iid u32    |
//! | 4..8   | b_iid u32    |
//! | 8..12  | a_hang i32   |
//! | 12..16 | b_hang i32   |
//! | 16..18 | corr_erate   |
//! | 18..20 | orig_erate   |
//! | 20..24 | flags (bit 0 = flipped) |
//!
//! Error rates are stored in thousandths.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::classify::{hang_kind, Orientation, RawOverlap};
use crate::edge::{ContainmentKind, EdgeKind};
use crate::error::{GraphError, Result};

pub const RECORD_SIZE: usize = 24;
const FLAG_FLIPPED: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreRecord {
    pub a_iid: u32,
    pub b_iid: u32,
    pub a_hang: i32,
    pub b_hang: i32,
    pub corr_erate: u16,
    pub orig_erate: u16,
    pub flipped: bool,
}

pub fn encode_error_rate(rate: f32) -> u16 {
    (rate * 1000.0).round().clamp(0.0, u16::MAX as f32) as u16
}

pub fn decode_error_rate(encoded: u16) -> f32 {
    encoded as f32 / 1000.0
}

impl StoreRecord {
    pub fn corrected_error_rate(&self) -> f32 {
        decode_error_rate(self.corr_erate)
    }

    pub fn original_error_rate(&self) -> f32 {
        decode_error_rate(self.orig_erate)
    }

    pub fn to_raw(&self) -> RawOverlap {
        let orientation = if self.flipped {
            Orientation::Innie
        } else {
            Orientation::Normal
        };
        RawOverlap {
            quality: self.corrected_error_rate(),
            ..RawOverlap::new(self.a_iid, self.b_iid, self.a_hang, self.b_hang, orientation)
        }
    }

    /// The a fragment lies inside the b fragment. The store also holds the
    /// same overlap seen from b, which is the copy that gets used.
    pub fn is_from_contained(&self) -> bool {
        let raw = self.to_raw();
        let (ahg, bhg) = if raw.is_improper() {
            // unrepresentable hangs are left for add_overlap to skip
            match (self.b_hang.checked_neg(), self.a_hang.checked_neg()) {
                (Some(ahg), Some(bhg)) => (ahg, bhg),
                _ => return false,
            }
        } else {
            (self.a_hang, self.b_hang)
        };
        hang_kind(ahg, bhg) == EdgeKind::Containment(ContainmentKind::FromContained)
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.a_iid.to_le_bytes());
        buf[4..8].copy_from_slice(&self.b_iid.to_le_bytes());
        buf[8..12].copy_from_slice(&self.a_hang.to_le_bytes());
        buf[12..16].copy_from_slice(&self.b_hang.to_le_bytes());
        buf[16..18].copy_from_slice(&self.corr_erate.to_le_bytes());
        buf[18..20].copy_from_slice(&self.orig_erate.to_le_bytes());
        let flags = if self.flipped { FLAG_FLIPPED } else { 0 };
        buf[20..24].copy_from_slice(&flags.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != RECORD_SIZE {
            return Err(GraphError::InvalidRecord(format!(
                "overlap-store record of {} bytes",
                buf.len()
            )));
        }
        let u32_at = |i: usize| u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        let u16_at = |i: usize| u16::from_le_bytes([buf[i], buf[i + 1]]);
        Ok(StoreRecord {
            a_iid: u32_at(0),
            b_iid: u32_at(4),
            a_hang: u32_at(8) as i32,
            b_hang: u32_at(12) as i32,
            corr_erate: u16_at(16),
            orig_erate: u16_at(18),
            flipped: u32_at(20) & FLAG_FLIPPED != 0,
        })
    }
}

pub fn write_records<W: Write>(out: &mut W, records: &[StoreRecord]) -> std::io::Result<()> {
    for record in records {
        out.write_all(&record.to_bytes())?;
    }
    Ok(())
}

/// Read-only, memory-mapped overlap-store file.
pub struct OverlapStoreFile {
    path: PathBuf,
    mmap: Option<Mmap>,
}

impl OverlapStoreFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len() as usize;
        if len % RECORD_SIZE != 0 {
            return Err(GraphError::InvalidRecord(format!(
                "{} is {} bytes, not a whole number of records",
                path.display(),
                len
            )));
        }
        let mmap = if len == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&file)? })
        };
        log::info!(
            "Mapped overlap store {} ({} records)",
            path.display(),
            len / RECORD_SIZE
        );
        Ok(Self { path, mmap })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mmap.as_ref().map_or(0, |m| m.len() / RECORD_SIZE)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<StoreRecord> {
        let mmap = self.mmap.as_ref()?;
        let start = index.checked_mul(RECORD_SIZE)?;
        let bytes = mmap.get(start..start + RECORD_SIZE)?;
        StoreRecord::from_bytes(bytes).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = StoreRecord> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}
