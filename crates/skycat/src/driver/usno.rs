//! USNO-A/SA and USNO-B zone catalogs.
//!
//! Both split the sky into bands of south polar distance, one `.cat` file of
//! RA-sorted records per band plus an `.acc` file locating each quarter hour
//! of right ascension. USNO-A bands are 7.5° wide with 12-byte big-endian
//! records; USNO-B bands are 0.1° wide with 80-byte little-endian records.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::angle::{normalize_ra, DEG_TO_RAD};
use crate::coords::Frame;
use crate::driver::{
    check_record, file_len, open_file, read_exact_at, read_file, CatalogHandle, FormatDriver,
    RecordSpan,
};
use crate::endian::{be_words, le_words, words_to_be, words_to_le};
use crate::entry::{SourceEntry, NO_MAGNITUDE};
use crate::error::{Error, Result};
use crate::planner::SkyBox;

/// Lines in an `.acc` file: one per 0.25 h of RA.
pub const ACC_LINES: usize = 96;
/// Width of one `.acc` line in degrees of RA.
pub const ACC_WIDTH: f64 = 3.75;

/// Which USNO zone layout a catalog uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsnoLayout {
    /// USNO-A1.0, A2.0, SA1.0, SA2.0.
    A,
    /// USNO-B1.0.
    B,
}

impl UsnoLayout {
    pub fn record_len(self) -> usize {
        match self {
            UsnoLayout::A => 12,
            UsnoLayout::B => 80,
        }
    }

    /// Number of zones covering the sky.
    pub fn zone_count(self) -> u32 {
        match self {
            UsnoLayout::A => 24,
            UsnoLayout::B => 1800,
        }
    }

    /// Zone holding a given declination.
    pub fn zone_of(self, dec: f64) -> u32 {
        let spd = (dec + 90.0).clamp(0.0, 180.0);
        let zone = match self {
            UsnoLayout::A => (spd / 7.5).floor(),
            UsnoLayout::B => (spd * 10.0 + 1e-9).floor(),
        };
        (zone as u32).min(self.zone_count() - 1)
    }

    /// The `NNNN` in a zone's file names; also the integer part of its ids.
    pub fn zone_number(self, zone: u32) -> u32 {
        match self {
            UsnoLayout::A => zone * 75,
            UsnoLayout::B => zone,
        }
    }

    fn id_scale(self) -> f64 {
        match self {
            UsnoLayout::A => 1e8,
            UsnoLayout::B => 1e7,
        }
    }

    /// Path of a zone file without extension.
    pub fn zone_stem(self, root: &Path, zone: u32) -> PathBuf {
        let nnnn = self.zone_number(zone);
        match self {
            UsnoLayout::A => root.join(format!("zone{nnnn:04}")),
            UsnoLayout::B => root
                .join(format!("b{:03}", nnnn / 10))
                .join(format!("b{nnnn:04}")),
        }
    }

    /// Identifier of record `num` in `zone`.
    pub fn id(self, zone: u32, num: u64) -> f64 {
        self.zone_number(zone) as f64 + num as f64 / self.id_scale()
    }
}

// ── Records ──

/// A USNO-A record: position in 0.01″ and a packed magnitude word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsnoARecord {
    pub ra: i32,
    pub spd: i32,
    pub magetc: i32,
}

impl UsnoARecord {
    pub fn from_bytes(b: &[u8]) -> UsnoARecord {
        let [ra, spd, magetc] = be_words::<3>(b);
        UsnoARecord { ra, spd, magetc }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        words_to_be(&[self.ra, self.spd, self.magetc])
    }

    /// Pack magnitudes and plate into a `magetc` word.
    pub fn pack_magetc(blue: f64, red: f64, plate: i32, flagged: bool) -> i32 {
        let word = plate * 1_000_000
            + (blue * 10.0).round() as i32 * 1000
            + (red * 10.0).round() as i32;
        if flagged {
            -word
        } else {
            word
        }
    }

    pub fn red(&self) -> f64 {
        (self.magetc.abs() % 1000) as f64 / 10.0
    }

    pub fn blue(&self) -> f64 {
        (self.magetc.abs() / 1000 % 1000) as f64 / 10.0
    }

    pub fn plate(&self) -> i32 {
        self.magetc.abs() / 1_000_000 % 1000
    }

    pub fn flagged(&self) -> bool {
        self.magetc < 0
    }

    /// Entry for record `id`; a flagged record keeps its plate as a negative peak.
    pub fn to_entry(&self, id: f64) -> SourceEntry {
        let ra = normalize_ra(self.ra as f64 / 360_000.0);
        let dec = self.spd as f64 / 360_000.0 - 90.0;
        let mut entry = SourceEntry::new(id, ra, dec, Frame::j2000());
        entry.mags = vec![self.blue(), self.red()];
        entry.peak = if self.flagged() {
            -self.plate()
        } else {
            self.plate()
        };
        entry
    }
}

/// A USNO-B record: 20 packed 32-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsnoBRecord {
    pub words: [i32; 20],
}

impl UsnoBRecord {
    pub fn from_bytes(b: &[u8]) -> UsnoBRecord {
        UsnoBRecord {
            words: le_words::<20>(b),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        words_to_le(&self.words)
    }

    /// Proper motion in RA, mas/yr.
    pub fn pm_ra_mas(&self) -> f64 {
        ((self.words[2] % 10_000) * 2 - 10_000) as f64
    }

    /// Proper motion in Dec, mas/yr.
    pub fn pm_dec_mas(&self) -> f64 {
        ((self.words[2] / 10_000 % 10_000) * 2 - 10_000) as f64
    }

    /// Mean epoch of the observations.
    pub fn epoch(&self) -> f64 {
        1950.0 + (self.words[4] / 1_000_000 % 1000) as f64 / 10.0
    }

    /// Magnitude `k` (0 = B1, 1 = R1, 2 = B2, 3 = R2, 4 = I), if measured.
    pub fn mag(&self, k: usize) -> Option<f64> {
        let v = self.words[5 + k] % 10_000;
        (v != 0).then(|| v as f64 / 100.0)
    }

    /// Survey field of magnitude `k`.
    pub fn field(&self, k: usize) -> i32 {
        self.words[5 + k] / 10_000 % 1000
    }

    pub fn to_entry(&self, id: f64) -> SourceEntry {
        let ra = normalize_ra(self.words[0] as f64 / 360_000.0);
        let dec = self.words[1] as f64 / 360_000.0 - 90.0;
        let mut entry = SourceEntry::new(id, ra, dec, Frame::j2000());
        let cos_dec = libm::cos(dec * DEG_TO_RAD);
        let pm_ra = self.pm_ra_mas() / 3_600_000.0;
        entry.pm_ra = if cos_dec > 0.0 { pm_ra / cos_dec } else { 0.0 };
        entry.pm_dec = self.pm_dec_mas() / 3_600_000.0;
        entry.mags = (0..5).map(|k| self.mag(k).unwrap_or(NO_MAGNITUDE)).collect();
        entry.peak = (0..5)
            .find(|&k| self.mag(k).is_some())
            .map(|k| self.field(k))
            .unwrap_or(0);
        entry
    }
}

// ── Accelerator index ──

/// One `.acc` line: the records of a quarter hour of RA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccLine {
    pub ra_hours: f64,
    /// First record (1-based).
    pub first: u64,
    pub count: u64,
}

pub fn parse_acc(text: &str) -> Result<Vec<AccLine>> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let mut parts = line.split_whitespace();
            let mut next = || parts.next().and_then(|p| p.parse::<f64>().ok());
            match (next(), next(), next()) {
                (Some(ra_hours), Some(first), Some(count)) => Ok(AccLine {
                    ra_hours,
                    first: first as u64,
                    count: count as u64,
                }),
                _ => Err(Error::malformed(format!("bad accelerator line {line:?}"))),
            }
        })
        .collect()
}

/// Build `.acc` text for a zone whose records have these sorted RAs.
pub fn format_acc(ras: &[f64]) -> String {
    let mut counts = [0u64; ACC_LINES];
    for &ra in ras {
        counts[acc_line(ra)] += 1;
    }
    let mut out = String::new();
    let mut first = 1;
    for (k, &count) in counts.iter().enumerate() {
        out.push_str(&format!("{:5.2} {first:8} {count:8}\n", k as f64 * 0.25));
        first += count;
    }
    out
}

fn acc_line(ra: f64) -> usize {
    ((normalize_ra(ra) / ACC_WIDTH) as usize).min(ACC_LINES - 1)
}

// ── Driver ──

/// A USNO catalog rooted at one directory.
#[derive(Debug, Clone)]
pub struct UsnoDriver {
    name: String,
    root: PathBuf,
    layout: UsnoLayout,
}

impl UsnoDriver {
    pub fn new(name: String, root: PathBuf, layout: UsnoLayout) -> UsnoDriver {
        UsnoDriver { name, root, layout }
    }

    pub fn layout(&self) -> UsnoLayout {
        self.layout
    }
}

impl FormatDriver for UsnoDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn zones(&self, limits: &SkyBox) -> Vec<u32> {
        let z1 = self.layout.zone_of(limits.dec_min);
        let z2 = self.layout.zone_of(limits.dec_max);
        (z1..=z2).collect()
    }

    fn open_zone(&self, zone: u32) -> Result<Box<dyn CatalogHandle>> {
        if zone >= self.layout.zone_count() {
            return Err(Error::NotFound(format!("zone {zone} of {}", self.name)));
        }
        Ok(Box::new(UsnoZone::open(&self.root, self.layout, zone)?))
    }

    fn locate_id(&self, id: f64) -> Option<(u32, u64)> {
        if id < 0.0 {
            return None;
        }
        let whole = id.floor();
        let num = ((id - whole) * self.layout.id_scale()).round() as u64;
        let zone = match self.layout {
            UsnoLayout::A => {
                let w = whole as u32;
                if w % 75 != 0 {
                    return None;
                }
                w / 75
            }
            UsnoLayout::B => whole as u32,
        };
        (zone < self.layout.zone_count() && num >= 1).then_some((zone, num))
    }

    fn id_zones(&self, id: f64) -> Vec<u32> {
        self.locate_id(id).map(|(z, _)| z).into_iter().collect()
    }
}

/// One open USNO zone.
#[derive(Debug)]
pub struct UsnoZone {
    file: File,
    layout: UsnoLayout,
    zone: u32,
    count: u64,
    acc: Option<Vec<AccLine>>,
    buf: Vec<u8>,
}

impl UsnoZone {
    pub fn open(root: &Path, layout: UsnoLayout, zone: u32) -> Result<UsnoZone> {
        let stem = layout.zone_stem(root, zone);
        let cat = stem.with_extension("cat");
        let file = open_file(&cat)?;
        let count = file_len(&file, &cat)? / layout.record_len() as u64;

        let acc_path = stem.with_extension("acc");
        let acc = match read_file(&acc_path) {
            Ok(bytes) => Some(parse_acc(&String::from_utf8_lossy(&bytes))?),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        debug!(
            path = %cat.display(),
            zone,
            count,
            indexed = acc.is_some(),
            "opened USNO zone"
        );
        Ok(UsnoZone {
            file,
            layout,
            zone,
            count,
            acc,
            buf: vec![0u8; layout.record_len()],
        })
    }
}

impl CatalogHandle for UsnoZone {
    fn len(&self) -> u64 {
        self.count
    }

    fn read(&mut self, num: u64) -> Result<SourceEntry> {
        check_record(num, self.count)?;
        let len = self.layout.record_len() as u64;
        read_exact_at(&mut self.file, (num - 1) * len, &mut self.buf)?;
        let id = self.layout.id(self.zone, num);
        Ok(match self.layout {
            UsnoLayout::A => UsnoARecord::from_bytes(&self.buf).to_entry(id),
            UsnoLayout::B => UsnoBRecord::from_bytes(&self.buf).to_entry(id),
        })
    }

    fn ra(&mut self, num: u64) -> Result<f64> {
        check_record(num, self.count)?;
        let len = self.layout.record_len() as u64;
        let mut raw = [0u8; 4];
        read_exact_at(&mut self.file, (num - 1) * len, &mut raw)?;
        let [ra] = match self.layout {
            UsnoLayout::A => be_words::<1>(&raw),
            UsnoLayout::B => le_words::<1>(&raw),
        };
        Ok(normalize_ra(ra as f64 / 360_000.0))
    }

    fn is_ra_sorted(&self) -> bool {
        true
    }

    fn spans(&mut self, ra_min: f64, ra_max: f64) -> Result<Vec<RecordSpan>> {
        let acc = match &self.acc {
            Some(acc) if acc.len() >= ACC_LINES => acc,
            _ => return Ok(RecordSpan::whole(self.count).into_iter().collect()),
        };
        let k1 = acc_line(ra_min);
        let k2 = if ra_max >= 360.0 {
            ACC_LINES - 1
        } else {
            acc_line(ra_max)
        };
        let first = acc[k1].first.max(1);
        let last = (acc[k2].first + acc[k2].count).saturating_sub(1).min(self.count);
        let span = RecordSpan::new(first, last);
        Ok(if span.is_empty() { Vec::new() } else { vec![span] })
    }

    fn find_id(&mut self, id: f64, tolerance: f64) -> Result<Option<u64>> {
        let num = ((id - self.layout.zone_number(self.zone) as f64) * self.layout.id_scale()).round();
        if num < 1.0 || num > self.count as f64 {
            return Ok(None);
        }
        let num = num as u64;
        let matches = (self.layout.id(self.zone, num) - id).abs() <= tolerance;
        Ok(matches.then_some(num))
    }
}
