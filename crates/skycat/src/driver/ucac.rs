//! Declination-zone catalogs in the UCAC2 layout.
//!
//! Zone `z` covers declinations `[-90 + (z-1)/2, -90 + z/2)` and lives in
//! file `zNNN`, sorted by right ascension. `u2index.da` holds, for every
//! zone, 240 cumulative record counts over 1.5° RA bins; it tells each zone's
//! size, the first record of any RA bin, and the running-number offset used
//! for identifiers.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::angle::{normalize_ra, DEG_TO_RAD};
use crate::coords::Frame;
use crate::driver::{
    check_record, open_file, read_exact_at, read_file, CatalogHandle, FormatDriver, RecordSpan,
};
use crate::endian::{read_i16, read_i32, write_i16, write_i32};
use crate::entry::SourceEntry;
use crate::error::{Error, Result};
use crate::planner::SkyBox;

/// Bytes per record.
pub const RECORD_LEN: usize = 44;
/// RA bins per zone in the index.
pub const BINS_PER_ZONE: usize = 240;
/// Width of one RA bin in degrees.
pub const BIN_WIDTH: f64 = 1.5;
/// Height of one zone in degrees.
pub const ZONE_HEIGHT: f64 = 0.5;
pub const INDEX_FILE: &str = "u2index.da";

// Little-endian on disk.
const SWAP: bool = cfg!(target_endian = "big");

// ── Records ──

/// One raw zone record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UcacRecord {
    /// Milliarcseconds.
    pub ra: i32,
    pub dec: i32,
    /// Hundredths of a magnitude.
    pub mag: i16,
    pub sigra: i8,
    pub sigdec: i8,
    pub nobs: i8,
    pub epos: i8,
    pub ncat: i8,
    pub cflg: i8,
    /// Hundredths of a year after 1975.
    pub epra: i16,
    pub epdec: i16,
    /// Tenths of mas/yr, `μα·cosδ`.
    pub pmra: i32,
    pub pmdec: i32,
    pub sigpmra: i8,
    pub sigpmdec: i8,
    pub qpmra: i8,
    pub qpmdec: i8,
    pub id2m: i32,
    /// Millimagnitudes.
    pub jmag: i16,
    pub hmag: i16,
    pub kmag: i16,
    pub qual: i8,
    pub cc: i8,
}

impl UcacRecord {
    pub fn from_bytes(b: &[u8]) -> Result<UcacRecord> {
        if b.len() < RECORD_LEN {
            return Err(Error::Truncated {
                expected: RECORD_LEN,
                found: b.len(),
            });
        }
        let i8_at = |k: usize| b[k] as i8;
        Ok(UcacRecord {
            ra: read_i32(b, SWAP),
            dec: read_i32(&b[4..], SWAP),
            mag: read_i16(&b[8..], SWAP),
            sigra: i8_at(10),
            sigdec: i8_at(11),
            nobs: i8_at(12),
            epos: i8_at(13),
            ncat: i8_at(14),
            cflg: i8_at(15),
            epra: read_i16(&b[16..], SWAP),
            epdec: read_i16(&b[18..], SWAP),
            pmra: read_i32(&b[20..], SWAP),
            pmdec: read_i32(&b[24..], SWAP),
            sigpmra: i8_at(28),
            sigpmdec: i8_at(29),
            qpmra: i8_at(30),
            qpmdec: i8_at(31),
            id2m: read_i32(&b[32..], SWAP),
            jmag: read_i16(&b[36..], SWAP),
            hmag: read_i16(&b[38..], SWAP),
            kmag: read_i16(&b[40..], SWAP),
            qual: i8_at(42),
            cc: i8_at(43),
        })
    }

    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut b = [0u8; RECORD_LEN];
        write_i32(&mut b, self.ra, SWAP);
        write_i32(&mut b[4..], self.dec, SWAP);
        write_i16(&mut b[8..], self.mag, SWAP);
        for (k, v) in [self.sigra, self.sigdec, self.nobs, self.epos, self.ncat, self.cflg]
            .into_iter()
            .enumerate()
        {
            b[10 + k] = v as u8;
        }
        write_i16(&mut b[16..], self.epra, SWAP);
        write_i16(&mut b[18..], self.epdec, SWAP);
        write_i32(&mut b[20..], self.pmra, SWAP);
        write_i32(&mut b[24..], self.pmdec, SWAP);
        for (k, v) in [self.sigpmra, self.sigpmdec, self.qpmra, self.qpmdec]
            .into_iter()
            .enumerate()
        {
            b[28 + k] = v as u8;
        }
        write_i32(&mut b[32..], self.id2m, SWAP);
        write_i16(&mut b[36..], self.jmag, SWAP);
        write_i16(&mut b[38..], self.hmag, SWAP);
        write_i16(&mut b[40..], self.kmag, SWAP);
        b[42] = self.qual as u8;
        b[43] = self.cc as u8;
        b
    }

    /// Convert to a catalog entry with the given running number.
    pub fn to_entry(&self, id: u64) -> SourceEntry {
        let ra = normalize_ra(self.ra as f64 / 3_600_000.0);
        let dec = self.dec as f64 / 3_600_000.0;
        let mut entry = SourceEntry::new(id as f64, ra, dec, Frame::j2000());
        entry.mags = vec![
            self.mag as f64 / 100.0,
            self.jmag as f64 / 1000.0,
            self.hmag as f64 / 1000.0,
            self.kmag as f64 / 1000.0,
        ];
        let cos_dec = libm::cos(dec * DEG_TO_RAD);
        let pm_ra = self.pmra as f64 / 36_000_000.0;
        entry.pm_ra = if cos_dec > 0.0 { pm_ra / cos_dec } else { 0.0 };
        entry.pm_dec = self.pmdec as f64 / 36_000_000.0;
        entry.peak = self.nobs as i32;
        entry
    }
}

// ── Index ──

/// Parse `u2index.da` into per-zone cumulative bin counts.
pub fn parse_index(text: &str) -> Result<Vec<Vec<u64>>> {
    let values = text
        .split_whitespace()
        .map(|t| {
            t.parse::<u64>()
                .map_err(|_| Error::malformed(format!("bad zone index value {t:?}")))
        })
        .collect::<Result<Vec<u64>>>()?;
    if values.is_empty() || values.len() % BINS_PER_ZONE != 0 {
        return Err(Error::malformed(format!(
            "zone index holds {} values, not a multiple of {BINS_PER_ZONE}",
            values.len()
        )));
    }
    let zones: Vec<Vec<u64>> = values.chunks(BINS_PER_ZONE).map(<[u64]>::to_vec).collect();
    if zones.iter().any(|bins| bins.windows(2).any(|w| w[1] < w[0])) {
        return Err(Error::malformed("zone index counts must not decrease"));
    }
    Ok(zones)
}

/// Cumulative bin counts for a zone whose records have these (sorted) RAs.
pub fn cumulative_bins(ras: &[f64]) -> Vec<u64> {
    let mut counts = vec![0u64; BINS_PER_ZONE];
    for &ra in ras {
        counts[ra_bin(ra)] += 1;
    }
    let mut total = 0;
    for c in counts.iter_mut() {
        total += *c;
        *c = total;
    }
    counts
}

/// Render per-zone cumulative counts as an index file.
pub fn format_index(zones: &[Vec<u64>]) -> String {
    let mut out = String::new();
    for bins in zones {
        for line in bins.chunks(10) {
            let row: Vec<String> = line.iter().map(|v| v.to_string()).collect();
            out.push_str(&row.join(" "));
            out.push('\n');
        }
    }
    out
}

fn ra_bin(ra: f64) -> usize {
    ((normalize_ra(ra) / BIN_WIDTH) as usize).min(BINS_PER_ZONE - 1)
}

/// Zone holding declination `dec`.
pub fn zone_of(dec: f64) -> u32 {
    (((dec + 90.0) / ZONE_HEIGHT).floor() as i64 + 1).max(1) as u32
}

// ── Driver ──

/// A UCAC2-style zone catalog rooted at one directory.
#[derive(Debug, Clone)]
pub struct UcacDriver {
    name: String,
    root: PathBuf,
    bins: Vec<Vec<u64>>,
    /// Records before each zone, for running-number identifiers.
    offsets: Vec<u64>,
}

impl UcacDriver {
    pub fn open(name: String, root: &Path) -> Result<UcacDriver> {
        let index_path = root.join(INDEX_FILE);
        let bytes = read_file(&index_path)?;
        let text = String::from_utf8_lossy(&bytes);
        let bins = parse_index(&text)?;

        let mut offsets = Vec::with_capacity(bins.len());
        let mut total = 0;
        for zone in &bins {
            offsets.push(total);
            total += zone.last().copied().unwrap_or(0);
        }
        debug!(root = %root.display(), zones = bins.len(), records = total, "read zone index");

        Ok(UcacDriver {
            name,
            root: root.to_path_buf(),
            bins,
            offsets,
        })
    }

    pub fn zone_count(&self) -> u32 {
        self.bins.len() as u32
    }

    pub fn zone_path(&self, zone: u32) -> PathBuf {
        self.root.join(format!("z{zone:03}"))
    }

    fn zone_len(&self, zone: u32) -> Option<u64> {
        self.bins
            .get(zone.checked_sub(1)? as usize)
            .and_then(|b| b.last().copied())
    }
}

impl FormatDriver for UcacDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn zones(&self, limits: &SkyBox) -> Vec<u32> {
        let last = self.zone_count();
        if last == 0 {
            return Vec::new();
        }
        let z1 = zone_of(limits.dec_min).min(last);
        let z2 = zone_of(limits.dec_max).min(last);
        (z1..=z2).collect()
    }

    fn open_zone(&self, zone: u32) -> Result<Box<dyn CatalogHandle>> {
        let count = self
            .zone_len(zone)
            .ok_or_else(|| Error::NotFound(format!("zone {zone} of {}", self.name)))?;
        let path = self.zone_path(zone);
        let file = open_file(&path)?;
        debug!(path = %path.display(), zone, count, "opened zone");
        Ok(Box::new(UcacZone {
            file,
            count,
            first_id: self.offsets[zone as usize - 1],
            bins: self.bins[zone as usize - 1].clone(),
        }))
    }

    fn locate_id(&self, id: f64) -> Option<(u32, u64)> {
        let n = id.round();
        if (id - n).abs() > 1e-7 || n < 1.0 {
            return None;
        }
        let n = n as u64;
        self.offsets.iter().enumerate().find_map(|(k, &offset)| {
            let len = self.bins[k].last().copied().unwrap_or(0);
            (n > offset && n <= offset + len).then_some((k as u32 + 1, n - offset))
        })
    }

    fn id_zones(&self, id: f64) -> Vec<u32> {
        self.locate_id(id).map(|(z, _)| z).into_iter().collect()
    }
}

/// One open zone file.
#[derive(Debug)]
pub struct UcacZone {
    file: File,
    count: u64,
    first_id: u64,
    bins: Vec<u64>,
}

impl UcacZone {
    fn raw(&mut self, num: u64, buf: &mut [u8]) -> Result<()> {
        check_record(num, self.count)?;
        read_exact_at(&mut self.file, (num - 1) * RECORD_LEN as u64, buf)
    }
}

impl CatalogHandle for UcacZone {
    fn len(&self) -> u64 {
        self.count
    }

    fn read(&mut self, num: u64) -> Result<SourceEntry> {
        let mut buf = [0u8; RECORD_LEN];
        self.raw(num, &mut buf)?;
        Ok(UcacRecord::from_bytes(&buf)?.to_entry(self.first_id + num))
    }

    fn ra(&mut self, num: u64) -> Result<f64> {
        let mut buf = [0u8; 4];
        self.raw(num, &mut buf)?;
        Ok(normalize_ra(read_i32(&buf, SWAP) as f64 / 3_600_000.0))
    }

    fn is_ra_sorted(&self) -> bool {
        true
    }

    fn spans(&mut self, ra_min: f64, ra_max: f64) -> Result<Vec<RecordSpan>> {
        let b1 = ra_bin(ra_min);
        let b2 = if ra_max >= 360.0 {
            BINS_PER_ZONE - 1
        } else {
            ra_bin(ra_max)
        };
        let first = if b1 == 0 { 1 } else { self.bins[b1 - 1] + 1 };
        let last = self.bins[b2].min(self.count);
        let span = RecordSpan::new(first, last);
        Ok(if span.is_empty() { Vec::new() } else { vec![span] })
    }

    fn find_id(&mut self, id: f64, tolerance: f64) -> Result<Option<u64>> {
        let n = id.round();
        if (id - n).abs() > tolerance || n <= self.first_id as f64 {
            return Ok(None);
        }
        let num = n as u64 - self.first_id;
        Ok((num <= self.count).then_some(num))
    }
}
