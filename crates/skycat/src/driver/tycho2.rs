//! Tycho-2: a single fixed-length-line catalog split into sky regions.
//!
//! `index.dat` lists, for each region, the first record in `catalog.dat`
//! and the region's RA/Dec bounds; a sentinel line closes the list, so region
//! `k` holds records `index[k].rec_t2 ..= index[k+1].rec_t2 - 1`. The first
//! part of a Tycho identifier is its region number.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::angle::{normalize_ra, DEG_TO_RAD};
use crate::coords::Frame;
use crate::driver::{
    check_record, file_len, open_file, read_exact_at, read_file, CatalogHandle, FormatDriver,
    RecordSpan,
};
use crate::entry::{SourceEntry, NO_MAGNITUDE};
use crate::error::{Error, Result};
use crate::planner::SkyBox;
use crate::tokens::{tokenize_with, Separators};

pub const CATALOG_FILE: &str = "catalog.dat";
pub const INDEX_FILE: &str = "index.dat";

/// Catalog field positions.
mod field {
    pub const TYC: usize = 0;
    pub const PFLAG: usize = 1;
    pub const RA_MEAN: usize = 2;
    pub const DEC_MEAN: usize = 3;
    pub const PM_RA: usize = 4;
    pub const PM_DEC: usize = 5;
    pub const BT: usize = 17;
    pub const VT: usize = 19;
    pub const HIP: usize = 23;
    pub const RA_OBS: usize = 24;
    pub const DEC_OBS: usize = 25;
    pub const EPOCH_RA: usize = 26;
    pub const COUNT: usize = 28;
}

/// One line of `index.dat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    /// First catalog record of the region (1-based).
    pub first: u64,
    pub count: u64,
    pub ra_min: f64,
    pub ra_max: f64,
    pub dec_min: f64,
    pub dec_max: f64,
}

impl Region {
    fn overlaps(&self, limits: &SkyBox) -> bool {
        if self.dec_max < limits.dec_min || self.dec_min > limits.dec_max {
            return false;
        }
        limits
            .ra_intervals()
            .iter()
            .any(|&(lo, hi)| self.ra_max >= lo && self.ra_min <= hi)
    }
}

/// Parse `index.dat` into regions. The sentinel line closes the last region.
pub fn parse_index(text: &str) -> Result<Vec<Region>> {
    let mut rows = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let tokens = tokenize_with(line, &Separators::Bar)?;
        let num = |k: usize| {
            tokens
                .get_token(k as isize + 1)
                .and_then(|t| t.trim().parse::<f64>().ok())
        };
        let first = num(0)
            .filter(|v| *v >= 1.0)
            .ok_or_else(|| Error::malformed(format!("bad Tycho-2 index line {line:?}")))?;
        // The sentinel carries only the record numbers.
        rows.push((first as u64, [num(2), num(3), num(4), num(5)]));
    }
    if rows.len() < 2 {
        return Err(Error::malformed("Tycho-2 index needs at least one region and a sentinel"));
    }

    let mut regions = Vec::with_capacity(rows.len() - 1);
    for pair in rows.windows(2) {
        let (first, bounds) = pair[0];
        let next = pair[1].0;
        if next < first {
            return Err(Error::malformed("Tycho-2 index record numbers decrease"));
        }
        let [Some(ra_min), Some(ra_max), Some(dec_min), Some(dec_max)] = bounds else {
            return Err(Error::malformed(format!(
                "Tycho-2 index region starting at record {first} has no bounds"
            )));
        };
        regions.push(Region {
            first,
            count: next - first,
            ra_min,
            ra_max,
            dec_min,
            dec_max,
        });
    }
    Ok(regions)
}

/// Decode one `catalog.dat` line.
pub fn decode_line(line: &str) -> Result<SourceEntry> {
    let tokens = tokenize_with(line, &Separators::Bar)?;
    if tokens.len() < field::COUNT {
        return Err(Error::malformed(format!(
            "Tycho-2 record has {} fields, expected {}",
            tokens.len(),
            field::COUNT
        )));
    }
    let get = |k: usize| tokens.get_token(k as isize + 1).unwrap_or("").trim();
    let number = |k: usize| -> Result<Option<f64>> {
        let tok = get(k);
        if tok.is_empty() {
            return Ok(None);
        }
        tok.parse::<f64>()
            .map(Some)
            .map_err(|_| Error::malformed(format!("Tycho-2 field {k} is not a number: {tok:?}")))
    };
    let required = |k: usize| -> Result<f64> {
        number(k)?.ok_or_else(|| Error::malformed(format!("Tycho-2 field {k} is empty")))
    };

    let tyc: Vec<f64> = get(field::TYC)
        .split_whitespace()
        .map(|p| p.parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| Error::malformed(format!("bad TYC number {:?}", get(field::TYC))))?;
    let [tyc1, tyc2, tyc3] = tyc[..] else {
        return Err(Error::malformed(format!("bad TYC number {:?}", get(field::TYC))));
    };
    let id = tyc1 + tyc2 / 1e5 + tyc3 / 1e6;

    let mut entry = if get(field::PFLAG) == "X" {
        let ra = required(field::RA_OBS)?;
        let dec = required(field::DEC_OBS)?;
        let epoch = 1990.0 + number(field::EPOCH_RA)?.unwrap_or(0.0);
        SourceEntry::new(id, normalize_ra(ra), dec, Frame::j2000().at_epoch(epoch))
    } else {
        let ra = required(field::RA_MEAN)?;
        let dec = required(field::DEC_MEAN)?;
        let mut e = SourceEntry::new(id, normalize_ra(ra), dec, Frame::j2000());
        let cos_dec = libm::cos(dec * DEG_TO_RAD);
        let pm_ra = number(field::PM_RA)?.unwrap_or(0.0) / 3_600_000.0;
        e.pm_ra = if cos_dec > 0.0 { pm_ra / cos_dec } else { 0.0 };
        e.pm_dec = number(field::PM_DEC)?.unwrap_or(0.0) / 3_600_000.0;
        e
    };

    entry.mags = vec![
        number(field::BT)?.unwrap_or(NO_MAGNITUDE),
        number(field::VT)?.unwrap_or(NO_MAGNITUDE),
    ];
    entry.peak = get(field::HIP)
        .split_whitespace()
        .next()
        .and_then(|h| h.parse::<i32>().ok())
        .unwrap_or(0);
    Ok(entry)
}

// ── Driver ──

/// Tycho-2 catalog directory holding `catalog.dat` and `index.dat`.
#[derive(Debug, Clone)]
pub struct Tycho2Driver {
    name: String,
    catalog: PathBuf,
    regions: Vec<Region>,
    line_len: u64,
}

impl Tycho2Driver {
    pub fn open(name: String, root: &Path) -> Result<Tycho2Driver> {
        let index = read_file(&root.join(INDEX_FILE))?;
        let regions = parse_index(&String::from_utf8_lossy(&index))?;

        let catalog = root.join(CATALOG_FILE);
        let mut file = open_file(&catalog)?;
        let len = file_len(&file, &catalog)?;
        let mut head = vec![0u8; len.min(1024) as usize];
        read_exact_at(&mut file, 0, &mut head)?;
        let line_len = head
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| p as u64 + 1)
            .ok_or_else(|| Error::malformed("Tycho-2 catalog has no complete line"))?;

        debug!(
            root = %root.display(),
            regions = regions.len(),
            records = len / line_len,
            line_len,
            "opened Tycho-2 index"
        );
        Ok(Tycho2Driver {
            name,
            catalog,
            regions,
            line_len,
        })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}

impl FormatDriver for Tycho2Driver {
    fn name(&self) -> &str {
        &self.name
    }

    fn zones(&self, limits: &SkyBox) -> Vec<u32> {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.overlaps(limits))
            .map(|(k, _)| k as u32 + 1)
            .collect()
    }

    fn open_zone(&self, zone: u32) -> Result<Box<dyn CatalogHandle>> {
        let region = zone
            .checked_sub(1)
            .and_then(|k| self.regions.get(k as usize))
            .copied()
            .ok_or_else(|| Error::NotFound(format!("Tycho-2 region {zone}")))?;
        let file = open_file(&self.catalog)?;
        Ok(Box::new(Tycho2Region {
            file,
            region,
            line_len: self.line_len,
            buf: vec![0u8; self.line_len as usize],
        }))
    }

    fn id_zones(&self, id: f64) -> Vec<u32> {
        let region = id.floor();
        if region >= 1.0 && region <= self.regions.len() as f64 {
            vec![region as u32]
        } else {
            Vec::new()
        }
    }
}

/// The records of one Tycho-2 region.
#[derive(Debug)]
pub struct Tycho2Region {
    file: File,
    region: Region,
    line_len: u64,
    buf: Vec<u8>,
}

impl CatalogHandle for Tycho2Region {
    fn len(&self) -> u64 {
        self.region.count
    }

    fn read(&mut self, num: u64) -> Result<SourceEntry> {
        check_record(num, self.region.count)?;
        let record = self.region.first + num - 1;
        read_exact_at(&mut self.file, (record - 1) * self.line_len, &mut self.buf)?;
        let line = std::str::from_utf8(&self.buf)
            .map_err(|_| Error::malformed(format!("Tycho-2 record {record} is not text")))?;
        decode_line(line)
    }

    fn is_ra_sorted(&self) -> bool {
        false
    }

    fn spans(&mut self, ra_min: f64, ra_max: f64) -> Result<Vec<RecordSpan>> {
        let r = &self.region;
        if r.ra_max < ra_min || r.ra_min > ra_max {
            return Ok(Vec::new());
        }
        Ok(RecordSpan::whole(r.count).into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a catalog line with the given fields, padded to `width`.
    fn line(fields: &[(usize, &str)], width: usize) -> String {
        let mut cols = vec![String::new(); field::COUNT + 4];
        for &(k, v) in fields {
            cols[k] = v.to_string();
        }
        let mut s = cols.join("|");
        while s.len() < width - 1 {
            s.push(' ');
        }
        s.push('\n');
        s
    }

    #[test]
    fn decode_mean_position() {
        let l = line(
            &[
                (0, "0001 00008 1"),
                (2, "2.317505"),
                (3, "60.0"),
                (4, "-16.3"),
                (5, "-9.0"),
                (17, "12.146"),
                (19, "12.146"),
                (23, "  1234 A"),
            ],
            200,
        );
        let e = decode_line(&l).unwrap();
        assert!((e.id - 1.000081).abs() < 1e-12);
        assert!((e.ra - 2.317505).abs() < 1e-12);
        assert_eq!(e.mags, vec![12.146, 12.146]);
        assert!((e.pm_ra + 32.6 / 3_600_000.0).abs() < 1e-12);
        assert!((e.pm_dec + 9.0 / 3_600_000.0).abs() < 1e-15);
        assert_eq!(e.peak, 1234);
        assert_eq!(e.frame, Frame::j2000());
    }

    #[test]
    fn decode_observed_position_for_x_flag() {
        let l = line(
            &[
                (0, "0002 01234 2"),
                (1, "X"),
                (17, ""),
                (19, "11.0"),
                (24, "5.5"),
                (25, "7.25"),
                (26, "1.73"),
            ],
            200,
        );
        let e = decode_line(&l).unwrap();
        assert_eq!(e.ra, 5.5);
        assert_eq!(e.dec, 7.25);
        assert_eq!(e.pm_ra, 0.0);
        assert!((e.frame.epoch - 1991.73).abs() < 1e-9);
        assert_eq!(e.mags, vec![NO_MAGNITUDE, 11.0]);
    }

    #[test]
    fn short_line_is_malformed() {
        assert!(decode_line("0001 00008 1| |1.0|2.0").is_err());
    }

    #[test]
    fn index_regions_with_sentinel() {
        let text = "     1|     1|  0.00|  3.75| 0.00|  3.75|\n\
                        4|     1|  3.75|  7.50| 0.00|  3.75|\n\
                        9|     2|\n";
        let regions = parse_index(text).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].first, 1);
        assert_eq!(regions[0].count, 3);
        assert_eq!(regions[1].count, 5);
        assert_eq!(regions[1].ra_min, 3.75);
        assert!(parse_index("1|1|0|1|0|1|\n").is_err());
    }
}
