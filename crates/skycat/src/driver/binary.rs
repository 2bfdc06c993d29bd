//! Binary fixed-record catalogs (TDC layout).
//!
//! A file is a header of seven 32-bit integers, optionally followed by a
//! 52-byte title, then fixed-size records. The byte order is whatever the
//! writing machine used; it is detected from the magnitude count in the
//! header and applied to every field read afterwards.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::angle::{normalize_ra, DEG_TO_RAD, RAD_TO_DEG};
use crate::coords::Frame;
use crate::driver::{
    check_record, file_len, open_file, read_exact_at, scan_for_id, CatalogHandle, FormatDriver,
};
use crate::endian::{
    read_f32, read_f64, read_i16, read_i32, write_f32, write_f64, write_i16, write_i32,
};
use crate::entry::{pack_spectral_type, unpack_spectral_type, SourceEntry, NO_MAGNITUDE};
use crate::error::{Error, Result};
use crate::planner::SkyBox;

/// Length of the short header.
pub const HEADER_LEN: usize = 28;
/// Length of the title that follows the short header in the extended variant.
pub const TITLE_LEN: usize = 52;
/// Length of the extended header.
pub const EXTENDED_HEADER_LEN: usize = HEADER_LEN + TITLE_LEN;
/// Largest magnitude count a valid header may carry.
pub const MAX_MAGS: i32 = 10;
/// Largest record size a valid header may state.
pub const MAX_RECORD_LEN: i32 = 4096;

// ── Header ──

/// How a record stores its identifier (the header's `STNUM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdEncoding {
    /// No stored id; the id is `STAR1 + n - 1`.
    Sequence,
    /// 4-byte float.
    Float,
    /// 4-byte integer with an implied decimal point.
    Scaled { places: u32 },
    /// No numeric id; a trailing object name of `len` bytes.
    Name { len: usize },
}

impl IdEncoding {
    pub fn from_stnum(stnum: i32) -> Result<IdEncoding> {
        Ok(match stnum {
            0 => IdEncoding::Sequence,
            1 => IdEncoding::Float,
            2 => IdEncoding::Scaled { places: 0 },
            3 => IdEncoding::Scaled { places: 4 },
            4 => IdEncoding::Scaled { places: 5 },
            5 => IdEncoding::Scaled { places: 1 },
            n if n < 0 => IdEncoding::Name {
                len: n.unsigned_abs() as usize,
            },
            n => return Err(Error::malformed(format!("unknown STNUM {n}"))),
        })
    }

    pub fn stnum(self) -> i32 {
        match self {
            IdEncoding::Sequence => 0,
            IdEncoding::Float => 1,
            IdEncoding::Scaled { places: 0 } => 2,
            IdEncoding::Scaled { places: 4 } => 3,
            IdEncoding::Scaled { places: 5 } => 4,
            IdEncoding::Scaled { .. } => 5,
            IdEncoding::Name { len } => -(len as i32),
        }
    }

    /// Decimal places a numeric id is shown with.
    pub fn places(self) -> u32 {
        match self {
            IdEncoding::Scaled { places } => places,
            IdEncoding::Float => 4,
            _ => 0,
        }
    }

    fn id_bytes(self) -> usize {
        match self {
            IdEncoding::Float | IdEncoding::Scaled { .. } => 4,
            _ => 0,
        }
    }

    fn name_bytes(self) -> usize {
        match self {
            IdEncoding::Name { len } => len,
            _ => 0,
        }
    }
}

/// The decoded header of a binary catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryHeader {
    pub star0: i32,
    pub star1: i32,
    /// Record count; negative when positions are FK5 J2000.
    pub starn: i32,
    pub stnum: i32,
    pub mprop: i32,
    pub nmag: i32,
    /// Bytes per record.
    pub nbent: i32,
    /// Present in the 80-byte header variant.
    pub title: Option<String>,
}

impl BinaryHeader {
    /// A header for `count` records with the smallest record size that fits.
    pub fn new(count: usize, j2000: bool, id: IdEncoding, mprop: i32, nmag: usize) -> BinaryHeader {
        let starn = if j2000 { -(count as i32) } else { count as i32 };
        let mut header = BinaryHeader {
            star0: 0,
            star1: 1,
            starn,
            stnum: id.stnum(),
            mprop,
            nmag: nmag as i32,
            nbent: 0,
            title: None,
        };
        header.nbent = data_len(id, mprop, nmag) as i32;
        header
    }

    /// Decode the first 28 bytes, detecting the byte order.
    ///
    /// A byte order is plausible when its header describes a valid record
    /// layout. When both orders are, the one whose record count and size
    /// agree with `file_len` wins; native order breaks any remaining tie.
    ///
    /// Returns the header (without title) and whether fields must be swapped.
    pub fn parse(bytes: &[u8], file_len: Option<u64>) -> Result<(BinaryHeader, bool)> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Truncated {
                expected: HEADER_LEN,
                found: bytes.len(),
            });
        }
        let mut candidates: Vec<(BinaryHeader, bool)> = [false, true]
            .into_iter()
            .map(|swap| (BinaryHeader::decode(bytes, swap), swap))
            .filter(|(h, _)| h.is_plausible())
            .collect();
        if let (Some(len), true) = (file_len, candidates.len() > 1) {
            if let Some(k) = candidates.iter().position(|(h, _)| h.fits_length(len)) {
                return Ok(candidates.swap_remove(k));
            }
        }
        candidates.into_iter().next().ok_or_else(|| {
            Error::malformed("binary catalog header is not plausible in either byte order")
        })
    }

    fn decode(bytes: &[u8], swap: bool) -> BinaryHeader {
        let word = |k: usize| read_i32(&bytes[4 * k..], swap);
        BinaryHeader {
            star0: word(0),
            star1: word(1),
            starn: word(2),
            stnum: word(3),
            mprop: word(4),
            nmag: word(5),
            nbent: word(6),
            title: None,
        }
    }

    fn is_plausible(&self) -> bool {
        (0..=MAX_MAGS).contains(&self.nmag)
            && (1..=MAX_RECORD_LEN).contains(&self.nbent)
            && self.layout().is_ok()
    }

    /// True when a file of `len` bytes holds exactly this header's records.
    fn fits_length(&self, len: u64) -> bool {
        let nbent = self.nbent.max(1) as u64;
        let count = self.count();
        [HEADER_LEN, EXTENDED_HEADER_LEN].iter().any(|&h| {
            let h = h as u64;
            if len < h {
                false
            } else if count > 0 {
                len == h + count * nbent
            } else {
                (len - h) % nbent == 0
            }
        })
    }

    /// Stated record count; 0 means "derive from the file size".
    pub fn count(&self) -> u64 {
        self.starn.unsigned_abs() as u64
    }

    pub fn frame(&self) -> Frame {
        if self.starn < 0 {
            Frame::j2000()
        } else {
            Frame::b1950()
        }
    }

    pub fn header_len(&self) -> usize {
        if self.title.is_some() {
            EXTENDED_HEADER_LEN
        } else {
            HEADER_LEN
        }
    }

    /// Check the header fields and derive the record layout.
    pub fn layout(&self) -> Result<RecordLayout> {
        let id = IdEncoding::from_stnum(self.stnum)?;
        if !(0..=2).contains(&self.mprop) {
            return Err(Error::malformed(format!("unknown MPROP {}", self.mprop)));
        }
        if !(0..=MAX_MAGS).contains(&self.nmag) {
            return Err(Error::malformed(format!("NMAG {} out of range", self.nmag)));
        }
        let nmag = self.nmag as usize;
        let needed = data_len(id, self.mprop, nmag);
        if self.nbent > MAX_RECORD_LEN {
            return Err(Error::malformed(format!(
                "NBENT {} exceeds {MAX_RECORD_LEN} bytes",
                self.nbent
            )));
        }
        if self.nbent <= 0 || needed > self.nbent as usize {
            return Err(Error::malformed(format!(
                "record needs {needed} bytes but NBENT is {}",
                self.nbent
            )));
        }
        Ok(RecordLayout {
            id,
            star1: self.star1,
            nmag,
            mprop: self.mprop,
            size: self.nbent as usize,
            frame: self.frame(),
        })
    }

    fn encode(&self, swap: bool) -> Vec<u8> {
        let mut out = vec![0u8; self.header_len()];
        let words = [
            self.star0, self.star1, self.starn, self.stnum, self.mprop, self.nmag, self.nbent,
        ];
        for (k, w) in words.iter().enumerate() {
            write_i32(&mut out[4 * k..], *w, swap);
        }
        if let Some(title) = &self.title {
            let field = &mut out[HEADER_LEN..EXTENDED_HEADER_LEN];
            field.fill(b' ');
            let bytes = title.as_bytes();
            let n = bytes.len().min(TITLE_LEN);
            field[..n].copy_from_slice(&bytes[..n]);
        }
        out
    }
}

fn data_len(id: IdEncoding, mprop: i32, nmag: usize) -> usize {
    let mut len = id.id_bytes() + 8 + 8 + 2 + 2 * nmag;
    if mprop >= 1 {
        len += 8;
    }
    if mprop == 2 {
        len += 8;
    }
    len + id.name_bytes()
}

// ── Records ──

/// Field positions within one record, derived from the header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordLayout {
    pub id: IdEncoding,
    pub star1: i32,
    pub nmag: usize,
    pub mprop: i32,
    /// Full record size including any padding.
    pub size: usize,
    pub frame: Frame,
}

/// Decode record `num` (1-based) from its bytes without modifying them.
pub fn decode_record(bytes: &[u8], layout: &RecordLayout, num: u64, swap: bool) -> Result<SourceEntry> {
    let needed = data_len(layout.id, layout.mprop, layout.nmag);
    if bytes.len() < needed {
        return Err(Error::Truncated {
            expected: needed,
            found: bytes.len(),
        });
    }

    let mut off = 0;
    let id = match layout.id {
        IdEncoding::Sequence => (layout.star1 as i64 + num as i64 - 1) as f64,
        IdEncoding::Float => {
            off += 4;
            read_f32(bytes, swap) as f64
        }
        IdEncoding::Scaled { places } => {
            off += 4;
            read_i32(bytes, swap) as f64 / 10f64.powi(places as i32)
        }
        IdEncoding::Name { .. } => num as f64,
    };

    let ra = normalize_ra(read_f64(&bytes[off..], swap) * RAD_TO_DEG);
    let dec = read_f64(&bytes[off + 8..], swap) * RAD_TO_DEG;
    off += 16;

    let mut entry = SourceEntry::new(id, ra, dec, layout.frame);
    entry.peak = pack_spectral_type([bytes[off], bytes[off + 1]]);
    off += 2;

    for _ in 0..layout.nmag {
        entry.mags.push(read_i16(&bytes[off..], swap) as f64 / 100.0);
        off += 2;
    }
    if layout.mprop >= 1 {
        entry.pm_ra = read_f32(&bytes[off..], swap) as f64 * RAD_TO_DEG;
        entry.pm_dec = read_f32(&bytes[off + 4..], swap) as f64 * RAD_TO_DEG;
        off += 8;
    }
    if layout.mprop == 2 {
        entry.radial_velocity = Some(read_f64(&bytes[off..], swap));
        off += 8;
    }
    if let IdEncoding::Name { len } = layout.id {
        let raw = &bytes[off..off + len];
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if !text.is_empty() {
            entry.name = Some(text.to_string());
        }
    }
    Ok(entry)
}

/// Encode one record, padded to the layout's record size.
pub fn encode_record(entry: &SourceEntry, layout: &RecordLayout, swap: bool) -> Vec<u8> {
    let mut out = vec![0u8; layout.size];
    let mut off = 0;
    match layout.id {
        IdEncoding::Float => {
            write_f32(&mut out, entry.id as f32, swap);
            off += 4;
        }
        IdEncoding::Scaled { places } => {
            let scaled = (entry.id * 10f64.powi(places as i32)).round() as i32;
            write_i32(&mut out, scaled, swap);
            off += 4;
        }
        IdEncoding::Sequence | IdEncoding::Name { .. } => {}
    }

    write_f64(&mut out[off..], entry.ra * DEG_TO_RAD, swap);
    write_f64(&mut out[off + 8..], entry.dec * DEG_TO_RAD, swap);
    off += 16;

    out[off..off + 2].copy_from_slice(&unpack_spectral_type(entry.peak));
    off += 2;

    for k in 0..layout.nmag {
        let mag = entry.mags.get(k).copied().unwrap_or(NO_MAGNITUDE);
        write_i16(&mut out[off..], (mag * 100.0).round() as i16, swap);
        off += 2;
    }
    if layout.mprop >= 1 {
        write_f32(&mut out[off..], (entry.pm_ra * DEG_TO_RAD) as f32, swap);
        write_f32(&mut out[off + 4..], (entry.pm_dec * DEG_TO_RAD) as f32, swap);
        off += 8;
    }
    if layout.mprop == 2 {
        write_f64(&mut out[off..], entry.radial_velocity.unwrap_or(0.0), swap);
        off += 8;
    }
    if let IdEncoding::Name { len } = layout.id {
        let field = &mut out[off..off + len];
        field.fill(b' ');
        if let Some(name) = &entry.name {
            let n = name.len().min(len);
            field[..n].copy_from_slice(&name.as_bytes()[..n]);
        }
    }
    out
}

/// Write a complete binary catalog.
///
/// `swap` writes every field in the byte order opposite to this machine's.
///
/// # Errors
/// Returns [`Error::Malformed`] if the header is inconsistent or states a
/// record count different from `entries.len()`.
pub fn serialize_binary_catalog(
    header: &BinaryHeader,
    entries: &[SourceEntry],
    swap: bool,
) -> Result<Vec<u8>> {
    let layout = header.layout()?;
    let stated = header.count();
    if stated != 0 && stated != entries.len() as u64 {
        return Err(Error::malformed(format!(
            "header states {stated} records but {} were given",
            entries.len()
        )));
    }
    let mut out = header.encode(swap);
    out.reserve(entries.len() * layout.size);
    for entry in entries {
        out.extend_from_slice(&encode_record(entry, &layout, swap));
    }
    Ok(out)
}

// ── Driver ──

/// A single-file binary catalog.
#[derive(Debug, Clone)]
pub struct BinaryDriver {
    name: String,
    path: PathBuf,
}

impl BinaryDriver {
    pub fn new(name: String, path: PathBuf) -> BinaryDriver {
        BinaryDriver { name, path }
    }
}

impl FormatDriver for BinaryDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn zones(&self, _limits: &SkyBox) -> Vec<u32> {
        vec![0]
    }

    fn open_zone(&self, _zone: u32) -> Result<Box<dyn CatalogHandle>> {
        Ok(Box::new(BinaryHandle::open(&self.path)?))
    }
}

/// An open binary catalog file.
#[derive(Debug)]
pub struct BinaryHandle {
    file: File,
    header: BinaryHeader,
    layout: RecordLayout,
    swap: bool,
    header_len: usize,
    count: u64,
    ra_sorted: bool,
    buf: Vec<u8>,
}

impl BinaryHandle {
    pub fn open(path: &Path) -> Result<BinaryHandle> {
        let mut file = open_file(path)?;
        let len = file_len(&file, path)?;

        let mut head = vec![0u8; (len as usize).min(EXTENDED_HEADER_LEN)];
        read_exact_at(&mut file, 0, &mut head)?;
        let (mut header, swap) = BinaryHeader::parse(&head, Some(len))?;
        let layout = header.layout()?;
        let nbent = layout.size as u64;

        let stated = header.count();
        let (header_len, count) = if stated > 0 {
            if len == EXTENDED_HEADER_LEN as u64 + stated * nbent {
                (EXTENDED_HEADER_LEN, stated)
            } else if len >= HEADER_LEN as u64 + stated * nbent {
                (HEADER_LEN, stated)
            } else {
                return Err(Error::Truncated {
                    expected: HEADER_LEN + (stated * nbent) as usize,
                    found: len as usize,
                });
            }
        } else {
            let titled = head.len() == EXTENDED_HEADER_LEN
                && head[HEADER_LEN..].iter().all(|b| (0x20..=0x7E).contains(b));
            let header_len = if titled { EXTENDED_HEADER_LEN } else { HEADER_LEN };
            (header_len, (len - header_len as u64) / nbent)
        };

        if header_len == EXTENDED_HEADER_LEN {
            let title = String::from_utf8_lossy(&head[HEADER_LEN..EXTENDED_HEADER_LEN]);
            header.title = Some(title.trim_end().to_string());
        }

        let ra_sorted = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_ascii_lowercase().ends_with("ra"))
            .unwrap_or(false);

        debug!(
            path = %path.display(),
            count,
            header_len,
            swap,
            ra_sorted,
            "opened binary catalog"
        );

        Ok(BinaryHandle {
            file,
            header,
            layout,
            swap,
            header_len,
            count,
            ra_sorted,
            buf: vec![0u8; layout.size],
        })
    }

    pub fn header(&self) -> &BinaryHeader {
        &self.header
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// True when the file's byte order differs from this machine's.
    pub fn is_swapped(&self) -> bool {
        self.swap
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }
}

impl CatalogHandle for BinaryHandle {
    fn len(&self) -> u64 {
        self.count
    }

    fn read(&mut self, num: u64) -> Result<SourceEntry> {
        check_record(num, self.count)?;
        let offset = self.header_len as u64 + (num - 1) * self.layout.size as u64;
        read_exact_at(&mut self.file, offset, &mut self.buf)?;
        decode_record(&self.buf, &self.layout, num, self.swap)
    }

    fn ra(&mut self, num: u64) -> Result<f64> {
        check_record(num, self.count)?;
        let at = self.layout.id.id_bytes();
        let offset = self.header_len as u64 + (num - 1) * self.layout.size as u64 + at as u64;
        let mut raw = [0u8; 8];
        read_exact_at(&mut self.file, offset, &mut raw)?;
        Ok(normalize_ra(read_f64(&raw, self.swap) * RAD_TO_DEG))
    }

    fn is_ra_sorted(&self) -> bool {
        self.ra_sorted
    }

    fn find_id(&mut self, id: f64, tolerance: f64) -> Result<Option<u64>> {
        if self.layout.id != IdEncoding::Sequence {
            return scan_for_id(self, id, tolerance);
        }
        let whole = id.round();
        if (id - whole).abs() > tolerance {
            return Ok(None);
        }
        let num = whole as i64 - self.layout.star1 as i64 + 1;
        Ok((num >= 1 && num as u64 <= self.count).then_some(num as u64))
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_entries() -> Vec<SourceEntry> {
        let mut a = SourceEntry::new(101.0, 10.5, -20.25, Frame::j2000());
        a.mags = vec![5.25, 6.5];
        a.peak = pack_spectral_type(*b"G2");
        a.pm_ra = 1e-5;
        a.pm_dec = -2e-5;
        let mut b = SourceEntry::new(102.0, 350.0, 45.0, Frame::j2000());
        b.mags = vec![7.0, 8.0];
        b.peak = pack_spectral_type(*b"M5");
        vec![a, b]
    }

    fn write_temp(bytes: &[u8], name: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        (dir, path)
    }

    // ---- Header ----

    #[test]
    fn stnum_round_trips_through_encoding() {
        for stnum in [0, 1, 2, 3, 4, 5, -12] {
            assert_eq!(IdEncoding::from_stnum(stnum).unwrap().stnum(), stnum);
        }
        assert!(IdEncoding::from_stnum(6).is_err());
    }

    #[test]
    fn header_detects_swapped_order() {
        let header = BinaryHeader::new(3, true, IdEncoding::Scaled { places: 0 }, 1, 2);
        for swap in [false, true] {
            let bytes = header.encode(swap);
            let (parsed, detected) = BinaryHeader::parse(&bytes, None).unwrap();
            assert_eq!(detected, swap);
            assert_eq!(parsed, header);
        }
    }

    #[test]
    fn header_too_short_is_truncated() {
        let err = BinaryHeader::parse(&[0u8; 10], None).unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                expected: 28,
                found: 10
            }
        ));
    }

    #[test]
    fn implausible_header_is_malformed() {
        let mut bytes = vec![0u8; HEADER_LEN];
        write_i32(&mut bytes[20..], 0x4000_0000, false);
        write_i32(&mut bytes[24..], 32, false);
        assert!(matches!(
            BinaryHeader::parse(&bytes, None),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn swapped_header_without_magnitudes_is_detected() {
        for id in [IdEncoding::Float, IdEncoding::Sequence, IdEncoding::Scaled { places: 4 }] {
            let header = BinaryHeader::new(2, true, id, 0, 0);
            for swap in [false, true] {
                let (parsed, detected) = BinaryHeader::parse(&header.encode(swap), None).unwrap();
                assert_eq!(detected, swap, "{id:?}");
                assert_eq!(parsed, header);
            }
        }
    }

    #[test]
    fn oversized_nbent_is_rejected() {
        let mut header = BinaryHeader::new(1, true, IdEncoding::Float, 0, 1);
        header.nbent = MAX_RECORD_LEN + 1;
        assert!(header.layout().is_err());
        assert!(BinaryHeader::parse(&header.encode(false), None).is_err());
    }

    #[test]
    fn file_length_settles_the_byte_order() {
        let header = BinaryHeader::new(3, true, IdEncoding::Float, 0, 1);
        let len = (HEADER_LEN + 3 * header.nbent as usize) as u64;
        assert!(header.fits_length(len));
        assert!(header.fits_length(len + TITLE_LEN as u64));
        assert!(!header.fits_length(len + 1));
        let (_, swap) = BinaryHeader::parse(&header.encode(true), Some(len)).unwrap();
        assert!(swap);
    }

    #[test]
    fn record_larger_than_nbent_is_malformed() {
        let mut header = BinaryHeader::new(1, true, IdEncoding::Float, 2, 4);
        header.nbent -= 1;
        assert!(header.layout().is_err());
    }

    #[test]
    fn frame_follows_starn_sign() {
        assert_eq!(
            BinaryHeader::new(1, true, IdEncoding::Sequence, 0, 1).frame(),
            Frame::j2000()
        );
        assert_eq!(
            BinaryHeader::new(1, false, IdEncoding::Sequence, 0, 1).frame(),
            Frame::b1950()
        );
    }

    // ---- Records ----

    #[test]
    fn record_decodes_all_fields() {
        let header = BinaryHeader::new(1, true, IdEncoding::Scaled { places: 4 }, 2, 2);
        let layout = header.layout().unwrap();
        let mut entry = SourceEntry::new(12.3456, 83.25, -5.5, Frame::j2000());
        entry.mags = vec![4.12, 99.99];
        entry.peak = pack_spectral_type(*b"B1");
        entry.pm_ra = 3e-6;
        entry.pm_dec = -1e-6;
        entry.radial_velocity = Some(-12.5);

        for swap in [false, true] {
            let bytes = encode_record(&entry, &layout, swap);
            let back = decode_record(&bytes, &layout, 1, swap).unwrap();
            assert!((back.id - 12.3456).abs() < 1e-9);
            assert!((back.ra - 83.25).abs() < 1e-12);
            assert!((back.dec + 5.5).abs() < 1e-12);
            assert_eq!(back.mags, vec![4.12, 99.99]);
            assert_eq!(back.peak, entry.peak);
            assert!((back.pm_ra - 3e-6).abs() < 1e-12);
            assert_eq!(back.radial_velocity, Some(-12.5));
        }
    }

    #[test]
    fn sequence_ids_start_at_star1() {
        let mut header = BinaryHeader::new(5, false, IdEncoding::Sequence, 0, 1);
        header.star1 = 1001;
        let layout = header.layout().unwrap();
        let bytes = encode_record(&SourceEntry::new(0.0, 1.0, 2.0, Frame::b1950()), &layout, false);
        let entry = decode_record(&bytes, &layout, 3, false).unwrap();
        assert_eq!(entry.id, 1003.0);
    }

    #[test]
    fn named_records_keep_name() {
        let header = BinaryHeader::new(1, true, IdEncoding::Name { len: 10 }, 0, 1);
        let layout = header.layout().unwrap();
        let mut entry = SourceEntry::new(0.0, 1.0, 2.0, Frame::j2000());
        entry.name = Some("NGC 224".into());
        let bytes = encode_record(&entry, &layout, false);
        let back = decode_record(&bytes, &layout, 7, false).unwrap();
        assert_eq!(back.name.as_deref(), Some("NGC 224"));
        assert_eq!(back.id, 7.0);
    }

    #[test]
    fn short_record_is_truncated() {
        let header = BinaryHeader::new(1, true, IdEncoding::Float, 0, 1);
        let layout = header.layout().unwrap();
        assert!(matches!(
            decode_record(&[0u8; 10], &layout, 1, false),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn serializer_rejects_count_mismatch() {
        let header = BinaryHeader::new(3, true, IdEncoding::Float, 0, 2);
        assert!(serialize_binary_catalog(&header, &sample_entries(), false).is_err());
    }

    // ---- Handle ----

    #[test]
    fn handle_reads_swapped_file_like_native() {
        let entries = sample_entries();
        let header = BinaryHeader::new(2, true, IdEncoding::Scaled { places: 0 }, 1, 2);
        let native = serialize_binary_catalog(&header, &entries, false).unwrap();
        let swapped = serialize_binary_catalog(&header, &entries, true).unwrap();
        let (_d1, p1) = write_temp(&native, "native");
        let (_d2, p2) = write_temp(&swapped, "swapped");

        let mut h1 = BinaryHandle::open(&p1).unwrap();
        let mut h2 = BinaryHandle::open(&p2).unwrap();
        assert!(!h1.is_swapped());
        assert!(h2.is_swapped());
        assert_eq!(h1.len(), 2);
        assert_eq!(h2.len(), 2);
        for n in 1..=2 {
            assert_eq!(h1.read(n).unwrap(), h2.read(n).unwrap());
        }
    }

    #[test]
    fn count_derived_from_file_size() {
        let mut header = BinaryHeader::new(2, true, IdEncoding::Float, 0, 2);
        header.starn = 0;
        let bytes = serialize_binary_catalog(&header, &sample_entries(), false).unwrap();
        let (_d, p) = write_temp(&bytes, "cat");
        let h = BinaryHandle::open(&p).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.header_len(), HEADER_LEN);
    }

    #[test]
    fn extended_header_keeps_title() {
        let mut header = BinaryHeader::new(2, true, IdEncoding::Float, 0, 2);
        header.title = Some("Test catalog".into());
        let bytes = serialize_binary_catalog(&header, &sample_entries(), false).unwrap();
        let (_d, p) = write_temp(&bytes, "titled");
        let mut h = BinaryHandle::open(&p).unwrap();
        assert_eq!(h.header_len(), EXTENDED_HEADER_LEN);
        assert_eq!(h.header().title.as_deref(), Some("Test catalog"));
        assert!((h.read(2).unwrap().ra - 350.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_record_is_an_error() {
        let header = BinaryHeader::new(2, true, IdEncoding::Float, 0, 2);
        let bytes = serialize_binary_catalog(&header, &sample_entries(), false).unwrap();
        let (_d, p) = write_temp(&bytes, "cat");
        let mut h = BinaryHandle::open(&p).unwrap();
        assert!(matches!(h.read(3), Err(Error::OutOfRange { record: 3, count: 2 })));
    }

    #[test]
    fn stated_count_longer_than_file_is_truncated() {
        let header = BinaryHeader::new(2, true, IdEncoding::Float, 0, 2);
        let mut bytes = serialize_binary_catalog(&header, &sample_entries(), false).unwrap();
        bytes.truncate(bytes.len() - 5);
        let (_d, p) = write_temp(&bytes, "cat");
        assert!(matches!(
            BinaryHandle::open(&p),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn ra_suffix_marks_sorted() {
        let header = BinaryHeader::new(2, true, IdEncoding::Float, 0, 2);
        let bytes = serialize_binary_catalog(&header, &sample_entries(), false).unwrap();
        let (_d, p) = write_temp(&bytes, "SAOra");
        let mut h = BinaryHandle::open(&p).unwrap();
        assert!(h.is_ra_sorted());
        assert!((h.ra(1).unwrap() - 10.5).abs() < 1e-12);
    }

    #[test]
    fn sequence_id_lookup_is_direct() {
        let mut header = BinaryHeader::new(2, false, IdEncoding::Sequence, 0, 2);
        header.star1 = 50;
        let bytes = serialize_binary_catalog(&header, &sample_entries(), false).unwrap();
        let (_d, p) = write_temp(&bytes, "seq");
        let mut h = BinaryHandle::open(&p).unwrap();
        assert_eq!(h.find_id(51.0, 1e-7).unwrap(), Some(2));
        assert_eq!(h.find_id(52.0, 1e-7).unwrap(), None);
    }

    #[test]
    fn stored_id_lookup_scans_records() {
        let header = BinaryHeader::new(2, true, IdEncoding::Scaled { places: 4 }, 0, 2);
        let bytes = serialize_binary_catalog(&header, &sample_entries(), true).unwrap();
        let (_d, p) = write_temp(&bytes, "scaled");
        let mut h = BinaryHandle::open(&p).unwrap();
        assert_eq!(h.find_id(102.0, 1e-7).unwrap(), Some(2));
        assert_eq!(h.find_id(101.00004, 1e-4).unwrap(), Some(1));
        assert_eq!(h.find_id(103.0, 1e-7).unwrap(), None);
    }
}
