//! Format drivers: one per physical catalog layout.
//!
//! A [`FormatDriver`] knows how a catalog is split into zones and opens one
//! zone at a time as a [`CatalogHandle`]. Flat catalogs (binary, ASCII,
//! tab-table) have a single zone, numbered 0. Handles decode records on
//! demand and close their files when dropped.

pub mod ascii;
pub mod binary;
pub mod tab;
pub mod tycho2;
pub mod ucac;
pub mod usno;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use crate::entry::SourceEntry;
use crate::error::{Error, Result};
use crate::planner::SkyBox;
use crate::registry::{CatalogDescriptor, Locator, StorageKind};
use crate::transport::CatalogTransport;

/// An inclusive run of 1-based record numbers inside one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    pub first: u64,
    pub last: u64,
}

impl RecordSpan {
    pub fn new(first: u64, last: u64) -> RecordSpan {
        RecordSpan { first, last }
    }

    /// Every record of a handle holding `count` records, or `None` if it is empty.
    pub fn whole(count: u64) -> Option<RecordSpan> {
        (count > 0).then(|| RecordSpan::new(1, count))
    }

    pub fn len(&self) -> u64 {
        if self.last < self.first {
            0
        } else {
            self.last - self.first + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Open state for one zone of one catalog.
pub trait CatalogHandle {
    /// Number of records in this handle.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode record `num` (1-based).
    ///
    /// # Errors
    /// [`Error::OutOfRange`] when `num` is 0 or beyond [`CatalogHandle::len`];
    /// [`Error::Truncated`] or [`Error::Malformed`] for a damaged record.
    fn read(&mut self, num: u64) -> Result<SourceEntry>;

    /// Right ascension of record `num`, used by bisection.
    fn ra(&mut self, num: u64) -> Result<f64> {
        Ok(self.read(num)?.ra)
    }

    /// True when records are in increasing right ascension order.
    fn is_ra_sorted(&self) -> bool;

    /// Record spans that may hold sources with RA in `[ra_min, ra_max]`.
    ///
    /// The interval never wraps. Indexed handles answer from their index; the
    /// default is every record.
    fn spans(&mut self, _ra_min: f64, _ra_max: f64) -> Result<Vec<RecordSpan>> {
        Ok(RecordSpan::whole(self.len()).into_iter().collect())
    }

    /// Search for a record whose identifier is within `tolerance` of `id`.
    fn find_id(&mut self, id: f64, tolerance: f64) -> Result<Option<u64>> {
        scan_for_id(self, id, tolerance)
    }
}

/// Read every record of `handle` in order until one matches `id`.
pub(crate) fn scan_for_id<H: CatalogHandle + ?Sized>(
    handle: &mut H,
    id: f64,
    tolerance: f64,
) -> Result<Option<u64>> {
    for num in 1..=handle.len() {
        if (handle.read(num)?.id - id).abs() <= tolerance {
            return Ok(Some(num));
        }
    }
    Ok(None)
}

/// Zone layout and access for one catalog.
pub trait FormatDriver {
    /// Catalog name, for log messages.
    fn name(&self) -> &str;

    /// Zones that may hold sources inside `limits` (catalog frame).
    fn zones(&self, limits: &SkyBox) -> Vec<u32>;

    /// Every zone, in catalog order.
    fn all_zones(&self) -> Vec<u32> {
        self.zones(&SkyBox::whole_sky())
    }

    /// Open one zone.
    fn open_zone(&self, zone: u32) -> Result<Box<dyn CatalogHandle>>;

    /// Open one zone for a region search. Remote catalogs pass the region on.
    fn open_region(&self, zone: u32, _limits: &SkyBox) -> Result<Box<dyn CatalogHandle>> {
        self.open_zone(zone)
    }

    /// Zone and record number of an identifier when it can be computed directly.
    fn locate_id(&self, _id: f64) -> Option<(u32, u64)> {
        None
    }

    /// Zones to search for an identifier that [`FormatDriver::locate_id`] cannot place.
    fn id_zones(&self, _id: f64) -> Vec<u32> {
        self.all_zones()
    }

    /// Largest difference between a requested and a stored id that still matches.
    fn id_tolerance(&self) -> f64 {
        1e-7
    }
}

/// Build the driver for a resolved catalog.
///
/// # Errors
/// Fails when a zone index the layout needs up front cannot be read, or when
/// a remote catalog is named but no transport is supplied.
pub fn open_driver(
    descriptor: &CatalogDescriptor,
    transport: Option<Arc<dyn CatalogTransport>>,
) -> Result<Box<dyn FormatDriver>> {
    let name = descriptor.name.clone();
    Ok(match &descriptor.kind {
        StorageKind::Binary(path) => Box::new(binary::BinaryDriver::new(name, path.clone())),
        StorageKind::Ascii(path) => Box::new(ascii::AsciiDriver::new(name, path.clone())),
        StorageKind::TabTable(Locator::File(path)) => {
            Box::new(tab::TabDriver::local(name, path.clone()))
        }
        StorageKind::TabTable(Locator::Remote { url }) => {
            let transport = transport.ok_or_else(|| {
                Error::NotFound(format!("no transport configured for remote catalog {url}"))
            })?;
            Box::new(tab::TabDriver::remote(name, url.clone(), transport))
        }
        StorageKind::ZoneBucketed(root) => Box::new(ucac::UcacDriver::open(name, root)?),
        StorageKind::Tycho2(root) => Box::new(tycho2::Tycho2Driver::open(name, root)?),
        StorageKind::Usno { root, layout } => {
            Box::new(usno::UsnoDriver::new(name, root.clone(), *layout))
        }
    })
}

// ── Shared file helpers ──

pub(crate) fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| Error::from_io(e, path))
}

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::from_io(e, path))
}

pub(crate) fn file_len(file: &File, path: &Path) -> Result<u64> {
    file.metadata()
        .map(|m| m.len())
        .map_err(|e| Error::from_io(e, path))
}

/// Fill `buf` from `offset`, reporting a short file as [`Error::Truncated`].
pub(crate) fn read_exact_at(file: &mut File, offset: u64, buf: &mut [u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(Error::Truncated {
                    expected: buf.len(),
                    found: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

pub(crate) fn check_record(num: u64, count: u64) -> Result<()> {
    if num == 0 || num > count {
        Err(Error::OutOfRange { record: num, count })
    } else {
        Ok(())
    }
}

/// Start and end byte offsets of each non-empty line in `text`.
///
/// Lines starting with `#` are skipped when `skip_comments` is set.
pub(crate) fn line_spans(text: &str, skip_comments: bool) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        let end = start + line.len();
        let body = line.trim_end_matches(['\n', '\r']);
        let trimmed = body.trim();
        let keep = !trimmed.is_empty() && !(skip_comments && trimmed.starts_with('#'));
        if keep {
            spans.push((start, start + body.len()));
        }
        start = end;
    }
    spans
}
