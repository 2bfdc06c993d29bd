//! Catalog queries.
//!
//! [`CatalogQuery`] runs region, identifier, and record-number queries
//! against resolved catalogs, returning entries converted to the caller's
//! frame.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::accumulator::{Eviction, ResultSet};
use crate::coords::{CoordConvert, Frame, StandardConverter};
use crate::driver::{open_driver, CatalogHandle, FormatDriver};
use crate::entry::SourceEntry;
use crate::error::{Error, Result};
use crate::planner::{scan, MagBand, ScanRequest, SearchRegion};
use crate::range::Range;
use crate::registry::CatalogDescriptor;
use crate::transport::CatalogTransport;

/// Order of the entries a region query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Accumulator order.
    #[default]
    None,
    Distance,
    Magnitude,
    Ra,
    Dec,
}

/// Parameters of a region query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionQuery {
    pub region: SearchRegion,
    /// Magnitude limits in either order; equal limits disable the filter.
    pub mag_limits: Option<(f64, f64)>,
    /// Frame the region is given in and results are returned in.
    pub frame: Frame,
    pub max_count: usize,
    pub eviction: Eviction,
    pub sort: SortOrder,
    /// Magnitude used for the band, magnitude eviction, and magnitude sort.
    pub sort_mag: usize,
}

impl RegionQuery {
    pub fn new(region: SearchRegion, frame: Frame, max_count: usize) -> RegionQuery {
        RegionQuery {
            region,
            mag_limits: None,
            frame,
            max_count,
            eviction: Eviction::Distance,
            sort: SortOrder::None,
            sort_mag: 0,
        }
    }

    pub fn with_mags(mut self, m1: f64, m2: f64) -> RegionQuery {
        self.mag_limits = Some((m1, m2));
        self
    }

    pub fn with_eviction(mut self, eviction: Eviction) -> RegionQuery {
        self.eviction = eviction;
        self
    }

    pub fn sorted(mut self, sort: SortOrder) -> RegionQuery {
        self.sort = sort;
        self
    }

    fn band(&self) -> Option<MagBand> {
        self.mag_limits.and_then(|(m1, m2)| MagBand::new(m1, m2))
    }
}

/// Runs queries through a coordinate converter and an optional transport
/// for remote catalogs.
pub struct CatalogQuery {
    converter: Box<dyn CoordConvert>,
    transport: Option<Arc<dyn CatalogTransport>>,
}

impl Default for CatalogQuery {
    fn default() -> CatalogQuery {
        CatalogQuery::new()
    }
}

impl CatalogQuery {
    pub fn new() -> CatalogQuery {
        CatalogQuery {
            converter: Box::new(StandardConverter),
            transport: None,
        }
    }

    pub fn with_converter(mut self, converter: Box<dyn CoordConvert>) -> CatalogQuery {
        self.converter = converter;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn CatalogTransport>) -> CatalogQuery {
        self.transport = Some(transport);
        self
    }

    fn driver(&self, descriptor: &CatalogDescriptor) -> Result<Box<dyn FormatDriver>> {
        open_driver(descriptor, self.transport.clone())
    }

    fn to_frame(&self, mut entry: SourceEntry, frame: &Frame) -> SourceEntry {
        let pos = self.converter.convert(&entry.frame, frame, entry.position());
        entry.set_position(pos, *frame);
        entry
    }

    // ── Region ──

    /// Up to `query.max_count` entries inside the query region.
    pub fn query_region(
        &self,
        descriptor: &CatalogDescriptor,
        query: &RegionQuery,
    ) -> Result<Vec<SourceEntry>> {
        let driver = self.driver(descriptor)?;
        let request = ScanRequest {
            region: query.region,
            frame: query.frame,
            mags: query.band(),
            mag_index: query.sort_mag,
            catalog_frame: descriptor.frame,
            mixed_frames: descriptor.mixed_frames,
        };
        let mut results = ResultSet::new(query.max_count, query.eviction);
        scan(driver.as_ref(), &request, self.converter.as_ref(), &mut results)?;

        let mut entries = results.into_entries();
        sort_entries(&mut entries, query);
        Ok(entries)
    }

    /// Run one region query per catalog. A failing catalog is logged and
    /// reported in its slot; the others still run.
    pub fn query_catalogs(
        &self,
        descriptors: &[CatalogDescriptor],
        query: &RegionQuery,
    ) -> Vec<Result<Vec<SourceEntry>>> {
        descriptors
            .iter()
            .map(|d| {
                let result = self.query_region(d, query);
                if let Err(e) = &result {
                    warn!(catalog = %d.name, error = %e, "catalog query failed");
                }
                result
            })
            .collect()
    }

    // ── Identifiers ──

    /// Look up entries by identifier, one slot per id.
    ///
    /// With `exact_match` false an id `k` is the `k`-th record in file order
    /// across all zones. Ids with no record give `None`.
    pub fn query_by_id(
        &self,
        descriptor: &CatalogDescriptor,
        ids: &[f64],
        frame: &Frame,
        exact_match: bool,
    ) -> Result<Vec<Option<SourceEntry>>> {
        let driver = self.driver(descriptor)?;
        let found = if exact_match {
            let mut found = Vec::with_capacity(ids.len());
            for &id in ids {
                found.push(find_exact(driver.as_ref(), id)?);
            }
            found
        } else {
            let mut zones = Sequence::new(driver.as_ref());
            let mut found = Vec::with_capacity(ids.len());
            for &id in ids {
                let k = id.round();
                found.push(if k >= 1.0 { zones.record(k as u64)? } else { None });
            }
            found
        };
        debug!(
            catalog = driver.name(),
            requested = ids.len(),
            found = found.iter().filter(|e| e.is_some()).count(),
            "identifier query finished"
        );
        Ok(found
            .into_iter()
            .map(|e| e.map(|e| self.to_frame(e, frame)))
            .collect())
    }

    /// The records whose sequence numbers `range` names.
    pub fn query_records(
        &self,
        descriptor: &CatalogDescriptor,
        mut range: Range,
        frame: &Frame,
    ) -> Result<Vec<SourceEntry>> {
        range.restart();
        let ids: Vec<f64> = std::iter::from_fn(|| range.next_i64())
            .map(|n| n as f64)
            .collect();
        Ok(self
            .query_by_id(descriptor, &ids, frame, false)?
            .into_iter()
            .flatten()
            .collect())
    }
}

fn sort_entries(entries: &mut [SourceEntry], query: &RegionQuery) {
    let region = query.region;
    let mag = query.sort_mag;
    let key = |e: &SourceEntry| -> f64 {
        match query.sort {
            SortOrder::None => 0.0,
            SortOrder::Distance => region.distance(e.ra, e.dec),
            SortOrder::Magnitude => e.mag(mag),
            SortOrder::Ra => e.ra,
            SortOrder::Dec => e.dec,
        }
    };
    if query.sort != SortOrder::None {
        entries.sort_by(|a, b| key(a).total_cmp(&key(b)));
    }
}

/// Read `num` from an open handle, mapping a record past the end to `None`.
fn read_optional(handle: &mut dyn CatalogHandle, num: u64) -> Result<Option<SourceEntry>> {
    match handle.read(num) {
        Ok(entry) => Ok(Some(entry)),
        Err(Error::OutOfRange { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn open_optional(driver: &dyn FormatDriver, zone: u32) -> Result<Option<Box<dyn CatalogHandle>>> {
    match driver.open_zone(zone) {
        Ok(handle) => Ok(Some(handle)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn find_exact(driver: &dyn FormatDriver, id: f64) -> Result<Option<SourceEntry>> {
    let tolerance = driver.id_tolerance();
    if let Some((zone, num)) = driver.locate_id(id) {
        let Some(mut handle) = open_optional(driver, zone)? else {
            return Ok(None);
        };
        let entry = read_optional(handle.as_mut(), num)?;
        return Ok(entry.filter(|e| (e.id - id).abs() <= tolerance));
    }
    for zone in driver.id_zones(id) {
        let Some(mut handle) = open_optional(driver, zone)? else {
            continue;
        };
        if let Some(num) = handle.find_id(id, tolerance)? {
            return read_optional(handle.as_mut(), num);
        }
    }
    Ok(None)
}

/// Walks the zones of a catalog in order, numbering records consecutively.
struct Sequence<'a> {
    driver: &'a dyn FormatDriver,
    zones: Vec<u32>,
    /// Opened zones in order; `None` for a zone with no file.
    opened: Vec<Option<Box<dyn CatalogHandle>>>,
}

impl<'a> Sequence<'a> {
    fn new(driver: &'a dyn FormatDriver) -> Sequence<'a> {
        Sequence {
            driver,
            zones: driver.all_zones(),
            opened: Vec::new(),
        }
    }

    fn record(&mut self, k: u64) -> Result<Option<SourceEntry>> {
        let mut remaining = k;
        for i in 0..self.zones.len() {
            if i == self.opened.len() {
                let handle = open_optional(self.driver, self.zones[i])?;
                self.opened.push(handle);
            }
            let Some(handle) = self.opened[i].as_mut() else {
                continue;
            };
            let len = handle.len();
            if remaining <= len {
                return read_optional(handle.as_mut(), remaining);
            }
            remaining -= len;
        }
        Ok(None)
    }
}
