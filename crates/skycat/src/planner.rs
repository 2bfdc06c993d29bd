//! Spatial search planning.
//!
//! A query region is first turned into a [`SkyBox`] in the search frame,
//! then into an enclosing box in the catalog's own frame
//! ([`catalog_limits`]). The catalog-frame box picks zones and record spans;
//! RA-sorted spans are narrowed by bisection ([`narrow_span`]). Every record
//! left is converted to the search frame and tested against the original
//! region before it reaches the [`ResultSet`].

use tracing::{debug, trace, warn};

use crate::accumulator::{Eviction, ResultSet};
use crate::angle::{normalize_ra, separation_deg, DEG_TO_RAD};
use crate::coords::{CoordConvert, Frame, Position};
use crate::driver::{CatalogHandle, FormatDriver, RecordSpan};
use crate::error::Result;

// ── Regions ──

/// Size of a search region around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extent {
    /// Half-widths in degrees; `half_ra` is measured in RA, not on the sky.
    Box { half_ra: f64, half_dec: f64 },
    /// Radius in degrees on the sky.
    Cone { radius: f64 },
}

/// A search region: center in degrees plus an extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchRegion {
    pub ra: f64,
    pub dec: f64,
    pub extent: Extent,
}

impl SearchRegion {
    pub fn boxed(ra: f64, dec: f64, half_ra: f64, half_dec: f64) -> SearchRegion {
        SearchRegion {
            ra: normalize_ra(ra),
            dec,
            extent: Extent::Box {
                half_ra: half_ra.abs(),
                half_dec: half_dec.abs(),
            },
        }
    }

    pub fn cone(ra: f64, dec: f64, radius: f64) -> SearchRegion {
        SearchRegion {
            ra: normalize_ra(ra),
            dec,
            extent: Extent::Cone {
                radius: radius.abs(),
            },
        }
    }

    /// Distance of a position from the region center in degrees.
    pub fn distance(&self, ra: f64, dec: f64) -> f64 {
        separation_deg(self.ra, self.dec, ra, dec)
    }
}

/// An RA/Dec box, inclusive on every edge.
///
/// When `ra_min > ra_max` the box crosses RA 0 and covers
/// `[ra_min, 360) ∪ [0, ra_max]`. `full_ra` marks a box covering every RA,
/// as around a pole.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyBox {
    pub ra_min: f64,
    pub ra_max: f64,
    pub dec_min: f64,
    pub dec_max: f64,
    pub full_ra: bool,
}

impl SkyBox {
    pub fn whole_sky() -> SkyBox {
        SkyBox {
            ra_min: 0.0,
            ra_max: 360.0,
            dec_min: -90.0,
            dec_max: 90.0,
            full_ra: true,
        }
    }

    /// The box enclosing a search region. Boxes reaching past a pole are
    /// clamped to it and widened to every RA.
    pub fn from_region(region: &SearchRegion) -> SkyBox {
        let (half_ra, half_dec) = match region.extent {
            Extent::Box { half_ra, half_dec } => (half_ra, half_dec),
            Extent::Cone { radius } => (radius, radius),
        };
        let mut dec_min = region.dec - half_dec;
        let mut dec_max = region.dec + half_dec;
        let mut full_ra = false;
        if dec_min < -90.0 {
            dec_min = -90.0;
            full_ra = true;
        }
        if dec_max > 90.0 {
            dec_max = 90.0;
            full_ra = true;
        }

        let half_ra = match region.extent {
            Extent::Box { .. } => half_ra,
            Extent::Cone { radius } => {
                let edge = dec_min.abs().max(dec_max.abs());
                let cos = libm::cos(edge * DEG_TO_RAD);
                if cos > 1e-9 {
                    radius / cos
                } else {
                    360.0
                }
            }
        };
        if half_ra >= 180.0 {
            full_ra = true;
        }

        if full_ra {
            return SkyBox {
                ra_min: 0.0,
                ra_max: 360.0,
                dec_min,
                dec_max,
                full_ra,
            };
        }
        SkyBox {
            ra_min: normalize_ra(region.ra - half_ra),
            ra_max: normalize_ra(region.ra + half_ra),
            dec_min,
            dec_max,
            full_ra,
        }
    }

    /// True when the box crosses RA 0.
    pub fn wraps(&self) -> bool {
        !self.full_ra && self.ra_min > self.ra_max
    }

    /// The box's RA coverage as one or two non-wrapping intervals.
    pub fn ra_intervals(&self) -> Vec<(f64, f64)> {
        if self.full_ra {
            vec![(0.0, 360.0)]
        } else if self.wraps() {
            vec![(self.ra_min, 360.0), (0.0, self.ra_max)]
        } else {
            vec![(self.ra_min, self.ra_max)]
        }
    }

    pub fn contains(&self, ra: f64, dec: f64) -> bool {
        if dec < self.dec_min || dec > self.dec_max {
            return false;
        }
        if self.full_ra {
            return true;
        }
        let ra = normalize_ra(ra);
        if self.wraps() {
            ra >= self.ra_min || ra <= self.ra_max
        } else {
            ra >= self.ra_min && ra <= self.ra_max
        }
    }

    /// Center and half-widths `(ra, dec, half_ra, half_dec)`.
    pub fn center(&self) -> (f64, f64, f64, f64) {
        let dec = (self.dec_min + self.dec_max) / 2.0;
        let half_dec = (self.dec_max - self.dec_min) / 2.0;
        if self.full_ra {
            return (180.0, dec, 180.0, half_dec);
        }
        let width = if self.wraps() {
            self.ra_max + 360.0 - self.ra_min
        } else {
            self.ra_max - self.ra_min
        };
        (normalize_ra(self.ra_min + width / 2.0), dec, width / 2.0, half_dec)
    }
}

/// An inclusive magnitude band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagBand {
    pub low: f64,
    pub high: f64,
}

impl MagBand {
    /// Band between two limits given in either order; equal limits mean no band.
    pub fn new(m1: f64, m2: f64) -> Option<MagBand> {
        if m1 == m2 {
            return None;
        }
        Some(MagBand {
            low: m1.min(m2),
            high: m1.max(m2),
        })
    }

    pub fn contains(&self, mag: f64) -> bool {
        mag >= self.low && mag <= self.high
    }
}

// ── Catalog-frame limits ──

/// Largest spacing, in degrees, between sampled edge points.
const LIMIT_STEP: f64 = 10.0;

/// The box in `catalog` frame that encloses `sky`, given in `search` frame.
///
/// A grid over `sky` no coarser than [`LIMIT_STEP`] is converted. Each
/// converted RA is unwrapped against its neighbor, so the enclosing span
/// follows the box rather than the RA 0 seam. A catalog pole that falls
/// inside `sky`, or a span of a full turn, opens the result to every RA.
pub fn catalog_limits(
    sky: &SkyBox,
    search: &Frame,
    catalog: &Frame,
    converter: &dyn CoordConvert,
) -> SkyBox {
    if search.same_axes(catalog) {
        return *sky;
    }
    if sky.full_ra {
        return SkyBox::whole_sky();
    }

    let (ra_c, _, half_ra, half_dec) = sky.center();
    let ra_steps = ((2.0 * half_ra / LIMIT_STEP).ceil() as usize).max(2);
    let dec_steps = ((2.0 * half_dec / LIMIT_STEP).ceil() as usize).max(2);
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut dec_min, mut dec_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let mut row_start: Option<f64> = None;
    for j in 0..=dec_steps {
        let dec = sky.dec_min + 2.0 * half_dec * j as f64 / dec_steps as f64;
        let mut prev = row_start;
        for i in 0..=ra_steps {
            let ra = ra_c - half_ra + 2.0 * half_ra * i as f64 / ra_steps as f64;
            let p = converter.convert(search, catalog, Position::new(normalize_ra(ra), dec));
            let unwrapped = match prev {
                Some(q) => q + wrap_180(p.ra - q),
                None => p.ra,
            };
            if i == 0 {
                row_start = Some(unwrapped);
            }
            prev = Some(unwrapped);
            lo = lo.min(unwrapped);
            hi = hi.max(unwrapped);
            dec_min = dec_min.min(p.dec);
            dec_max = dec_max.max(p.dec);
        }
    }
    let (ra_min, ra_max) = (normalize_ra(lo), normalize_ra(hi));
    trace!(lo, hi, dec_min, dec_max, "unwrapped catalog-frame limits");

    let mut full_ra = hi - lo >= 360.0;
    for pole in [90.0, -90.0] {
        let p = converter.convert(catalog, search, Position::new(0.0, pole));
        if sky.contains(p.ra, p.dec) {
            full_ra = true;
            if pole > 0.0 {
                dec_max = 90.0;
            } else {
                dec_min = -90.0;
            }
        }
    }
    if full_ra {
        return SkyBox {
            ra_min: 0.0,
            ra_max: 360.0,
            dec_min,
            dec_max,
            full_ra,
        };
    }
    SkyBox {
        ra_min,
        ra_max,
        dec_min,
        dec_max,
        full_ra,
    }
}

/// `d` folded into `[-180, 180)`.
fn wrap_180(d: f64) -> f64 {
    normalize_ra(d + 180.0) - 180.0
}

// ── Bisection ──

/// Narrow an RA-sorted span to the records with RA in `[lo, hi]`.
///
/// Returns `None` when no record qualifies.
pub fn narrow_span(
    handle: &mut dyn CatalogHandle,
    span: RecordSpan,
    lo: f64,
    hi: f64,
) -> Result<Option<RecordSpan>> {
    if span.is_empty() {
        return Ok(None);
    }
    let first = if lo <= 0.0 {
        span.first
    } else {
        bisect(handle, span, |ra| ra < lo)?
    };
    let last = if hi >= 360.0 {
        span.last
    } else {
        bisect(handle, span, |ra| ra <= hi)? - 1
    };
    trace!(first, last, lo, hi, "narrowed span");
    let narrowed = RecordSpan::new(first, last);
    Ok((!narrowed.is_empty()).then_some(narrowed))
}

/// First record in `span` for which `before` is false, or `span.last + 1`.
fn bisect(
    handle: &mut dyn CatalogHandle,
    span: RecordSpan,
    before: impl Fn(f64) -> bool,
) -> Result<u64> {
    let mut lo = span.first;
    let mut hi = span.last + 1;
    let mut previous = None;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if previous == Some(mid) {
            break;
        }
        previous = Some(mid);
        let ra = handle.ra(mid)?;
        trace!(lo, hi, mid, ra, "bisect");
        if before(ra) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

/// Sort spans and merge any that overlap or touch.
pub fn merge_spans(mut spans: Vec<RecordSpan>) -> Vec<RecordSpan> {
    spans.retain(|s| !s.is_empty());
    spans.sort_by_key(|s| s.first);
    let mut merged: Vec<RecordSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(prev) if span.first <= prev.last + 1 => prev.last = prev.last.max(span.last),
            _ => merged.push(span),
        }
    }
    merged
}

// ── Scan ──

/// Everything the scan needs to know about one region query on one catalog.
#[derive(Debug, Clone, Copy)]
pub struct ScanRequest {
    pub region: SearchRegion,
    /// Frame the region is given in, and the frame results are returned in.
    pub frame: Frame,
    pub mags: Option<MagBand>,
    /// Which magnitude the band and magnitude eviction use.
    pub mag_index: usize,
    /// Native frame of the catalog.
    pub catalog_frame: Frame,
    /// Records carry their own frame, so catalog-frame RA order cannot be trusted.
    pub mixed_frames: bool,
}

/// Counters from one [`scan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub zones: usize,
    pub spans: usize,
    pub scanned: u64,
    pub accepted: u64,
}

/// Run a region search over one catalog, feeding `results`.
pub fn scan(
    driver: &dyn FormatDriver,
    request: &ScanRequest,
    converter: &dyn CoordConvert,
    results: &mut ResultSet,
) -> Result<ScanStats> {
    let sky = SkyBox::from_region(&request.region);
    let limits = catalog_limits(&sky, &request.frame, &request.catalog_frame, converter);
    let mut stats = ScanStats::default();
    let zoned = driver.all_zones().len() > 1;

    for zone in driver.zones(&limits) {
        let mut handle = match driver.open_region(zone, &limits) {
            Ok(handle) => handle,
            // Zoned surveys may be installed partially.
            Err(e) if e.is_not_found() && zoned => {
                warn!(catalog = driver.name(), zone, error = %e, "skipping missing zone");
                continue;
            }
            Err(e) => return Err(e),
        };
        let narrow = handle.is_ra_sorted() && !request.mixed_frames;
        let mut spans = Vec::new();
        for (lo, hi) in limits.ra_intervals() {
            for span in handle.spans(lo, hi)? {
                if narrow {
                    spans.extend(narrow_span(handle.as_mut(), span, lo, hi)?);
                } else {
                    spans.push(span);
                }
            }
        }
        let spans = merge_spans(spans);
        stats.zones += 1;
        stats.spans += spans.len();

        for span in spans {
            for num in span.first..=span.last {
                stats.scanned += 1;
                if offer(handle.as_mut(), num, &sky, request, converter, results)? {
                    stats.accepted += 1;
                }
            }
        }
    }

    debug!(
        catalog = driver.name(),
        zones = stats.zones,
        spans = stats.spans,
        scanned = stats.scanned,
        accepted = stats.accepted,
        "region scan finished"
    );
    Ok(stats)
}

fn offer(
    handle: &mut dyn CatalogHandle,
    num: u64,
    sky: &SkyBox,
    request: &ScanRequest,
    converter: &dyn CoordConvert,
    results: &mut ResultSet,
) -> Result<bool> {
    let mut entry = handle.read(num)?;
    let pos = converter.convert(&entry.frame, &request.frame, entry.position());
    entry.set_position(pos, request.frame);

    if !sky.contains(entry.ra, entry.dec) {
        return Ok(false);
    }
    let distance = request.region.distance(entry.ra, entry.dec);
    if let Extent::Cone { radius } = request.region.extent {
        if distance > radius {
            return Ok(false);
        }
    }
    let mag = entry.mag(request.mag_index);
    if let Some(band) = request.mags {
        if !band.contains(mag) {
            return Ok(false);
        }
    }
    let key = match results.eviction() {
        Eviction::Distance => distance,
        Eviction::Magnitude => mag,
    };
    Ok(results.accept(entry, key))
}
