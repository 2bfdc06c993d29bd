//! Starbase tab-tables.
//!
//! ```text
//! Nearby stars
//! radecsys	fk5
//! equinox	J2000
//! id	ra	dec	mag
//! --	--	---	---
//! 1	10.0	20.0	5.5
//! ```
//!
//! Columns are found by name, so their order in the file does not matter.
//! The same layout arrives from remote search engines through a
//! [`CatalogTransport`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::angle::{format_dec_dms, parse_dec, parse_ra, RAD_TO_DEG};
use crate::coords::{parse_equinox, CoordSys, Frame};
use crate::driver::{check_record, line_spans, read_file, CatalogHandle, FormatDriver};
use crate::entry::{pack_spectral_type, SourceEntry, NO_MAGNITUDE};
use crate::error::{Error, Result};
use crate::planner::SkyBox;
use crate::registry::IdFormat;
use crate::tokens::{tokenize_with, Separators};
use crate::transport::CatalogTransport;

// ── Proper-motion units ──

/// Unit of a proper-motion column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmUnit {
    MasPerYear,
    ArcsecPerYear,
    /// Seconds of time per year.
    TimeSecPerYear,
    DegPerYear,
    RadPerYear,
}

impl PmUnit {
    /// Unit of an RA proper-motion column (`rpmunit`).
    ///
    /// Plain `sec/yr` means seconds of time here, but arcseconds in
    /// [`PmUnit::parse_dec`].
    pub fn parse_ra(text: &str) -> Option<PmUnit> {
        match text.trim().to_ascii_lowercase().as_str() {
            "sec/yr" | "tsec/yr" | "s/yr" => Some(PmUnit::TimeSecPerYear),
            other => PmUnit::parse_common(other),
        }
    }

    /// Unit of a Dec proper-motion column (`dpmunit`).
    pub fn parse_dec(text: &str) -> Option<PmUnit> {
        match text.trim().to_ascii_lowercase().as_str() {
            "sec/yr" | "arcsec/yr" | "asec/yr" => Some(PmUnit::ArcsecPerYear),
            "tsec/yr" => Some(PmUnit::TimeSecPerYear),
            other => PmUnit::parse_common(other),
        }
    }

    fn parse_common(text: &str) -> Option<PmUnit> {
        match text {
            "mas/yr" => Some(PmUnit::MasPerYear),
            "arcsec/yr" => Some(PmUnit::ArcsecPerYear),
            "deg/yr" => Some(PmUnit::DegPerYear),
            "rad/yr" => Some(PmUnit::RadPerYear),
            _ => None,
        }
    }

    /// Convert a value in this unit to degrees per year.
    pub fn to_degrees(self, value: f64) -> f64 {
        match self {
            PmUnit::MasPerYear => value / 3_600_000.0,
            PmUnit::ArcsecPerYear => value / 3600.0,
            PmUnit::TimeSecPerYear => value * 15.0 / 3600.0,
            PmUnit::DegPerYear => value,
            PmUnit::RadPerYear => value * RAD_TO_DEG,
        }
    }
}

// ── Header ──

/// Column indices of the fields a record is decoded from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub id: Option<usize>,
    pub ra: usize,
    pub dec: usize,
    /// Primary magnitude first, then the other `mag*` columns by name.
    pub mags: Vec<usize>,
    pub pm_ra: Option<usize>,
    pub pm_dec: Option<usize>,
    pub epoch: Option<usize>,
    pub name: Option<usize>,
    pub peak: Option<usize>,
}

impl ColumnMap {
    /// Resolve fields from column names: exact names first, then substrings.
    pub fn resolve(columns: &[String]) -> Result<ColumnMap> {
        let lower: Vec<String> = columns.iter().map(|c| c.trim().to_ascii_lowercase()).collect();
        let mut claimed = vec![false; lower.len()];

        let exact = |names: &[&str], claimed: &mut Vec<bool>| {
            let found = lower
                .iter()
                .enumerate()
                .find(|(i, c)| !claimed[*i] && names.contains(&c.as_str()))
                .map(|(i, _)| i);
            if let Some(i) = found {
                claimed[i] = true;
            }
            found
        };

        let mut id = exact(&["id"], &mut claimed);
        let mut ra = exact(&["ra", "raj2000"], &mut claimed);
        let mut dec = exact(&["dec", "dej2000"], &mut claimed);
        let mut mag = exact(&["mag"], &mut claimed);
        let mut pm_ra = exact(&["ura", "pmra"], &mut claimed);
        let mut pm_dec = exact(&["udec", "pmdec", "pmde"], &mut claimed);
        let mut epoch = exact(&["epoch"], &mut claimed);
        let mut name = exact(&["name", "object"], &mut claimed);
        let mut peak = exact(&["peak", "plate", "type"], &mut claimed);

        let substring = |subs: &[&str], claimed: &mut Vec<bool>| {
            let found = lower
                .iter()
                .enumerate()
                .find(|(i, c)| !claimed[*i] && subs.iter().any(|s| c.contains(s)))
                .map(|(i, _)| i);
            if let Some(i) = found {
                claimed[i] = true;
            }
            found
        };

        // Longer names go first so "pmra" is not taken as "ra".
        if pm_ra.is_none() {
            pm_ra = substring(&["ura", "pmra"], &mut claimed);
        }
        if pm_dec.is_none() {
            pm_dec = substring(&["udec", "pmdec", "pmde"], &mut claimed);
        }
        if dec.is_none() {
            dec = substring(&["dec", "de"], &mut claimed);
        }
        if ra.is_none() {
            ra = substring(&["ra"], &mut claimed);
        }
        if id.is_none() {
            id = substring(&["id"], &mut claimed);
        }
        if mag.is_none() {
            mag = substring(&["mag"], &mut claimed);
        }
        if epoch.is_none() {
            epoch = substring(&["epoch"], &mut claimed);
        }
        if name.is_none() {
            name = substring(&["name", "object"], &mut claimed);
        }
        if peak.is_none() {
            peak = substring(&["peak", "plate"], &mut claimed);
        }

        let (Some(ra), Some(dec)) = (ra, dec) else {
            return Err(Error::malformed(format!(
                "tab-table needs ra and dec columns, found {columns:?}"
            )));
        };

        let mut extra: Vec<usize> = (0..lower.len())
            .filter(|&i| Some(i) != mag && !claimed[i] && lower[i].starts_with("mag"))
            .collect();
        extra.sort_by(|&a, &b| {
            (lower[a].len(), &lower[a]).cmp(&(lower[b].len(), &lower[b]))
        });
        let mags = mag.into_iter().chain(extra).collect();

        Ok(ColumnMap {
            id,
            ra,
            dec,
            mags,
            pm_ra,
            pm_dec,
            epoch,
            name,
            peak,
        })
    }
}

/// Everything above the data lines of a tab-table.
#[derive(Debug, Clone, PartialEq)]
pub struct TabHeader {
    pub title: Option<String>,
    /// `keyword<TAB>value` lines, keywords lower-cased.
    pub keywords: Vec<(String, String)>,
    pub columns: Vec<String>,
    pub widths: Vec<usize>,
    pub frame: Frame,
    pub ra_pm_unit: PmUnit,
    pub dec_pm_unit: PmUnit,
}

impl TabHeader {
    pub fn keyword(&self, key: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn is_dash_line(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('-') && t.chars().all(|c| c == '-' || c == '\t' || c == ' ')
}

/// Split a tab-table into header and the byte spans of its data lines.
fn parse_table(text: &str) -> Result<(TabHeader, Vec<(usize, usize)>)> {
    let lines = line_spans(text, false);
    let dash = lines
        .iter()
        .position(|&(s, e)| is_dash_line(&text[s..e]))
        .ok_or_else(|| Error::malformed("tab-table has no dash line"))?;
    if dash == 0 {
        return Err(Error::malformed("tab-table has no column-name line"));
    }

    let (cs, ce) = lines[dash - 1];
    let columns: Vec<String> = text[cs..ce].split('\t').map(|c| c.trim().to_string()).collect();
    let (ds, de) = lines[dash];
    let widths = text[ds..de].split('\t').map(|d| d.trim().len()).collect();

    let mut title = None;
    let mut keywords = Vec::new();
    for (k, &(s, e)) in lines[..dash - 1].iter().enumerate() {
        let line = &text[s..e];
        match line.split_once('\t') {
            Some((key, value)) => {
                keywords.push((key.trim().to_ascii_lowercase(), value.trim().to_string()))
            }
            None if k == 0 => title = Some(line.trim().to_string()),
            None => {}
        }
    }

    let mut header = TabHeader {
        title,
        keywords,
        columns,
        widths,
        frame: Frame::j2000(),
        ra_pm_unit: PmUnit::MasPerYear,
        dec_pm_unit: PmUnit::MasPerYear,
    };
    header.frame = header_frame(&header)?;
    if let Some(u) = header.keyword("rpmunit") {
        header.ra_pm_unit = PmUnit::parse_ra(u)
            .ok_or_else(|| Error::malformed(format!("unknown rpmunit {u:?}")))?;
    }
    if let Some(u) = header.keyword("dpmunit") {
        header.dec_pm_unit = PmUnit::parse_dec(u)
            .ok_or_else(|| Error::malformed(format!("unknown dpmunit {u:?}")))?;
    }

    let data = lines[dash + 1..].to_vec();
    Ok((header, data))
}

fn header_frame(header: &TabHeader) -> Result<Frame> {
    let equinox_text = header.keyword("equinox");
    let sys = match header.keyword("radecsys") {
        Some(s) => CoordSys::parse(s)
            .ok_or_else(|| Error::malformed(format!("unknown radecsys {s:?}")))?,
        None => match equinox_text {
            Some(e) if e.trim().starts_with(['B', 'b']) => CoordSys::Fk4,
            Some(e) if parse_equinox(e).is_some_and(|v| v < 1984.0) => CoordSys::Fk4,
            _ => CoordSys::Fk5,
        },
    };
    let default = Frame::from_token(sys.name()).unwrap_or_else(Frame::j2000);
    let equinox = match equinox_text {
        Some(e) => parse_equinox(e)
            .ok_or_else(|| Error::malformed(format!("bad equinox {e:?}")))?,
        None => default.equinox,
    };
    let epoch = match header.keyword("epoch") {
        Some(e) => parse_equinox(e).ok_or_else(|| Error::malformed(format!("bad epoch {e:?}")))?,
        None => equinox,
    };
    Ok(Frame::new(sys, equinox, epoch))
}

// ── Records ──

fn optional_number(field: Option<&str>, what: &str) -> Result<Option<f64>> {
    match field.map(str::trim) {
        None | Some("") => Ok(None),
        Some(tok) => tok
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| Error::malformed(format!("{what} is not a number: {tok:?}"))),
    }
}

/// Decode one data line using a resolved column map.
pub fn decode_row(line: &str, header: &TabHeader, map: &ColumnMap, num: u64) -> Result<SourceEntry> {
    let tokens = tokenize_with(line, &Separators::Tab)?;
    let field = |col: Option<usize>| col.and_then(|c| tokens.get_token(c as isize + 1));

    let ra_text = field(Some(map.ra)).unwrap_or("").trim();
    let dec_text = field(Some(map.dec)).unwrap_or("").trim();
    let ra = parse_ra(ra_text)?;
    let dec = parse_dec(dec_text)?;

    let mut frame = header.frame;
    if let Some(epoch) = optional_number(field(map.epoch), "epoch")? {
        frame.epoch = epoch;
    }

    let mut entry = SourceEntry::new(num as f64, ra, dec, frame);
    if let Some(raw) = field(map.id).map(str::trim).filter(|s| !s.is_empty()) {
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => entry.id = v,
            _ => entry.name = Some(raw.to_string()),
        }
    }
    if let Some(name) = field(map.name).map(str::trim).filter(|s| !s.is_empty()) {
        entry.name = Some(name.to_string());
    }

    for &col in &map.mags {
        let mag = optional_number(field(Some(col)), "magnitude")?.unwrap_or(NO_MAGNITUDE);
        entry.mags.push(mag);
    }
    if let Some(pm) = optional_number(field(map.pm_ra), "RA proper motion")? {
        entry.pm_ra = header.ra_pm_unit.to_degrees(pm);
    }
    if let Some(pm) = optional_number(field(map.pm_dec), "Dec proper motion")? {
        entry.pm_dec = header.dec_pm_unit.to_degrees(pm);
    }
    if let Some(peak) = field(map.peak).and_then(parse_peak) {
        entry.peak = peak;
    }
    Ok(entry)
}

/// A plate number or peak count as a number, anything else as a packed
/// two-character spectral type.
fn parse_peak(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(v) = raw.parse::<f64>() {
        if v.is_finite() {
            return Some(v.round() as i32);
        }
    }
    let b = raw.as_bytes();
    Some(pack_spectral_type([b[0], b.get(1).copied().unwrap_or(b' ')]))
}

// ── Driver ──

/// Where a tab-table comes from.
#[derive(Clone)]
enum Source {
    File(PathBuf),
    Remote {
        url: String,
        transport: Arc<dyn CatalogTransport>,
    },
}

/// A tab-table catalog, local or remote.
#[derive(Clone)]
pub struct TabDriver {
    name: String,
    source: Source,
}

impl TabDriver {
    pub fn local(name: String, path: PathBuf) -> TabDriver {
        TabDriver {
            name,
            source: Source::File(path),
        }
    }

    pub fn remote(name: String, url: String, transport: Arc<dyn CatalogTransport>) -> TabDriver {
        TabDriver {
            name,
            source: Source::Remote { url, transport },
        }
    }

    fn fetch(&self, params: &[(String, String)]) -> Result<TabHandle> {
        match &self.source {
            Source::File(path) => TabHandle::open(path),
            Source::Remote { url, transport } => {
                let body = transport.fetch(url, params)?;
                debug!(url = %url, bytes = body.len(), "fetched remote tab-table");
                TabHandle::from_bytes(body)
            }
        }
    }
}

impl FormatDriver for TabDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn zones(&self, _limits: &SkyBox) -> Vec<u32> {
        vec![0]
    }

    fn open_zone(&self, _zone: u32) -> Result<Box<dyn CatalogHandle>> {
        Ok(Box::new(self.fetch(&[])?))
    }

    fn open_region(&self, _zone: u32, limits: &SkyBox) -> Result<Box<dyn CatalogHandle>> {
        let (ra, dec, half_ra, half_dec) = limits.center();
        let params = vec![
            ("catalog".to_string(), self.name.clone()),
            ("ra".to_string(), format!("{ra:.6}")),
            ("dec".to_string(), format_dec_dms(dec)),
            ("dra".to_string(), format!("{half_ra:.6}")),
            ("ddec".to_string(), format!("{half_dec:.6}")),
        ];
        Ok(Box::new(self.fetch(&params)?))
    }
}

/// A tab-table held in memory.
#[derive(Debug, Clone)]
pub struct TabHandle {
    text: String,
    header: TabHeader,
    map: ColumnMap,
    rows: Vec<(usize, usize)>,
}

impl TabHandle {
    pub fn open(path: &Path) -> Result<TabHandle> {
        let handle = TabHandle::from_bytes(read_file(path)?)?;
        debug!(path = %path.display(), count = handle.rows.len(), "opened tab-table");
        Ok(handle)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<TabHandle> {
        let text = String::from_utf8(bytes)
            .map_err(|_| Error::malformed("tab-table is not UTF-8 text"))?;
        let (header, rows) = parse_table(&text)?;
        let map = ColumnMap::resolve(&header.columns)?;
        Ok(TabHandle {
            text,
            header,
            map,
            rows,
        })
    }

    pub fn header(&self) -> &TabHeader {
        &self.header
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.map
    }

    /// Raw text of row `num` (1-based).
    pub fn row(&self, num: u64) -> Result<&str> {
        check_record(num, self.rows.len() as u64)?;
        let (s, e) = self.rows[num as usize - 1];
        Ok(&self.text[s..e])
    }
}

impl CatalogHandle for TabHandle {
    fn len(&self) -> u64 {
        self.rows.len() as u64
    }

    fn read(&mut self, num: u64) -> Result<SourceEntry> {
        decode_row(self.row(num)?, &self.header, &self.map, num)
    }

    fn is_ra_sorted(&self) -> bool {
        false
    }
}

// ── Writing ──

/// Layout choices for [`write_tab_table`].
#[derive(Debug, Clone)]
pub struct TabOptions {
    pub title: String,
    pub frame: Frame,
    pub nmag: usize,
    pub proper_motion: bool,
    pub id_format: IdFormat,
}

impl Default for TabOptions {
    fn default() -> TabOptions {
        TabOptions {
            title: "catalog".to_string(),
            frame: Frame::j2000(),
            nmag: 1,
            proper_motion: false,
            id_format: IdFormat::Decimal {
                width: 0,
                places: 0,
            },
        }
    }
}

/// Render entries as a Starbase tab-table that [`TabHandle`] reads back.
///
/// Positions are written in decimal degrees and proper motions in mas/yr.
pub fn write_tab_table(entries: &[SourceEntry], options: &TabOptions) -> String {
    let with_names = entries.iter().any(|e| e.name.is_some());
    let mut columns = vec!["id".to_string(), "ra".to_string(), "dec".to_string()];
    for k in 0..options.nmag {
        columns.push(if k == 0 {
            "mag".to_string()
        } else {
            format!("mag{}", k + 1)
        });
    }
    if options.proper_motion {
        columns.push("ura".to_string());
        columns.push("udec".to_string());
    }
    if with_names {
        columns.push("name".to_string());
    }

    let frame = options.frame;
    let prefix = if frame.sys == CoordSys::Fk4 { 'B' } else { 'J' };
    let mut out = String::new();
    out.push_str(&options.title);
    out.push('\n');
    out.push_str(&format!("radecsys\t{}\n", frame.sys.name()));
    out.push_str(&format!("equinox\t{prefix}{:.1}\n", frame.equinox));
    out.push_str(&format!("epoch\t{:.1}\n", frame.epoch));
    if options.proper_motion {
        out.push_str("rpmunit\tmas/yr\ndpmunit\tmas/yr\n");
    }
    out.push_str(&columns.join("\t"));
    out.push('\n');
    let dashes: Vec<String> = columns.iter().map(|c| "-".repeat(c.len())).collect();
    out.push_str(&dashes.join("\t"));
    out.push('\n');

    for e in entries {
        let mut fields = vec![
            options.id_format.format(e.id),
            format!("{:.7}", e.ra),
            format!("{:.7}", e.dec),
        ];
        for k in 0..options.nmag {
            let mag = e.mag(k);
            fields.push(if mag == NO_MAGNITUDE {
                String::new()
            } else {
                format!("{mag:.3}")
            });
        }
        if options.proper_motion {
            fields.push(format!("{:.4}", e.pm_ra * 3_600_000.0));
            fields.push(format!("{:.4}", e.pm_dec * 3_600_000.0));
        }
        if with_names {
            fields.push(e.name.clone().unwrap_or_default());
        }
        out.push_str(&fields.join("\t"));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "Test stars\n\
radecsys\tfk5\n\
equinox\tJ2000\n\
rpmunit\tsec/yr\n\
dpmunit\tsec/yr\n\
id\tra\tdec\tmag\tmagb\tura\tudec\tname\n\
--\t--\t---\t---\t----\t---\t----\t----\n\
1\t10.0\t20.0\t5.5\t6.0\t0.1\t1.0\tAlpha\n\
2\t12:00:00\t-30:00:00\t\t7.0\t\t\t\n";

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn pm_units_keep_ra_dec_asymmetry() {
        assert_eq!(PmUnit::parse_ra("sec/yr"), Some(PmUnit::TimeSecPerYear));
        assert_eq!(PmUnit::parse_dec("sec/yr"), Some(PmUnit::ArcsecPerYear));
        assert_eq!(PmUnit::parse_ra("tsec/yr"), Some(PmUnit::TimeSecPerYear));
        assert_eq!(PmUnit::parse_dec("tsec/yr"), Some(PmUnit::TimeSecPerYear));
        assert_eq!(PmUnit::parse_ra("s/yr"), Some(PmUnit::TimeSecPerYear));
        assert_eq!(PmUnit::parse_dec("s/yr"), None);
        assert_eq!(PmUnit::parse_dec("asec/yr"), Some(PmUnit::ArcsecPerYear));
        assert_eq!(PmUnit::parse_ra("asec/yr"), None);
        assert_eq!(PmUnit::parse_ra("MAS/YR"), Some(PmUnit::MasPerYear));
    }

    #[test]
    fn columns_resolve_exact_then_substring() {
        let map = ColumnMap::resolve(&names(&["RAJ2000", "DEJ2000", "pmRA", "pmDE", "Vmag"])).unwrap();
        assert_eq!(map.ra, 0);
        assert_eq!(map.dec, 1);
        assert_eq!(map.pm_ra, Some(2));
        assert_eq!(map.pm_dec, Some(3));
        assert_eq!(map.mags, vec![4]);
        assert_eq!(map.id, None);
    }

    #[test]
    fn missing_position_column_is_malformed() {
        assert!(ColumnMap::resolve(&names(&["id", "mag"])).is_err());
    }

    #[test]
    fn extra_mag_columns_follow_primary() {
        let map = ColumnMap::resolve(&names(&["mag_r", "ra", "mag", "dec", "mag_b"])).unwrap();
        assert_eq!(map.mags, vec![2, 4, 0]);
    }

    #[test]
    fn table_decodes_rows() {
        let mut h = TabHandle::from_bytes(TABLE.as_bytes().to_vec()).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.header().title.as_deref(), Some("Test stars"));
        assert_eq!(h.header().frame, Frame::j2000());

        let a = h.read(1).unwrap();
        assert_eq!(a.id, 1.0);
        assert_eq!(a.mags, vec![5.5, 6.0]);
        assert!((a.pm_ra - 0.1 * 15.0 / 3600.0).abs() < 1e-15);
        assert!((a.pm_dec - 1.0 / 3600.0).abs() < 1e-15);
        assert_eq!(a.name.as_deref(), Some("Alpha"));

        let b = h.read(2).unwrap();
        assert!((b.ra - 180.0).abs() < 1e-10);
        assert!((b.dec + 30.0).abs() < 1e-10);
        assert_eq!(b.mags, vec![NO_MAGNITUDE, 7.0]);
        assert_eq!(b.pm_ra, 0.0);
        assert_eq!(b.name, None);
    }

    #[test]
    fn type_column_keeps_spectral_types() {
        let text = "id\tra\tdec\ttype\n--\t--\t---\t----\n1\t10\t20\tG2V\n2\t11\t21\tK\n3\t12\t22\t1234\n4\t13\t23\t\n";
        let mut h = TabHandle::from_bytes(text.as_bytes().to_vec()).unwrap();
        let first = h.read(1).unwrap();
        assert_eq!(first.peak, pack_spectral_type(*b"G2"));
        assert_eq!(crate::entry::spectral_type_str(first.peak), "G2");
        assert_eq!(crate::entry::spectral_type_str(h.read(2).unwrap().peak), "K");
        assert_eq!(h.read(3).unwrap().peak, 1234);
        assert_eq!(h.read(4).unwrap().peak, 0);
    }

    #[test]
    fn fk4_from_equinox_keyword() {
        let text = "id\tra\tdec\n--\t--\t---\n1\t1\t2\n";
        let h = TabHandle::from_bytes(format!("equinox\tB1950\n{text}").into_bytes()).unwrap();
        assert_eq!(h.header().frame, Frame::b1950());
    }

    #[test]
    fn no_dash_line_is_malformed() {
        let err = TabHandle::from_bytes(b"id\tra\tdec\n1\t2\t3\n".to_vec()).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn writer_output_reads_back() {
        let mut a = SourceEntry::new(1.0, 10.25, -5.5, Frame::j2000());
        a.mags = vec![5.5, NO_MAGNITUDE];
        a.pm_ra = 1e-6;
        a.pm_dec = -2e-6;
        a.name = Some("first".into());
        let mut b = SourceEntry::new(2.0, 300.0, 60.0, Frame::j2000());
        b.mags = vec![9.25, 10.0];
        let opts = TabOptions {
            nmag: 2,
            proper_motion: true,
            ..TabOptions::default()
        };
        let text = write_tab_table(&[a.clone(), b], &opts);

        let mut h = TabHandle::from_bytes(text.into_bytes()).unwrap();
        let back = h.read(1).unwrap();
        assert_eq!(back.id, 1.0);
        assert!((back.ra - 10.25).abs() < 1e-7);
        assert_eq!(back.mags, vec![5.5, NO_MAGNITUDE]);
        assert!((back.pm_ra - 1e-6).abs() < 1e-10);
        assert_eq!(back.name.as_deref(), Some("first"));
        assert_eq!(h.read(2).unwrap().name, None);
    }
}
