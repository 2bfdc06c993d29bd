//! Catalog names to catalog descriptors.
//!
//! [`CatalogRegistry::resolve`] recognizes the survey catalogs by name or
//! alias and falls back to sniffing a file: a NUL in the first four bytes
//! means a binary catalog, a `.tab` suffix or a tab in the first line means a
//! tab-table, anything else is read as an ASCII catalog. Header metadata is
//! read from local files while resolving; nothing else in the crate opens a
//! catalog speculatively.

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{CatalogConfig, CatalogRoot};
use crate::coords::Frame;
use crate::driver::ascii::AsciiHandle;
use crate::driver::binary::{BinaryHandle, IdEncoding};
use crate::driver::tab::TabHandle;
use crate::driver::usno::UsnoLayout;
use crate::driver::{open_file, CatalogHandle};
use crate::error::{Error, Result};
use crate::tokens::tokenize;

pub use crate::config::SurveyFamily;

/// Where a catalog's records come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    File(PathBuf),
    /// A search engine returning tab-tables.
    Remote { url: String },
}

/// Physical layout of a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    Binary(PathBuf),
    Ascii(PathBuf),
    TabTable(Locator),
    /// UCAC2-style declination zones with an RA bin index.
    ZoneBucketed(PathBuf),
    Tycho2(PathBuf),
    Usno { root: PathBuf, layout: UsnoLayout },
}

/// How identifiers are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdFormat {
    /// Right-aligned in `width` columns with `places` decimals.
    Decimal { width: usize, places: usize },
    /// Like `Decimal` but padded with leading zeros.
    ZeroPadded { width: usize, places: usize },
    /// Records carry object names; the numeric id is only a sequence number.
    Name,
}

impl IdFormat {
    pub fn format(&self, id: f64) -> String {
        match *self {
            IdFormat::Decimal { width, places } => format!("{id:width$.places$}"),
            IdFormat::ZeroPadded { width, places } => format!("{id:0width$.places$}"),
            IdFormat::Name => format!("{id:.0}"),
        }
    }

    /// The format a sample identifier is written in.
    pub fn from_sample(token: &str) -> IdFormat {
        let token = token.trim();
        if token.is_empty() || token.parse::<f64>().is_err() {
            return IdFormat::Name;
        }
        let places = token.split_once('.').map_or(0, |(_, frac)| frac.len());
        let width = token.len();
        let padded = token.len() > 1 && token.starts_with('0') && !token.starts_with("0.");
        if padded {
            IdFormat::ZeroPadded { width, places }
        } else {
            IdFormat::Decimal { width, places }
        }
    }
}

/// Everything the query layer needs to know about one catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogDescriptor {
    pub name: String,
    pub family: SurveyFamily,
    pub kind: StorageKind,
    /// Native frame of the stored positions.
    pub frame: Frame,
    pub proper_motion: bool,
    pub nmag: usize,
    pub id_format: IdFormat,
    pub ra_sorted: bool,
    /// Each record names its own frame.
    pub mixed_frames: bool,
}

impl CatalogDescriptor {
    fn survey(name: &str, family: SurveyFamily, kind: StorageKind) -> CatalogDescriptor {
        let traits = SurveyTraits::of(family);
        CatalogDescriptor {
            name: name.to_string(),
            family,
            kind,
            frame: Frame::j2000(),
            proper_motion: traits.proper_motion,
            nmag: traits.nmag,
            id_format: traits.id_format,
            ra_sorted: traits.ra_sorted,
            mixed_frames: false,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.kind, StorageKind::TabTable(Locator::Remote { .. }))
    }
}

/// Fixed per-survey properties.
struct SurveyTraits {
    proper_motion: bool,
    nmag: usize,
    id_format: IdFormat,
    ra_sorted: bool,
    /// File name of single-file binary surveys.
    file: &'static str,
}

impl SurveyTraits {
    fn of(family: SurveyFamily) -> SurveyTraits {
        let (proper_motion, nmag, id_format, ra_sorted, file) = match family {
            SurveyFamily::UsnoA1
            | SurveyFamily::UsnoA2
            | SurveyFamily::UsnoSa1
            | SurveyFamily::UsnoSa2 => (
                false,
                2,
                IdFormat::ZeroPadded {
                    width: 13,
                    places: 8,
                },
                true,
                "",
            ),
            SurveyFamily::UsnoB1 => (
                true,
                5,
                IdFormat::ZeroPadded {
                    width: 12,
                    places: 7,
                },
                true,
                "",
            ),
            SurveyFamily::Ucac2 => (
                true,
                4,
                IdFormat::Decimal {
                    width: 8,
                    places: 0,
                },
                true,
                "",
            ),
            SurveyFamily::Tycho2 => (
                true,
                2,
                IdFormat::Decimal {
                    width: 11,
                    places: 6,
                },
                false,
                "",
            ),
            SurveyFamily::Sao => (true, 2, decimal(6, 0), true, "SAOra"),
            SurveyFamily::Ppm => (true, 2, decimal(6, 0), true, "PPMra"),
            SurveyFamily::Iras => (false, 4, decimal(10, 4), false, "IRAS"),
            SurveyFamily::Bsc => (true, 1, decimal(4, 0), true, "BSC5ra"),
            SurveyFamily::Generic => (false, 1, decimal(0, 0), false, ""),
        };
        SurveyTraits {
            proper_motion,
            nmag,
            id_format,
            ra_sorted,
            file,
        }
    }
}

fn decimal(width: usize, places: usize) -> IdFormat {
    IdFormat::Decimal { width, places }
}

/// Aliases per survey; a name matches when it is an alias followed only by digits.
const ALIASES: &[(&[&str], Survey)] = &[
    (&["usnob", "ub"], Survey::UsnoB),
    (&["usnosa", "usa"], Survey::UsnoSa),
    (&["usnoa", "ua"], Survey::UsnoA),
    (&["ucac"], Survey::Fixed(SurveyFamily::Ucac2)),
    (&["tycho", "tyc", "ty"], Survey::Fixed(SurveyFamily::Tycho2)),
    (&["sao"], Survey::Fixed(SurveyFamily::Sao)),
    (&["ppm"], Survey::Fixed(SurveyFamily::Ppm)),
    (&["iras"], Survey::Fixed(SurveyFamily::Iras)),
    (&["ybsc", "bsc"], Survey::Fixed(SurveyFamily::Bsc)),
];

#[derive(Debug, Clone, Copy)]
enum Survey {
    UsnoA,
    UsnoSa,
    UsnoB,
    Fixed(SurveyFamily),
}

/// Identify a survey from a catalog name such as `USNO-A2.0`, `ub1`, or `tycho2`.
pub fn survey_family(name: &str) -> Option<SurveyFamily> {
    let key: String = name
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '_'))
        .map(|c| c.to_ascii_lowercase())
        .collect();
    for (aliases, survey) in ALIASES {
        for alias in *aliases {
            let Some(rest) = key.strip_prefix(alias) else {
                continue;
            };
            if !rest.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let first_one = rest.starts_with('1');
            return Some(match survey {
                Survey::UsnoA if first_one => SurveyFamily::UsnoA1,
                Survey::UsnoA => SurveyFamily::UsnoA2,
                Survey::UsnoSa if first_one => SurveyFamily::UsnoSa1,
                Survey::UsnoSa => SurveyFamily::UsnoSa2,
                Survey::UsnoB => SurveyFamily::UsnoB1,
                Survey::Fixed(family) => *family,
            });
        }
    }
    None
}

/// Resolves catalog names against a [`CatalogConfig`].
#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    config: CatalogConfig,
}

impl CatalogRegistry {
    pub fn new(config: CatalogConfig) -> CatalogRegistry {
        CatalogRegistry { config }
    }

    pub fn from_env() -> CatalogRegistry {
        CatalogRegistry::new(CatalogConfig::from_env())
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Describe the catalog called `name`.
    ///
    /// # Errors
    /// [`Error::NotFound`] when neither a survey nor a file matches, and any
    /// error raised reading a local catalog's header.
    pub fn resolve(&self, name: &str) -> Result<CatalogDescriptor> {
        let name = name.trim();
        let descriptor = match survey_family(name) {
            Some(family) => self.resolve_survey(name, family)?,
            None => self.resolve_file(name)?,
        };
        debug!(
            catalog = name,
            family = descriptor.family.label(),
            kind = ?descriptor.kind,
            "resolved catalog"
        );
        Ok(descriptor)
    }

    fn resolve_survey(&self, name: &str, family: SurveyFamily) -> Result<CatalogDescriptor> {
        let root = match self.config.root(family) {
            CatalogRoot::Remote(url) => {
                let kind = StorageKind::TabTable(Locator::Remote { url });
                return Ok(CatalogDescriptor::survey(name, family, kind));
            }
            CatalogRoot::Local(dir) => dir,
        };
        let kind = match family {
            SurveyFamily::UsnoA1
            | SurveyFamily::UsnoA2
            | SurveyFamily::UsnoSa1
            | SurveyFamily::UsnoSa2 => StorageKind::Usno {
                root,
                layout: UsnoLayout::A,
            },
            SurveyFamily::UsnoB1 => StorageKind::Usno {
                root,
                layout: UsnoLayout::B,
            },
            SurveyFamily::Ucac2 => StorageKind::ZoneBucketed(root),
            SurveyFamily::Tycho2 => StorageKind::Tycho2(root),
            SurveyFamily::Sao | SurveyFamily::Ppm | SurveyFamily::Iras | SurveyFamily::Bsc => {
                let path = root.join(SurveyTraits::of(family).file);
                let mut descriptor = describe_binary(name, &path)?;
                descriptor.family = family;
                return Ok(descriptor);
            }
            SurveyFamily::Generic => return self.resolve_file(name),
        };
        Ok(CatalogDescriptor::survey(name, family, kind))
    }

    fn resolve_file(&self, name: &str) -> Result<CatalogDescriptor> {
        let direct = PathBuf::from(name);
        if direct.is_file() {
            return describe_file(name, &direct);
        }
        match self.config.root(SurveyFamily::Generic) {
            CatalogRoot::Local(dir) => {
                let path = dir.join(name);
                if path.is_file() {
                    describe_file(name, &path)
                } else {
                    Err(Error::NotFound(format!("catalog {name}")))
                }
            }
            CatalogRoot::Remote(url) => Ok(CatalogDescriptor::survey(
                name,
                SurveyFamily::Generic,
                StorageKind::TabTable(Locator::Remote { url }),
            )),
        }
    }
}

// ── File sniffing ──

/// Describe a local catalog file, detecting its format.
pub fn describe_file(name: &str, path: &Path) -> Result<CatalogDescriptor> {
    let head = read_head(path, 512)?;
    if head.iter().take(4).any(|&b| b == 0) {
        return describe_binary(name, path);
    }
    let first_line = head.split(|&b| b == b'\n').next().unwrap_or_default();
    let tab_suffix = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("tab"));
    if tab_suffix || first_line.contains(&b'\t') {
        describe_tab(name, path)
    } else {
        describe_ascii(name, path)
    }
}

fn read_head(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let file = open_file(path)?;
    let mut head = Vec::new();
    file.take(limit)
        .read_to_end(&mut head)
        .map_err(|e| Error::from_io(e, path))?;
    Ok(head)
}

fn generic(name: &str, kind: StorageKind, frame: Frame) -> CatalogDescriptor {
    CatalogDescriptor {
        name: name.to_string(),
        family: SurveyFamily::Generic,
        kind,
        frame,
        proper_motion: false,
        nmag: 1,
        id_format: decimal(0, 0),
        ra_sorted: false,
        mixed_frames: false,
    }
}

fn describe_binary(name: &str, path: &Path) -> Result<CatalogDescriptor> {
    let handle = BinaryHandle::open(path)?;
    let layout = *handle.layout();
    let mut d = generic(name, StorageKind::Binary(path.to_path_buf()), layout.frame);
    d.proper_motion = layout.mprop > 0;
    d.nmag = layout.nmag;
    d.ra_sorted = handle.is_ra_sorted();
    d.id_format = match layout.id {
        IdEncoding::Name { .. } => IdFormat::Name,
        id => {
            let largest = (layout.star1.max(1) as u64 + handle.len()).max(1);
            let digits = largest.to_string().len();
            let places = id.places() as usize;
            let width = if places > 0 { digits + places + 1 } else { digits };
            decimal(width, places)
        }
    };
    Ok(d)
}

fn describe_ascii(name: &str, path: &Path) -> Result<CatalogDescriptor> {
    let handle = AsciiHandle::open(path)?;
    let flags = handle.flags();
    let mut d = generic(
        name,
        StorageKind::Ascii(path.to_path_buf()),
        flags.frame.unwrap_or_else(Frame::j2000),
    );
    d.mixed_frames = flags.frame.is_none();
    d.proper_motion = flags.proper_motion;
    d.nmag = flags.nmag;
    d.ra_sorted = flags.ra_sorted;
    d.id_format = if flags.names {
        IdFormat::Name
    } else if flags.no_id || handle.is_empty() {
        decimal(0, 0)
    } else {
        let line = handle.line(1)?;
        let tokens = tokenize(line, None)?;
        IdFormat::from_sample(tokens.get_token(1).unwrap_or_default())
    };
    Ok(d)
}

fn describe_tab(name: &str, path: &Path) -> Result<CatalogDescriptor> {
    let handle = TabHandle::open(path)?;
    let map = handle.columns();
    let mut d = generic(
        name,
        StorageKind::TabTable(Locator::File(path.to_path_buf())),
        handle.header().frame,
    );
    d.proper_motion = map.pm_ra.is_some() || map.pm_dec.is_some();
    d.nmag = map.mags.len();
    d.id_format = match map.id {
        Some(col) if !handle.is_empty() => {
            let row = handle.row(1)?;
            IdFormat::from_sample(row.split('\t').nth(col).unwrap_or_default())
        }
        None if map.name.is_some() => IdFormat::Name,
        _ => decimal(0, 0),
    };
    Ok(d)
}
