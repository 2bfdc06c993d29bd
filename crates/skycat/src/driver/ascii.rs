//! Whitespace-delimited ASCII catalogs.
//!
//! ```text
//! /j/p/m2
//! Nearby stars with proper motion
//! 1  10.0000  20.0000  5.1 6.0  0.001 -0.02  Alpha
//! ```
//!
//! Line 1 holds single-letter flags after `/`, line 2 a description, and
//! every remaining non-blank line that does not start with `#` is a record.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::angle::{parse_dec, parse_ra};
use crate::coords::Frame;
use crate::driver::{check_record, line_spans, read_file, CatalogHandle, FormatDriver};
use crate::entry::{SourceEntry, NO_MAGNITUDE};
use crate::error::{Error, Result};
use crate::planner::SkyBox;
use crate::tokens::tokenize;

/// Parsing switches from the first line of an ASCII catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiFlags {
    /// Frame of every record; `None` when each record names its own.
    pub frame: Option<Frame>,
    pub proper_motion: bool,
    pub ra_sorted: bool,
    /// First field is an object name instead of a numeric id.
    pub names: bool,
    /// No id field; records are numbered in file order.
    pub no_id: bool,
    /// Each record ends its numeric fields with an epoch.
    pub epoch_column: bool,
    pub nmag: usize,
}

impl Default for AsciiFlags {
    fn default() -> AsciiFlags {
        AsciiFlags {
            frame: None,
            proper_motion: false,
            ra_sorted: false,
            names: false,
            no_id: false,
            epoch_column: false,
            nmag: 1,
        }
    }
}

impl AsciiFlags {
    /// Parse a flag line such as `/j/p/m2` or `/b /r`.
    ///
    /// # Errors
    /// [`Error::Malformed`] when the line does not start with `/` or holds an
    /// unknown flag letter.
    pub fn parse(line: &str) -> Result<AsciiFlags> {
        let line = line.trim();
        if !line.starts_with('/') {
            return Err(Error::malformed(format!(
                "ASCII catalog must start with a flag line, found {line:?}"
            )));
        }
        let mut flags = AsciiFlags::default();
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match c.to_ascii_lowercase() {
                '/' | ' ' | '\t' => {}
                'b' => flags.frame = Some(Frame::b1950()),
                'j' => flags.frame = Some(Frame::j2000()),
                'i' => flags.frame = Some(Frame::icrs()),
                'g' => flags.frame = Some(Frame::galactic()),
                'e' => flags.frame = Some(Frame::ecliptic()),
                'p' => flags.proper_motion = true,
                'r' => flags.ra_sorted = true,
                'o' => flags.names = true,
                'n' => flags.no_id = true,
                't' => flags.epoch_column = true,
                'm' => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        digits.push(d);
                        chars.next();
                    }
                    flags.nmag = digits
                        .parse()
                        .map_err(|_| Error::malformed(format!("flag m needs a count: {line:?}")))?;
                }
                other => {
                    return Err(Error::malformed(format!(
                        "unknown ASCII catalog flag {other:?}"
                    )))
                }
            }
        }
        Ok(flags)
    }

    fn has_id_field(&self) -> bool {
        !self.no_id && !self.names
    }
}

/// Decode one record line.
///
/// `num` is the 1-based record number, used as the id when the catalog stores none.
pub fn decode_line(line: &str, flags: &AsciiFlags, num: u64) -> Result<SourceEntry> {
    let mut tokens = tokenize(line, None)?;
    let mut field = |what: &str| {
        tokens
            .next_token()
            .ok_or_else(|| Error::malformed(format!("record {num} has no {what}: {line:?}")))
    };

    let mut name = None;
    let id = if flags.names {
        name = Some(field("name")?.to_string());
        num as f64
    } else if flags.has_id_field() {
        parse_number(field("id")?, "id")?
    } else {
        num as f64
    };

    let ra = parse_ra(field("right ascension")?)?;
    let dec = parse_dec(field("declination")?)?;

    let mut frame = match flags.frame {
        Some(frame) => frame,
        None => {
            let tok = field("equinox")?;
            Frame::from_token(tok)
                .ok_or_else(|| Error::malformed(format!("unknown coordinate system {tok:?}")))?
        }
    };

    let mut entry = SourceEntry::new(id, ra, dec, frame);
    entry.name = name;

    for _ in 0..flags.nmag {
        let mag = match tokens.next_token() {
            Some(tok) => parse_number(tok, "magnitude")?,
            None => NO_MAGNITUDE,
        };
        entry.mags.push(mag);
    }

    if flags.proper_motion {
        let mut pm = |what: &str| -> Result<f64> {
            let tok = tokens
                .next_token()
                .ok_or_else(|| Error::malformed(format!("record {num} has no {what}")))?;
            parse_number(tok, what)
        };
        // Seconds of time and arcseconds per year.
        entry.pm_ra = pm("RA proper motion")? * 15.0 / 3600.0;
        entry.pm_dec = pm("Dec proper motion")? / 3600.0;
    }

    if flags.epoch_column {
        let tok = tokens
            .next_token()
            .ok_or_else(|| Error::malformed(format!("record {num} has no epoch")))?;
        frame.epoch = parse_number(tok, "epoch")?;
        entry.frame = frame;
    }

    if entry.name.is_none() {
        let rest = tokens.get_token(-(tokens.consumed() as isize + 1));
        entry.name = rest.filter(|r| !r.is_empty()).map(str::to_string);
    }
    Ok(entry)
}

fn parse_number(tok: &str, what: &str) -> Result<f64> {
    tok.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::malformed(format!("{what} is not a number: {tok:?}")))
}

// ── Driver ──

/// A single-file ASCII catalog.
#[derive(Debug, Clone)]
pub struct AsciiDriver {
    name: String,
    path: PathBuf,
}

impl AsciiDriver {
    pub fn new(name: String, path: PathBuf) -> AsciiDriver {
        AsciiDriver { name, path }
    }
}

impl FormatDriver for AsciiDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn zones(&self, _limits: &SkyBox) -> Vec<u32> {
        vec![0]
    }

    fn open_zone(&self, _zone: u32) -> Result<Box<dyn CatalogHandle>> {
        Ok(Box::new(AsciiHandle::open(&self.path)?))
    }
}

/// An ASCII catalog held in memory, with one span per record line.
#[derive(Debug, Clone)]
pub struct AsciiHandle {
    text: String,
    records: Vec<(usize, usize)>,
    flags: AsciiFlags,
    description: String,
}

impl AsciiHandle {
    pub fn open(path: &Path) -> Result<AsciiHandle> {
        let bytes = read_file(path)?;
        let text = String::from_utf8(bytes)
            .map_err(|_| Error::malformed(format!("{} is not UTF-8 text", path.display())))?;
        let handle = AsciiHandle::from_text(text)?;
        debug!(
            path = %path.display(),
            count = handle.records.len(),
            ra_sorted = handle.flags.ra_sorted,
            "opened ASCII catalog"
        );
        Ok(handle)
    }

    pub fn from_text(text: String) -> Result<AsciiHandle> {
        let lines = line_spans(&text, false);
        let Some(&(fs, fe)) = lines.first() else {
            return Err(Error::malformed("empty ASCII catalog"));
        };
        let flags = AsciiFlags::parse(&text[fs..fe])?;

        let (description, body_start) = match lines.get(1) {
            Some(&(ds, de)) => (text[ds..de].trim().to_string(), de),
            None => (String::new(), fe),
        };
        let records = line_spans(&text[body_start..], true)
            .into_iter()
            .map(|(s, e)| (s + body_start, e + body_start))
            .collect();

        Ok(AsciiHandle {
            text,
            records,
            flags,
            description,
        })
    }

    pub fn flags(&self) -> &AsciiFlags {
        &self.flags
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Raw text of record `num` (1-based).
    pub fn line(&self, num: u64) -> Result<&str> {
        check_record(num, self.records.len() as u64)?;
        let (s, e) = self.records[num as usize - 1];
        Ok(&self.text[s..e])
    }
}

impl CatalogHandle for AsciiHandle {
    fn len(&self) -> u64 {
        self.records.len() as u64
    }

    fn read(&mut self, num: u64) -> Result<SourceEntry> {
        let line = self.line(num)?;
        decode_line(line, &self.flags, num)
    }

    fn is_ra_sorted(&self) -> bool {
        self.flags.ra_sorted
    }
}
