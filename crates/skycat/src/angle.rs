//! Angle parsing and spherical helpers shared by the drivers and the planner.

use crate::error::{Error, Result};

pub const DEG_TO_RAD: f64 = core::f64::consts::PI / 180.0;
pub const RAD_TO_DEG: f64 = 180.0 / core::f64::consts::PI;

/// Bring a right ascension into `[0, 360)`.
pub fn normalize_ra(ra: f64) -> f64 {
    let mut r = ra % 360.0;
    if r < 0.0 {
        r += 360.0;
    }
    // A tiny negative input rounds up to exactly 360 above.
    if r >= 360.0 {
        r = 0.0;
    }
    r
}

/// Great-circle separation between two positions, all in degrees.
///
/// Uses the Vincenty formula, which stays accurate for both tiny and
/// near-antipodal separations.
pub fn separation_deg(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (sd1, cd1) = (libm::sin(dec1 * DEG_TO_RAD), libm::cos(dec1 * DEG_TO_RAD));
    let (sd2, cd2) = (libm::sin(dec2 * DEG_TO_RAD), libm::cos(dec2 * DEG_TO_RAD));
    let dra = (ra2 - ra1) * DEG_TO_RAD;
    let (sdra, cdra) = (libm::sin(dra), libm::cos(dra));

    let num1 = cd2 * sdra;
    let num2 = cd1 * sd2 - sd1 * cd2 * cdra;
    let num = libm::sqrt(num1 * num1 + num2 * num2);
    let den = sd1 * sd2 + cd1 * cd2 * cdra;
    libm::atan2(num, den) * RAD_TO_DEG
}

/// Parse a right ascension.
///
/// Sexagesimal text (`hh:mm:ss.s` or `hh mm ss.s`) is read as hours;
/// a plain number is read as degrees.
pub fn parse_ra(text: &str) -> Result<f64> {
    let text = text.trim();
    if is_sexagesimal(text) {
        Ok(normalize_ra(parse_sexagesimal(text)? * 15.0))
    } else {
        parse_degrees(text).map(normalize_ra)
    }
}

/// Parse a declination from `±dd:mm:ss.s` or decimal degrees.
pub fn parse_dec(text: &str) -> Result<f64> {
    let text = text.trim();
    let dec = if is_sexagesimal(text) {
        parse_sexagesimal(text)?
    } else {
        parse_degrees(text)?
    };
    if !(-90.0..=90.0).contains(&dec) {
        return Err(Error::malformed(format!("declination out of range: {text}")));
    }
    Ok(dec)
}

fn is_sexagesimal(text: &str) -> bool {
    text.contains(':') || text.trim().contains(' ')
}

fn parse_degrees(text: &str) -> Result<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::malformed(format!("not a number: {text:?}")))
}

/// Parse `[-]a:b:c` (or space separated) into `a + b/60 + c/3600`, keeping the sign.
fn parse_sexagesimal(text: &str) -> Result<f64> {
    let negative = text.starts_with('-');
    let body = text.trim_start_matches(['-', '+']);
    let mut total = 0.0;
    let mut scale = 1.0;
    let mut parts = 0;
    for part in body.split(|c: char| c == ':' || c.is_whitespace()) {
        if part.is_empty() {
            continue;
        }
        let v = parse_degrees(part)?;
        if v < 0.0 {
            return Err(Error::malformed(format!("bad sexagesimal value: {text:?}")));
        }
        total += v / scale;
        scale *= 60.0;
        parts += 1;
    }
    if parts == 0 || parts > 3 {
        return Err(Error::malformed(format!("bad sexagesimal value: {text:?}")));
    }
    Ok(if negative { -total } else { total })
}

/// Format a right ascension in degrees as `hh:mm:ss.sss`.
pub fn format_ra_hms(ra: f64) -> String {
    let total_ms = libm::round(normalize_ra(ra) / 15.0 * 3_600_000.0) as i64 % 86_400_000;
    let h = total_ms / 3_600_000;
    let m = (total_ms / 60_000) % 60;
    let s = (total_ms % 60_000) as f64 / 1000.0;
    format!("{h:02}:{m:02}:{s:06.3}")
}

/// Format a declination in degrees as `±dd:mm:ss.ss`.
pub fn format_dec_dms(dec: f64) -> String {
    let sign = if dec < 0.0 { '-' } else { '+' };
    let total_cs = libm::round(dec.abs() * 360_000.0) as i64;
    let d = total_cs / 360_000;
    let m = (total_cs / 6_000) % 60;
    let s = (total_cs % 6_000) as f64 / 100.0;
    format!("{sign}{d:02}:{m:02}:{s:05.2}")
}
