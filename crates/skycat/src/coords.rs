//! Sky coordinate systems and conversion between them.
//!
//! Catalog drivers decode positions in the catalog's own frame; the planner
//! converts them into whatever frame the caller asked for through the
//! [`CoordConvert`] trait. [`StandardConverter`] covers the frames the
//! catalogs in this crate use: FK4, FK5, ICRS, galactic, and ecliptic.

use crate::angle::{normalize_ra, DEG_TO_RAD, RAD_TO_DEG};

/// A celestial coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordSys {
    /// FK5, equinox given in Julian years.
    Fk5,
    /// FK4, equinox given in Besselian years.
    Fk4,
    Icrs,
    Galactic,
    Ecliptic,
}

impl CoordSys {
    /// Parse a system name such as `fk5`, `B1950`, or `galactic`.
    pub fn parse(text: &str) -> Option<CoordSys> {
        let t = text.trim().to_ascii_lowercase();
        match t.as_str() {
            "fk5" | "j2000" | "2000" | "2000.0" => Some(CoordSys::Fk5),
            "fk4" | "b1950" | "1950" | "1950.0" => Some(CoordSys::Fk4),
            "icrs" => Some(CoordSys::Icrs),
            "galactic" | "gal" => Some(CoordSys::Galactic),
            "ecliptic" | "ecl" => Some(CoordSys::Ecliptic),
            _ => None,
        }
    }

    /// Conventional short name.
    pub fn name(self) -> &'static str {
        match self {
            CoordSys::Fk5 => "fk5",
            CoordSys::Fk4 => "fk4",
            CoordSys::Icrs => "icrs",
            CoordSys::Galactic => "galactic",
            CoordSys::Ecliptic => "ecliptic",
        }
    }

    fn default_equinox(self) -> f64 {
        match self {
            CoordSys::Fk4 => 1950.0,
            _ => 2000.0,
        }
    }
}

/// A coordinate system together with its equinox and the epoch positions refer to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub sys: CoordSys,
    pub equinox: f64,
    pub epoch: f64,
}

impl Frame {
    pub fn new(sys: CoordSys, equinox: f64, epoch: f64) -> Frame {
        Frame {
            sys,
            equinox,
            epoch,
        }
    }

    pub fn j2000() -> Frame {
        Frame::new(CoordSys::Fk5, 2000.0, 2000.0)
    }

    pub fn b1950() -> Frame {
        Frame::new(CoordSys::Fk4, 1950.0, 1950.0)
    }

    pub fn icrs() -> Frame {
        Frame::new(CoordSys::Icrs, 2000.0, 2000.0)
    }

    pub fn galactic() -> Frame {
        Frame::new(CoordSys::Galactic, 2000.0, 2000.0)
    }

    pub fn ecliptic() -> Frame {
        Frame::new(CoordSys::Ecliptic, 2000.0, 2000.0)
    }

    /// The same frame with a different epoch.
    pub fn at_epoch(self, epoch: f64) -> Frame {
        Frame { epoch, ..self }
    }

    /// Parse a per-record system token: `J2000`, `B1950`, `fk5`, `icrs`, ...
    ///
    /// The epoch is set equal to the equinox.
    pub fn from_token(token: &str) -> Option<Frame> {
        let sys = CoordSys::parse(token)?;
        let eq = sys.default_equinox();
        Some(Frame::new(sys, eq, eq))
    }

    /// True when both frames share axes, so a position needs no rotation
    /// between them (epochs may still differ).
    pub fn same_axes(&self, other: &Frame) -> bool {
        if self.sys != other.sys {
            return false;
        }
        match self.sys {
            CoordSys::Icrs | CoordSys::Galactic => true,
            _ => self.equinox == other.equinox,
        }
    }
}

/// Parse an equinox such as `J2000`, `B1950`, or `2000.0` into years.
pub fn parse_equinox(text: &str) -> Option<f64> {
    let t = text.trim();
    let digits = t
        .strip_prefix(['J', 'j', 'B', 'b'])
        .unwrap_or(t);
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A position with proper motion, all in degrees and degrees per year.
///
/// `pm_ra` is the rate of change of the right ascension coordinate itself,
/// not multiplied by `cos(dec)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub ra: f64,
    pub dec: f64,
    pub pm_ra: f64,
    pub pm_dec: f64,
}

impl Position {
    pub fn new(ra: f64, dec: f64) -> Position {
        Position {
            ra,
            dec,
            pm_ra: 0.0,
            pm_dec: 0.0,
        }
    }

    pub fn with_pm(ra: f64, dec: f64, pm_ra: f64, pm_dec: f64) -> Position {
        Position {
            ra,
            dec,
            pm_ra,
            pm_dec,
        }
    }

    fn has_pm(&self) -> bool {
        self.pm_ra != 0.0 || self.pm_dec != 0.0
    }
}

/// Converts positions between frames.
///
/// Implementations must be pure: the same inputs always give the same output.
pub trait CoordConvert {
    fn convert(&self, from: &Frame, to: &Frame, pos: Position) -> Position;
}

/// Rigorous rotations between the supported frames.
///
/// Proper motion is applied linearly from the input epoch to the output
/// epoch before rotating; the rotated proper motion is found by rotating the
/// position one year later and differencing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConverter;

impl CoordConvert for StandardConverter {
    fn convert(&self, from: &Frame, to: &Frame, pos: Position) -> Position {
        let moved = propagate(pos, to.epoch - from.epoch);
        if from.same_axes(to) {
            return moved;
        }

        let (ra, dec) = rotate(from, to, moved.ra, moved.dec);
        if !moved.has_pm() {
            return Position::new(ra, dec);
        }

        let later = propagate(moved, 1.0);
        let (ra1, dec1) = rotate(from, to, later.ra, later.dec);
        let mut dra = ra1 - ra;
        if dra > 180.0 {
            dra -= 360.0;
        } else if dra < -180.0 {
            dra += 360.0;
        }
        Position::with_pm(ra, dec, dra, dec1 - dec)
    }
}

/// Move a position along its proper motion by `years`.
fn propagate(pos: Position, years: f64) -> Position {
    if years == 0.0 || !pos.has_pm() {
        return Position {
            ra: normalize_ra(pos.ra),
            ..pos
        };
    }
    let mut ra = pos.ra + pos.pm_ra * years;
    let mut dec = pos.dec + pos.pm_dec * years;
    // Carried over a pole: reflect back and move to the opposite meridian.
    if dec > 90.0 {
        dec = 180.0 - dec;
        ra += 180.0;
    } else if dec < -90.0 {
        dec = -180.0 - dec;
        ra += 180.0;
    }
    Position {
        ra: normalize_ra(ra),
        dec,
        ..pos
    }
}

// ── Rotations ──

type Mat3 = [[f64; 3]; 3];

const IDENTITY: Mat3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// FK4 B1950 to FK5 J2000, E-terms not removed.
const FK4_TO_FK5: Mat3 = [
    [0.999_925_678_2, -0.011_182_061_1, -0.004_857_947_7],
    [0.011_182_061_0, 0.999_937_478_4, -0.000_027_176_5],
    [0.004_857_947_9, -0.000_027_147_4, 0.999_988_199_7],
];

/// FK5 J2000 to galactic.
const J2000_TO_GALACTIC: Mat3 = [
    [-0.054_875_560_4, -0.873_437_090_2, -0.483_835_015_5],
    [0.494_109_427_9, -0.444_829_630_0, 0.746_982_244_5],
    [-0.867_666_149_0, -0.198_076_373_4, 0.455_983_776_2],
];

fn rotate(from: &Frame, to: &Frame, ra: f64, dec: f64) -> (f64, f64) {
    let v = to_j2000(from, unit_vector(ra, dec));
    let (ra, dec) = angles(from_j2000(to, v));
    (normalize_ra(ra), dec)
}

/// Rotate a unit vector in `frame` into FK5 J2000 axes.
fn to_j2000(frame: &Frame, v: [f64; 3]) -> [f64; 3] {
    match frame.sys {
        CoordSys::Fk5 => mat_vec(&precession(frame.equinox, 2000.0), v),
        CoordSys::Icrs => v,
        CoordSys::Fk4 => {
            let eq = besselian_to_julian(frame.equinox);
            let at_b1950 = mat_vec(&precession(eq, besselian_to_julian(1950.0)), v);
            mat_vec(&FK4_TO_FK5, at_b1950)
        }
        CoordSys::Galactic => mat_vec(&transpose(&J2000_TO_GALACTIC), v),
        CoordSys::Ecliptic => {
            let eq = mat_vec(&transpose(&ecliptic_matrix(frame.equinox)), v);
            mat_vec(&precession(frame.equinox, 2000.0), eq)
        }
    }
}

/// Rotate a unit vector in FK5 J2000 axes into `frame`.
fn from_j2000(frame: &Frame, v: [f64; 3]) -> [f64; 3] {
    match frame.sys {
        CoordSys::Fk5 => mat_vec(&precession(2000.0, frame.equinox), v),
        CoordSys::Icrs => v,
        CoordSys::Fk4 => {
            let at_b1950 = mat_vec(&transpose(&FK4_TO_FK5), v);
            let eq = besselian_to_julian(frame.equinox);
            mat_vec(&precession(besselian_to_julian(1950.0), eq), at_b1950)
        }
        CoordSys::Galactic => mat_vec(&J2000_TO_GALACTIC, v),
        CoordSys::Ecliptic => {
            let eq = mat_vec(&precession(2000.0, frame.equinox), v);
            mat_vec(&ecliptic_matrix(frame.equinox), eq)
        }
    }
}

/// IAU 1976 precession matrix between two Julian epochs.
fn precession(from: f64, to: f64) -> Mat3 {
    if from == to {
        return IDENTITY;
    }
    let big_t = (from - 2000.0) / 100.0;
    let t = (to - from) / 100.0;
    let arcsec = DEG_TO_RAD / 3600.0;

    let w = 2306.2181 + (1.39656 - 0.000139 * big_t) * big_t;
    let zeta = (w + ((0.30188 - 0.000344 * big_t) + 0.017998 * t) * t) * t * arcsec;
    let z = (w + ((1.09468 + 0.000066 * big_t) + 0.018203 * t) * t) * t * arcsec;
    let theta = ((2004.3109 + (-0.85330 - 0.000217 * big_t) * big_t)
        + ((-0.42665 - 0.000217 * big_t) - 0.041833 * t) * t)
        * t
        * arcsec;

    mat_mul(&mat_mul(&rot_z(-z), &rot_y(theta)), &rot_z(-zeta))
}

/// Equatorial to ecliptic rotation for the mean obliquity at `equinox`.
fn ecliptic_matrix(equinox: f64) -> Mat3 {
    let t = (equinox - 2000.0) / 100.0;
    let eps = (84381.448 + (-46.8150 + (-0.00059 + 0.001813 * t) * t) * t) / 3600.0 * DEG_TO_RAD;
    rot_x(eps)
}

fn besselian_to_julian(b: f64) -> f64 {
    let jd = 2_415_020.313_52 + (b - 1900.0) * 365.242_198_781;
    2000.0 + (jd - 2_451_545.0) / 365.25
}

fn rot_x(a: f64) -> Mat3 {
    let (s, c) = (libm::sin(a), libm::cos(a));
    [[1.0, 0.0, 0.0], [0.0, c, s], [0.0, -s, c]]
}

fn rot_y(a: f64) -> Mat3 {
    let (s, c) = (libm::sin(a), libm::cos(a));
    [[c, 0.0, -s], [0.0, 1.0, 0.0], [s, 0.0, c]]
}

fn rot_z(a: f64) -> Mat3 {
    let (s, c) = (libm::sin(a), libm::cos(a));
    [[c, s, 0.0], [-s, c, 0.0], [0.0, 0.0, 1.0]]
}

fn mat_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn mat_vec(m: &Mat3, v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

fn transpose(m: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in m.iter().enumerate() {
        for (j, &cell) in row.iter().enumerate() {
            out[j][i] = cell;
        }
    }
    out
}

fn unit_vector(ra: f64, dec: f64) -> [f64; 3] {
    let (sr, cr) = (libm::sin(ra * DEG_TO_RAD), libm::cos(ra * DEG_TO_RAD));
    let (sd, cd) = (libm::sin(dec * DEG_TO_RAD), libm::cos(dec * DEG_TO_RAD));
    [cd * cr, cd * sr, sd]
}

fn angles(v: [f64; 3]) -> (f64, f64) {
    let rho = libm::sqrt(v[0] * v[0] + v[1] * v[1]);
    let ra = if rho == 0.0 {
        0.0
    } else {
        libm::atan2(v[1], v[0]) * RAD_TO_DEG
    };
    let dec = libm::atan2(v[2], rho) * RAD_TO_DEG;
    (ra, dec)
}
