//! The decoded form of one catalog record.

use crate::coords::{Frame, Position};

/// Magnitude value written for a missing measurement.
pub const NO_MAGNITUDE: f64 = 99.99;

/// One decoded catalog record.
///
/// Positions are in degrees and proper motions in degrees per year of the
/// coordinate, both in `frame`. A driver fills in the catalog's native frame;
/// the planner rewrites the position and frame after conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    pub id: f64,
    pub name: Option<String>,
    pub ra: f64,
    pub dec: f64,
    pub pm_ra: f64,
    pub pm_dec: f64,
    pub mags: Vec<f64>,
    /// Peak, plate, or spectral-type code, depending on the catalog.
    pub peak: i32,
    /// Radial velocity in km/s, when the catalog stores one.
    pub radial_velocity: Option<f64>,
    pub frame: Frame,
}

impl SourceEntry {
    pub fn new(id: f64, ra: f64, dec: f64, frame: Frame) -> SourceEntry {
        SourceEntry {
            id,
            name: None,
            ra,
            dec,
            pm_ra: 0.0,
            pm_dec: 0.0,
            mags: Vec::new(),
            peak: 0,
            radial_velocity: None,
            frame,
        }
    }

    pub fn position(&self) -> Position {
        Position::with_pm(self.ra, self.dec, self.pm_ra, self.pm_dec)
    }

    pub fn set_position(&mut self, pos: Position, frame: Frame) {
        self.ra = pos.ra;
        self.dec = pos.dec;
        self.pm_ra = pos.pm_ra;
        self.pm_dec = pos.pm_dec;
        self.frame = frame;
    }

    /// Magnitude `index` (0-based), or [`NO_MAGNITUDE`] if the record has fewer.
    pub fn mag(&self, index: usize) -> f64 {
        self.mags.get(index).copied().unwrap_or(NO_MAGNITUDE)
    }
}

/// Pack a two-character spectral type into the `peak` field.
pub fn pack_spectral_type(code: [u8; 2]) -> i32 {
    ((code[0] as i32) << 8) | code[1] as i32
}

/// Recover the two spectral-type characters stored by [`pack_spectral_type`].
pub fn unpack_spectral_type(peak: i32) -> [u8; 2] {
    [((peak >> 8) & 0xFF) as u8, (peak & 0xFF) as u8]
}

/// Render a packed spectral type as text, dropping padding.
pub fn spectral_type_str(peak: i32) -> String {
    unpack_spectral_type(peak)
        .iter()
        .filter(|b| b.is_ascii_graphic())
        .map(|&b| b as char)
        .collect()
}
