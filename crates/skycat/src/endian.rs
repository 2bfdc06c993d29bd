//! Byte-order handling for binary catalog records.
//!
//! Binary catalogs are written in the byte order of whatever machine produced
//! them, so every field read takes a `swap` flag: `false` reads the bytes in
//! native order, `true` reverses them first. The flag is decided once per file
//! (see [`crate::driver::binary`]) and never stored back into the buffer.
//!
//! Zone catalogs with a fixed documented byte order use the `*_words_*`
//! helpers instead.

/// Read an `i16` from the first 2 bytes of the slice.
#[inline]
pub fn read_i16(buf: &[u8], swap: bool) -> i16 {
    let v = i16::from_ne_bytes([buf[0], buf[1]]);
    if swap {
        v.swap_bytes()
    } else {
        v
    }
}

/// Read an `i32` from the first 4 bytes of the slice.
#[inline]
pub fn read_i32(buf: &[u8], swap: bool) -> i32 {
    let v = i32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if swap {
        v.swap_bytes()
    } else {
        v
    }
}

/// Read an IEEE `f32` from the first 4 bytes of the slice.
#[inline]
pub fn read_f32(buf: &[u8], swap: bool) -> f32 {
    f32::from_bits(read_i32(buf, swap) as u32)
}

/// Read an IEEE `f64` from the first 8 bytes of the slice.
#[inline]
pub fn read_f64(buf: &[u8], swap: bool) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[..8]);
    let v = u64::from_ne_bytes(raw);
    f64::from_bits(if swap { v.swap_bytes() } else { v })
}

// --- Single-value writes ---

/// Write an `i16` into the first 2 bytes of the slice.
#[inline]
pub fn write_i16(buf: &mut [u8], val: i16, swap: bool) {
    let v = if swap { val.swap_bytes() } else { val };
    buf[..2].copy_from_slice(&v.to_ne_bytes());
}

/// Write an `i32` into the first 4 bytes of the slice.
#[inline]
pub fn write_i32(buf: &mut [u8], val: i32, swap: bool) {
    let v = if swap { val.swap_bytes() } else { val };
    buf[..4].copy_from_slice(&v.to_ne_bytes());
}

/// Write an `f32` into the first 4 bytes of the slice.
#[inline]
pub fn write_f32(buf: &mut [u8], val: f32, swap: bool) {
    write_i32(buf, val.to_bits() as i32, swap);
}

/// Write an `f64` into the first 8 bytes of the slice.
#[inline]
pub fn write_f64(buf: &mut [u8], val: f64, swap: bool) {
    let bits = val.to_bits();
    let v = if swap { bits.swap_bytes() } else { bits };
    buf[..8].copy_from_slice(&v.to_ne_bytes());
}

// --- Fixed-order word records ---

/// Decode `N` consecutive big-endian 32-bit words.
///
/// # Panics
/// Panics if `buf` is shorter than `4 * N` bytes.
pub fn be_words<const N: usize>(buf: &[u8]) -> [i32; N] {
    let raw: [i32; N] = bytemuck::pod_read_unaligned(&buf[..4 * N]);
    raw.map(i32::from_be)
}

/// Decode `N` consecutive little-endian 32-bit words.
///
/// # Panics
/// Panics if `buf` is shorter than `4 * N` bytes.
pub fn le_words<const N: usize>(buf: &[u8]) -> [i32; N] {
    let raw: [i32; N] = bytemuck::pod_read_unaligned(&buf[..4 * N]);
    raw.map(i32::from_le)
}

/// Encode words in big-endian order (used to build zone fixtures).
pub fn words_to_be(words: &[i32]) -> Vec<u8> {
    let be: Vec<i32> = words.iter().map(|w| w.to_be()).collect();
    bytemuck::cast_slice(&be).to_vec()
}

/// Encode words in little-endian order.
pub fn words_to_le(words: &[i32]) -> Vec<u8> {
    let le: Vec<i32> = words.iter().map(|w| w.to_le()).collect();
    bytemuck::cast_slice(&le).to_vec()
}
