//! CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`).
//!
//! The lookup table is computed at compile time, so there is no lazy global
//! state to initialise.

const POLYNOMIAL: u32 = 0xEDB8_8320;

static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { POLYNOMIAL ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

#[inline(always)]
fn step(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ TABLE[((crc ^ byte as u32) & 0xFF) as usize]
}

/// Compute the CRC-32 of `data`.
pub fn calc(data: &[u8]) -> u32 {
    update(0, data)
}

/// Continue a CRC-32 computation from a previously returned checksum.
///
/// `update(update(0, a), b) == calc(&[a, b].concat())`.
pub fn update(prior: u32, data: &[u8]) -> u32 {
    let mut crc = prior ^ 0xFFFF_FFFF;

    let mut chunks = data.chunks_exact(8);
    for chunk in &mut chunks {
        crc = step(crc, chunk[0]);
        crc = step(crc, chunk[1]);
        crc = step(crc, chunk[2]);
        crc = step(crc, chunk[3]);
        crc = step(crc, chunk[4]);
        crc = step(crc, chunk[5]);
        crc = step(crc, chunk[6]);
        crc = step(crc, chunk[7]);
    }
    for &byte in chunks.remainder() {
        crc = step(crc, byte);
    }

    crc ^ 0xFFFF_FFFF
}
