//! Bit-level output stream for DEFLATE.
//!
//! Bits are accumulated most-significant-first into a one-byte register and
//! each completed byte is stored bit-reversed, which yields the LSB-first
//! packing RFC 1951 requires. As a consequence:
//!
//! * `write_bits(code, len, false)` emits `code` starting from its most
//!   significant bit, the order Huffman codes are transmitted in;
//! * `write_bits(value, n, true)` emits `value` starting from its least
//!   significant bit, the order of every other header and extra-bits field.

/// `REVERSE_TABLE[b]` is `b` with its eight bits mirrored.
pub static REVERSE_TABLE: [u8; 256] = build_reverse_table();

const fn build_reverse_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut b = i as u8;
        let mut r = 0u8;
        let mut k = 0;
        while k < 8 {
            r = (r << 1) | (b & 1);
            b >>= 1;
            k += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
}

/// Mirror all 32 bits of `n` using the byte table.
#[inline]
pub fn reverse32(n: u32) -> u32 {
    (REVERSE_TABLE[(n & 0xFF) as usize] as u32) << 24
        | (REVERSE_TABLE[(n >> 8 & 0xFF) as usize] as u32) << 16
        | (REVERSE_TABLE[(n >> 16 & 0xFF) as usize] as u32) << 8
        | REVERSE_TABLE[(n >> 24 & 0xFF) as usize] as u32
}

/// Mirror the low `n` bits of `value` (`n <= 32`).
#[inline]
pub fn reverse_bits(value: u32, n: u32) -> u32 {
    match n {
        0 | 1 => value,
        2..=8 => (REVERSE_TABLE[(value & 0xFF) as usize] >> (8 - n)) as u32,
        _ => reverse32(value) >> (32 - n),
    }
}

const INITIAL_CAPACITY: usize = 0x8000;

/// Growable bit sink.
pub struct BitWriter {
    buffer: Vec<u8>,
    index: usize,
    bit_index: u32,
    current: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    /// Create a writer whose backing buffer starts at `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        BitWriter {
            buffer: vec![0; capacity.max(1)],
            index: 0,
            bit_index: 0,
            current: 0,
        }
    }

    /// Number of complete bytes written so far.
    pub fn byte_len(&self) -> usize {
        self.index
    }

    /// Append the low `n` bits of `value` (`n <= 32`).
    ///
    /// With `reversed` the bits go out least-significant first.
    pub fn write_bits(&mut self, value: u32, n: u32, reversed: bool) {
        debug_assert!(n <= 32, "bit width {} exceeds 32", n);
        let mut value = if n < 32 { value & ((1u32 << n) - 1) } else { value };
        if reversed && n > 1 {
            value = reverse_bits(value, n);
        }

        if n + self.bit_index < 8 {
            self.current = (self.current << n) | value;
            self.bit_index += n;
            return;
        }

        for i in 0..n {
            self.current = (self.current << 1) | ((value >> (n - i - 1)) & 1);
            self.bit_index += 1;
            if self.bit_index == 8 {
                self.push_byte();
            }
        }
    }

    fn push_byte(&mut self) {
        if self.index == self.buffer.len() {
            let doubled = self.buffer.len() * 2;
            self.buffer.resize(doubled, 0);
        }
        self.buffer[self.index] = REVERSE_TABLE[(self.current & 0xFF) as usize];
        self.index += 1;
        self.bit_index = 0;
        self.current = 0;
    }

    /// Flush the partial byte (zero padded) and return the written bytes.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_index > 0 {
            self.current <<= 8 - self.bit_index;
            self.push_byte();
        }
        self.buffer.truncate(self.index);
        self.buffer
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_table() {
        assert_eq!(REVERSE_TABLE[0b0000_0001], 0b1000_0000);
        assert_eq!(REVERSE_TABLE[0b1100_1010], 0b0101_0011);
        assert_eq!(reverse_bits(0b110, 3), 0b011);
        assert_eq!(reverse_bits(0b1, 9), 0b1_0000_0000);
        assert_eq!(reverse32(1), 0x8000_0000);
    }

    #[test]
    fn test_lsb_first_fields() {
        let mut w = BitWriter::new();
        // BFINAL=1, BTYPE=2
        w.write_bits(1, 1, true);
        w.write_bits(2, 2, true);
        assert_eq!(w.finish(), vec![0b0000_0101]);
    }

    #[test]
    fn test_msb_first_codes() {
        let mut w = BitWriter::new();
        // Huffman code 0b110 is read back bit by bit starting with the leading 1.
        w.write_bits(0b110, 3, false);
        assert_eq!(w.finish(), vec![0b0000_0011]);
    }

    #[test]
    fn test_spans_bytes() {
        let mut w = BitWriter::new();
        w.write_bits(0x1FF, 9, true);
        w.write_bits(0, 7, true);
        w.write_bits(0xABCD, 16, true);
        assert_eq!(w.finish(), vec![0xFF, 0x01, 0xCD, 0xAB]);
    }

    #[test]
    fn test_zero_width_is_noop() {
        let mut w = BitWriter::new();
        w.write_bits(0xFF, 0, true);
        assert!(w.finish().is_empty());
    }

    #[test]
    fn test_buffer_growth() {
        let mut w = BitWriter::with_capacity(1);
        for i in 0..1000u32 {
            w.write_bits(i & 0xFF, 8, true);
        }
        let out = w.finish();
        assert_eq!(out.len(), 1000);
        assert_eq!(out[999], (999 & 0xFF) as u8);
    }
}
