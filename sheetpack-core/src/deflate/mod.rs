//! Raw DEFLATE (RFC 1951) compressor.
//!
//! Every stream is a single final block using dynamic Huffman codes. The
//! whole input is parsed with LZ77 first, then the literal/length, distance
//! and code-length alphabets get fresh length-limited canonical codes.

pub mod bits;
pub mod heap;
pub mod huffman;
pub mod lz77;

use log::debug;

use crate::deflate::bits::BitWriter;
use crate::deflate::huffman::{canonical_codes, CodeLengthBuilder};
use crate::deflate::lz77::{Matcher, SymbolCode, Token, MAX_MATCH, MIN_MATCH, WINDOW_SIZE};
use crate::error::{Result, SheetpackError};

/// Literal/length alphabet size (0..=255 literals, 256 end of block, 257..=285 lengths).
pub const LITERAL_LENGTH_SYMBOLS: usize = 286;
pub const DISTANCE_SYMBOLS: usize = 30;
pub const CODE_LENGTH_SYMBOLS: usize = 19;
pub const END_OF_BLOCK: u16 = 256;

const LITERAL_LENGTH_CODES: CodeLengthBuilder = CodeLengthBuilder::fixed(LITERAL_LENGTH_SYMBOLS, 15);
const DISTANCE_CODES: CodeLengthBuilder = CodeLengthBuilder::fixed(DISTANCE_SYMBOLS, 7);
const CODE_LENGTH_CODES: CodeLengthBuilder = CodeLengthBuilder::fixed(CODE_LENGTH_SYMBOLS, 7);

/// Transmission order of the code-length alphabet's own code lengths.
const CODE_LENGTH_ORDER: [usize; CODE_LENGTH_SYMBOLS] =
    [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];

const BLOCK_TYPE_DYNAMIC: u32 = 2;

/// LZ77 parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeflateOptions {
    /// Farthest back-reference considered (1..=32768).
    pub window_size: usize,
    /// Longest match emitted (3..=258).
    pub max_match: usize,
    /// Matches shorter than this are held back one position in case the
    /// next position matches longer. 0 disables lazy matching.
    pub lazy: usize,
}

impl Default for DeflateOptions {
    fn default() -> Self {
        DeflateOptions {
            window_size: WINDOW_SIZE,
            max_match: MAX_MATCH,
            lazy: 0,
        }
    }
}

impl DeflateOptions {
    fn validate(&self) -> Result<()> {
        if !(1..=WINDOW_SIZE).contains(&self.window_size) {
            return Err(SheetpackError::InvalidConfig(format!(
                "window size {} outside 1..={}",
                self.window_size, WINDOW_SIZE
            )));
        }
        if !(MIN_MATCH..=MAX_MATCH).contains(&self.max_match) {
            return Err(SheetpackError::InvalidConfig(format!(
                "maximum match length {} outside {}..={}",
                self.max_match, MIN_MATCH, MAX_MATCH
            )));
        }
        if self.lazy > MAX_MATCH {
            return Err(SheetpackError::InvalidConfig(format!(
                "lazy threshold {} exceeds {}",
                self.lazy, MAX_MATCH
            )));
        }
        Ok(())
    }
}

/// A configured compressor. Holds no state between calls.
#[derive(Clone, Debug, Default)]
pub struct Deflater {
    options: DeflateOptions,
}

impl Deflater {
    /// Create a compressor, rejecting parameters outside the protocol limits.
    pub fn new(options: DeflateOptions) -> Result<Self> {
        options.validate()?;
        Ok(Deflater { options })
    }

    /// For presets known to be within limits.
    pub(crate) fn from_valid(options: DeflateOptions) -> Self {
        debug_assert!(options.validate().is_ok());
        Deflater { options }
    }

    pub fn options(&self) -> &DeflateOptions {
        &self.options
    }

    /// Compress `data` into one final dynamic-Huffman block.
    pub fn compress(&self, data: &[u8]) -> Vec<u8> {
        let scan = Matcher::new(&self.options).scan(data);

        let mut literal_freqs = scan.literal_freqs;
        let mut distance_freqs = scan.distance_freqs;
        ensure_two_symbols(&mut literal_freqs);
        ensure_two_symbols(&mut distance_freqs);

        let literal_lengths = LITERAL_LENGTH_CODES.lengths(&literal_freqs);
        let literal_codes = canonical_codes(&literal_lengths);
        let distance_lengths = DISTANCE_CODES.lengths(&distance_freqs);
        let distance_codes = canonical_codes(&distance_lengths);

        let hlit = trimmed_len(&literal_lengths, 257);
        let hdist = trimmed_len(&distance_lengths, 1);

        let mut header_lengths = Vec::with_capacity(hlit + hdist);
        header_lengths.extend_from_slice(&literal_lengths[..hlit]);
        header_lengths.extend_from_slice(&distance_lengths[..hdist]);
        let (tree_symbols, mut tree_freqs) = run_length_encode(&header_lengths);
        ensure_two_symbols(&mut tree_freqs);

        let tree_lengths = CODE_LENGTH_CODES.lengths(&tree_freqs);
        let tree_codes = canonical_codes(&tree_lengths);
        let permuted: Vec<u8> = CODE_LENGTH_ORDER.iter().map(|&s| tree_lengths[s]).collect();
        let hclen = trimmed_len(&permuted, 4);

        let mut writer = BitWriter::with_capacity(data.len() / 2 + 64);
        writer.write_bits(1, 1, true);
        writer.write_bits(BLOCK_TYPE_DYNAMIC, 2, true);
        writer.write_bits((hlit - 257) as u32, 5, true);
        writer.write_bits((hdist - 1) as u32, 5, true);
        writer.write_bits((hclen - 4) as u32, 4, true);
        for &length in &permuted[..hclen] {
            writer.write_bits(length as u32, 3, true);
        }

        for &(symbol, extra) in &tree_symbols {
            let s = symbol as usize;
            writer.write_bits(tree_codes[s] as u32, tree_lengths[s] as u32, false);
            match symbol {
                16 => writer.write_bits(extra as u32, 2, true),
                17 => writer.write_bits(extra as u32, 3, true),
                18 => writer.write_bits(extra as u32, 7, true),
                _ => {}
            }
        }

        let literal = |w: &mut BitWriter, symbol: usize| {
            w.write_bits(literal_codes[symbol] as u32, literal_lengths[symbol] as u32, false)
        };
        let extra = |w: &mut BitWriter, code: &SymbolCode| {
            if code.extra_bits > 0 {
                w.write_bits(code.extra as u32, code.extra_bits as u32, true);
            }
        };

        for token in &scan.tokens {
            match token {
                Token::Literal(byte) => literal(&mut writer, *byte as usize),
                Token::Match(m) => {
                    literal(&mut writer, m.length.symbol as usize);
                    extra(&mut writer, &m.length);
                    let d = m.distance.symbol as usize;
                    writer.write_bits(distance_codes[d] as u32, distance_lengths[d] as u32, false);
                    extra(&mut writer, &m.distance);
                }
            }
        }
        literal(&mut writer, END_OF_BLOCK as usize);

        let out = writer.finish();
        debug!(
            "deflate: {} bytes -> {} bytes ({} tokens)",
            data.len(),
            out.len(),
            scan.tokens.len()
        );
        out
    }
}

/// Compress with the default options.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    Deflater::default().compress(data)
}

/// Give at least two symbols a nonzero frequency so the resulting code is
/// complete. The padded symbols are never emitted.
fn ensure_two_symbols(freqs: &mut [u32]) {
    let mut used = freqs.iter().filter(|&&f| f > 0).count();
    for f in freqs.iter_mut() {
        if used >= 2 {
            break;
        }
        if *f == 0 {
            *f = 1;
            used += 1;
        }
    }
}

/// Length of `lengths` with trailing zeros removed, but at least `min`.
fn trimmed_len(lengths: &[u8], min: usize) -> usize {
    let mut len = lengths.len();
    while len > min && lengths[len - 1] == 0 {
        len -= 1;
    }
    len
}

/// Run-length encode code lengths with the code-length alphabet.
///
/// Returns `(symbol, extra)` pairs and the frequency of each of the 19 symbols:
/// 16 repeats the previous length 3..=6 times, 17 repeats zero 3..=10 times,
/// 18 repeats zero 11..=138 times.
fn run_length_encode(lengths: &[u8]) -> (Vec<(u8, u8)>, [u32; CODE_LENGTH_SYMBOLS]) {
    let mut symbols = Vec::with_capacity(lengths.len());
    let mut freqs = [0u32; CODE_LENGTH_SYMBOLS];

    let mut i = 0;
    while i < lengths.len() {
        let value = lengths[i];
        let mut j = i + 1;
        while j < lengths.len() && lengths[j] == value {
            j += 1;
        }
        let mut run = j - i;

        if value == 0 {
            if run < 3 {
                for _ in 0..run {
                    symbols.push((0, 0));
                    freqs[0] += 1;
                }
            } else {
                while run > 0 {
                    let mut repeat = run.min(138);
                    // Never leave a remainder too short to encode as a repeat.
                    if repeat > run.saturating_sub(3) && repeat < run {
                        repeat = run - 3;
                    }
                    if repeat <= 10 {
                        symbols.push((17, (repeat - 3) as u8));
                        freqs[17] += 1;
                    } else {
                        symbols.push((18, (repeat - 11) as u8));
                        freqs[18] += 1;
                    }
                    run -= repeat;
                }
            }
        } else {
            symbols.push((value, 0));
            freqs[value as usize] += 1;
            run -= 1;

            if run < 3 {
                for _ in 0..run {
                    symbols.push((value, 0));
                    freqs[value as usize] += 1;
                }
            } else {
                while run > 0 {
                    let mut repeat = run.min(6);
                    if repeat > run.saturating_sub(3) && repeat < run {
                        repeat = run - 3;
                    }
                    symbols.push((16, (repeat - 3) as u8));
                    freqs[16] += 1;
                    run -= repeat;
                }
            }
        }

        i = j;
    }

    (symbols, freqs)
}
