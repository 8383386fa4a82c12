//! LZ77 matching and the RFC 1951 length/distance symbol tables.

#[cfg(feature = "fast-hash")]
use hashbrown::HashMap;
#[cfg(not(feature = "fast-hash"))]
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::OnceLock;

use crate::deflate::{DeflateOptions, DISTANCE_SYMBOLS, END_OF_BLOCK, LITERAL_LENGTH_SYMBOLS};

/// Shortest match DEFLATE can encode.
pub const MIN_MATCH: usize = 3;
/// Longest match DEFLATE can encode.
pub const MAX_MATCH: usize = 258;
/// Largest back-reference distance DEFLATE can encode.
pub const WINDOW_SIZE: usize = 32768;

/// Base length for symbols 257..=285.
const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Base distance for symbols 0..=29.
const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

const DISTANCE_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// A symbol plus the extra bits that refine it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolCode {
    pub symbol: u16,
    pub extra: u16,
    pub extra_bits: u8,
}

/// `(symbol, extra, extra_bits)` for every length 0..=258; entries below 3 are unused.
fn length_table() -> &'static [SymbolCode; MAX_MATCH + 1] {
    static TABLE: OnceLock<[SymbolCode; MAX_MATCH + 1]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [SymbolCode { symbol: 0, extra: 0, extra_bits: 0 }; MAX_MATCH + 1];
        // Symbol 284 nominally spans 227..=258; 285 claims 258 afterwards.
        for (i, (&base, &bits)) in LENGTH_BASE.iter().zip(LENGTH_EXTRA.iter()).enumerate() {
            let base = base as usize;
            let end = (base + (1usize << bits)).min(MAX_MATCH + 1);
            for length in base..end {
                table[length] = SymbolCode {
                    symbol: 257 + i as u16,
                    extra: (length - base) as u16,
                    extra_bits: bits,
                };
            }
        }
        table
    })
}

/// Length symbol (257..=285) for a match length.
pub fn length_code(length: usize) -> SymbolCode {
    assert!(
        (MIN_MATCH..=MAX_MATCH).contains(&length),
        "match length {} outside {}..={}",
        length,
        MIN_MATCH,
        MAX_MATCH
    );
    length_table()[length]
}

/// Distance symbol (0..=29) for a back-reference distance.
pub fn distance_code(distance: usize) -> SymbolCode {
    if distance <= WINDOW_SIZE {
        for (i, &base) in DISTANCE_BASE.iter().enumerate().rev() {
            if distance >= base as usize {
                return SymbolCode {
                    symbol: i as u16,
                    extra: (distance - base as usize) as u16,
                    extra_bits: DISTANCE_EXTRA[i],
                };
            }
        }
    }
    unreachable!("match distance {} outside 1..={}", distance, WINDOW_SIZE)
}

/// A back-reference found by the matcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub length: usize,
    pub distance: usize,
}

/// A match translated into DEFLATE symbols.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchSymbols {
    pub length: SymbolCode,
    pub distance: SymbolCode,
}

impl Match {
    pub fn new(length: usize, distance: usize) -> Self {
        debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&length));
        debug_assert!((1..=WINDOW_SIZE).contains(&distance));
        Match { length, distance }
    }

    pub fn to_symbols(&self) -> MatchSymbols {
        MatchSymbols {
            length: length_code(self.length),
            distance: distance_code(self.distance),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    Literal(u8),
    Match(MatchSymbols),
}

/// Tokens of one block plus the symbol frequencies they produce.
///
/// The end-of-block symbol is counted but not stored as a token.
pub struct Lz77Output {
    pub tokens: Vec<Token>,
    pub literal_freqs: [u32; LITERAL_LENGTH_SYMBOLS],
    pub distance_freqs: [u32; DISTANCE_SYMBOLS],
}

impl Lz77Output {
    fn new(capacity: usize) -> Self {
        let mut literal_freqs = [0u32; LITERAL_LENGTH_SYMBOLS];
        literal_freqs[END_OF_BLOCK as usize] = 1;
        Lz77Output {
            tokens: Vec::with_capacity(capacity),
            literal_freqs,
            distance_freqs: [0u32; DISTANCE_SYMBOLS],
        }
    }

    fn literal(&mut self, byte: u8) {
        self.tokens.push(Token::Literal(byte));
        self.literal_freqs[byte as usize] += 1;
    }

    fn matched(&mut self, m: Match) {
        let symbols = m.to_symbols();
        self.literal_freqs[symbols.length.symbol as usize] += 1;
        self.distance_freqs[symbols.distance.symbol as usize] += 1;
        self.tokens.push(Token::Match(symbols));
    }
}

/// Hash chains keyed by the next three bytes. Keys are exact, so every
/// chain entry shares its first three bytes with the position being looked up.
///
/// Only the most recent `window` positions are kept: inserting position `p`
/// evicts `p - window`, and a chain that empties is removed with its key.
struct Chains {
    table: HashMap<u32, VecDeque<usize>>,
    window: usize,
    live: usize,
}

impl Chains {
    fn new(window: usize) -> Self {
        Chains { table: HashMap::new(), window, live: 0 }
    }

    fn key(data: &[u8], position: usize) -> u32 {
        (data[position] as u32) << 16 | (data[position + 1] as u32) << 8 | data[position + 2] as u32
    }

    fn get(&self, key: u32) -> Option<&VecDeque<usize>> {
        self.table.get(&key)
    }

    fn insert(&mut self, data: &[u8], position: usize) {
        if position >= self.window {
            self.evict(data, position - self.window);
        }
        if position + MIN_MATCH <= data.len() {
            self.table
                .entry(Self::key(data, position))
                .or_default()
                .push_back(position);
            self.live += 1;
        }
    }

    /// Positions are inserted in order, so `expired` is the oldest entry of
    /// its chain.
    fn evict(&mut self, data: &[u8], expired: usize) {
        if expired + MIN_MATCH > data.len() {
            return;
        }
        let key = Self::key(data, expired);
        if let Some(chain) = self.table.get_mut(&key) {
            if chain.front() == Some(&expired) {
                chain.pop_front();
                self.live -= 1;
            }
            if chain.is_empty() {
                self.table.remove(&key);
            }
        }
    }
}

/// Greedy LZ77 parse with an optional single position of lazy look-ahead.
pub(crate) struct Matcher<'a> {
    options: &'a DeflateOptions,
}

impl<'a> Matcher<'a> {
    pub(crate) fn new(options: &'a DeflateOptions) -> Self {
        Matcher { options }
    }

    pub(crate) fn scan(&self, data: &[u8]) -> Lz77Output {
        let mut chains = Chains::new(self.options.window_size);
        self.scan_into(data, &mut chains)
    }

    fn scan_into(&self, data: &[u8], chains: &mut Chains) -> Lz77Output {
        let len = data.len();
        let mut out = Lz77Output::new(len);
        // A match found at `position - 1` whose emission was deferred.
        let mut pending: Option<Match> = None;
        let mut position = 0;

        while position < len {
            if position + MIN_MATCH > len {
                let mut tail = position;
                if let Some(prev) = pending.take() {
                    out.matched(prev);
                    tail = position - 1 + prev.length;
                }
                for &byte in &data[tail..] {
                    out.literal(byte);
                }
                break;
            }

            let key = Chains::key(data, position);
            let best = chains
                .get(key)
                .map(|chain| self.longest_match(data, position, chain));

            let next = match (pending.take(), best) {
                (Some(prev), Some(current)) if current.length > prev.length => {
                    out.literal(data[position - 1]);
                    out.matched(current);
                    position + current.length
                }
                (Some(prev), _) => {
                    out.matched(prev);
                    position - 1 + prev.length
                }
                (None, Some(current)) if current.length < self.options.lazy => {
                    pending = Some(current);
                    position + 1
                }
                (None, Some(current)) => {
                    out.matched(current);
                    position + current.length
                }
                (None, None) => {
                    out.literal(data[position]);
                    position + 1
                }
            };

            for p in position..next {
                chains.insert(data, p);
            }
            position = next;
        }

        out
    }

    /// Longest earlier occurrence of the bytes at `position`, newest first.
    ///
    /// Once a match of length `best` is known, a candidate is only extended
    /// if it agrees on bytes `MIN_MATCH..best`; otherwise it is skipped.
    fn longest_match(&self, data: &[u8], position: usize, chain: &VecDeque<usize>) -> Match {
        let max = self.options.max_match.min(data.len() - position);
        let mut best_length = 0;
        let mut best_position = position;

        for &candidate in chain.iter().rev() {
            let mut length = MIN_MATCH;
            if best_length > MIN_MATCH {
                if (MIN_MATCH..best_length)
                    .rev()
                    .any(|j| data[candidate + j] != data[position + j])
                {
                    continue;
                }
                length = best_length;
            }
            while length < max && data[candidate + length] == data[position + length] {
                length += 1;
            }
            if length > best_length {
                best_length = length;
                best_position = candidate;
            }
            if length >= max {
                break;
            }
        }

        Match::new(best_length, position - best_position)
    }
}
