//! Length-limited canonical Huffman codes.
//!
//! Code lengths come from the package-merge algorithm, which yields an
//! optimal prefix code under a maximum code length. When the unrestricted
//! Huffman tree already fits the limit the result has the same cost as a
//! plain Huffman code.

use crate::deflate::heap::HuffmanHeap;
use crate::error::{Result, SheetpackError};

/// Largest code length DEFLATE can transmit.
pub const MAX_CODE_LENGTH: u8 = 15;

/// Computes code lengths for one alphabet under one length limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodeLengthBuilder {
    symbols: usize,
    limit: u8,
}

impl CodeLengthBuilder {
    /// Validate an alphabet size / limit pair.
    ///
    /// Fails unless `1 <= limit <= 15` and every symbol can receive a code,
    /// i.e. `symbols <= 2^limit`.
    pub fn new(symbols: usize, limit: u8) -> Result<Self> {
        if limit == 0 || limit > MAX_CODE_LENGTH || symbols == 0 || symbols > 1usize << limit {
            return Err(SheetpackError::CodeLengthLimit { limit, symbols });
        }
        Ok(CodeLengthBuilder { symbols, limit })
    }

    /// Builder for a fixed protocol alphabet, checked at compile time.
    pub(crate) const fn fixed(symbols: usize, limit: u8) -> Self {
        assert!(limit >= 1 && limit <= MAX_CODE_LENGTH);
        assert!(symbols >= 1 && symbols <= 1usize << limit);
        CodeLengthBuilder { symbols, limit }
    }

    pub fn symbols(&self) -> usize {
        self.symbols
    }

    pub fn limit(&self) -> u8 {
        self.limit
    }

    /// Code length per symbol; 0 marks an unused symbol.
    ///
    /// A lone used symbol gets length 1.
    pub fn lengths(&self, freqs: &[u32]) -> Vec<u8> {
        assert_eq!(
            freqs.len(),
            self.symbols,
            "frequency table does not match the alphabet"
        );
        let mut lengths = vec![0u8; self.symbols];

        let mut heap = HuffmanHeap::with_capacity(self.symbols);
        for (symbol, &freq) in freqs.iter().enumerate() {
            if freq > 0 {
                heap.push(symbol, -(freq as i64));
            }
        }

        match heap.len() {
            0 => return lengths,
            1 => {
                if let Some(node) = heap.pop() {
                    lengths[node.index] = 1;
                }
                return lengths;
            }
            _ => {}
        }

        // Lowest frequency first.
        let mut order = Vec::with_capacity(heap.len());
        let mut weights = Vec::with_capacity(heap.len());
        while let Some(node) = heap.pop() {
            order.push(node.index);
            weights.push(node.frequency());
        }

        for (symbol, length) in order.into_iter().zip(package_merge(&weights, self.limit)) {
            lengths[symbol] = length;
        }
        lengths
    }
}

#[derive(Clone, Copy)]
struct Item {
    weight: u64,
    /// Position in the sorted leaf list, `None` for a package.
    leaf: Option<usize>,
}

/// Package-merge over leaves sorted by ascending weight.
///
/// Requires `2 <= weights.len() <= 2^limit`. Returns the code length of each
/// leaf, in input order.
fn package_merge(weights: &[u64], limit: u8) -> Vec<u8> {
    let n = weights.len();
    debug_assert!(n >= 2 && n <= 1usize << limit);

    let leaves: Vec<Item> = weights
        .iter()
        .enumerate()
        .map(|(i, &weight)| Item { weight, leaf: Some(i) })
        .collect();

    // levels[0] holds the deepest list (length `limit`), levels[limit-1] the root list.
    let mut levels: Vec<Vec<Item>> = Vec::with_capacity(limit as usize);
    levels.push(leaves.clone());
    for _ in 1..limit {
        let previous = &levels[levels.len() - 1];
        let packages: Vec<Item> = previous
            .chunks_exact(2)
            .map(|pair| Item { weight: pair[0].weight + pair[1].weight, leaf: None })
            .collect();
        levels.push(merge(&leaves, &packages));
    }

    // The optimal solution takes the 2n-2 cheapest items of the root list.
    // Packages taken at one level select a prefix of twice as many items
    // one level deeper, so the walk needs no recursion; its depth is `limit`.
    let mut lengths = vec![0u8; n];
    let mut take = 2 * n - 2;
    for level in levels.iter().rev() {
        let mut packages = 0;
        for item in &level[..take] {
            match item.leaf {
                Some(i) => lengths[i] += 1,
                None => packages += 1,
            }
        }
        take = 2 * packages;
    }
    lengths
}

/// Merge two ascending lists; leaves win ties.
fn merge(leaves: &[Item], packages: &[Item]) -> Vec<Item> {
    let mut merged = Vec::with_capacity(leaves.len() + packages.len());
    let (mut i, mut j) = (0, 0);
    while i < leaves.len() && j < packages.len() {
        if leaves[i].weight <= packages[j].weight {
            merged.push(leaves[i]);
            i += 1;
        } else {
            merged.push(packages[j]);
            j += 1;
        }
    }
    merged.extend_from_slice(&leaves[i..]);
    merged.extend_from_slice(&packages[j..]);
    merged
}

/// Assign canonical code values (RFC 1951 section 3.2.2) to code lengths.
pub fn canonical_codes(lengths: &[u8]) -> Vec<u16> {
    let mut bl_count = [0u32; MAX_CODE_LENGTH as usize + 1];
    for &len in lengths {
        if len > 0 {
            bl_count[len as usize] += 1;
        }
    }

    let mut next_code = [0u32; MAX_CODE_LENGTH as usize + 1];
    let mut code = 0u32;
    for bits in 1..=MAX_CODE_LENGTH as usize {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                0
            } else {
                let c = next_code[len as usize];
                next_code[len as usize] += 1;
                c as u16
            }
        })
        .collect()
}
