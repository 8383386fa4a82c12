use std::io::Read;

use flate2::read::DeflateDecoder;
use proptest::prelude::*;
use sheetpack_core::crc32;
use sheetpack_core::deflate::huffman::{canonical_codes, CodeLengthBuilder};
use sheetpack_core::{deflate, DeflateOptions, Deflater};

fn inflate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    DeflateDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

/// Bytes drawn from a small alphabet so that matches are common.
fn repetitive_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(b"abcde \n<>".to_vec()), 0..4000)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_arbitrary_bytes_round_trip(data in prop::collection::vec(any::<u8>(), 0..3000)) {
        prop_assert_eq!(inflate(&deflate(&data)), data);
    }

    #[test]
    fn test_repetitive_bytes_round_trip(data in repetitive_bytes()) {
        prop_assert_eq!(inflate(&deflate(&data)), data);
    }

    #[test]
    fn test_options_round_trip(
        data in repetitive_bytes(),
        window_size in 1usize..=32768,
        max_match in 3usize..=258,
        lazy in 0usize..=258,
    ) {
        let deflater = Deflater::new(DeflateOptions { window_size, max_match, lazy }).unwrap();
        prop_assert_eq!(inflate(&deflater.compress(&data)), data);
    }

    #[test]
    fn test_crc32_matches_reference(data in prop::collection::vec(any::<u8>(), 0..2000), split in 0usize..2000) {
        let split = split.min(data.len());
        prop_assert_eq!(crc32::calc(&data), crc32fast::hash(&data));
        let (a, b) = data.split_at(split);
        prop_assert_eq!(crc32::update(crc32::calc(a), b), crc32::calc(&data));
    }

    #[test]
    fn test_code_lengths_respect_limit(freqs in prop::collection::vec(0u32..10_000, 30)) {
        let builder = CodeLengthBuilder::new(30, 7).unwrap();
        let lengths = builder.lengths(&freqs);
        let used = freqs.iter().filter(|&&f| f > 0).count();

        for (&f, &l) in freqs.iter().zip(&lengths) {
            prop_assert_eq!(f == 0, l == 0);
            prop_assert!(l <= 7);
        }
        let kraft: u32 = lengths.iter().filter(|&&l| l > 0).map(|&l| 1u32 << (7 - l)).sum();
        if used >= 2 {
            prop_assert_eq!(kraft, 1 << 7);
        }

        // Canonical codes are distinct prefixes.
        let codes = canonical_codes(&lengths);
        let words: Vec<String> = codes
            .iter()
            .zip(&lengths)
            .filter(|(_, l)| **l > 0)
            .map(|(&c, &l)| format!("{:0width$b}", c, width = l as usize))
            .collect();
        for (i, a) in words.iter().enumerate() {
            for (j, b) in words.iter().enumerate() {
                if i != j {
                    prop_assert!(!b.starts_with(a.as_str()));
                }
            }
        }
    }
}

#[test]
fn test_highly_compressible_input() {
    let data = vec![0u8; 1 << 20];
    let out = deflate(&data);
    assert!(out.len() < 8192);
    assert_eq!(inflate(&out), data);
}
