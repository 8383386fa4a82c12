#![no_main]

//! Compress arbitrary bytes with arbitrary LZ77 parameters and check that a
//! reference inflater restores them exactly.

use std::io::Read;

use arbitrary::Arbitrary;
use flate2::read::DeflateDecoder;
use libfuzzer_sys::fuzz_target;
use sheetpack_core::{crc32, DeflateOptions, Deflater};

#[derive(Arbitrary, Debug)]
struct DeflateInput {
    window_size: u16,
    max_match: u16,
    lazy: u16,
    data: Vec<u8>,
}

fuzz_target!(|input: DeflateInput| {
    let options = DeflateOptions {
        window_size: input.window_size as usize,
        max_match: input.max_match as usize,
        lazy: input.lazy as usize,
    };
    // Out-of-range parameters must be rejected, never clamped.
    let deflater = match Deflater::new(options) {
        Ok(d) => d,
        Err(_) => {
            assert!(
                options.window_size == 0
                    || options.window_size > 32768
                    || !(3..=258).contains(&options.max_match)
                    || options.lazy > 258
            );
            return;
        }
    };

    let compressed = deflater.compress(&input.data);
    let mut restored = Vec::with_capacity(input.data.len());
    DeflateDecoder::new(&compressed[..])
        .read_to_end(&mut restored)
        .expect("compressed stream must inflate");
    assert_eq!(restored, input.data);
    assert_eq!(crc32::calc(&restored), crc32::calc(&input.data));
});
