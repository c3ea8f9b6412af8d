//! Fuzz target for `KmerVal::encode` on arbitrary byte input.
//!
//! Encoding must never panic: it accepts any ASCII DNA string and rejects
//! anything containing a non-ACGT byte.

#![no_main]

use kmctools::kmer::{Encoding, KmerVal};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 256 {
        return;
    }

    let encoding = Encoding::canonical();
    let has_invalid_base = data
        .iter()
        .any(|&b| !matches!(b, b'A' | b'C' | b'G' | b'T' | b'a' | b'c' | b'g' | b't'));

    match KmerVal::encode(data, &encoding) {
        Ok(kmer) => {
            assert!(!has_invalid_base, "encode accepted a non-ACGT byte");
            assert_eq!(kmer.k(), data.len());
        }
        Err(_) => {
            assert!(has_invalid_base, "encode rejected an all-ACGT string");
        }
    }
});
