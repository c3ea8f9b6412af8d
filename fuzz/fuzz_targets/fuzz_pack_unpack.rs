//! Fuzz target for the packed k-mer encode/decode roundtrip.
//!
//! Encoding then decoding an ASCII DNA string under the canonical encoding
//! must reproduce the input, modulo upper-casing.

#![no_main]

use kmctools::kmer::{Encoding, KmerVal};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 256 {
        return;
    }
    for &byte in data {
        if !matches!(byte, b'A' | b'C' | b'G' | b'T' | b'a' | b'c' | b'g' | b't') {
            return;
        }
    }

    let encoding = Encoding::canonical();
    let kmer = KmerVal::encode(data, &encoding).expect("valid bases must encode");
    let decoded = kmer.decode(&encoding);

    let normalized: Vec<u8> = data.iter().map(u8::to_ascii_uppercase).collect();
    assert_eq!(decoded, normalized, "encode/decode roundtrip failed");
    assert_eq!(kmer.k(), data.len());
});
