//! Building a KMC1 database with `Kmc1Writer` and reading it back with
//! `Kmc1Reader`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example build_and_read_database
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use kmctools::bundle::Bundle;
use kmctools::kmer::{Encoding, KmerVal};
use kmctools::ops::RecordSink;
use kmctools::readers::kmc1::{prefix_file_path, suffix_file_path, Cutoff, Kmc1Reader};
use kmctools::readers::BundleSource;
use kmctools::writers::kmc1::Kmc1Writer;

fn main() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let stem = dir.path().join("demo");
    let prefix_path = prefix_file_path(&stem);
    let suffix_path = suffix_file_path(&stem);

    let encoding = Encoding::canonical();
    let mut writer = Kmc1Writer::open(&prefix_path, &suffix_path, 4, 0, 1, 1, 255, 255, true)
        .expect("open KMC1 writer");
    for (seq, count) in [(b"AAAA", 3), (b"ACGT", 7), (b"TTTT", 1)] {
        writer
            .accept(&KmerVal::encode(seq, &encoding).unwrap(), count)
            .unwrap();
    }
    writer.close().expect("close KMC1 writer");

    let mut reader = Kmc1Reader::open(&prefix_path, &suffix_path, Cutoff { min: 0, max: u32::MAX }, None)
        .expect("open KMC1 reader");
    let mut bundle = Bundle::new();
    loop {
        reader.next_bundle(&mut bundle).expect("read bundle");
        if bundle.is_empty() {
            break;
        }
        while let Some((kmer, counter)) = bundle.pop() {
            println!("{}\t{counter}", String::from_utf8_lossy(&kmer.decode(&encoding)));
        }
    }
}
