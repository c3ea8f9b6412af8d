//! Filtering FASTA reads by membership in a k-mer set, as the `filter`
//! subcommand does, driven directly from the library.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example filter_reads
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::io::Write;

use kmctools::fastx_filter::{filter, MembershipSet};
use kmctools::kmer::{Encoding, KmerVal};

fn main() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let reads_path = dir.path().join("reads.fa");
    let output_path = dir.path().join("matched.fa");

    let mut reads_file = fs::File::create(&reads_path).unwrap();
    writeln!(reads_file, ">r1\nACGTACGTAC").unwrap();
    writeln!(reads_file, ">r2\nTTTTTTTTTT").unwrap();
    drop(reads_file);

    let encoding = Encoding::canonical();
    let mut set = MembershipSet::new(4, encoding);
    set.insert(KmerVal::encode(b"ACGT", &encoding).unwrap());

    filter(&reads_path, &output_path, &set).expect("filter reads");

    print!("{}", fs::read_to_string(&output_path).unwrap());
}
