//! Composing an expression tree over two small KMC1 databases: the same
//! `ExprNode` machinery the `complex` subcommand drives, used directly as a
//! library.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example set_algebra
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use kmctools::bundle::Bundle;
use kmctools::kmer::{Encoding, KmerVal};
use kmctools::ops::{Combiner, ExprNode, RecordSink};
use kmctools::readers::kmc1::{prefix_file_path, suffix_file_path, Cutoff, Kmc1Reader};
use kmctools::readers::BundleSource;
use kmctools::writers::kmc1::Kmc1Writer;

fn build(dir: &std::path::Path, name: &str, records: &[(&[u8], u32)], encoding: &Encoding) -> (std::path::PathBuf, std::path::PathBuf) {
    let stem = dir.join(name);
    let prefix_path = prefix_file_path(&stem);
    let suffix_path = suffix_file_path(&stem);
    let mut writer = Kmc1Writer::open(&prefix_path, &suffix_path, 4, 0, 1, 1, 255, 255, true).unwrap();
    for (seq, count) in records {
        writer.accept(&KmerVal::encode(seq, encoding).unwrap(), *count).unwrap();
    }
    writer.close().unwrap();
    (prefix_path, suffix_path)
}

fn main() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let encoding = Encoding::canonical();

    let (left_pre, left_suf) = build(dir.path(), "left", &[(b"AAAA", 3), (b"ACGT", 7)], &encoding);
    let (right_pre, right_suf) = build(dir.path(), "right", &[(b"ACGT", 2), (b"TTTT", 5)], &encoding);

    let cutoff = Cutoff { min: 0, max: u32::MAX };
    let left = ExprNode::input(Box::new(Kmc1Reader::open(&left_pre, &left_suf, cutoff, None).unwrap()));
    let right = ExprNode::input(Box::new(Kmc1Reader::open(&right_pre, &right_suf, cutoff, None).unwrap()));

    let mut union = ExprNode::union(Combiner::Sum, 255, left, right);

    let mut bundle = Bundle::new();
    println!("union with summed counters:");
    loop {
        union.next_bundle(&mut bundle).unwrap();
        if bundle.is_empty() {
            break;
        }
        while let Some((kmer, counter)) = bundle.pop() {
            println!("  {}\t{counter}", String::from_utf8_lossy(&kmer.decode(&encoding)));
        }
    }
}
