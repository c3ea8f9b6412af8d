#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::similar_names,
    clippy::too_many_lines
)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use kmctools::kmer::{Encoding, KmerVal};
use kmctools::ops::RecordSink;
use kmctools::readers::kmc1::{prefix_file_path, suffix_file_path};
use kmctools::writers::kmc1::Kmc1Writer;

fn kmctools_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_kmctools"))
}

/// Writes a tiny KMC1 database under `dir/name` and returns its stem path
/// (without extension, as every subcommand expects).
fn write_kmc1(dir: &Path, name: &str, k: usize, records: &[(&[u8], u32)]) -> PathBuf {
    let stem = dir.join(name);
    let prefix_path = prefix_file_path(&stem);
    let suffix_path = suffix_file_path(&stem);
    let encoding = Encoding::canonical();
    let mut writer =
        Kmc1Writer::open(&prefix_path, &suffix_path, k, 0, 1, 1, 255, 255, true).unwrap();
    for (seq, count) in records {
        writer.accept(&KmerVal::encode(seq, &encoding).unwrap(), *count).unwrap();
    }
    writer.close().unwrap();
    stem
}

#[test]
fn cli_help_flag() {
    let output = kmctools_cmd().arg("--help").output().expect("run kmctools --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("kmctools"));
}

#[test]
fn cli_version_flag() {
    let output = kmctools_cmd()
        .arg("--version")
        .output()
        .expect("run kmctools --version");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_missing_subcommand() {
    let output = kmctools_cmd().output().expect("run kmctools");
    assert!(!output.status.success());
}

#[test]
fn info_reports_header_fields() {
    let dir = tempfile::tempdir().unwrap();
    let stem = write_kmc1(dir.path(), "db", 4, &[(b"AAAA", 3), (b"ACGT", 7)]);

    let output = kmctools_cmd()
        .args(["info", prefix_file_path(&stem).to_str().unwrap()])
        .output()
        .expect("run kmctools info");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("KMC1"));
    assert!(stdout.contains('4'));
}

#[test]
fn check_reports_total_records_for_well_ordered_database() {
    let dir = tempfile::tempdir().unwrap();
    let stem = write_kmc1(dir.path(), "db", 4, &[(b"AAAA", 3), (b"ACGT", 7)]);

    let output = kmctools_cmd()
        .args(["check", prefix_file_path(&stem).to_str().unwrap()])
        .output()
        .expect("run kmctools check");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains('2'));
}

#[test]
fn compare_identifies_identical_and_differing_databases() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_kmc1(dir.path(), "a", 4, &[(b"AAAA", 3), (b"ACGT", 7)]);
    let b = write_kmc1(dir.path(), "b", 4, &[(b"AAAA", 3), (b"ACGT", 7)]);
    let c = write_kmc1(dir.path(), "c", 4, &[(b"AAAA", 3)]);

    let same = kmctools_cmd()
        .args([
            "compare",
            prefix_file_path(&a).to_str().unwrap(),
            prefix_file_path(&b).to_str().unwrap(),
        ])
        .output()
        .expect("run kmctools compare");
    assert!(same.status.success());

    let different = kmctools_cmd()
        .args([
            "compare",
            prefix_file_path(&a).to_str().unwrap(),
            prefix_file_path(&c).to_str().unwrap(),
        ])
        .output()
        .expect("run kmctools compare");
    assert_eq!(different.status.code(), Some(1));
}

#[test]
fn transform_dump_writes_kmer_counter_lines() {
    let dir = tempfile::tempdir().unwrap();
    let stem = write_kmc1(dir.path(), "db", 4, &[(b"AAAA", 3), (b"ACGT", 7)]);
    let dump_path = dir.path().join("dump.txt");

    let output = kmctools_cmd()
        .args([
            "transform",
            prefix_file_path(&stem).to_str().unwrap(),
            "dump",
            dump_path.to_str().unwrap(),
        ])
        .output()
        .expect("run kmctools transform dump");
    assert!(output.status.success());

    let text = fs::read_to_string(&dump_path).unwrap();
    assert!(text.contains("AAAA\t3"));
    assert!(text.contains("ACGT\t7"));
}

#[test]
fn transform_reduce_applies_cutoff_and_rewrites_a_database() {
    let dir = tempfile::tempdir().unwrap();
    let stem = write_kmc1(dir.path(), "db", 4, &[(b"AAAA", 1), (b"ACGT", 7)]);
    let out_stem = dir.path().join("reduced");

    let output = kmctools_cmd()
        .args([
            "transform",
            "--ci",
            "2",
            prefix_file_path(&stem).to_str().unwrap(),
            "reduce",
            out_stem.to_str().unwrap(),
        ])
        .output()
        .expect("run kmctools transform reduce");
    assert!(output.status.success());

    let dump_path = dir.path().join("reduced_dump.txt");
    let dump_output = kmctools_cmd()
        .args([
            "transform",
            prefix_file_path(&out_stem).to_str().unwrap(),
            "dump",
            dump_path.to_str().unwrap(),
        ])
        .output()
        .expect("run kmctools transform dump on the reduced database");
    assert!(dump_output.status.success());
    let text = fs::read_to_string(&dump_path).unwrap();
    assert!(!text.contains("AAAA"));
    assert!(text.contains("ACGT\t7"));
}

#[test]
fn simple_union_sums_matching_counters() {
    let dir = tempfile::tempdir().unwrap();
    let left = write_kmc1(dir.path(), "left", 4, &[(b"AAAA", 3), (b"ACGT", 7)]);
    let right = write_kmc1(dir.path(), "right", 4, &[(b"ACGT", 2), (b"TTTT", 5)]);
    let out_stem = dir.path().join("union");

    let output = kmctools_cmd()
        .args([
            "simple",
            prefix_file_path(&left).to_str().unwrap(),
            prefix_file_path(&right).to_str().unwrap(),
            "union",
            "--oc",
            "sum",
            out_stem.to_str().unwrap(),
        ])
        .output()
        .expect("run kmctools simple union");
    assert!(output.status.success());

    let dump_path = dir.path().join("union_dump.txt");
    kmctools_cmd()
        .args([
            "transform",
            prefix_file_path(&out_stem).to_str().unwrap(),
            "dump",
            dump_path.to_str().unwrap(),
        ])
        .output()
        .expect("run kmctools transform dump on the union");
    let text = fs::read_to_string(&dump_path).unwrap();
    assert!(text.contains("AAAA\t3"));
    assert!(text.contains("ACGT\t9"));
    assert!(text.contains("TTTT\t5"));
}

#[test]
fn complex_expression_file_drives_a_multi_input_union() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_kmc1(dir.path(), "a", 4, &[(b"AAAA", 1)]);
    let b = write_kmc1(dir.path(), "b", 4, &[(b"ACGT", 1)]);
    let out_stem = dir.path().join("complex_out");

    let expr_path = dir.path().join("expr.txt");
    fs::write(
        &expr_path,
        format!(
            "input A {}\ninput B {}\nC = union A B oc=sum\noutput C\n",
            prefix_file_path(&a).display(),
            prefix_file_path(&b).display()
        ),
    )
    .unwrap();

    let output = kmctools_cmd()
        .args([
            "complex",
            expr_path.to_str().unwrap(),
            out_stem.to_str().unwrap(),
        ])
        .output()
        .expect("run kmctools complex");
    assert!(output.status.success());

    let dump_path = dir.path().join("complex_dump.txt");
    kmctools_cmd()
        .args([
            "transform",
            prefix_file_path(&out_stem).to_str().unwrap(),
            "dump",
            dump_path.to_str().unwrap(),
        ])
        .output()
        .expect("run kmctools transform dump on the complex result");
    let text = fs::read_to_string(&dump_path).unwrap();
    assert!(text.contains("AAAA\t1"));
    assert!(text.contains("ACGT\t1"));
}

#[test]
fn filter_keeps_only_reads_with_a_matching_kmer() {
    let dir = tempfile::tempdir().unwrap();
    let stem = write_kmc1(dir.path(), "db", 4, &[(b"ACGT", 1)]);
    let reads_path = dir.path().join("reads.fa");
    fs::write(&reads_path, ">r1\nACGTACGTAC\n>r2\nTTTTTTTTTT\n").unwrap();
    let output_path = dir.path().join("matched.fa");

    let output = kmctools_cmd()
        .args([
            "filter",
            prefix_file_path(&stem).to_str().unwrap(),
            reads_path.to_str().unwrap(),
            output_path.to_str().unwrap(),
        ])
        .output()
        .expect("run kmctools filter");
    assert!(output.status.success());

    let text = fs::read_to_string(&output_path).unwrap();
    assert!(text.contains("r1"));
    assert!(!text.contains("r2"));
}
