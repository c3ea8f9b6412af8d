#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::uninlined_format_args,
    clippy::semicolon_if_nothing_returned
)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kmctools::kmer::{Encoding, KmerVal};
use kmctools::ops::Combiner;

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("KmerVal::encode");
    let encoding = Encoding::canonical();

    for k in [5, 11, 21, 31, 63] {
        let seq = "ACGT".repeat(k / 4 + 1);
        let seq = &seq.as_bytes()[..k];

        group.bench_with_input(BenchmarkId::from_parameter(k), seq, |b, seq| {
            b.iter(|| KmerVal::encode(black_box(seq), &encoding).unwrap());
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("KmerVal::decode");
    let encoding = Encoding::canonical();

    for k in [5, 11, 21, 31, 63] {
        let seq = "ACGT".repeat(k / 4 + 1);
        let kmer = KmerVal::encode(&seq.as_bytes()[..k], &encoding).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(k), &kmer, |b, kmer| {
            b.iter(|| black_box(kmer).decode(&encoding));
        });
    }

    group.finish();
}

fn bench_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("KmerVal::cmp sort");
    let encoding = Encoding::canonical();

    for n in [100usize, 1_000, 10_000] {
        let bases = [b'A', b'C', b'G', b'T'];
        let kmers: Vec<KmerVal> = (0..n)
            .map(|i| {
                let mut h = i.wrapping_mul(2_654_435_761);
                let seq: Vec<u8> = (0..16)
                    .map(|_| {
                        let b = bases[h % 4];
                        h /= 4;
                        b
                    })
                    .collect();
                KmerVal::encode(&seq, &encoding).unwrap()
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(n), &kmers, |b, kmers| {
            b.iter(|| {
                let mut v = kmers.clone();
                v.sort();
                black_box(v)
            });
        });
    }

    group.finish();
}

fn bench_combine(c: &mut Criterion) {
    let mut group = c.benchmark_group("Combiner::combine");

    for combiner in [Combiner::Min, Combiner::Max, Combiner::Sum, Combiner::Diff] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{combiner:?}")),
            &combiner,
            |b, combiner| {
                b.iter(|| combiner.combine(black_box(37), black_box(255), black_box(1_000)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_ordering, bench_combine);
criterion_main!(benches);
