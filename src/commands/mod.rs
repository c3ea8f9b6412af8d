//! Subcommand orchestration (§1 ADD: "info/check/compare convenience
//! commands" and the `clap`-driven CLI surface). Each submodule wires the
//! core reader/operator/writer primitives together for one subcommand;
//! none of them contain pipeline logic of their own.

pub mod check;
pub mod compare;
pub mod complex;
pub mod filter;
pub mod info;
pub mod simple;
pub mod transform;

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::bundle::Bundle;
use crate::cli::{OutputArgs, OutputFormat};
use crate::error::{KmcError, Result};
use crate::format::kmc_header::KMC2_VERSION;
use crate::kmer::Encoding;
use crate::ops::RecordSink;
use crate::progress::{Progress, SourceProgress};
use crate::readers::kff::KffReader;
use crate::readers::kmc1::{prefix_file_path, suffix_file_path, Cutoff, Kmc1Reader};
use crate::readers::kmc2::Kmc2Reader;
use crate::readers::BundleSource;
use crate::writers::kff::KffWriter;
use crate::writers::kmc1::Kmc1Writer;
use crate::writers::choose_output_p;

/// Which on-disk container a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Kmc1,
    Kmc2,
    Kff,
}

/// Header facts needed to size or validate an output database without
/// decoding every record: k-mer length, the strand-canonical flag, and the
/// total record count.
#[derive(Debug, Clone, Copy)]
pub struct DbHeader {
    pub k: usize,
    pub canonical: bool,
    pub total: u64,
}

/// Detects which format `path` names. KMC1/KMC2 databases are addressed by
/// their shared stem (`<stem>.kmc_pre` / `<stem>.kmc_suf`); KFF databases
/// are conventionally a single `.kff` file, but a bare file starting with
/// the `"KFF"` magic is also accepted.
pub fn detect_db_kind(path: &Path) -> Result<DbKind> {
    if path.extension().and_then(|e| e.to_str()) == Some("kff") {
        return Ok(DbKind::Kff);
    }
    let prefix_path = prefix_file_path(path);
    if prefix_path.exists() {
        let header = crate::readers::kmc1::read_header(&prefix_path)?;
        return Ok(if header.db_version == KMC2_VERSION {
            DbKind::Kmc2
        } else {
            DbKind::Kmc1
        });
    }
    if path.exists() {
        if let Ok(mut file) = File::open(path) {
            let mut magic = [0u8; 3];
            if file.read_exact(&mut magic).is_ok() && &magic == crate::format::kff::MAGIC {
                return Ok(DbKind::Kff);
            }
        }
    }
    Err(KmcError::BadArgument(format!(
        "no recognisable KMC1/KMC2/KFF database at {}",
        path.display()
    )))
}

/// Reads just the header/footer fields of a database, without opening its
/// threaded record pipeline.
pub fn db_header(path: &Path, kind: DbKind) -> Result<DbHeader> {
    match kind {
        DbKind::Kmc1 => {
            let header = crate::readers::kmc1::read_header(&prefix_file_path(path))?;
            Ok(DbHeader {
                k: header.kmer_length as usize,
                canonical: header.canonical(),
                total: header.total_kmers,
            })
        }
        DbKind::Kmc2 => {
            let layout = crate::readers::kmc2::read_layout(&prefix_file_path(path))?;
            Ok(DbHeader {
                k: layout.header.kmer_length as usize,
                canonical: layout.header.canonical(),
                total: layout.total_records(),
            })
        }
        DbKind::Kff => {
            let layout = crate::readers::kff::read_layout(path)?;
            Ok(DbHeader {
                k: layout.k as usize,
                canonical: layout.header.canonical,
                total: layout.total_records(),
            })
        }
    }
}

/// Opens the matching reader behind the one `BundleSource` trait object, so
/// callers branch on `DbKind` exactly once, at open time.
pub fn open_reader(
    path: &Path,
    kind: DbKind,
    threads: usize,
    cutoff: Cutoff,
    progress: Option<(Arc<Progress>, Arc<SourceProgress>)>,
) -> Result<Box<dyn BundleSource>> {
    match kind {
        DbKind::Kmc1 => Ok(Box::new(Kmc1Reader::open(
            &prefix_file_path(path),
            &suffix_file_path(path),
            cutoff,
            progress,
        )?)),
        DbKind::Kmc2 => Ok(Box::new(Kmc2Reader::open(
            &prefix_file_path(path),
            &suffix_file_path(path),
            threads,
            cutoff,
            progress,
        )?)),
        DbKind::Kff => Ok(Box::new(KffReader::open(path, threads, cutoff, progress)?)),
    }
}

/// Builds a shared [`Progress`] registry plus one [`SourceProgress`] per
/// named input, honouring `-hp`/`hide_percent_progress` (§4, "Percent-progress
/// reporter"). Every command that opens readers calls this once up front so
/// each reader's `advance` calls land on the same coarse-mutexed printer.
pub fn make_progress(config: &crate::config::Config, named_totals: &[(&str, u64)]) -> (Arc<Progress>, Vec<Arc<SourceProgress>>) {
    let progress = Progress::new(config.hide_percent_progress);
    let sources = named_totals
        .iter()
        .map(|&(name, total)| progress.register(name, total))
        .collect();
    (progress, sources)
}

/// Picks the narrowest counter width that can hold `counter_max` without
/// truncation (§3: "0-4 little-endian bytes").
pub fn choose_counter_size(counter_max: u32) -> usize {
    match counter_max {
        0 => 0,
        1..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xff_ffff => 3,
        _ => 4,
    }
}

/// Drains every bundle a `BundleSource` produces into `sink`, record by
/// record, then finishes the sink. Every subcommand ends up here: "stream
/// one evaluated source into one output" is the whole of `main`'s job.
pub fn drain_into_sink(mut source: impl BundleSource, sink: &mut dyn RecordSink) -> Result<()> {
    let mut bundle = Bundle::new();
    loop {
        source.next_bundle(&mut bundle)?;
        if bundle.is_empty() {
            break;
        }
        while let Some((kmer, counter)) = bundle.pop() {
            sink.accept(&kmer, counter)?;
        }
    }
    sink.finish()
}

/// Writes every record a `BundleSource` produces to one output database,
/// choosing the KMC1 or KFF writer per `out.format`. Shared by every
/// subcommand that ends in "one evaluated stream, one output database"
/// (`transform reduce`, `simple`, `complex`).
pub fn write_database(
    out: &OutputArgs,
    k: usize,
    canonical: bool,
    input_totals: &[u64],
    source: impl BundleSource,
) -> Result<()> {
    let counter_size = choose_counter_size(out.counter_max);
    match out.format {
        OutputFormat::Kmc => {
            let p = choose_output_p(k, input_totals);
            let mut writer = Kmc1Writer::open(
                &prefix_file_path(&out.output),
                &suffix_file_path(&out.output),
                k,
                p,
                counter_size,
                out.cutoff_min,
                out.cutoff_max,
                out.counter_max,
                canonical,
            )?;
            drain_into_sink(source, &mut writer)?;
            writer.close()
        }
        OutputFormat::Kff => {
            let mut writer = KffWriter::open(
                &out.output,
                k as u64,
                counter_size as u64,
                Encoding::canonical().to_byte(),
                canonical,
                out.cutoff_min,
                out.cutoff_max,
                out.counter_max,
            )?;
            drain_into_sink(source, &mut writer)?;
            writer.close()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_size_grows_with_max() {
        assert_eq!(choose_counter_size(0), 0);
        assert_eq!(choose_counter_size(200), 1);
        assert_eq!(choose_counter_size(70_000), 3);
        assert_eq!(choose_counter_size(u32::MAX), 4);
    }

    #[test]
    fn detect_db_kind_rejects_missing_path() {
        let err = detect_db_kind(Path::new("/nonexistent/does-not-exist"));
        assert!(err.is_err());
    }
}
