//! `check`: reads a database end to end and verifies strict k-mer ordering.

use crate::bundle::Bundle;
use crate::cli::CheckArgs;
use crate::commands::{db_header, detect_db_kind, make_progress, open_reader};
use crate::config::Config;
use crate::error::{KmcError, Result};
use crate::kmer::KmerVal;
use crate::readers::kmc1::Cutoff;
use crate::readers::BundleSource;

/// Returns the total record count on success, or a `BadFormat` error at the
/// first record that does not strictly increase over its predecessor.
pub fn run(config: &Config, args: &CheckArgs) -> Result<u64> {
    let kind = detect_db_kind(&args.db)?;
    let header = db_header(&args.db, kind)?;
    let full = Cutoff {
        min: 0,
        max: u32::MAX,
    };
    let (progress, mut sources) = make_progress(config, &[(&args.db.display().to_string(), header.total)]);
    let mut reader = open_reader(&args.db, kind, config.threads, full, Some((progress, sources.remove(0))))?;

    let mut bundle = Bundle::new();
    let mut count = 0u64;
    let mut prev: Option<KmerVal> = None;

    loop {
        reader.next_bundle(&mut bundle)?;
        if bundle.is_empty() {
            break;
        }
        while let Some((kmer, _counter)) = bundle.pop() {
            if let Some(p) = &prev {
                if kmer <= *p {
                    return Err(KmcError::bad_format(
                        &args.db,
                        format!("records out of order at index {count}"),
                    ));
                }
            }
            prev = Some(kmer);
            count += 1;
        }
    }
    Ok(count)
}
