//! `compare`: exits 0 iff two databases hold exactly the same k-mer/counter
//! records (§6, "Exit codes").

use crate::cli::CompareArgs;
use crate::commands::{db_header, detect_db_kind, make_progress, open_reader};
use crate::config::Config;
use crate::error::{KmcError, Result};
use crate::readers::kmc1::Cutoff;
use crate::readers::Peekable;

/// `Ok(true)` when both databases are record-for-record identical,
/// `Ok(false)` when they differ, `Err` on a read failure.
pub fn run(config: &Config, args: &CompareArgs) -> Result<bool> {
    let kind1 = detect_db_kind(&args.db1)?;
    let kind2 = detect_db_kind(&args.db2)?;
    let header1 = db_header(&args.db1, kind1)?;
    let header2 = db_header(&args.db2, kind2)?;
    if header1.k != header2.k {
        return Ok(false);
    }

    let threads = config.threads_for_inputs(&[kind1, kind2]);
    let full = Cutoff { min: 0, max: u32::MAX };
    let (progress, mut sources) = make_progress(
        config,
        &[
            (&args.db1.display().to_string(), header1.total),
            (&args.db2.display().to_string(), header2.total),
        ],
    );
    let source2 = sources.remove(1);
    let source1 = sources.remove(0);
    let reader1 = open_reader(&args.db1, kind1, threads[0], full, Some((progress.clone(), source1)))?;
    let reader2 = open_reader(&args.db2, kind2, threads[1], full, Some((progress, source2)))?;
    let mut left = Peekable::new(reader1);
    let mut right = Peekable::new(reader2);

    loop {
        match (left.top()?, right.top()?) {
            (None, None) => return Ok(true),
            (Some(a), Some(b)) => {
                if a != b {
                    return Ok(false);
                }
                advance(&mut left)?;
                advance(&mut right)?;
            }
            _ => return Ok(false),
        }
    }
}

fn advance<S: crate::readers::BundleSource>(p: &mut Peekable<S>) -> Result<()> {
    p.advance()?
        .ok_or_else(|| KmcError::Internal("peeked record vanished on advance".into()))?;
    Ok(())
}
