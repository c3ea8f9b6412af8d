//! `filter`: keeps reads that contain at least one k-mer present in a
//! database, within the database's counter cutoff range.

use crate::bundle::Bundle;
use crate::cli::FilterArgs;
use crate::commands::{db_header, detect_db_kind, make_progress, open_reader};
use crate::config::Config;
use crate::error::Result;
use crate::fastx_filter::{self, MembershipSet};
use crate::kmer::Encoding;
use crate::readers::kmc1::Cutoff;
use crate::readers::BundleSource;

pub fn run(config: &Config, args: &FilterArgs) -> Result<()> {
    let kind = detect_db_kind(&args.db)?;
    let header = db_header(&args.db, kind)?;
    let cutoff = Cutoff {
        min: args.cutoff_min,
        max: args.cutoff_max,
    };
    let (progress, mut sources) = make_progress(config, &[(&args.db.display().to_string(), header.total)]);
    let mut reader = open_reader(&args.db, kind, config.threads, cutoff, Some((progress, sources.remove(0))))?;

    let encoding = Encoding::canonical();
    let mut set = MembershipSet::new(header.k, encoding);
    let mut bundle = Bundle::new();
    loop {
        reader.next_bundle(&mut bundle)?;
        if bundle.is_empty() {
            break;
        }
        while let Some((kmer, _counter)) = bundle.pop() {
            set.insert(kmer);
        }
    }

    fastx_filter::filter(&args.reads, &args.output, &set)
}
