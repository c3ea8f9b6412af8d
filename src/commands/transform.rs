//! `transform`: single-input reduce / dump / histogram.

use crate::cli::{TransformAction, TransformArgs};
use crate::commands::{db_header, detect_db_kind, drain_into_sink, make_progress, open_reader, write_database};
use crate::config::Config;
use crate::error::Result;
use crate::kmer::Encoding;
use crate::readers::kmc1::Cutoff;
use crate::sinks::dump::DumpSink;
use crate::sinks::histogram::HistogramSink;

pub fn run(config: &Config, args: &TransformArgs) -> Result<()> {
    let kind = detect_db_kind(&args.input)?;
    let header = db_header(&args.input, kind)?;
    let cutoff = Cutoff {
        min: args.cutoff_min,
        max: args.cutoff_max,
    };
    let (progress, mut sources) = make_progress(config, &[(&args.input.display().to_string(), header.total)]);
    let reader = open_reader(&args.input, kind, config.threads, cutoff, Some((progress, sources.remove(0))))?;

    match &args.action {
        TransformAction::Reduce(out) => {
            write_database(out, header.k, header.canonical, &[header.total], reader)?;
        }
        TransformAction::Dump { output } => {
            let mut sink = DumpSink::create(output, Encoding::canonical())?;
            drain_into_sink(reader, &mut sink)?;
        }
        TransformAction::Histogram {
            output,
            cutoff_min,
            cutoff_max,
        } => {
            let mut sink = HistogramSink::create(output, *cutoff_min, *cutoff_max)?;
            drain_into_sink(reader, &mut sink)?;
        }
    }
    Ok(())
}
