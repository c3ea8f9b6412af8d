//! `simple`: a two-input set-algebra operation with a single output.

use crate::cli::{CombinerArg, OpArg, SimpleArgs};
use crate::commands::{db_header, detect_db_kind, make_progress, open_reader, write_database};
use crate::config::Config;
use crate::error::{KmcError, Result};
use crate::ops::{Combiner, ExprNode};
use crate::readers::kmc1::Cutoff;

fn combiner_from_arg(arg: CombinerArg) -> Combiner {
    match arg {
        CombinerArg::Min => Combiner::Min,
        CombinerArg::Max => Combiner::Max,
        CombinerArg::Sum => Combiner::Sum,
        CombinerArg::Diff => Combiner::Diff,
        CombinerArg::Left => Combiner::FromLeft,
        CombinerArg::Right => Combiner::FromRight,
    }
}

pub fn run(config: &Config, args: &SimpleArgs) -> Result<()> {
    let kind1 = detect_db_kind(&args.input1)?;
    let kind2 = detect_db_kind(&args.input2)?;
    let header1 = db_header(&args.input1, kind1)?;
    let header2 = db_header(&args.input2, kind2)?;
    if header1.k != header2.k {
        return Err(KmcError::BadArgument(format!(
            "k-mer length mismatch: {} has k={}, {} has k={}",
            args.input1.display(),
            header1.k,
            args.input2.display(),
            header2.k
        )));
    }

    let threads = config.threads_for_inputs(&[kind1, kind2]);
    let cutoff1 = Cutoff {
        min: args.cutoff_min1,
        max: args.cutoff_max1,
    };
    let cutoff2 = Cutoff {
        min: args.cutoff_min2,
        max: args.cutoff_max2,
    };
    let (progress, mut sources) = make_progress(
        config,
        &[
            (&args.input1.display().to_string(), header1.total),
            (&args.input2.display().to_string(), header2.total),
        ],
    );
    let source2 = sources.remove(1);
    let source1 = sources.remove(0);
    let reader1 = open_reader(&args.input1, kind1, threads[0], cutoff1, Some((progress.clone(), source1)))?;
    let reader2 = open_reader(&args.input2, kind2, threads[1], cutoff2, Some((progress, source2)))?;

    let combiner = combiner_from_arg(args.combiner);
    let left = ExprNode::input(reader1);
    let right = ExprNode::input(reader2);
    let root = match args.op {
        OpArg::Union => ExprNode::union(combiner, args.out.counter_max, left, right),
        OpArg::Intersect => ExprNode::intersect(combiner, args.out.counter_max, left, right),
        OpArg::KmersSubtract => ExprNode::kmers_subtract(args.out.counter_max, left, right),
        OpArg::CountersSubtract => ExprNode::counters_subtract(args.out.counter_max, left, right),
    };

    write_database(
        &args.out,
        header1.k,
        header1.canonical || header2.canonical,
        &[header1.total, header2.total],
        root,
    )
}
