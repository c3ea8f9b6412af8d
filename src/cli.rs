//! Command-line interface definition (§6 ADD).
//!
//! Mirrors the `kmc_tools` grammar this crate reimplements: per-input
//! cutoffs (`-ci`/`-cx`), per-output cutoff/clamp/format/combiner flags,
//! and seven subcommands. Global flags (`-t`, `-v`, `-hp`) live on the
//! top-level [`Cli`] and are threaded down into every subcommand.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "kmctools")]
#[command(version, author, about = "Manipulate on-disk databases of DNA k-mer counts", long_about = None)]
pub struct Cli {
    /// Number of worker threads (0 or omitted: hardware concurrency).
    #[arg(short = 't', long = "threads", global = true)]
    pub threads: Option<usize>,

    /// Print per-thread progress and decision logging to stderr.
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Suppress the percent-progress reporter.
    #[arg(long = "hp", global = true)]
    pub hide_percent_progress: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Single-input transform: reduce (cutoff/clamp/rewrite), dump, or
    /// histogram.
    Transform(TransformArgs),
    /// Two-input set-algebra operation with a single output.
    Simple(SimpleArgs),
    /// Arbitrary-arity set-algebra expression read from a file.
    Complex(ComplexArgs),
    /// FASTA/FASTQ membership filter against a k-mer set.
    Filter(FilterArgs),
    /// Compares two databases for exact k-mer/counter equality.
    Compare(CompareArgs),
    /// Prints a database's header fields without decoding its records.
    Info(InfoArgs),
    /// Reads a database end-to-end, verifying sort order and structure.
    Check(CheckArgs),
}

/// Flags shared by every per-database-output action: cutoffs, counter
/// clamp, and the written format.
#[derive(clap::Args, Debug, Clone)]
pub struct OutputArgs {
    pub output: PathBuf,

    /// Drop records with a combined counter below this value.
    #[arg(long = "ci", default_value_t = 1)]
    pub cutoff_min: u32,

    /// Drop records with a combined counter above this value.
    #[arg(long = "cx", default_value_t = u32::MAX)]
    pub cutoff_max: u32,

    /// Clamp written counters to this maximum.
    #[arg(long = "cs", default_value_t = u32::MAX)]
    pub counter_max: u32,

    #[arg(long = "o", value_enum, default_value = "kmc")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Kmc,
    Kff,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TransformArgs {
    pub input: PathBuf,

    #[arg(long = "ci", default_value_t = 1)]
    pub cutoff_min: u32,

    #[arg(long = "cx", default_value_t = u32::MAX)]
    pub cutoff_max: u32,

    #[command(subcommand)]
    pub action: TransformAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TransformAction {
    /// Writes a new database applying the input's cutoff/clamp rules.
    Reduce(OutputArgs),
    /// Writes `<kmer>\t<counter>` text, one record per line.
    Dump { output: PathBuf },
    /// Writes `<counter>\t<count>` histogram lines.
    Histogram {
        output: PathBuf,
        #[arg(long = "ci", default_value_t = 1)]
        cutoff_min: u32,
        #[arg(long = "cx", default_value_t = 255)]
        cutoff_max: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OpArg {
    Union,
    Intersect,
    KmersSubtract,
    CountersSubtract,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CombinerArg {
    Min,
    Max,
    Sum,
    Diff,
    Left,
    Right,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SimpleArgs {
    pub input1: PathBuf,
    #[arg(long = "ci1", default_value_t = 1)]
    pub cutoff_min1: u32,
    #[arg(long = "cx1", default_value_t = u32::MAX)]
    pub cutoff_max1: u32,

    pub input2: PathBuf,
    #[arg(long = "ci2", default_value_t = 1)]
    pub cutoff_min2: u32,
    #[arg(long = "cx2", default_value_t = u32::MAX)]
    pub cutoff_max2: u32,

    #[arg(value_enum)]
    pub op: OpArg,

    #[arg(long = "oc", value_enum, default_value = "sum")]
    pub combiner: CombinerArg,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ComplexArgs {
    /// Path to the expression-file describing the operator tree.
    pub expr_file: PathBuf,
    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct FilterArgs {
    /// Database whose k-mers define set membership.
    pub db: PathBuf,
    /// FASTA/FASTQ file to filter.
    pub reads: PathBuf,
    pub output: PathBuf,
    #[arg(long = "ci", default_value_t = 1)]
    pub cutoff_min: u32,
    #[arg(long = "cx", default_value_t = u32::MAX)]
    pub cutoff_max: u32,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CompareArgs {
    pub db1: PathBuf,
    pub db2: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InfoArgs {
    pub db: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
    pub db: PathBuf,
}
