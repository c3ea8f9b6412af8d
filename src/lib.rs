//! A multi-threaded k-mer database engine: streaming readers for
//! KMC1/KMC2/KFF formats, set-algebra over k-mer/counter streams, and
//! prefix-LUT writers.

pub mod bundle;
pub mod byteorder;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod expr_parser;
pub mod fastx_filter;
pub mod format;
pub mod kmer;
pub mod ops;
pub mod progress;
pub mod queues;
pub mod readers;
pub mod sinks;
pub mod writers;
