//! `info`: prints a database's header fields without decoding its records.

use colored::Colorize;

use crate::cli::InfoArgs;
use crate::commands::{db_header, detect_db_kind, DbKind};
use crate::error::Result;

pub fn run(args: &InfoArgs) -> Result<()> {
    let kind = detect_db_kind(&args.db)?;
    let header = db_header(&args.db, kind)?;
    let kind_name = match kind {
        DbKind::Kmc1 => "KMC1",
        DbKind::Kmc2 => "KMC2",
        DbKind::Kff => "KFF",
    };
    println!("{}: {}", "format".bold(), kind_name.blue().bold());
    println!("{}: {}", "k".bold(), header.k.to_string().blue().bold());
    println!(
        "{}: {}",
        "canonical".bold(),
        header.canonical.to_string().blue().bold()
    );
    println!(
        "{}: {}",
        "total-kmers".bold(),
        header.total.to_string().blue().bold()
    );
    Ok(())
}
