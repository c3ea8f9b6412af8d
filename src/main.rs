#![allow(clippy::too_many_lines)]

use std::process;

use clap::Parser;
use colored::Colorize;

use kmctools::cli::{Cli, Command};
use kmctools::commands::{check, compare, complex, filter, info, simple, transform};
use kmctools::config::Config;

/// Set `RUST_LOG=kmctools=debug` to see debug output.
#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

fn main() {
    #[cfg(feature = "tracing")]
    init_tracing();

    let cli = Cli::parse();
    let config = Config::new(cli.threads, cli.verbose, cli.hide_percent_progress);

    match &cli.command {
        Command::Compare(args) => match compare::run(&config, args) {
            Ok(true) => process::exit(0),
            Ok(false) => {
                println!("{}", "databases differ".yellow().bold());
                process::exit(1);
            }
            Err(e) => fail(&e),
        },
        Command::Check(args) => match check::run(&config, args) {
            Ok(total) => {
                println!(
                    "{}: {}",
                    "ok, records".bold(),
                    total.to_string().green().bold()
                );
            }
            Err(e) => fail(&e),
        },
        Command::Info(args) => {
            if let Err(e) = info::run(args) {
                fail(&e);
            }
        }
        Command::Transform(args) => {
            if let Err(e) = transform::run(&config, args) {
                fail(&e);
            }
        }
        Command::Simple(args) => {
            if let Err(e) = simple::run(&config, args) {
                fail(&e);
            }
        }
        Command::Complex(args) => {
            if let Err(e) = complex::run(&config, args) {
                fail(&e);
            }
        }
        Command::Filter(args) => {
            if let Err(e) = filter::run(&config, args) {
                fail(&e);
            }
        }
    }
}

fn fail(e: &kmctools::error::KmcError) -> ! {
    eprintln!(
        "{}\n {}",
        "Application error:".blue().bold(),
        e.to_string().blue()
    );
    process::exit(1);
}
