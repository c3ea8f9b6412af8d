//! The `complex`-mode expression-file parser (§1: the expression-file
//! parser is an external-collaborator contract; this is the thin, working
//! implementation the binary needs to support `complex` at all).
//!
//! Grammar, one statement per non-blank, non-`#`-comment line:
//!
//! ```text
//! input <name> <path> [ci=<min>] [cx=<max>]
//! <name> = <union|intersect|kmers_subtract|counters_subtract> <left> <right> [oc=<combiner>] [cs=<max>]
//! output <name>
//! ```
//!
//! Names are single tokens; an op statement consumes its `left`/`right`
//! names (they cannot be referenced again), mirroring the expression
//! tree's post-order ownership (§3, "a parent owns its children").

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;

use crate::cli::{CombinerArg, OpArg};
use crate::error::{KmcError, Result};

#[derive(Debug, Clone)]
pub enum ExprStmt {
    Input {
        name: String,
        path: PathBuf,
        cutoff_min: u32,
        cutoff_max: u32,
    },
    Op {
        name: String,
        op: OpArg,
        left: String,
        right: String,
        combiner: CombinerArg,
        counter_max: u32,
    },
}

#[derive(Debug, Clone)]
pub struct ExprFile {
    pub statements: Vec<ExprStmt>,
    pub output: String,
}

pub fn parse(path: &Path) -> Result<ExprFile> {
    let text = fs::read_to_string(path).map_err(|e| KmcError::file_io(path, e))?;
    let mut statements = Vec::new();
    let mut output = None;

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let at = |msg: String| KmcError::BadArgument(format!("{}:{}: {msg}", path.display(), line_no + 1));

        match tokens.first().copied() {
            Some(kw) if kw.eq_ignore_ascii_case("input") => {
                if tokens.len() < 3 {
                    return Err(at("expected: input <name> <path> [ci=N] [cx=N]".into()));
                }
                let mut cutoff_min = 1u32;
                let mut cutoff_max = u32::MAX;
                for kv in &tokens[3..] {
                    if let Some(v) = kv.strip_prefix("ci=") {
                        cutoff_min = v.parse().map_err(|_| at(format!("invalid ci {v:?}")))?;
                    } else if let Some(v) = kv.strip_prefix("cx=") {
                        cutoff_max = v.parse().map_err(|_| at(format!("invalid cx {v:?}")))?;
                    } else {
                        return Err(at(format!("unrecognised modifier {kv:?}")));
                    }
                }
                statements.push(ExprStmt::Input {
                    name: tokens[1].to_string(),
                    path: PathBuf::from(tokens[2]),
                    cutoff_min,
                    cutoff_max,
                });
            }
            Some(kw) if kw.eq_ignore_ascii_case("output") => {
                if tokens.len() != 2 {
                    return Err(at("expected: output <name>".into()));
                }
                output = Some(tokens[1].to_string());
            }
            Some(_) => {
                if tokens.len() < 5 || tokens[1] != "=" {
                    return Err(at("expected: <name> = <op> <left> <right> [oc=X] [cs=N]".into()));
                }
                let op = OpArg::from_str(tokens[2], true)
                    .map_err(|e| at(format!("unknown operation {:?}: {e}", tokens[2])))?;
                let mut combiner = CombinerArg::Sum;
                let mut counter_max = u32::MAX;
                for kv in &tokens[5..] {
                    if let Some(v) = kv.strip_prefix("oc=") {
                        combiner = CombinerArg::from_str(v, true)
                            .map_err(|e| at(format!("unknown combiner {v:?}: {e}")))?;
                    } else if let Some(v) = kv.strip_prefix("cs=") {
                        counter_max = v.parse().map_err(|_| at(format!("invalid counter_max {v:?}")))?;
                    } else {
                        return Err(at(format!("unrecognised modifier {kv:?}")));
                    }
                }
                statements.push(ExprStmt::Op {
                    name: tokens[0].to_string(),
                    op,
                    left: tokens[3].to_string(),
                    right: tokens[4].to_string(),
                    combiner,
                    counter_max,
                });
            }
            None => unreachable!("blank lines are skipped above"),
        }
    }

    let output =
        output.ok_or_else(|| KmcError::BadArgument(format!("{}: missing `output <name>` statement", path.display())))?;
    Ok(ExprFile { statements, output })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &std::path::Path, contents: &str) -> PathBuf {
        let path = dir.join("expr.txt");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parses_inputs_ops_and_output() {
        let dir = tempdir().unwrap();
        let path = write(
            &dir,
            "# comment\n\
             input A a.kmc_pre ci=2 cx=100\n\
             input B b.kff\n\
             C = union A B oc=sum cs=255\n\
             output C\n",
        );
        let file = parse(&path).unwrap();
        assert_eq!(file.statements.len(), 3);
        assert_eq!(file.output, "C");
        match &file.statements[0] {
            ExprStmt::Input { name, cutoff_min, cutoff_max, .. } => {
                assert_eq!(name, "A");
                assert_eq!(*cutoff_min, 2);
                assert_eq!(*cutoff_max, 100);
            }
            ExprStmt::Op { .. } => panic!("expected input statement"),
        }
        match &file.statements[2] {
            ExprStmt::Op { op, left, right, combiner, counter_max, .. } => {
                assert_eq!(*op, OpArg::Union);
                assert_eq!(left, "A");
                assert_eq!(right, "B");
                assert_eq!(*combiner, CombinerArg::Sum);
                assert_eq!(*counter_max, 255);
            }
            ExprStmt::Input { .. } => panic!("expected op statement"),
        }
    }

    #[test]
    fn rejects_missing_output() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "input A a.kmc_pre\n");
        assert!(parse(&path).is_err());
    }

    #[test]
    fn rejects_unknown_operation() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "input A a.kmc_pre\ninput B b.kmc_pre\nC = frobnicate A B\noutput C\n");
        assert!(parse(&path).is_err());
    }
}
