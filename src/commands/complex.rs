//! `complex`: an arbitrary-arity set-algebra expression read from a file.

use std::collections::HashMap;

use crate::cli::{ComplexArgs, OpArg};
use crate::commands::{db_header, detect_db_kind, make_progress, open_reader, write_database, DbKind};
use crate::config::Config;
use crate::error::{KmcError, Result};
use crate::expr_parser::{self, ExprStmt};
use crate::ops::{Combiner, ExprNode};
use crate::readers::kmc1::Cutoff;

#[derive(Clone, Copy)]
struct NodeInfo {
    k: usize,
    canonical: bool,
    total: u64,
}

fn combiner_from_arg(arg: crate::cli::CombinerArg) -> Combiner {
    match arg {
        crate::cli::CombinerArg::Min => Combiner::Min,
        crate::cli::CombinerArg::Max => Combiner::Max,
        crate::cli::CombinerArg::Sum => Combiner::Sum,
        crate::cli::CombinerArg::Diff => Combiner::Diff,
        crate::cli::CombinerArg::Left => Combiner::FromLeft,
        crate::cli::CombinerArg::Right => Combiner::FromRight,
    }
}

fn undefined(expr_file: &std::path::Path, name: &str) -> KmcError {
    KmcError::BadArgument(format!(
        "{}: {name:?} is undefined or already consumed",
        expr_file.display()
    ))
}

pub fn run(config: &Config, args: &ComplexArgs) -> Result<()> {
    let file = expr_parser::parse(&args.expr_file)?;

    let mut kinds: Vec<DbKind> = Vec::new();
    let mut headers = Vec::new();
    for stmt in &file.statements {
        if let ExprStmt::Input { name, path, .. } = stmt {
            let kind = detect_db_kind(path)?;
            let header = db_header(path, kind)?;
            kinds.push(kind);
            headers.push((name.clone(), header));
        }
    }
    let threads = config.threads_for_inputs(&kinds);
    let named_totals: Vec<(&str, u64)> = headers.iter().map(|(n, h)| (n.as_str(), h.total)).collect();
    let (progress, mut sources) = make_progress(config, &named_totals);
    sources.reverse(); // pop() below hands them out in forward order

    let mut nodes: HashMap<String, ExprNode> = HashMap::new();
    let mut infos: HashMap<String, NodeInfo> = HashMap::new();
    let mut input_idx = 0usize;

    for stmt in &file.statements {
        match stmt {
            ExprStmt::Input {
                name,
                path,
                cutoff_min,
                cutoff_max,
            } => {
                let kind = kinds[input_idx];
                let header = headers[input_idx].1;
                let cutoff = Cutoff {
                    min: *cutoff_min,
                    max: *cutoff_max,
                };
                let source = sources.pop().ok_or_else(|| KmcError::Internal("progress source count mismatch".into()))?;
                let reader = open_reader(path, kind, threads[input_idx], cutoff, Some((progress.clone(), source)))?;
                input_idx += 1;
                nodes.insert(name.clone(), ExprNode::input(reader));
                infos.insert(
                    name.clone(),
                    NodeInfo {
                        k: header.k,
                        canonical: header.canonical,
                        total: header.total,
                    },
                );
            }
            ExprStmt::Op {
                name,
                op,
                left,
                right,
                combiner,
                counter_max,
            } => {
                let left_node = nodes.remove(left).ok_or_else(|| undefined(&args.expr_file, left))?;
                let right_node = nodes.remove(right).ok_or_else(|| undefined(&args.expr_file, right))?;
                let left_info = infos
                    .remove(left)
                    .ok_or_else(|| KmcError::Internal(format!("missing node info for {left:?}")))?;
                let right_info = infos
                    .remove(right)
                    .ok_or_else(|| KmcError::Internal(format!("missing node info for {right:?}")))?;
                if left_info.k != right_info.k {
                    return Err(KmcError::BadArgument(format!(
                        "{}: k-mer length mismatch between {left:?} (k={}) and {right:?} (k={})",
                        args.expr_file.display(),
                        left_info.k,
                        right_info.k
                    )));
                }
                let c = combiner_from_arg(*combiner);
                let merged = match op {
                    OpArg::Union => ExprNode::union(c, *counter_max, left_node, right_node),
                    OpArg::Intersect => ExprNode::intersect(c, *counter_max, left_node, right_node),
                    OpArg::KmersSubtract => ExprNode::kmers_subtract(*counter_max, left_node, right_node),
                    OpArg::CountersSubtract => ExprNode::counters_subtract(*counter_max, left_node, right_node),
                };
                nodes.insert(name.clone(), merged);
                infos.insert(
                    name.clone(),
                    NodeInfo {
                        k: left_info.k,
                        canonical: left_info.canonical || right_info.canonical,
                        total: left_info.total + right_info.total,
                    },
                );
            }
        }
    }

    let root = nodes
        .remove(&file.output)
        .ok_or_else(|| undefined(&args.expr_file, &file.output))?;
    let root_info = infos
        .remove(&file.output)
        .ok_or_else(|| KmcError::Internal(format!("missing node info for output {:?}", file.output)))?;

    write_database(&args.out, root_info.k, root_info.canonical, &[root_info.total], root)
}
