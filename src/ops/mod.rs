//! The expression tree and two-input merge (§4.1): the vocabulary every
//! `complex`-mode evaluation is built from. Leaves are readers; internal
//! nodes are tagged `Merge` variants rather than trait objects, since the
//! set of set-algebra operators is closed (design note 9, "Virtual
//! dispatch"). The per-record comparison loop works directly on
//! `Peekable::top`/`advance`, so the one genuinely virtual call per
//! producer (`next_bundle`) fires once per bundle, never once per record.

pub mod simple;

use crate::bundle::Bundle;
use crate::error::{KmcError, Result};
use crate::kmer::KmerVal;
use crate::readers::{BundleSource, Peekable};

/// A peeked top was confirmed non-empty one line above; `advance` racing
/// it to `None` would mean a `Peekable` broke its own contract.
fn advance_confirmed(p: &mut Peekable<ExprNode>) -> Result<(KmerVal, u32)> {
    p.advance()?
        .ok_or_else(|| KmcError::Internal("peeked record vanished on advance".into()))
}

/// How two counters at matching keys combine into one output counter.
/// `None` never occurs on a kept record: `KmersSubtract` drops matches
/// entirely and applies no combiner to its pass-through side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combiner {
    Min,
    Max,
    Sum,
    Diff,
    FromLeft,
    FromRight,
    None,
}

impl Combiner {
    /// Combines two counters, clamping the result to `counter_max`
    /// (design note open question 1: clamp happens before any cutoff
    /// check, so callers apply cutoff filtering afterward).
    pub fn combine(self, a: u32, b: u32, counter_max: u32) -> u32 {
        let raw = match self {
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::Sum => a.saturating_add(b),
            Self::Diff => a.saturating_sub(b),
            Self::FromLeft => a,
            Self::FromRight => b,
            Self::None => 0,
        };
        raw.min(counter_max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Union,
    Intersect,
    KmersSubtract,
    CountersSubtract,
}

/// One node of the expression tree. `Merge` nodes own their children and
/// drop them in post-order (design note 9, "Cyclic/pointer ownership").
pub enum ExprNode {
    Input(Box<dyn BundleSource>),
    Merge {
        op: Op,
        combiner: Combiner,
        counter_max: u32,
        left: Box<Peekable<ExprNode>>,
        right: Box<Peekable<ExprNode>>,
    },
}

impl ExprNode {
    pub fn input(source: Box<dyn BundleSource>) -> Self {
        Self::Input(source)
    }

    pub fn merge(op: Op, combiner: Combiner, counter_max: u32, left: ExprNode, right: ExprNode) -> Self {
        Self::Merge {
            op,
            combiner,
            counter_max,
            left: Box::new(Peekable::new(left)),
            right: Box::new(Peekable::new(right)),
        }
    }

    pub fn union(combiner: Combiner, counter_max: u32, left: ExprNode, right: ExprNode) -> Self {
        Self::merge(Op::Union, combiner, counter_max, left, right)
    }

    pub fn intersect(combiner: Combiner, counter_max: u32, left: ExprNode, right: ExprNode) -> Self {
        Self::merge(Op::Intersect, combiner, counter_max, left, right)
    }

    pub fn kmers_subtract(counter_max: u32, left: ExprNode, right: ExprNode) -> Self {
        Self::merge(Op::KmersSubtract, Combiner::None, counter_max, left, right)
    }

    pub fn counters_subtract(counter_max: u32, left: ExprNode, right: ExprNode) -> Self {
        Self::merge(Op::CountersSubtract, Combiner::Diff, counter_max, left, right)
    }
}

impl BundleSource for ExprNode {
    fn next_bundle(&mut self, bundle: &mut Bundle) -> Result<()> {
        bundle.reset();
        match self {
            Self::Input(src) => src.next_bundle(bundle),
            Self::Merge {
                op,
                combiner,
                counter_max,
                left,
                right,
            } => fill_from_merge(*op, *combiner, *counter_max, left, right, bundle),
        }
    }

    fn ignore_rest(&mut self) {
        match self {
            Self::Input(src) => src.ignore_rest(),
            Self::Merge { left, right, .. } => {
                left.ignore_rest();
                right.ignore_rest();
            }
        }
    }
}

/// Fills `bundle` to capacity (or end-of-stream) applying the two-input
/// merge rule from §4.1.
fn fill_from_merge(
    op: Op,
    combiner: Combiner,
    counter_max: u32,
    left: &mut Peekable<ExprNode>,
    right: &mut Peekable<ExprNode>,
    bundle: &mut Bundle,
) -> Result<()> {
    while !bundle.is_full() {
        let ordering = match (left.top()?, right.top()?) {
            (None, None) => break,
            (Some(_), None) => {
                drain_side_a(op, left, bundle)?;
                break;
            }
            (None, Some(_)) => {
                drain_side_b(op, right, bundle)?;
                break;
            }
            (Some((a, _)), Some((b, _))) => a.cmp(b),
        };

        match ordering {
            std::cmp::Ordering::Equal => {
                let (a_kmer, a_counter) = advance_confirmed(left)?;
                let (_, b_counter) = advance_confirmed(right)?;
                match op {
                    Op::Intersect | Op::Union | Op::CountersSubtract => {
                        let combined = combiner.combine(a_counter, b_counter, counter_max);
                        if op != Op::CountersSubtract || combined != 0 {
                            bundle.push(a_kmer, combined);
                        }
                    }
                    Op::KmersSubtract => {}
                }
            }
            std::cmp::Ordering::Less => {
                let (kmer, counter) = advance_confirmed(left)?;
                if matches!(op, Op::Union | Op::KmersSubtract | Op::CountersSubtract) {
                    bundle.push(kmer, counter);
                }
                // Intersect: A's key is absent from B, nothing emitted.
            }
            std::cmp::Ordering::Greater => {
                let (kmer, counter) = advance_confirmed(right)?;
                if op == Op::Union {
                    bundle.push(kmer, counter);
                }
                // Intersect and both subtractions emit nothing for a
                // B-only key.
            }
        }
    }
    Ok(())
}

/// One side (B) is exhausted; `left` (A) is the only remaining producer.
/// Union and both subtractions keep draining A verbatim; Intersect has
/// nothing left to match and cancels A outright.
fn drain_side_a(op: Op, left: &mut Peekable<ExprNode>, bundle: &mut Bundle) -> Result<()> {
    if op == Op::Intersect {
        left.ignore_rest();
        return Ok(());
    }
    while !bundle.is_full() {
        match left.advance()? {
            Some((kmer, counter)) => bundle.push(kmer, counter),
            None => break,
        }
    }
    Ok(())
}

/// One side (A) is exhausted; `right` (B) is the only remaining producer.
/// Only Union keeps draining B verbatim: for Intersect and both
/// subtractions, A running out means no further key can ever match.
fn drain_side_b(op: Op, right: &mut Peekable<ExprNode>, bundle: &mut Bundle) -> Result<()> {
    if op != Op::Union {
        right.ignore_rest();
        return Ok(());
    }
    while !bundle.is_full() {
        match right.advance()? {
            Some((kmer, counter)) => bundle.push(kmer, counter),
            None => break,
        }
    }
    Ok(())
}

/// A consumer of one `(k-mer, counter)` record at a time: the target of a
/// simple-operation dispatch route, or of a writer sitting at the root of
/// an expression tree.
pub trait RecordSink: Send {
    fn accept(&mut self, kmer: &KmerVal, counter: u32) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::Encoding;

    struct VecSource {
        records: Vec<(KmerVal, u32)>,
        pos: usize,
    }

    impl BundleSource for VecSource {
        fn next_bundle(&mut self, bundle: &mut Bundle) -> Result<()> {
            bundle.reset();
            while !bundle.is_full() && self.pos < self.records.len() {
                let (k, c) = self.records[self.pos].clone();
                bundle.push(k, c);
                self.pos += 1;
            }
            Ok(())
        }

        fn ignore_rest(&mut self) {
            self.pos = self.records.len();
        }
    }

    fn src(records: Vec<(KmerVal, u32)>) -> ExprNode {
        ExprNode::input(Box::new(VecSource { records, pos: 0 }))
    }

    fn km(seq: &[u8]) -> KmerVal {
        KmerVal::encode(seq, &Encoding::canonical()).unwrap()
    }

    fn drain(mut node: ExprNode) -> Vec<(KmerVal, u32)> {
        let mut out = Vec::new();
        let mut bundle = Bundle::new();
        loop {
            node.next_bundle(&mut bundle).unwrap();
            if bundle.is_empty() {
                break;
            }
            while let Some(rec) = bundle.pop() {
                out.push(rec);
            }
        }
        out
    }

    #[test]
    fn union_sum_matches_scenario_s1() {
        let a = src(vec![(km(b"AAAA"), 3), (km(b"ACGT"), 1)]);
        let b = src(vec![(km(b"ACGT"), 2), (km(b"TTTT"), 5)]);
        let node = ExprNode::union(Combiner::Sum, u32::MAX, a, b);
        let out = drain(node);
        assert_eq!(
            out,
            vec![(km(b"AAAA"), 3), (km(b"ACGT"), 3), (km(b"TTTT"), 5)]
        );
    }

    #[test]
    fn intersect_min_matches_scenario_s2() {
        let a = src(vec![(km(b"AAAA"), 3), (km(b"ACGT"), 1), (km(b"GGGG"), 7)]);
        let b = src(vec![(km(b"ACGT"), 2), (km(b"GGGG"), 4)]);
        let node = ExprNode::intersect(Combiner::Min, u32::MAX, a, b);
        let out = drain(node);
        assert_eq!(out, vec![(km(b"ACGT"), 1), (km(b"GGGG"), 4)]);
    }

    #[test]
    fn kmers_subtract_matches_scenario_s3() {
        let a = src(vec![(km(b"AAAA"), 3), (km(b"ACGT"), 1), (km(b"GGGG"), 7)]);
        let b = src(vec![(km(b"ACGT"), 9)]);
        let node = ExprNode::kmers_subtract(u32::MAX, a, b);
        let out = drain(node);
        assert_eq!(out, vec![(km(b"AAAA"), 3), (km(b"GGGG"), 7)]);
    }

    #[test]
    fn counters_subtract_matches_scenario_s4() {
        let a = src(vec![(km(b"AAAA"), 3), (km(b"ACGT"), 5)]);
        let b = src(vec![(km(b"AAAA"), 3), (km(b"ACGT"), 2)]);
        let node = ExprNode::counters_subtract(u32::MAX, a, b);
        let out = drain(node);
        assert_eq!(out, vec![(km(b"ACGT"), 3)]);
    }

    #[test]
    fn union_drains_surviving_side_after_exhaustion() {
        let a = src(vec![(km(b"AAAA"), 1)]);
        let b = src(vec![(km(b"CCCC"), 2), (km(b"GGGG"), 3), (km(b"TTTT"), 4)]);
        let node = ExprNode::union(Combiner::Sum, u32::MAX, a, b);
        let out = drain(node);
        assert_eq!(
            out,
            vec![
                (km(b"AAAA"), 1),
                (km(b"CCCC"), 2),
                (km(b"GGGG"), 3),
                (km(b"TTTT"), 4),
            ]
        );
    }
}
