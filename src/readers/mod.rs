//! Format readers: the `BundleSource` capability shared by KMC1, KMC2, and
//! KFF readers, plus operator nodes and the dump/histogram sinks.

pub mod kff;
pub mod kmc1;
pub mod kmc2;

use crate::bundle::Bundle;
use crate::error::Result;
use crate::kmer::KmerVal;

/// Every producer/consumer stage in the pipeline exposes this capability.
/// `next_bundle` fills `bundle` with as many records as are currently
/// available (up to its capacity); an empty result signals permanent
/// end-of-stream. `ignore_rest` cancels all upstream activity and is safe
/// to call at any point, including after end-of-stream.
pub trait BundleSource: Send {
    fn next_bundle(&mut self, bundle: &mut Bundle) -> Result<()>;
    fn ignore_rest(&mut self);
}

impl BundleSource for Box<dyn BundleSource> {
    fn next_bundle(&mut self, bundle: &mut Bundle) -> Result<()> {
        (**self).next_bundle(bundle)
    }

    fn ignore_rest(&mut self) {
        (**self).ignore_rest();
    }
}

/// Adapts any `BundleSource` into a single-record-at-a-time, peekable
/// cursor. This is the vocabulary the two-input merge (`ops::merge`) and the
/// fan-out dispatcher (`ops::simple`) are built on: `top()` peeks the next
/// record without consuming it, `advance()` consumes it and refills the
/// underlying bundle on demand.
pub struct Peekable<S> {
    source: S,
    bundle: Bundle,
    finished: bool,
}

impl<S: BundleSource> Peekable<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            bundle: Bundle::new(),
            finished: false,
        }
    }

    fn ensure_filled(&mut self) -> Result<()> {
        while self.bundle.peek().is_none() && !self.finished {
            self.bundle.reset();
            self.source.next_bundle(&mut self.bundle)?;
            if self.bundle.is_empty() {
                self.finished = true;
            }
        }
        Ok(())
    }

    /// Peeks the next `(kmer, counter)` without consuming it. `None` means
    /// end-of-stream.
    pub fn top(&mut self) -> Result<Option<&(KmerVal, u32)>> {
        self.ensure_filled()?;
        Ok(self.bundle.peek())
    }

    /// Consumes and returns the next record.
    pub fn advance(&mut self) -> Result<Option<(KmerVal, u32)>> {
        self.ensure_filled()?;
        Ok(self.bundle.pop())
    }

    pub fn ignore_rest(&mut self) {
        self.source.ignore_rest();
    }

    /// Drains the remainder of the stream into `out`, applying no filter.
    /// Used when one side of a merge is exhausted and the other must be
    /// streamed through untouched.
    pub fn drain_into(&mut self, out: &mut Vec<(KmerVal, u32)>) -> Result<()> {
        while let Some(rec) = self.advance()? {
            out.push(rec);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecSource {
        records: Vec<(KmerVal, u32)>,
        pos: usize,
        cancelled: bool,
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
            self.cancelled = true;
        }
    }

    fn kmer(b: u8) -> KmerVal {
        KmerVal::from_bytes(4, vec![b])
    }

    #[test]
    fn peekable_top_does_not_consume() {
        let src = VecSource {
            records: vec![(kmer(1), 10), (kmer(2), 20)],
            pos: 0,
            cancelled: false,
        };
        let mut p = Peekable::new(src);
        assert_eq!(p.top().unwrap(), Some(&(kmer(1), 10)));
        assert_eq!(p.top().unwrap(), Some(&(kmer(1), 10)));
        assert_eq!(p.advance().unwrap(), Some((kmer(1), 10)));
        assert_eq!(p.advance().unwrap(), Some((kmer(2), 20)));
        assert_eq!(p.advance().unwrap(), None);
    }

    #[test]
    fn ignore_rest_propagates_to_source() {
        let src = VecSource {
            records: vec![],
            pos: 0,
            cancelled: false,
        };
        let mut p = Peekable::new(src);
        p.ignore_rest();
        assert!(p.source.cancelled);
    }
}
