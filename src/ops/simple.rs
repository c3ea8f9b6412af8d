//! Fan-out dispatch (§4.1, "simple operation"): a single scan over two
//! sorted inputs classifies each tick as equal, A-lower, or B-lower, and
//! feeds every registered route interested in that class. Used when
//! several outputs share the same two inputs, so the comparison work is
//! paid once instead of once per output.

use crate::error::{KmcError, Result};
use crate::kmer::KmerVal;
use crate::ops::{Combiner, RecordSink};
use crate::readers::{BundleSource, Peekable};

/// Which side(s) contributed the record a route receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Equal,
    ALower,
    BLower,
}

/// One registered output: interested in records of `class`, combining
/// counters with `combiner` on the equal-keys path (ignored otherwise)
/// and clamping to `counter_max`.
pub struct Route {
    pub class: Class,
    pub combiner: Combiner,
    pub counter_max: u32,
    pub sink: Box<dyn RecordSink>,
}

/// Runs the fan-out scan to completion, driving every registered route.
pub fn dispatch<A, B>(mut left: Peekable<A>, mut right: Peekable<B>, mut routes: Vec<Route>) -> Result<()>
where
    A: BundleSource,
    B: BundleSource,
{
    loop {
        let ordering = match (left.top()?, right.top()?) {
            (None, None) => break,
            (Some(_), None) => {
                drain_one_side(&mut left, Class::ALower, &mut routes)?;
                break;
            }
            (None, Some(_)) => {
                drain_one_side(&mut right, Class::BLower, &mut routes)?;
                break;
            }
            (Some((a, _)), Some((b, _))) => a.cmp(b),
        };

        match ordering {
            std::cmp::Ordering::Equal => {
                let (kmer, a_counter) = advance_confirmed(&mut left)?;
                let (_, b_counter) = advance_confirmed(&mut right)?;
                for route in routes.iter_mut().filter(|r| r.class == Class::Equal) {
                    let combined = route.combiner.combine(a_counter, b_counter, route.counter_max);
                    route.sink.accept(&kmer, combined)?;
                }
            }
            std::cmp::Ordering::Less => {
                let (kmer, counter) = advance_confirmed(&mut left)?;
                for route in routes.iter_mut().filter(|r| r.class == Class::ALower) {
                    route.sink.accept(&kmer, counter)?;
                }
            }
            std::cmp::Ordering::Greater => {
                let (kmer, counter) = advance_confirmed(&mut right)?;
                for route in routes.iter_mut().filter(|r| r.class == Class::BLower) {
                    route.sink.accept(&kmer, counter)?;
                }
            }
        }
    }
    for route in &mut routes {
        route.sink.finish()?;
    }
    Ok(())
}

/// A peeked top was confirmed non-empty one line above; `advance` racing
/// it to `None` would mean a `Peekable` broke its own contract.
fn advance_confirmed<S: BundleSource>(p: &mut Peekable<S>) -> Result<(KmerVal, u32)> {
    p.advance()?
        .ok_or_else(|| KmcError::Internal("peeked record vanished on advance".into()))
}

fn drain_one_side<S: BundleSource>(side: &mut Peekable<S>, class: Class, routes: &mut [Route]) -> Result<()> {
    while let Some((kmer, counter)) = side.advance()? {
        for route in routes.iter_mut().filter(|r| r.class == class) {
            route.sink.accept(&kmer, counter)?;
        }
    }
    Ok(())
}
