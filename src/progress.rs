//! Percent-progress reporter.
//!
//! One atomic counter per source, updated only by the owning reader and read
//! by the display routine; a coarse mutex around the print call prevents
//! interleaved output when more than one reader is reporting concurrently
//! (§5, "Shared resource policy").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use colored::Colorize;

/// Progress for a single named source (one per input database / writer).
pub struct SourceProgress {
    name: String,
    total: u64,
    done: AtomicU64,
    last_percent: AtomicU64,
}

impl SourceProgress {
    pub fn new(name: impl Into<String>, total: u64) -> Self {
        Self {
            name: name.into(),
            total: total.max(1),
            done: AtomicU64::new(0),
            last_percent: AtomicU64::new(u64::MAX),
        }
    }

    pub fn percent(&self) -> u64 {
        let done = self.done.load(Ordering::Relaxed);
        (done.saturating_mul(100) / self.total).min(100)
    }
}

/// Shared handle passed explicitly to readers/writers; this is the one
/// piece of cross-thread mutable state the design calls out by name.
pub struct Progress {
    sources: Mutex<Vec<std::sync::Arc<SourceProgress>>>,
    hidden: bool,
}

impl Progress {
    pub fn new(hidden: bool) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            sources: Mutex::new(Vec::new()),
            hidden,
        })
    }

    pub fn register(&self, name: impl Into<String>, total: u64) -> std::sync::Arc<SourceProgress> {
        let source = std::sync::Arc::new(SourceProgress::new(name, total));
        self.sources.lock().unwrap().push(source.clone());
        source
    }

    /// Called by the owning reader after advancing `by` records; prints once
    /// per 1% step crossed.
    pub fn advance(&self, source: &SourceProgress, by: u64) {
        source.done.fetch_add(by, Ordering::Relaxed);
        if self.hidden {
            return;
        }
        let pct = source.percent();
        let prev = source.last_percent.swap(pct, Ordering::Relaxed);
        if prev == pct {
            return;
        }
        eprintln!("{}: {}%", source.name.bold(), pct.to_string().blue());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_clamped_to_100() {
        let s = SourceProgress::new("db", 10);
        s.done.store(50, Ordering::Relaxed);
        assert_eq!(s.percent(), 100);
    }

    #[test]
    fn advance_updates_done_counter() {
        let progress = Progress::new(true);
        let source = progress.register("db", 100);
        progress.advance(&source, 25);
        assert_eq!(source.percent(), 25);
    }

    #[test]
    fn zero_total_does_not_panic() {
        let s = SourceProgress::new("db", 0);
        assert_eq!(s.percent(), 0);
    }
}
