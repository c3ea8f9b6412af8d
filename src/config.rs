//! The explicit `Config` value.
//!
//! The original program kept these knobs in a process-wide singleton (design
//! note 9, "Global mutable state"). Here they live in one value, constructed
//! once from parsed CLI arguments and threaded by reference into every
//! reader/writer/evaluator constructor.

/// Process-wide knobs threaded through constructors instead of a singleton.
#[derive(Debug, Clone)]
pub struct Config {
    /// Total worker threads available to the evaluation (default: hardware
    /// concurrency).
    pub threads: usize,
    pub verbose: bool,
    pub hide_percent_progress: bool,
}

impl Config {
    pub fn new(threads: Option<usize>, verbose: bool, hide_percent_progress: bool) -> Self {
        let threads = threads
            .filter(|&t| t > 0)
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, std::num::NonZero::get));
        Self {
            threads,
            verbose,
            hide_percent_progress,
        }
    }

    /// Per-input-database thread split, per §5: 2 threads for each KMC1
    /// input, the remainder split evenly across KMC2/KFF inputs.
    pub fn threads_for_inputs(&self, kinds: &[crate::commands::DbKind]) -> Vec<usize> {
        let kmc1_count = kinds
            .iter()
            .filter(|k| matches!(k, crate::commands::DbKind::Kmc1))
            .count();
        let reserved = kmc1_count * 2;
        let remaining_slots = kinds.len() - kmc1_count;
        let remaining_threads = self.threads.saturating_sub(reserved).max(remaining_slots);
        let share = if remaining_slots == 0 {
            0
        } else {
            (remaining_threads / remaining_slots).max(1)
        };
        kinds
            .iter()
            .map(|k| match k {
                crate::commands::DbKind::Kmc1 => 2,
                _ => share,
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(None, false, false)
    }
}
