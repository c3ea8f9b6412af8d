//! Database writers (§4.5, §4.6): KMC1 and KFF output.

pub mod kff;
pub mod kmc1;

/// Chooses the LUT prefix length `p` for one input database, minimising
/// `total_kmers * (k-p)/4 + 4^p * 8` subject to `(k-p)` divisible by 4
/// (§4.5, "Choice of p"). `p` itself is unconstrained mod 4 — only the
/// suffix (`k-p` bases) needs to land on a byte boundary, so every
/// candidate `p` in `0..=k` is checked.
pub fn choose_p(k: usize, total_kmers: u64) -> usize {
    let mut best_p = 0usize;
    let mut best_cost = u64::MAX;
    for p in 0..=k {
        if (k - p) % 4 == 0 {
            let lut_cost = 4u64
                .checked_pow(p as u32)
                .and_then(|n| n.checked_mul(8))
                .unwrap_or(u64::MAX);
            let cost = total_kmers
                .saturating_mul(((k - p) / 4) as u64)
                .saturating_add(lut_cost);
            if cost < best_cost {
                best_cost = cost;
                best_p = p;
            }
        }
    }
    best_p
}

/// The output `p` for a multi-input write is the maximum across inputs
/// (§4.5): a shared LUT width wide enough for every source database.
pub fn choose_output_p(k: usize, totals: &[u64]) -> usize {
    totals.iter().map(|&t| choose_p(k, t)).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choose_p_prefers_smaller_lut_for_small_databases() {
        // A tiny database should not pay for a large LUT.
        let p = choose_p(32, 10);
        assert!(p <= 8, "expected a small p for a tiny database, got {p}");
    }

    #[test]
    fn choose_p_grows_with_database_size() {
        let small = choose_p(32, 100);
        let large = choose_p(32, 100_000_000);
        assert!(large >= small);
    }

    #[test]
    fn choose_output_p_is_max_across_inputs() {
        let totals = [10u64, 100_000_000u64];
        let combined = choose_output_p(32, &totals);
        let individual_max = totals.iter().map(|&t| choose_p(32, t)).max().unwrap();
        assert_eq!(combined, individual_max);
    }
}
