use crate::geo::PoolEntry;
use rand::{Rng, RngCore};
use std::collections::HashSet;

/// Trait for target selection strategies
pub trait TargetSelector {
    /// Pick the next target id, or `None` when the session is exhausted.
    fn pick(
        &self,
        pool: &[PoolEntry],
        used_ids: &HashSet<String>,
        allow_repeat: bool,
        total_rounds: usize,
        current_round: usize,
        rng: &mut dyn RngCore,
    ) -> Option<String>;
}

/// Importance-weighted draw, preferring places not yet asked this session.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedSelector;

impl TargetSelector for WeightedSelector {
    fn pick(
        &self,
        pool: &[PoolEntry],
        used_ids: &HashSet<String>,
        allow_repeat: bool,
        total_rounds: usize,
        current_round: usize,
        rng: &mut dyn RngCore,
    ) -> Option<String> {
        pick_target(pool, used_ids, allow_repeat, total_rounds, current_round, rng)
    }
}

fn weight(entry: &PoolEntry) -> f64 {
    if entry.importance.is_finite() && entry.importance > 0.0 {
        entry.importance
    } else {
        1.0
    }
}

/// Draw the next target.
///
/// Unseen entries are preferred. Once every entry has been used the whole pool is
/// eligible again if repeats are allowed or rounds remain; otherwise `None`.
/// Consumes exactly one random value whenever a candidate exists.
pub fn pick_target(
    pool: &[PoolEntry],
    used_ids: &HashSet<String>,
    allow_repeat: bool,
    total_rounds: usize,
    current_round: usize,
    rng: &mut dyn RngCore,
) -> Option<String> {
    let unseen: Vec<&PoolEntry> = pool.iter().filter(|p| !used_ids.contains(&p.id)).collect();

    let candidates: Vec<&PoolEntry> = if !unseen.is_empty() {
        unseen
    } else if allow_repeat || current_round < total_rounds {
        pool.iter().collect()
    } else {
        return None;
    };

    let last = candidates.last()?;

    let total: f64 = candidates.iter().map(|c| weight(c)).sum();
    let mut remaining = rng.gen::<f64>() * total;
    for candidate in &candidates {
        remaining -= weight(candidate);
        if remaining <= 0.0 {
            return Some(candidate.id.clone());
        }
    }

    // Rounding can leave a sliver of weight unspent
    Some(last.id.clone())
}
