//! Hit-rank accumulator with Recall@k and MRR reductions.

use std::collections::BTreeSet;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// The 0-based rank of the first relevant result per query, or `None` when no
/// relevant result was retrieved within the evaluation depth.
///
/// Both metrics are pure reductions over the recorded ranks and can be
/// computed any number of times.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    hit_ranks: Vec<Option<usize>>,
}

impl Metrics {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the first-hit rank of one query.
    pub fn record(&mut self, rank: Option<usize>) {
        self.hit_ranks.push(rank);
    }

    /// Recorded ranks in insertion order.
    pub fn hit_ranks(&self) -> &[Option<usize>] {
        &self.hit_ranks
    }

    /// Number of recorded queries.
    pub fn len(&self) -> usize {
        self.hit_ranks.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.hit_ranks.is_empty()
    }

    /// Fraction of queries whose first hit has rank `<= k`. Misses never
    /// count. Returns `0.0` when empty.
    pub fn recall(&self, k: usize) -> f64 {
        if self.hit_ranks.is_empty() {
            return 0.0;
        }
        let hits = self.hit_ranks.iter().flatten().filter(|rank| **rank <= k).count();
        hits as f64 / self.hit_ranks.len() as f64
    }

    /// Mean of `1 / (rank + 1)` over all queries, counting ranks beyond
    /// `depth` and misses as zero. Returns `0.0` when empty.
    pub fn mrr(&self, depth: usize) -> f64 {
        if self.hit_ranks.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .hit_ranks
            .iter()
            .flatten()
            .filter(|rank| **rank <= depth)
            .map(|rank| 1.0 / (*rank as f64 + 1.0))
            .sum();
        sum / self.hit_ranks.len() as f64
    }
}

impl AddAssign for Metrics {
    fn add_assign(&mut self, other: Self) {
        self.hit_ranks.extend(other.hit_ranks);
    }
}

impl FromIterator<Option<usize>> for Metrics {
    fn from_iter<I: IntoIterator<Item = Option<usize>>>(iter: I) -> Self {
        Self { hit_ranks: iter.into_iter().collect() }
    }
}

/// The 0-based rank of the first id in `retrieved` that is in `relevant`.
pub fn first_hit_rank<'a, I>(retrieved: I, relevant: &BTreeSet<String>) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    retrieved.into_iter().position(|id| relevant.contains(id))
}
