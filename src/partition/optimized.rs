use super::{clamp_percent, to_key, Condition, ScoreMetric};
use crate::tree::HcTree;
use crate::HcTreeResult;
use num_traits::Float;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;

/// Greedy partition refinement. Starting from the source alone, each step replaces one entry by
/// its descendants a few levels down, choosing the replacement that scores best.
///
/// Candidate splits are scored from running totals of the current partition, so a step costs
/// the size of the replaced frontier rather than the size of the whole partition.
pub(super) struct OptimizedSearch<'a, T> {
    tree: &'a HcTree<T>,
    metric: ScoreMetric,
    exclude_leaves: bool,
    depth: usize,
}

enum Limit {
    Count(usize),
    /// Entries above this size (size metric) or value (spread metric) must be split.
    Threshold(f64),
}

impl<'a, T: Float> OptimizedSearch<'a, T> {
    pub(super) fn new(
        tree: &'a HcTree<T>,
        metric: ScoreMetric,
        exclude_leaves: bool,
        depth: usize,
    ) -> Self {
        OptimizedSearch {
            tree,
            metric,
            exclude_leaves,
            depth: depth.max(1),
        }
    }

    pub(super) fn run(&self, source: usize, condition: Condition<T>) -> HcTreeResult<Vec<usize>> {
        let source_size = self.tree.node(source)?.size();
        let mut totals = Totals::new(source_size);
        totals.insert(source_size, self.spread_of(source));
        match self.limit(source, condition)? {
            Limit::Count(target) => self.refine_to_count(source, target, totals),
            Limit::Threshold(threshold) => self.refine_to_threshold(source, threshold, totals),
        }
    }

    /// Takes the best split over all entries for as long as one fits into `target` entries.
    fn refine_to_count(
        &self,
        source: usize,
        target: usize,
        mut totals: Totals,
    ) -> HcTreeResult<Vec<usize>> {
        let mut entries = vec![source];
        loop {
            let mut best: Option<(f64, usize, Vec<usize>)> = None;
            for (pos, &id) in entries.iter().enumerate() {
                if !self.is_splittable(id) {
                    continue;
                }
                for frontier in self.frontiers(id)? {
                    if entries.len() - 1 + frontier.len() > target {
                        break;
                    }
                    let score = self.score_split(&totals, id, &frontier);
                    let improves = best
                        .as_ref()
                        .map_or(true, |(top, _, _)| self.is_better(score, *top));
                    if improves {
                        best = Some((score, pos, frontier));
                    }
                }
            }
            let (score, pos, frontier) = match best {
                Some(step) => step,
                None => break,
            };
            self.apply_split(&mut totals, entries[pos], &frontier);
            entries.splice(pos..pos + 1, frontier);
            trace!(entries = entries.len(), score, "optimized search step");
        }
        Ok(entries)
    }

    /// Splits entries above the threshold, biggest measure first, each at its best scoring depth.
    fn refine_to_threshold(
        &self,
        source: usize,
        threshold: f64,
        mut totals: Totals,
    ) -> HcTreeResult<Vec<usize>> {
        let mut settled = Vec::new();
        let mut pending = BinaryHeap::new();
        self.schedule(source, threshold, &mut pending, &mut settled);
        while let Some(Pending { id, .. }) = pending.pop() {
            let mut best: Option<(f64, Vec<usize>)> = None;
            for frontier in self.frontiers(id)? {
                let score = self.score_split(&totals, id, &frontier);
                if best.as_ref().map_or(true, |(top, _)| self.is_better(score, *top)) {
                    best = Some((score, frontier));
                }
            }
            let (score, frontier) = match best {
                Some(step) => step,
                None => {
                    settled.push(id);
                    continue;
                }
            };
            self.apply_split(&mut totals, id, &frontier);
            trace!(entries = totals.sizes.count, score, "optimized search step");
            for part in frontier {
                self.schedule(part, threshold, &mut pending, &mut settled);
            }
        }
        Ok(settled)
    }

    fn schedule(
        &self,
        id: usize,
        threshold: f64,
        pending: &mut BinaryHeap<Pending>,
        settled: &mut Vec<usize>,
    ) {
        let measure = self.measure(id);
        if self.is_splittable(id) && measure > threshold {
            pending.push(Pending { measure, id });
        } else {
            settled.push(id);
        }
    }

    fn limit(&self, source: usize, condition: Condition<T>) -> HcTreeResult<Limit> {
        let node = self.tree.node(source)?;
        let limit = match (condition, self.metric) {
            (Condition::Count(target), _) => Limit::Count(target.clamp(1, node.size().max(1))),
            (Condition::Value(value), _) => Limit::Threshold(to_key(value)),
            (Condition::Percent(percent), ScoreMetric::SizeDifference) => {
                Limit::Threshold(clamp_percent(percent) / 100.0 * node.size() as f64)
            }
            (Condition::Percent(percent), ScoreMetric::Spread) => {
                Limit::Threshold(clamp_percent(percent) / 100.0 * to_key(node.value()))
            }
        };
        Ok(limit)
    }

    /// What a threshold limits for the current metric.
    fn measure(&self, id: usize) -> f64 {
        match (self.tree.get(id), self.metric) {
            (Some(node), ScoreMetric::SizeDifference) => node.size() as f64,
            (Some(node), ScoreMetric::Spread) => to_key(node.value()),
            (None, _) => 0.0,
        }
    }

    fn is_splittable(&self, id: usize) -> bool {
        match self.tree.get(id) {
            Some(node) => node.is_cluster() && !(self.exclude_leaves && node.level() == 1),
            None => false,
        }
    }

    /// The replacements of `id` one to `depth` levels down, stopping once a level adds nothing.
    fn frontiers(&self, id: usize) -> HcTreeResult<Vec<Vec<usize>>> {
        let mut frontiers: Vec<Vec<usize>> = Vec::with_capacity(self.depth);
        let mut frontier = vec![id];
        for _ in 0..self.depth {
            let mut next = Vec::with_capacity(frontier.len() * 2);
            for &current in &frontier {
                if self.is_splittable(current) {
                    next.extend_from_slice(self.tree.node(current)?.children());
                } else {
                    next.push(current);
                }
            }
            if next.len() == frontier.len() {
                break;
            }
            frontiers.push(next.clone());
            frontier = next;
        }
        Ok(frontiers)
    }

    fn is_better(&self, score: f64, other: f64) -> bool {
        match self.metric {
            ScoreMetric::SizeDifference => score < other,
            ScoreMetric::Spread => score > other,
        }
    }

    /// Score of the partition that results from replacing `id` by `frontier`.
    fn score_split(&self, totals: &Totals, id: usize, frontier: &[usize]) -> f64 {
        match self.metric {
            ScoreMetric::SizeDifference => {
                let removed = self.tree.size_of(id);
                let mut pair_sum = totals.pair_sum - totals.sizes.distance_sum(removed);
                for (i, &part) in frontier.iter().enumerate() {
                    let size = self.tree.size_of(part);
                    pair_sum += totals.sizes.distance_sum(size) - size_gap(size, removed);
                    pair_sum += frontier[..i]
                        .iter()
                        .map(|&other| size_gap(size, self.tree.size_of(other)))
                        .sum::<i64>();
                }
                let count = totals.sizes.count - 1 + frontier.len() as i64;
                size_difference_score(pair_sum, count, totals.total)
            }
            ScoreMetric::Spread => {
                let added: f64 = frontier.iter().map(|&part| self.spread_of(part)).sum();
                (totals.spread + added - self.spread_of(id)) / totals.total as f64
            }
        }
    }

    fn apply_split(&self, totals: &mut Totals, id: usize, frontier: &[usize]) {
        totals.remove(self.tree.size_of(id), self.spread_of(id));
        for &part in frontier {
            totals.insert(self.tree.size_of(part), self.spread_of(part));
        }
    }

    /// A node's share of the spread score. A node without parent has no separation.
    fn spread_of(&self, id: usize) -> f64 {
        let node = match self.tree.get(id) {
            Some(node) => node,
            None => return 0.0,
        };
        let parent_value = node
            .parent()
            .and_then(|p| self.tree.get(p))
            .map(|parent| parent.value())
            .unwrap_or(node.value());
        spread_contribution(
            node.size() as f64,
            to_key(parent_value - node.value()),
            to_key(node.value()),
        )
    }
}

/// An entry waiting to be split, ordered by its measure.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Pending {
    measure: f64,
    id: usize,
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.measure
            .total_cmp(&other.measure)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Running totals of the current partition.
struct Totals {
    /// Leaves of the source. Every partition of the source covers all of them.
    total: i64,
    /// Sum of `|size_i - size_j|` over all entry pairs.
    pair_sum: i64,
    spread: f64,
    sizes: SizeIndex,
}

impl Totals {
    fn new(total: usize) -> Self {
        Totals {
            total: total as i64,
            pair_sum: 0,
            spread: 0.0,
            sizes: SizeIndex::new(total),
        }
    }

    fn insert(&mut self, size: usize, spread: f64) {
        self.pair_sum += self.sizes.distance_sum(size);
        self.sizes.update(size, 1);
        self.spread += spread;
    }

    fn remove(&mut self, size: usize, spread: f64) {
        self.sizes.update(size, -1);
        self.pair_sum -= self.sizes.distance_sum(size);
        self.spread -= spread;
    }
}

/// Fenwick trees over entry sizes, counting entries and summing their sizes per size bucket.
struct SizeIndex {
    counts: Vec<i64>,
    sums: Vec<i64>,
    count: i64,
    sum: i64,
}

impl SizeIndex {
    fn new(max_size: usize) -> Self {
        SizeIndex {
            counts: vec![0; max_size + 1],
            sums: vec![0; max_size + 1],
            count: 0,
            sum: 0,
        }
    }

    fn update(&mut self, size: usize, sign: i64) {
        self.count += sign;
        self.sum += sign * size as i64;
        let mut i = size;
        while i > 0 && i < self.counts.len() {
            self.counts[i] += sign;
            self.sums[i] += sign * size as i64;
            i += i & i.wrapping_neg();
        }
    }

    /// Count and sum of the indexed sizes that are at most `size`.
    fn prefix(&self, size: usize) -> (i64, i64) {
        let (mut count, mut sum) = (0, 0);
        let mut i = size.min(self.counts.len() - 1);
        while i > 0 {
            count += self.counts[i];
            sum += self.sums[i];
            i -= i & i.wrapping_neg();
        }
        (count, sum)
    }

    /// Sum of `|size - s|` over every indexed size `s`.
    fn distance_sum(&self, size: usize) -> i64 {
        let (below, below_sum) = self.prefix(size);
        let x = size as i64;
        x * below - below_sum + (self.sum - below_sum) - x * (self.count - below)
    }
}

fn size_gap(a: usize, b: usize) -> i64 {
    a.abs_diff(b) as i64
}

/// Mean absolute pairwise size difference relative to the mean size, from the pairwise sum of
/// `count` entries covering `total` leaves. 0 for perfectly even partitions.
fn size_difference_score(pair_sum: i64, count: i64, total: i64) -> f64 {
    if count < 2 || total == 0 {
        return 0.0;
    }
    // (pair_sum / pairs) / (total / count) with pairs = count * (count - 1) / 2
    2.0 * pair_sum as f64 / ((count - 1) as f64 * total as f64)
}

/// Size-weighted separation from the parent minus size-weighted internal value.
fn spread_contribution(size: f64, separation: f64, value: f64) -> f64 {
    size * (separation - value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals_of(sizes: &[usize]) -> Totals {
        let mut totals = Totals::new(sizes.iter().sum());
        for &size in sizes {
            totals.insert(size, 0.0);
        }
        totals
    }

    #[test]
    fn even_sizes_score_zero() {
        let totals = totals_of(&[3, 3, 3]);
        assert_eq!(0, totals.pair_sum);
        assert_eq!(0.0, size_difference_score(totals.pair_sum, 3, 9));
        assert_eq!(0.0, size_difference_score(0, 1, 7));
    }

    #[test]
    fn uneven_sizes_score_relative_difference() {
        // Pairs: |1-3| = 2, mean size 2
        let totals = totals_of(&[3, 1]);
        assert!((size_difference_score(totals.pair_sum, 2, 4) - 1.0).abs() < 1e-12);
        // Pairs: 1, 2, 1 -> mean 4/3, mean size 2
        let totals = totals_of(&[1, 2, 3]);
        assert_eq!(4, totals.pair_sum);
        assert!((size_difference_score(totals.pair_sum, 3, 6) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn pair_sum_follows_removals() {
        let mut totals = totals_of(&[5, 1, 2, 2]);
        // 4 + 3 + 3 + 1 + 1 + 0
        assert_eq!(12, totals.pair_sum);
        totals.remove(5, 0.0);
        assert_eq!(2, totals.pair_sum);
        assert_eq!(3, totals.sizes.count);
        assert_eq!(4, totals.sizes.distance_sum(3));
    }

    #[test]
    fn spread_rewards_separation() {
        let separated =
            (spread_contribution(2.0, 0.7, 0.2) + spread_contribution(2.0, 0.6, 0.3)) / 4.0;
        let tight =
            (spread_contribution(2.0, 0.1, 0.8) + spread_contribution(2.0, 0.1, 0.8)) / 4.0;
        assert!(separated > tight);
        assert!((separated - 0.4).abs() < 1e-12);
    }

    #[test]
    fn pending_entries_pop_biggest_first() {
        let mut heap = BinaryHeap::from([
            Pending { measure: 2.0, id: 9 },
            Pending { measure: 4.0, id: 10 },
            Pending { measure: 4.0, id: 13 },
        ]);
        assert_eq!(Some(10), heap.pop().map(|pending| pending.id));
        assert_eq!(Some(13), heap.pop().map(|pending| pending.id));
        assert_eq!(Some(9), heap.pop().map(|pending| pending.id));
    }
}
