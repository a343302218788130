mod optimized;

use crate::color::{Color, ColorTable};
use crate::params::PartitionParams;
use crate::tree::HcTree;
use crate::HcTreeResult;
use num_traits::Float;
use optimized::OptimizedSearch;
use tracing::{debug, instrument, warn};

/// One element of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
    pub id: usize,
    pub is_cluster: bool,
}

/// A set of nodes whose leaf sets disjointly cover the leaves of a source cluster. Entries are
/// ordered biggest first, ties by ascending id.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<T> {
    entries: Vec<PartitionEntry>,
    cut_value: T,
    source: Option<usize>,
    colors: Option<Vec<Color>>,
    generation: u64,
}

impl<T: Float> Partition<T> {
    pub fn entries(&self) -> &[PartitionEntry] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<usize> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The value (or level) the partition was cut at.
    pub fn cut_value(&self) -> T {
        self.cut_value
    }

    /// The partitioned subtree, `None` for the empty partition of an empty tree.
    pub fn source(&self) -> Option<usize> {
        self.source
    }

    /// Per-entry colors, only present for preloaded partitions that declared them.
    pub fn colors(&self) -> Option<&[Color]> {
        self.colors.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while the tree has not been edited since the partition was computed.
    pub fn is_current(&self, tree: &HcTree<T>) -> bool {
        self.generation == tree.generation()
    }

    /// Saves the partition as tree metadata and returns its index. Colors are taken from
    /// `colors` when given, otherwise the partition's own colors are kept.
    pub fn store(&self, tree: &mut HcTree<T>, colors: Option<&ColorTable>) -> HcTreeResult<usize> {
        tree.ensure_generation(self.generation)?;
        let colors = match colors {
            Some(table) => {
                table.ensure_current(tree)?;
                Some(
                    self.entries
                        .iter()
                        .map(|entry| table.color(entry.id).unwrap_or(Color::GREY))
                        .collect(),
                )
            }
            None => self.colors.clone(),
        };
        tree.add_partition(self.ids(), self.cut_value, colors)
    }
}

/// How a partition search limits its result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition<T> {
    /// At most this many entries, as close to it as the tree allows.
    Count(usize),
    /// An explicit threshold: a cut value, a branch gap or a score limit depending on the mode.
    Value(T),
    /// A percentage (0 to 100) of the source cluster's value, level or size.
    Percent(f64),
}

/// Scoring used by the optimized search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMetric {
    /// Prefers partitions of evenly sized entries.
    SizeDifference,
    /// Prefers compact entries that are well separated from their parents.
    Spread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionMode {
    HorizontalValue,
    HorizontalLevel,
    Optimized(ScoreMetric),
    BranchLength,
    /// Index of a partition stored on the tree.
    Preloaded(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CutKey {
    Value,
    Level,
}

/// Partition searches over a borrowed tree.
#[derive(Debug, Clone)]
pub struct PartitionEngine<'t, T> {
    tree: &'t HcTree<T>,
    params: PartitionParams,
}

impl<'t, T: Float> PartitionEngine<'t, T> {
    pub fn new(tree: &'t HcTree<T>) -> Self {
        Self::with_params(tree, PartitionParams::default())
    }

    pub fn with_params(tree: &'t HcTree<T>, params: PartitionParams) -> Self {
        PartitionEngine { tree, params }
    }

    /// Runs the search selected by `mode`.
    ///
    /// # Errors
    /// * `OutOfBounds` if the configured source is not a live node.
    /// * `MissingPartition` if a preloaded index is not stored on the tree.
    #[instrument(level = "debug", skip(self, condition))]
    pub fn partition(
        &self,
        mode: PartitionMode,
        condition: Condition<T>,
    ) -> HcTreeResult<Partition<T>> {
        let partition = match mode {
            PartitionMode::HorizontalValue => self.horizontal_by_value(condition),
            PartitionMode::HorizontalLevel => self.horizontal_by_level(condition),
            PartitionMode::Optimized(metric) => self.optimized(metric, condition),
            PartitionMode::BranchLength => self.branch_length(condition),
            PartitionMode::Preloaded(index) => self.preloaded(index),
        }?;
        debug!(
            entries = partition.len(),
            cut = partition.cut_value.to_f64().unwrap_or(f64::NAN),
            "partition computed"
        );
        Ok(partition)
    }

    /// Every node at or below the cut value whose parent lies above it.
    pub fn horizontal_by_value(&self, condition: Condition<T>) -> HcTreeResult<Partition<T>> {
        self.horizontal(CutKey::Value, condition)
    }

    /// Every node at or below the cut level whose parent lies above it.
    pub fn horizontal_by_level(&self, condition: Condition<T>) -> HcTreeResult<Partition<T>> {
        self.horizontal(CutKey::Level, condition)
    }

    /// Greedy refinement scored by `metric`.
    pub fn optimized(
        &self,
        metric: ScoreMetric,
        condition: Condition<T>,
    ) -> HcTreeResult<Partition<T>> {
        let source = match self.resolve_source()? {
            Some(source) => source,
            None => return Ok(self.empty_partition()),
        };
        let search = OptimizedSearch::new(
            self.tree,
            metric,
            self.params.exclude_leaves,
            self.params.search_depth,
        );
        let ids = search.run(source, condition)?;
        let cut_value = self.largest_value(&ids);
        Ok(self.finish(source, ids, cut_value))
    }

    /// Selects nodes whose branch to their parent is at least the gap and which hold at least
    /// `min_size` leaves, descending into everything else.
    pub fn branch_length(&self, condition: Condition<T>) -> HcTreeResult<Partition<T>> {
        let source = match self.resolve_source()? {
            Some(source) => source,
            None => return Ok(self.empty_partition()),
        };
        let gap = match condition {
            Condition::Value(gap) => to_key(gap),
            Condition::Percent(percent) => {
                clamp_percent(percent) / 100.0 * to_key(self.tree.node(source)?.value())
            }
            Condition::Count(target) => match self.search_gap(source, target)? {
                Some(gap) => gap,
                // Every gap splits the source into more entries than allowed
                None => {
                    let value = self.tree.node(source)?.value();
                    return Ok(self.finish(source, vec![source], value));
                }
            },
        };
        let ids = self.branch_cut(source, gap)?;
        Ok(self.finish(source, ids, T::from(gap).unwrap_or(T::zero())))
    }

    /// A partition stored on the tree, returned as declared.
    pub fn preloaded(&self, index: usize) -> HcTreeResult<Partition<T>> {
        let stored = self.tree.stored_partition(index)?;
        let entries = stored
            .ids
            .iter()
            .map(|&id| {
                self.tree.node(id).map(|node| PartitionEntry {
                    id,
                    is_cluster: node.is_cluster(),
                })
            })
            .collect::<HcTreeResult<Vec<_>>>()?;
        Ok(Partition {
            entries,
            cut_value: stored.cut_value,
            source: self.tree.root(),
            colors: stored.colors.clone(),
            generation: self.tree.generation(),
        })
    }

    /// Splits the biggest splittable entry, starting from the source, for as long as the result
    /// holds at most `count` entries.
    pub fn largest_clusters(&self, count: usize) -> HcTreeResult<Partition<T>> {
        let source = match self.resolve_source()? {
            Some(source) => source,
            None => return Ok(self.empty_partition()),
        };
        let count = self.clamp_count(source, count)?;
        let mut entries = vec![source];
        loop {
            self.tree.sort_by_size(&mut entries);
            let split = entries
                .iter()
                .position(|&id| self.is_splittable(id));
            let pos = match split {
                Some(pos) => pos,
                None => break,
            };
            let children = self.tree.node(entries[pos])?.children();
            if entries.len() - 1 + children.len() > count {
                break;
            }
            entries.splice(pos..pos + 1, children.iter().copied());
        }
        let cut_value = self.largest_value(&entries);
        Ok(self.finish(source, entries, cut_value))
    }

    /// The nodes `depth` levels below the source, biggest first. Branches ending earlier
    /// contribute their leaves, which `hide_outliers` drops.
    pub fn levels_from_top(&self, depth: usize, hide_outliers: bool) -> HcTreeResult<Vec<usize>> {
        let source = match self.resolve_source()? {
            Some(source) => source,
            None => return Ok(Vec::new()),
        };
        let mut frontier = vec![source];
        for _ in 0..depth {
            let mut next = Vec::with_capacity(frontier.len() * 2);
            for &id in &frontier {
                let node = self.tree.node(id)?;
                if node.is_leaf() {
                    next.push(id);
                } else {
                    next.extend_from_slice(node.children());
                }
            }
            if next.len() == frontier.len() {
                break;
            }
            frontier = next;
        }
        if hide_outliers {
            frontier.retain(|&id| !self.tree.is_leaf(id));
        }
        self.tree.sort_by_size(&mut frontier);
        Ok(frontier)
    }

    fn horizontal(&self, key: CutKey, condition: Condition<T>) -> HcTreeResult<Partition<T>> {
        let source = match self.resolve_source()? {
            Some(source) => source,
            None => return Ok(self.empty_partition()),
        };
        let cut = match condition {
            Condition::Value(value) => to_key(value),
            Condition::Percent(percent) => {
                clamp_percent(percent) / 100.0 * self.key_of(source, key)
            }
            Condition::Count(target) => self.search_cut(source, key, target)?,
        };
        let ids = self.horizontal_cut(source, key, cut)?;
        Ok(self.finish(source, ids, T::from(cut).unwrap_or(T::zero())))
    }

    fn horizontal_cut(&self, source: usize, key: CutKey, cut: f64) -> HcTreeResult<Vec<usize>> {
        let mut ids = Vec::new();
        let mut stack = vec![source];
        while let Some(id) = stack.pop() {
            let node = self.tree.node(id)?;
            if node.is_leaf() || self.kept_whole(id) || self.key_of(id, key) <= cut {
                ids.push(id);
            } else {
                stack.extend_from_slice(node.children());
            }
        }
        Ok(ids)
    }

    /// Finds the lowest cut whose partition has at most `target` entries. The entry count never
    /// grows with the cut, so the candidate cuts can be bisected.
    fn search_cut(&self, source: usize, key: CutKey, target: usize) -> HcTreeResult<f64> {
        let target = self.clamp_count(source, target)?;
        let mut candidates = vec![0.0];
        candidates.extend(
            self.subtree(source)?
                .into_iter()
                .filter(|&id| !self.tree.is_leaf(id))
                .map(|id| self.key_of(id, key)),
        );
        sort_and_dedup(&mut candidates);

        let mut failure = None;
        let split = candidates.partition_point(|&cut| {
            match self.horizontal_cut(source, key, cut) {
                Ok(ids) => ids.len() > target,
                Err(err) => {
                    failure.get_or_insert(err);
                    false
                }
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(candidates
            .get(split)
            .or(candidates.last())
            .copied()
            .unwrap_or(0.0))
    }

    fn branch_cut(&self, source: usize, gap: f64) -> HcTreeResult<Vec<usize>> {
        let min_size = self.params.min_size;
        let mut ids = Vec::new();
        let mut stack = vec![source];
        while let Some(id) = stack.pop() {
            let node = self.tree.node(id)?;
            let selected = id != source
                && node.size() >= min_size
                && self.branch_of(id).map(|branch| branch >= gap).unwrap_or(false);
            if node.is_leaf() || self.kept_whole(id) || selected {
                ids.push(id);
            } else {
                stack.extend_from_slice(node.children());
            }
        }
        Ok(ids)
    }

    /// Finds the largest gap whose partition has at most `target` entries. A larger gap selects
    /// fewer nodes early, so the entry count never shrinks as the gap grows.
    fn search_gap(&self, source: usize, target: usize) -> HcTreeResult<Option<f64>> {
        let target = self.clamp_count(source, target)?;
        let mut candidates = vec![0.0];
        candidates.extend(
            self.subtree(source)?
                .into_iter()
                .filter(|&id| id != source)
                .filter_map(|id| self.branch_of(id)),
        );
        sort_and_dedup(&mut candidates);

        let mut failure = None;
        let fitting = candidates.partition_point(|&gap| match self.branch_cut(source, gap) {
            Ok(ids) => ids.len() <= target,
            Err(err) => {
                failure.get_or_insert(err);
                false
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(fitting.checked_sub(1).map(|last| candidates[last]))
    }

    fn resolve_source(&self) -> HcTreeResult<Option<usize>> {
        match self.params.source {
            Some(source) => self.tree.node(source).map(|_| Some(source)),
            None => Ok(self.tree.root()),
        }
    }

    fn clamp_count(&self, source: usize, count: usize) -> HcTreeResult<usize> {
        let size = self.tree.node(source)?.size();
        if count > size {
            warn!(count, size, "target count exceeds the source size and was clamped");
        }
        Ok(count.clamp(1, size.max(1)))
    }

    fn subtree(&self, source: usize) -> HcTreeResult<Vec<usize>> {
        let mut ids = Vec::new();
        let mut stack = vec![source];
        while let Some(id) = stack.pop() {
            stack.extend_from_slice(self.tree.node(id)?.children());
            ids.push(id);
        }
        Ok(ids)
    }

    /// Clusters of leaves only stay whole when leaves are excluded.
    fn kept_whole(&self, id: usize) -> bool {
        self.params.exclude_leaves
            && self
                .tree
                .get(id)
                .map(|node| node.level() == 1)
                .unwrap_or(false)
    }

    fn is_splittable(&self, id: usize) -> bool {
        !self.tree.is_leaf(id) && !self.kept_whole(id)
    }

    fn key_of(&self, id: usize, key: CutKey) -> f64 {
        match (self.tree.get(id), key) {
            (Some(node), CutKey::Value) => to_key(node.value()),
            (Some(node), CutKey::Level) => node.level() as f64,
            (None, _) => 0.0,
        }
    }

    fn branch_of(&self, id: usize) -> Option<f64> {
        let node = self.tree.get(id)?;
        let parent = self.tree.get(node.parent()?)?;
        Some(to_key(parent.value() - node.value()))
    }

    fn largest_value(&self, ids: &[usize]) -> T {
        ids.iter()
            .filter_map(|&id| self.tree.get(id))
            .map(|node| node.value())
            .fold(T::zero(), T::max)
    }

    fn finish(&self, source: usize, mut ids: Vec<usize>, cut_value: T) -> Partition<T> {
        self.tree.sort_by_size(&mut ids);
        let entries = ids
            .into_iter()
            .map(|id| PartitionEntry {
                id,
                is_cluster: !self.tree.is_leaf(id),
            })
            .collect();
        Partition {
            entries,
            cut_value,
            source: Some(source),
            colors: None,
            generation: self.tree.generation(),
        }
    }

    fn empty_partition(&self) -> Partition<T> {
        Partition {
            entries: Vec::new(),
            cut_value: T::zero(),
            source: None,
            colors: None,
            generation: self.tree.generation(),
        }
    }
}

pub(crate) fn to_key<T: Float>(value: T) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

pub(crate) fn clamp_percent(percent: f64) -> f64 {
    if !(0.0..=100.0).contains(&percent) {
        warn!(percent, "percentage outside 0..=100 was clamped");
    }
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

fn sort_and_dedup(values: &mut Vec<f64>) {
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
}
