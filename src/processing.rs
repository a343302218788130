use crate::tree::{display_value, HcTree};
use crate::{HcTreeError, HcTreeResult};
use num_traits::Float;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use tracing::{debug, instrument, warn};

/// What a structural transform removed: `leaves` counts removed leaves, `nodes` counts removed
/// clusters, including those dropped while re-normalizing the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PruneCount {
    pub leaves: usize,
    pub nodes: usize,
}

impl PruneCount {
    pub fn total(&self) -> usize {
        self.leaves + self.nodes
    }
}

/// Rules for [`TreeProcessor::prune_by`]. Each is evaluated against the parent of a candidate
/// node, where the "rest" of the parent is `size(parent) - size(node)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PruneCriterion<T> {
    /// Prune when the rest of the parent is at least `ratio` times the node size.
    SizeRatio(f64),
    /// Prune when the rest of the parent holds at least this many leaves.
    JoinSize(usize),
    /// Prune when the node joins the tree above this value.
    JoinLevel(T),
}

/// Whole-tree structural edits. Every transform removes nodes permanently, re-normalizes the tree
/// so that all invariants hold again and starts a new tree generation.
pub struct TreeProcessor<'t, T> {
    tree: &'t mut HcTree<T>,
}

impl<'t, T: Float> TreeProcessor<'t, T> {
    pub fn new(tree: &'t mut HcTree<T>) -> Self {
        TreeProcessor { tree }
    }

    /// Removes a node together with everything below it. Pruning the root empties the tree.
    #[instrument(level = "debug", skip(self))]
    pub fn prune_subtree(&mut self, id: usize) -> HcTreeResult<PruneCount> {
        self.tree.node(id)?;
        let mut count = self.remove_subtree(id);
        count.nodes += self.tree.commit_edit();
        debug!(leaves = count.leaves, nodes = count.nodes, "subtree pruned");
        Ok(count)
    }

    /// Removes several subtrees in one edit. Ids nested below another selected id are covered by
    /// their ancestor.
    #[instrument(level = "debug", skip(self))]
    pub fn prune_selection(&mut self, ids: &[usize]) -> HcTreeResult<PruneCount> {
        self.ensure_all_exist(ids)?;
        let mut count = PruneCount::default();
        for &id in ids {
            if self.tree.contains(id) {
                let removed = self.remove_subtree(id);
                count.leaves += removed.leaves;
                count.nodes += removed.nodes;
            }
        }
        count.nodes += self.tree.commit_edit();
        debug!(leaves = count.leaves, nodes = count.nodes, "selection pruned");
        Ok(count)
    }

    /// Replaces a cluster by its children in the child list of its parent.
    ///
    /// # Errors
    /// * `OutOfBounds` for unknown ids.
    /// * `StructureError` for leaves and for the root, which have nothing to splice into.
    #[instrument(level = "debug", skip(self))]
    pub fn collapse_node(&mut self, id: usize) -> HcTreeResult<PruneCount> {
        let node = self.tree.node(id)?;
        if node.is_leaf() {
            return Err(HcTreeError::StructureError(format!(
                "leaf {id} cannot be collapsed"
            )));
        }
        if node.is_root() {
            return Err(HcTreeError::StructureError(format!(
                "root {id} has no parent to collapse into"
            )));
        }
        self.tree.splice_out(id);
        let nodes = 1 + self.tree.commit_edit();
        Ok(PruneCount { leaves: 0, nodes })
    }

    /// Removes the internal structure below each selected cluster, so that its leaves become its
    /// direct children. With `keep_bases`, clusters of level 1 survive and become direct
    /// children together with the loose leaves.
    #[instrument(level = "debug", skip(self))]
    pub fn flatten_selection(
        &mut self,
        ids: &[usize],
        keep_bases: bool,
    ) -> HcTreeResult<PruneCount> {
        self.ensure_all_exist(ids)?;
        let mut count = PruneCount::default();
        for &id in ids {
            if !self.tree.contains(id) {
                continue;
            }
            let mut inner = self.inner_clusters(id);
            inner.retain(|&inner_id| !(keep_bases && self.level_of(inner_id) == 1));
            // Top-down, so each splice hands its children to a live parent
            inner.sort_unstable_by(|a, b| b.cmp(a));
            for inner_id in inner {
                self.tree.splice_out(inner_id);
                count.nodes += 1;
            }
        }
        count.nodes += self.tree.commit_edit();
        debug!(nodes = count.nodes, "selection flattened");
        Ok(count)
    }

    /// Prunes the topmost nodes of at most `safe_size` leaves that satisfy `criterion`. The root
    /// is never pruned.
    #[instrument(level = "debug", skip(self, criterion))]
    pub fn prune_by(
        &mut self,
        criterion: PruneCriterion<T>,
        safe_size: usize,
    ) -> HcTreeResult<PruneCount> {
        let mut selected = Vec::new();
        let mut queue: VecDeque<usize> = self.tree.roots().into_iter().collect();
        while let Some(id) = queue.pop_front() {
            let node = self.tree.node(id)?;
            if let Some(parent_id) = node.parent() {
                let parent = self.tree.node(parent_id)?;
                if node.size() <= safe_size
                    && qualifies(criterion, node.size(), parent.size(), parent.value())
                {
                    selected.push(id);
                    continue;
                }
            }
            queue.extend(node.children().iter().copied());
        }

        let mut count = PruneCount::default();
        for id in selected {
            let removed = self.remove_subtree(id);
            count.leaves += removed.leaves;
            count.nodes += removed.nodes;
        }
        count.nodes += self.tree.commit_edit();
        debug!(leaves = count.leaves, nodes = count.nodes, "pruned by criterion");
        Ok(count)
    }

    /// Removes `count` leaves drawn at random, as a quick way of thinning out a large tree.
    /// The same seed on the same tree always removes the same leaves. Asking for more leaves than
    /// the tree holds removes all of them.
    #[instrument(level = "debug", skip(self))]
    pub fn prune_random(&mut self, count: usize, seed: u64) -> HcTreeResult<PruneCount> {
        let leaves: Vec<usize> = self
            .tree
            .nodes()
            .filter(|node| node.is_leaf())
            .map(|node| node.id)
            .collect();
        let amount = if count > leaves.len() {
            warn!(requested = count, available = leaves.len(), "pruning every leaf");
            leaves.len()
        } else {
            count
        };

        let mut rng = SmallRng::seed_from_u64(seed);
        let mut pruned = PruneCount::default();
        for index in rand::seq::index::sample(&mut rng, leaves.len(), amount) {
            let removed = self.remove_subtree(leaves[index]);
            pruned.leaves += removed.leaves;
            pruned.nodes += removed.nodes;
        }
        pruned.nodes += self.tree.commit_edit();
        debug!(leaves = pruned.leaves, nodes = pruned.nodes, "random leaves pruned");
        Ok(pruned)
    }

    /// Collapses every non-root cluster whose branch `value(parent) - value(node)` is shorter than
    /// `coefficient * value(parent)`, working from the top down so that a collapsed cluster's
    /// children are measured against their new parent.
    #[instrument(level = "debug", skip(self, coefficient))]
    pub fn collapse_linear(
        &mut self,
        coefficient: T,
        keep_bases: bool,
    ) -> HcTreeResult<PruneCount> {
        let mut clusters: Vec<usize> = self.tree.cluster_ids().collect();
        clusters.sort_unstable_by(|a, b| b.cmp(a));

        let mut count = PruneCount::default();
        for id in clusters {
            let node = match self.tree.get(id) {
                Some(node) => node,
                None => continue,
            };
            if keep_bases && node.level() == 1 {
                continue;
            }
            let parent_value = match node.parent().and_then(|p| self.tree.get(p)) {
                Some(parent) => parent.value(),
                None => continue,
            };
            if parent_value - node.value() < coefficient * parent_value {
                self.tree.splice_out(id);
                count.nodes += 1;
            }
        }
        count.nodes += self.tree.commit_edit();
        debug!(
            nodes = count.nodes,
            coefficient = display_value(coefficient),
            "linear branches collapsed"
        );
        Ok(count)
    }

    fn ensure_all_exist(&self, ids: &[usize]) -> HcTreeResult<()> {
        match ids.iter().find(|id| !self.tree.contains(**id)) {
            Some(unknown) => Err(HcTreeError::OutOfBounds(*unknown)),
            None => Ok(()),
        }
    }

    fn level_of(&self, id: usize) -> usize {
        self.tree.get(id).map(|node| node.level()).unwrap_or(0)
    }

    /// Clusters strictly below `id`.
    fn inner_clusters(&self, id: usize) -> Vec<usize> {
        let mut inner = Vec::new();
        let mut stack: Vec<usize> = self
            .tree
            .get(id)
            .map(|node| node.children().to_vec())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            if let Some(node) = self.tree.get(current) {
                if node.is_cluster() {
                    inner.push(current);
                    stack.extend_from_slice(node.children());
                }
            }
        }
        inner
    }

    fn remove_subtree(&mut self, id: usize) -> PruneCount {
        if let Some(parent_id) = self.tree.get(id).and_then(|node| node.parent()) {
            self.tree.detach_child(parent_id, id);
        }
        let mut count = PruneCount::default();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.tree.remove_slot(current) {
                if node.is_leaf() {
                    count.leaves += 1;
                } else {
                    count.nodes += 1;
                }
                stack.extend(node.children);
            }
        }
        count
    }
}

fn qualifies<T: Float>(
    criterion: PruneCriterion<T>,
    size: usize,
    parent_size: usize,
    parent_value: T,
) -> bool {
    let rest = parent_size.saturating_sub(size);
    match criterion {
        PruneCriterion::SizeRatio(ratio) => rest as f64 >= ratio * size as f64,
        PruneCriterion::JoinSize(min_rest) => rest >= min_rest,
        PruneCriterion::JoinLevel(value) => parent_value > value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_ratio_compares_against_parent_rest() {
        assert!(qualifies(PruneCriterion::SizeRatio(3.0), 2, 8, 1.0));
        assert!(!qualifies(PruneCriterion::SizeRatio(4.0), 2, 8, 1.0));
    }

    #[test]
    fn join_level_uses_parent_value() {
        assert!(qualifies(PruneCriterion::JoinLevel(0.5), 1, 4, 0.9));
        assert!(!qualifies(PruneCriterion::JoinLevel(0.9), 1, 4, 0.9));
    }
}
