use crate::tree::HcTree;
use crate::{HcTreeError, HcTreeResult};
use bitvec::prelude::*;
use num_traits::Float;
use std::collections::VecDeque;
use tracing::{debug, instrument, warn};

/// A boolean flag per leaf id, indexed over `[0, leaf_slots)`.
pub type LeafMask = BitVec<u64, Lsb0>;

/// Creates an all-false mask for `len` leaf slots.
pub fn empty_mask(len: usize) -> LeafMask {
    bitvec![u64, Lsb0; 0; len]
}

/// Evaluates a region-of-interest mask against the leaf sets of a tree.
#[derive(Debug, Clone)]
pub struct SelectionQuery<'t, T> {
    tree: &'t HcTree<T>,
    roi: LeafMask,
}

impl<'t, T: Float> SelectionQuery<'t, T> {
    /// Starts with an empty region of interest.
    pub fn new(tree: &'t HcTree<T>) -> Self {
        SelectionQuery {
            tree,
            roi: empty_mask(tree.leaf_slots()),
        }
    }

    pub fn with_region_of_interest(tree: &'t HcTree<T>, roi: LeafMask) -> Self {
        let mut query = Self::new(tree);
        query.set_region_of_interest(roi);
        query
    }

    /// Replaces the active mask. Bits past the leaf slots of the tree are ignored and missing
    /// bits count as inactive.
    pub fn set_region_of_interest(&mut self, mut roi: LeafMask) {
        if roi.len() != self.tree.leaf_slots() {
            warn!(
                mask = roi.len(),
                leaves = self.tree.leaf_slots(),
                "region of interest resized to the leaf count"
            );
            roi.resize(self.tree.leaf_slots(), false);
        }
        self.roi = roi;
    }

    pub fn region_of_interest(&self) -> &LeafMask {
        &self.roi
    }

    /// Number of live leaves inside the region of interest.
    pub fn active_leaves(&self) -> usize {
        self.roi
            .iter_ones()
            .filter(|&leaf| self.tree.contains(leaf))
            .count()
    }

    /// Fraction of the leaves under `id` that are inside the region of interest.
    ///
    /// # Errors
    /// * `OutOfBounds` for unknown ids.
    /// * `EmptyNode` for a node without leaves.
    pub fn ratio(&self, id: usize) -> HcTreeResult<f64> {
        let node = self.tree.node(id)?;
        if node.size() == 0 {
            return Err(HcTreeError::EmptyNode(id));
        }
        let active = node
            .leaves()
            .iter()
            .filter(|&&leaf| self.is_active(leaf))
            .count();
        Ok(active as f64 / node.size() as f64)
    }

    /// A mask set for every leaf under `id`.
    pub fn mask(&self, id: usize) -> HcTreeResult<LeafMask> {
        let mut mask = empty_mask(self.tree.leaf_slots());
        self.mark_leaves(id, &mut mask)?;
        Ok(mask)
    }

    /// The union of the masks of `ids`.
    pub fn mask_union(&self, ids: &[usize]) -> HcTreeResult<LeafMask> {
        let mut mask = empty_mask(self.tree.leaf_slots());
        for &id in ids {
            self.mark_leaves(id, &mut mask)?;
        }
        Ok(mask)
    }

    /// [`SelectionQuery::find_best_fit_from`] starting at the root. An empty tree yields no
    /// candidates.
    pub fn find_best_fit(
        &self,
        ratio_threshold: f64,
        max_count: usize,
    ) -> HcTreeResult<Vec<usize>> {
        match self.tree.root() {
            Some(root) => self.find_best_fit_from(root, ratio_threshold, max_count),
            None => Ok(Vec::new()),
        }
    }

    /// Searches breadth first for the biggest nodes whose ratio reaches `ratio_threshold`.
    ///
    /// A node failing the threshold is only subdivided when it has grandchildren, and only into
    /// its cluster children. Candidates are returned biggest first, at most `max_count` of them
    /// (at least one).
    #[instrument(level = "debug", skip(self))]
    pub fn find_best_fit_from(
        &self,
        source: usize,
        ratio_threshold: f64,
        max_count: usize,
    ) -> HcTreeResult<Vec<usize>> {
        self.tree.node(source)?;
        let mut candidates = Vec::new();
        let mut queue = VecDeque::from([source]);
        while let Some(id) = queue.pop_front() {
            if self.ratio(id)? >= ratio_threshold {
                candidates.push(id);
                continue;
            }
            let node = self.tree.node(id)?;
            if node.level() > 1 {
                queue.extend(
                    node.children()
                        .iter()
                        .copied()
                        .filter(|&child| !self.tree.is_leaf(child)),
                );
            }
        }
        self.tree.sort_by_size(&mut candidates);
        candidates.truncate(max_count.max(1));
        debug!(found = candidates.len(), "best fit search finished");
        Ok(candidates)
    }

    fn is_active(&self, leaf: usize) -> bool {
        self.roi.get(leaf).map(|bit| *bit).unwrap_or(false)
    }

    fn mark_leaves(&self, id: usize, mask: &mut LeafMask) -> HcTreeResult<()> {
        for &leaf in self.tree.leaf_set(id)? {
            mask.set(leaf, true);
        }
        Ok(())
    }
}
