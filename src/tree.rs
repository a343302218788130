use crate::color::{Color, ColorTable};
use crate::node::Node;
use crate::validation::TreeValidator;
use crate::{HcTreeError, HcTreeResult};
use num_traits::Float;
use tracing::{debug, warn};

/// A partition kept as tree metadata, e.g. one declared by the loader or saved from an earlier
/// selection. Consumed unmodified by `PartitionMode::Preloaded`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPartition<T> {
    pub ids: Vec<usize>,
    pub cut_value: T,
    pub colors: Option<Vec<Color>>,
}

/// Arena of cluster-tree nodes addressed by dense integer ids. Generic over floating point merge
/// values.
///
/// Leaves occupy ids `[0, leaf_slots)` and are added first; clusters follow in strictly increasing
/// construction order, so every child id is lower than its parent's. Removed nodes leave an empty
/// slot behind and their ids are never handed out again.
#[derive(Debug, Clone, PartialEq)]
pub struct HcTree<T> {
    nodes: Vec<Option<Node<T>>>,
    leaf_slots: usize,
    leaves_locked: bool,
    generation: u64,
    partitions: Vec<StoredPartition<T>>,
}

impl<T: Float> Default for HcTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> HcTree<T> {
    /// Creates an empty tree. A tree with zero leaves is valid, and all queries on it return empty
    /// results.
    pub fn new() -> Self {
        HcTree {
            nodes: Vec::new(),
            leaf_slots: 0,
            leaves_locked: false,
            generation: 0,
            partitions: Vec::new(),
        }
    }

    /// Creates a tree holding `n_leaves` unmerged leaves.
    pub fn with_leaves(n_leaves: usize) -> Self {
        let mut tree = Self::new();
        tree.nodes = (0..n_leaves).map(|id| Some(Node::leaf(id))).collect();
        tree.leaf_slots = n_leaves;
        tree.generation = n_leaves as u64;
        tree
    }

    /// Appends a new leaf and returns its id.
    ///
    /// # Errors
    /// * `StructureError` once the first cluster exists, as leaves are locked from then on.
    pub fn add_leaf(&mut self) -> HcTreeResult<usize> {
        if self.leaves_locked {
            return Err(HcTreeError::StructureError(format!(
                "cannot add a leaf after clusters were built (leaf count locked at {})",
                self.leaf_slots
            )));
        }
        let id = self.nodes.len();
        self.nodes.push(Some(Node::leaf(id)));
        self.leaf_slots += 1;
        self.generation += 1;
        Ok(id)
    }

    /// Merges existing parentless nodes into a new cluster formed at `value`.
    /// See [`HcTree::add_cluster_with_data`].
    pub fn add_cluster(&mut self, children: &[usize], value: T) -> HcTreeResult<usize> {
        self.add_cluster_with_data(children, value, T::zero())
    }

    /// Merges existing parentless nodes into a new cluster formed at `value`, carrying an
    /// arbitrary `custom_data` payload.
    ///
    /// # Parameters
    /// * `children` - two or more ids of nodes that exist and have no parent yet.
    /// * `value` - the merge dissimilarity. Must not be lower than any child's value.
    /// * `custom_data` - display metadata, not used by any algorithm.
    ///
    /// # Returns
    /// * The id of the new cluster, one above the previously highest id.
    ///
    /// # Errors
    /// * `StructureError` if fewer than two children are given.
    /// * `InvalidReference` if a child is unknown, listed twice or already has a parent.
    /// * `OrderViolation` if `value` is negative, NaN or below the largest child value.
    pub fn add_cluster_with_data(
        &mut self,
        children: &[usize],
        value: T,
        custom_data: T,
    ) -> HcTreeResult<usize> {
        if children.len() < 2 {
            return Err(HcTreeError::StructureError(format!(
                "a cluster needs at least two children, got {}",
                children.len()
            )));
        }
        if value.is_nan() || value < T::zero() {
            return Err(HcTreeError::OrderViolation(format!(
                "merge value {} is not a non-negative number",
                display_value(value)
            )));
        }

        let mut max_child_value = T::zero();
        let mut level = 0;
        let mut leaves = Vec::new();
        for (i, &child_id) in children.iter().enumerate() {
            if children[..i].contains(&child_id) {
                return Err(HcTreeError::InvalidReference(format!(
                    "child {child_id} is listed twice"
                )));
            }
            let child = self.get(child_id).ok_or_else(|| {
                HcTreeError::InvalidReference(format!("child {child_id} does not exist"))
            })?;
            if let Some(parent) = child.parent {
                return Err(HcTreeError::InvalidReference(format!(
                    "child {child_id} already belongs to cluster {parent}"
                )));
            }
            max_child_value = max_child_value.max(child.value);
            level = level.max(child.level + 1);
            leaves.extend_from_slice(&child.leaves);
        }
        if value < max_child_value {
            return Err(HcTreeError::OrderViolation(format!(
                "cluster value {} is below child value {}",
                display_value(value),
                display_value(max_child_value)
            )));
        }
        leaves.sort_unstable();

        let id = self.nodes.len();
        for &child_id in children {
            if let Some(child) = self.node_mut(child_id) {
                child.parent = Some(id);
            }
        }
        self.nodes.push(Some(Node {
            id,
            parent: None,
            children: children.to_vec(),
            level,
            value,
            custom_data,
            leaves,
        }));
        self.leaves_locked = true;
        self.generation += 1;
        Ok(id)
    }

    /// Looks up a node.
    ///
    /// # Errors
    /// * `OutOfBounds` if the id was never assigned or its node has been removed.
    pub fn node(&self, id: usize) -> HcTreeResult<&Node<T>> {
        self.get(id).ok_or(HcTreeError::OutOfBounds(id))
    }

    /// Non-failing variant of [`HcTree::node`].
    pub fn get(&self, id: usize) -> Option<&Node<T>> {
        self.nodes.get(id).and_then(|slot| slot.as_ref())
    }

    pub(crate) fn node_mut(&mut self, id: usize) -> Option<&mut Node<T>> {
        self.nodes.get_mut(id).and_then(|slot| slot.as_mut())
    }

    pub fn contains(&self, id: usize) -> bool {
        self.get(id).is_some()
    }

    /// Sorted ids of the leaves under `id`.
    pub fn leaf_set(&self, id: usize) -> HcTreeResult<&[usize]> {
        self.node(id).map(|node| node.leaves())
    }

    /// Size of a node, 0 for unknown ids.
    pub fn size_of(&self, id: usize) -> usize {
        self.get(id).map(|node| node.size()).unwrap_or(0)
    }

    pub fn is_leaf(&self, id: usize) -> bool {
        self.get(id).map(|node| node.is_leaf()).unwrap_or(false)
    }

    /// The single root of a fully merged tree. Parents always carry higher ids than their
    /// children, so this is the highest live id.
    ///
    /// `None` for an empty tree and for a forest of several parentless nodes (e.g. leaves not
    /// merged yet, or spanning edges that left components apart). Use [`HcTree::roots`] there,
    /// or pick a source explicitly.
    pub fn root(&self) -> Option<usize> {
        let top = self.nodes.iter().rposition(|slot| slot.is_some())?;
        if self.size_of(top) == self.num_leaves() {
            Some(top)
        } else {
            None
        }
    }

    /// All parentless nodes, in increasing id order.
    pub fn roots(&self) -> Vec<usize> {
        self.nodes().filter(|node| node.is_root()).map(|node| node.id).collect()
    }

    /// True when exactly one node has no parent.
    pub fn is_fully_merged(&self) -> bool {
        self.root().is_some()
    }

    /// Number of live leaves.
    pub fn num_leaves(&self) -> usize {
        self.nodes[..self.leaf_slots]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// Number of live clusters.
    pub fn num_clusters(&self) -> usize {
        self.nodes[self.leaf_slots..]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// Number of live nodes, leaves included.
    pub fn num_nodes(&self) -> usize {
        self.num_leaves() + self.num_clusters()
    }

    /// Number of leaf ids ever assigned. Region-of-interest masks are indexed over this range.
    pub fn leaf_slots(&self) -> usize {
        self.leaf_slots
    }

    /// One above the highest id ever assigned.
    pub fn id_bound(&self) -> usize {
        self.nodes.len()
    }

    /// Level of the root, 0 for an empty or unmerged tree.
    pub fn max_level(&self) -> usize {
        self.root()
            .and_then(|root| self.get(root))
            .map(|node| node.level)
            .unwrap_or(0)
    }

    /// Version stamp bumped by every structural edit. Derived data records the generation it
    /// was computed against.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node<T>> + '_ {
        self.nodes.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn live_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes().map(|node| node.id)
    }

    pub fn cluster_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes().filter(|node| node.is_cluster()).map(|node| node.id)
    }

    /// Orders ids by decreasing size, ties broken by ascending id. This is the biggest-first,
    /// left-to-right order used for partitions, coloring and the dendrogram.
    pub fn sort_by_size(&self, ids: &mut [usize]) {
        ids.sort_by(|a, b| {
            self.size_of(*b)
                .cmp(&self.size_of(*a))
                .then_with(|| a.cmp(b))
        });
    }

    /// The children of `id` in [`HcTree::sort_by_size`] order.
    pub fn sorted_children(&self, id: usize) -> HcTreeResult<Vec<usize>> {
        let mut children = self.node(id)?.children.clone();
        self.sort_by_size(&mut children);
        Ok(children)
    }

    /// The biggest child of `id` (ties go to the lowest id), `None` for leaves and unknown ids.
    pub fn largest_child(&self, id: usize) -> Option<usize> {
        self.get(id)?.children.iter().copied().min_by(|a, b| {
            self.size_of(*b)
                .cmp(&self.size_of(*a))
                .then_with(|| a.cmp(b))
        })
    }

    /// Verifies every structural invariant of the tree.
    pub fn check_invariants(&self) -> HcTreeResult<()> {
        TreeValidator::new(self).validate()
    }

    pub(crate) fn ensure_generation(&self, computed: u64) -> HcTreeResult<()> {
        if computed == self.generation {
            Ok(())
        } else {
            Err(HcTreeError::StaleGeneration {
                computed,
                current: self.generation,
            })
        }
    }

    /// Stores a partition as tree metadata and returns its index.
    ///
    /// # Errors
    /// * `StructureError` if `ids` is empty or `colors` does not hold one color per id.
    /// * `OutOfBounds` if an id is not a live node.
    pub fn add_partition(
        &mut self,
        ids: Vec<usize>,
        cut_value: T,
        colors: Option<Vec<Color>>,
    ) -> HcTreeResult<usize> {
        if ids.is_empty() {
            return Err(HcTreeError::StructureError(String::from(
                "cannot store an empty partition",
            )));
        }
        if let Some(unknown) = ids.iter().find(|id| !self.contains(**id)) {
            return Err(HcTreeError::OutOfBounds(*unknown));
        }
        if let Some(colors) = &colors {
            if colors.len() != ids.len() {
                return Err(HcTreeError::StructureError(format!(
                    "partition has {} ids but {} colors",
                    ids.len(),
                    colors.len()
                )));
            }
        }
        self.partitions.push(StoredPartition {
            ids,
            cut_value,
            colors,
        });
        debug!(stored = self.partitions.len(), "partition added to tree");
        Ok(self.partitions.len() - 1)
    }

    pub fn stored_partition(&self, index: usize) -> HcTreeResult<&StoredPartition<T>> {
        self.partitions
            .get(index)
            .ok_or(HcTreeError::MissingPartition(index))
    }

    pub fn stored_partitions(&self) -> &[StoredPartition<T>] {
        &self.partitions
    }

    pub fn clear_partitions(&mut self) {
        self.partitions.clear();
    }

    /// Replaces the colors of every stored partition with the current colors of its ids.
    pub fn recolor_partitions(&mut self, colors: &ColorTable) -> HcTreeResult<()> {
        colors.ensure_current(self)?;
        if self.partitions.iter().any(|part| part.colors.is_some()) {
            warn!("stored partitions already had colors, they will be replaced");
        }
        for partition in self.partitions.iter_mut() {
            partition.colors = Some(
                partition
                    .ids
                    .iter()
                    .map(|id| colors.color(*id).unwrap_or(Color::GREY))
                    .collect(),
            );
        }
        Ok(())
    }

    pub(crate) fn remove_slot(&mut self, id: usize) -> Option<Node<T>> {
        self.nodes.get_mut(id).and_then(Option::take)
    }

    pub(crate) fn detach_child(&mut self, parent_id: usize, child_id: usize) {
        if let Some(parent) = self.node_mut(parent_id) {
            parent.children.retain(|&child| child != child_id);
        }
    }

    /// Removes a cluster and hands its children to its parent, at the position the cluster held
    /// in the parent's child list. Without a parent the children become parentless.
    pub(crate) fn splice_out(&mut self, id: usize) {
        let node = match self.remove_slot(id) {
            Some(node) => node,
            None => return,
        };
        if let Some(parent_id) = node.parent {
            if let Some(parent) = self.node_mut(parent_id) {
                match parent.children.iter().position(|&child| child == id) {
                    Some(pos) => {
                        parent
                            .children
                            .splice(pos..pos + 1, node.children.iter().copied());
                    }
                    None => parent.children.extend(node.children.iter().copied()),
                }
            }
        }
        for &child_id in &node.children {
            if let Some(child) = self.node_mut(child_id) {
                child.parent = node.parent;
            }
        }
    }

    /// Re-establishes the structural invariants after an edit and starts a new generation.
    /// Returns the number of clusters removed because they were left with fewer than two
    /// children.
    pub(crate) fn commit_edit(&mut self) -> usize {
        let removed = self.remove_degenerate_clusters();
        self.refresh_derived();

        let nodes = &self.nodes;
        let before = self.partitions.len();
        self.partitions.retain(|part| {
            part.ids
                .iter()
                .all(|&id| matches!(nodes.get(id), Some(Some(_))))
        });
        let dropped = before - self.partitions.len();
        if dropped > 0 {
            warn!(dropped, "stored partitions referenced removed nodes and were dropped");
        }

        self.generation += 1;
        removed
    }

    fn remove_degenerate_clusters(&mut self) -> usize {
        let mut removed = 0;
        // Children carry lower ids, so one bottom-up sweep settles every cluster
        for id in self.leaf_slots..self.nodes.len() {
            let (n_children, parent) = match self.get(id) {
                Some(node) => (node.children.len(), node.parent),
                None => continue,
            };
            match n_children {
                0 => {
                    self.remove_slot(id);
                    if let Some(parent_id) = parent {
                        self.detach_child(parent_id, id);
                    }
                    removed += 1;
                }
                1 => {
                    self.splice_out(id);
                    removed += 1;
                }
                _ => {}
            }
        }
        removed
    }

    fn refresh_derived(&mut self) {
        for id in self.leaf_slots..self.nodes.len() {
            let children = match self.get(id) {
                Some(node) => node.children.clone(),
                None => continue,
            };
            let mut leaves = Vec::new();
            let mut level = 0;
            for child_id in children {
                if let Some(child) = self.get(child_id) {
                    leaves.extend_from_slice(&child.leaves);
                    level = level.max(child.level + 1);
                }
            }
            leaves.sort_unstable();
            if let Some(node) = self.node_mut(id) {
                node.leaves = leaves;
                node.level = level;
            }
        }
    }
}

pub(crate) fn display_value<T: Float>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
