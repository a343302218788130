use crate::color::Color;
use crate::node::MergeEdge;
use crate::tree::HcTree;
use crate::union_find::UnionFind;
use crate::{HcTreeError, HcTreeResult};
use num_traits::Float;
use tracing::{debug, instrument, warn};

/// One record of the tree-build protocol. Records arrive as a run of leaves, then a run of
/// clusters (bottom-up), then optional partitions.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration<T> {
    Leaf,
    Cluster { children: Vec<usize>, value: T },
    Partition {
        ids: Vec<usize>,
        cut_value: T,
        colors: Option<Vec<Color>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Leaves,
    Clusters,
    Partitions,
}

impl<T> Declaration<T> {
    fn phase(&self) -> Phase {
        match self {
            Declaration::Leaf => Phase::Leaves,
            Declaration::Cluster { .. } => Phase::Clusters,
            Declaration::Partition { .. } => Phase::Partitions,
        }
    }
}

/// Consumes build declarations in protocol order. The first failure poisons the loader, since a
/// partially built tree cannot satisfy its invariants.
#[derive(Debug)]
pub struct TreeLoader<T> {
    tree: HcTree<T>,
    phase: Phase,
    failed: bool,
}

impl<T: Float> Default for TreeLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> TreeLoader<T> {
    pub fn new() -> Self {
        TreeLoader {
            tree: HcTree::new(),
            phase: Phase::Leaves,
            failed: false,
        }
    }

    /// Applies one declaration and returns the id (or partition index) it produced.
    pub fn declare(&mut self, declaration: Declaration<T>) -> HcTreeResult<usize> {
        if self.failed {
            return Err(HcTreeError::StructureError(String::from(
                "loader aborted after an earlier error",
            )));
        }
        let result = self.apply(declaration);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn apply(&mut self, declaration: Declaration<T>) -> HcTreeResult<usize> {
        let phase = declaration.phase();
        if phase < self.phase {
            return Err(HcTreeError::StructureError(format!(
                "{phase:?} declaration after {:?} declarations",
                self.phase
            )));
        }
        self.phase = phase;
        match declaration {
            Declaration::Leaf => self.tree.add_leaf(),
            Declaration::Cluster { children, value } => self.tree.add_cluster(&children, value),
            Declaration::Partition {
                ids,
                cut_value,
                colors,
            } => self.tree.add_partition(ids, cut_value, colors),
        }
    }

    /// Ends the load and hands over the tree.
    pub fn finish(self) -> HcTreeResult<HcTree<T>> {
        if self.failed {
            return Err(HcTreeError::StructureError(String::from(
                "loader aborted after an earlier error",
            )));
        }
        let roots = self.tree.roots().len();
        if roots > 1 {
            warn!(roots, "loaded tree is not fully merged");
        }
        debug!(
            leaves = self.tree.num_leaves(),
            clusters = self.tree.num_clusters(),
            partitions = self.tree.stored_partitions().len(),
            "tree loaded"
        );
        Ok(self.tree)
    }

    /// Runs a whole declaration stream through a fresh loader.
    pub fn load<I>(declarations: I) -> HcTreeResult<HcTree<T>>
    where
        I: IntoIterator<Item = Declaration<T>>,
    {
        let mut loader = Self::new();
        for declaration in declarations {
            loader.declare(declaration)?;
        }
        loader.finish()
    }
}

impl<T: Float> HcTree<T> {
    /// Builds a tree of `n_leaves` leaves from `(child1, child2, merge_value)` triples given
    /// bottom-up. The i-th merge creates cluster `n_leaves + i`.
    #[instrument(level = "debug", skip(merges))]
    pub fn from_merges(n_leaves: usize, merges: &[(usize, usize, T)]) -> HcTreeResult<Self> {
        let declarations = (0..n_leaves)
            .map(|_| Declaration::Leaf)
            .chain(merges.iter().map(|&(a, b, value)| Declaration::Cluster {
                children: vec![a, b],
                value,
            }));
        TreeLoader::load(declarations)
    }

    /// Builds the single-linkage tree of a spanning forest over `n_leaves` leaves. Edges are
    /// merged by increasing distance, and edges whose ends are already joined are skipped.
    #[instrument(level = "debug", skip(edges))]
    pub fn from_spanning_edges(n_leaves: usize, edges: &[MergeEdge<T>]) -> HcTreeResult<Self> {
        let mut sorted = edges.to_vec();
        sort_edges_by_distance(&mut sorted);

        let mut tree = HcTree::with_leaves(n_leaves);
        let mut union_find = UnionFind::new(n_leaves);
        let mut skipped = 0;
        for edge in &sorted {
            for leaf in [edge.left_leaf, edge.right_leaf] {
                if leaf >= n_leaves {
                    return Err(HcTreeError::OutOfBounds(leaf));
                }
            }
            let left_child = union_find.find(edge.left_leaf);
            let right_child = union_find.find(edge.right_leaf);
            if left_child == right_child {
                skipped += 1;
                continue;
            }
            let id = tree.add_cluster(&[left_child, right_child], edge.distance)?;
            let label = union_find.union(left_child, right_child);
            debug_assert_eq!(id, label);
            debug_assert_eq!(tree.size_of(id), union_find.size_of(label));
        }
        if skipped > 0 {
            debug!(skipped, "edges closing a cycle were skipped");
        }
        if !union_find.is_complete() {
            warn!(roots = tree.roots().len(), "spanning edges do not connect every leaf");
        }
        Ok(tree)
    }
}

fn sort_edges_by_distance<T: Float>(edges: &mut [MergeEdge<T>]) {
    edges.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
