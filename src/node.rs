use num_traits::Float;

/// A node of the cluster tree: either a leaf (one voxel or fiber sample) or a cluster formed by
/// merging two or more nodes at a given dissimilarity.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    pub(crate) id: usize,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) level: usize,
    pub(crate) value: T,
    pub(crate) custom_data: T,
    pub(crate) leaves: Vec<usize>,
}

impl<T: Float> Node<T> {
    pub(crate) fn leaf(id: usize) -> Self {
        Node {
            id,
            parent: None,
            children: Vec::new(),
            level: 0,
            value: T::zero(),
            custom_data: T::zero(),
            leaves: vec![id],
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of leaves under this node. Leaves have size 1.
    pub fn size(&self) -> usize {
        self.leaves.len()
    }

    /// 0 for a leaf, otherwise one more than the deepest child.
    pub fn level(&self) -> usize {
        self.level
    }

    /// The dissimilarity at which the node was formed, 0 for leaves.
    pub fn value(&self) -> T {
        self.value
    }

    pub fn custom_data(&self) -> T {
        self.custom_data
    }

    /// Child ids in insertion order. Empty for leaves.
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_cluster(&self) -> bool {
        !self.is_leaf()
    }

    /// True for a node without parent. In a fully merged tree this is the single root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Sorted ids of the leaves reachable under this node.
    pub fn leaves(&self) -> &[usize] {
        &self.leaves
    }
}

/// An edge between two leaves of a spanning tree, merged in increasing distance order when a
/// tree is built by single linkage.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeEdge<T> {
    pub left_leaf: usize,
    pub right_leaf: usize,
    pub distance: T,
}

impl<T> MergeEdge<T> {
    pub fn new(left_leaf: usize, right_leaf: usize, distance: T) -> Self {
        MergeEdge {
            left_leaf,
            right_leaf,
            distance,
        }
    }
}
