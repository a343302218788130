/// Disjoint sets over the leaves of a tree under construction. Every union creates a new label,
/// handed out sequentially from `n_leaves`, so labels coincide with the ids the tree assigns to
/// its clusters.
pub(crate) struct UnionFind {
    parent: Vec<Option<usize>>,
    next_label: usize,
    size: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(n_leaves: usize) -> Self {
        let length = (2 * n_leaves).saturating_sub(1);
        let parent = vec![None; length];
        let size = (0..length)
            .map(|n| if n < n_leaves { 1 } else { 0 })
            .collect();

        UnionFind {
            parent,
            next_label: n_leaves,
            size,
        }
    }

    /// Joins two set labels under a fresh label and returns it.
    pub(crate) fn union(&mut self, m: usize, n: usize) -> usize {
        let label = self.next_label;
        self.parent[m] = Some(label);
        self.parent[n] = Some(label);
        self.size[label] = self.size[m] + self.size[n];
        self.next_label += 1;
        label
    }

    pub(crate) fn find(&mut self, n: usize) -> usize {
        let mut root = n;
        while let Some(parent) = self.parent[root] {
            root = parent;
        }
        let mut current = n;
        while let Some(parent) = self.parent[current] {
            if parent != root {
                self.parent[current] = Some(root);
            }
            current = parent;
        }
        root
    }

    pub(crate) fn size_of(&self, n: usize) -> usize {
        self.size[n]
    }

    /// True once every leaf has been merged into a single set.
    pub(crate) fn is_complete(&self) -> bool {
        self.next_label == self.parent.len()
    }
}
