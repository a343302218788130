#![allow(dead_code)]

use hctree::HcTree;
use std::collections::HashSet;

/// Leaves 0..4, `4 = (0, 1) @ 0.2`, `5 = (2, 3) @ 0.3`, root `6 = (4, 5) @ 0.9`.
pub fn example_tree() -> HcTree<f64> {
    HcTree::from_merges(4, &[(0, 1, 0.2), (2, 3, 0.3), (4, 5, 0.9)]).unwrap()
}

/// Leaves 0..8 merged into two branches of four leaves each:
///
/// ```text
///              14 @ 1.0
///        /                \
///    10 @ 0.4            13 @ 0.6
///    /      \            /      \
/// 8 @ 0.1  9 @ 0.15   12 @ 0.5   7
///  0  1     2  3      /    \
///                 11 @ 0.2  6
///                   4  5
/// ```
pub fn eight_leaf_tree() -> HcTree<f64> {
    HcTree::from_merges(
        8,
        &[
            (0, 1, 0.1),
            (2, 3, 0.15),
            (8, 9, 0.4),
            (4, 5, 0.2),
            (11, 6, 0.5),
            (12, 7, 0.6),
            (10, 13, 1.0),
        ],
    )
    .unwrap()
}

/// Leaves 0..5 joined one at a time: `5 = (0, 1)`, `6 = (5, 2)`, `7 = (6, 3)`, `8 = (7, 4)`.
pub fn chain_tree() -> HcTree<f64> {
    HcTree::from_merges(5, &[(0, 1, 0.1), (5, 2, 0.2), (6, 3, 0.3), (7, 4, 0.4)]).unwrap()
}

/// Asserts that the leaf sets of `ids` are disjoint and together cover the leaves of `source`.
pub fn assert_partition_complete(tree: &HcTree<f64>, source: usize, ids: &[usize]) {
    let mut covered = HashSet::new();
    for &id in ids {
        for &leaf in tree.leaf_set(id).unwrap() {
            assert!(covered.insert(leaf), "leaf {leaf} is covered twice");
        }
    }
    let expected: HashSet<usize> = tree.leaf_set(source).unwrap().iter().copied().collect();
    assert_eq!(expected, covered);
}

/// Asserts the size, level and value relations between every cluster and its children.
pub fn assert_tree_invariants(tree: &HcTree<f64>) {
    tree.check_invariants().unwrap();
    for node in tree.nodes() {
        if node.is_leaf() {
            assert_eq!(1, node.size());
            assert_eq!(0, node.level());
            continue;
        }
        let children: Vec<_> = node
            .children()
            .iter()
            .map(|&child| tree.node(child).unwrap())
            .collect();
        assert_eq!(
            node.size(),
            children.iter().map(|child| child.size()).sum::<usize>()
        );
        for child in children {
            assert!(child.value() <= node.value());
            assert!(child.level() < node.level());
        }
    }
}
