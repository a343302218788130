mod common;

use common::{assert_tree_invariants, eight_leaf_tree, example_tree};
use hctree::{HcTreeError, PruneCount, PruneCriterion, TreeProcessor};

#[test]
fn prune_subtree_splices_single_child_parent() {
    let mut tree = example_tree();
    let before = tree.generation();
    let count = TreeProcessor::new(&mut tree).prune_subtree(5).unwrap();
    // Cluster 5 and its leaves go, the root is left with one child and is spliced out
    assert_eq!(PruneCount { leaves: 2, nodes: 2 }, count);
    assert!(tree.generation() > before);
    assert!(!tree.contains(5));
    assert!(!tree.contains(6));
    assert_eq!(Some(4), tree.root());
    assert!(tree.node(4).unwrap().is_root());
    assert_eq!(2, tree.num_leaves());
    assert_tree_invariants(&tree);
}

#[test]
fn removed_ids_are_never_reused() {
    let mut tree = example_tree();
    TreeProcessor::new(&mut tree).prune_subtree(5).unwrap();
    assert!(matches!(tree.node(5), Err(HcTreeError::OutOfBounds(5))));
    assert_eq!(7, tree.id_bound());
}

#[test]
fn prune_selection_covers_nested_ids() {
    let mut tree = eight_leaf_tree();
    let count = TreeProcessor::new(&mut tree)
        .prune_selection(&[10, 8])
        .unwrap();
    assert_eq!(PruneCount { leaves: 4, nodes: 4 }, count);
    assert_eq!(Some(13), tree.root());
    assert_tree_invariants(&tree);
}

#[test]
fn prune_selection_rejects_unknown_ids() {
    let mut tree = eight_leaf_tree();
    let result = TreeProcessor::new(&mut tree).prune_selection(&[10, 99]);
    assert_eq!(Err(HcTreeError::OutOfBounds(99)), result);
    // Nothing was removed
    assert!(tree.contains(10));
}

#[test]
fn collapse_node_hands_children_to_parent() {
    let mut tree = eight_leaf_tree();
    let count = TreeProcessor::new(&mut tree).collapse_node(10).unwrap();
    assert_eq!(PruneCount { leaves: 0, nodes: 1 }, count);
    assert_eq!(&[8, 9, 13], tree.node(14).unwrap().children());
    assert_eq!(4, tree.node(14).unwrap().level());
    assert_eq!(8, tree.node(14).unwrap().size());
    assert_tree_invariants(&tree);
}

#[test]
fn collapse_rejects_root_and_leaves() {
    let mut tree = eight_leaf_tree();
    let mut processor = TreeProcessor::new(&mut tree);
    assert!(matches!(
        processor.collapse_node(14),
        Err(HcTreeError::StructureError(_))
    ));
    assert!(matches!(
        processor.collapse_node(3),
        Err(HcTreeError::StructureError(_))
    ));
    assert!(matches!(
        processor.collapse_node(20),
        Err(HcTreeError::OutOfBounds(20))
    ));
}

#[test]
fn flatten_selection_leaves_only_leaves() {
    let mut tree = eight_leaf_tree();
    let count = TreeProcessor::new(&mut tree)
        .flatten_selection(&[13], false)
        .unwrap();
    assert_eq!(2, count.nodes);
    assert_eq!(&[4, 5, 6, 7], tree.node(13).unwrap().children());
    assert_eq!(1, tree.node(13).unwrap().level());
    assert_tree_invariants(&tree);
}

#[test]
fn flatten_selection_can_keep_bases() {
    let mut tree = eight_leaf_tree();
    TreeProcessor::new(&mut tree)
        .flatten_selection(&[13], true)
        .unwrap();
    assert_eq!(&[11, 6, 7], tree.node(13).unwrap().children());
    assert_eq!(2, tree.node(13).unwrap().level());
    assert_tree_invariants(&tree);
}

#[test]
fn prune_by_join_size_removes_outliers() {
    let mut tree = eight_leaf_tree();
    let count = TreeProcessor::new(&mut tree)
        .prune_by(PruneCriterion::JoinSize(3), 1)
        .unwrap();
    // Leaf 7 joins a cluster of three; 13 is left with one child
    assert_eq!(PruneCount { leaves: 1, nodes: 1 }, count);
    assert!(!tree.contains(7));
    assert_eq!(&[10, 12], tree.node(14).unwrap().children());
    assert_eq!(7, tree.num_leaves());
    assert_tree_invariants(&tree);
}

#[test]
fn prune_by_join_level() {
    let mut tree = eight_leaf_tree();
    let count = TreeProcessor::new(&mut tree)
        .prune_by(PruneCriterion::JoinLevel(0.55), 1)
        .unwrap();
    // Only leaf 7 joins above 0.55
    assert_eq!(1, count.leaves);
    assert!(!tree.contains(7));
    assert_tree_invariants(&tree);
}

#[test]
fn collapse_linear_removes_short_branches() {
    let mut tree = eight_leaf_tree();
    let count = TreeProcessor::new(&mut tree)
        .collapse_linear(0.2, false)
        .unwrap();
    // 12 joins 13 only 0.1 below it
    assert_eq!(PruneCount { leaves: 0, nodes: 1 }, count);
    assert_eq!(&[11, 6, 7], tree.node(13).unwrap().children());
    assert_tree_invariants(&tree);
}

#[test]
fn edits_drop_stale_stored_partitions() {
    let mut tree = example_tree();
    tree.add_partition(vec![4, 5], 0.25, None).unwrap();
    tree.add_partition(vec![6], 0.9, None).unwrap();
    tree.add_partition(vec![2, 3], 0.0, None).unwrap();
    TreeProcessor::new(&mut tree).prune_subtree(4).unwrap();
    // 4 was pruned and 6 spliced out, only the partition of survivors is kept
    assert_eq!(1, tree.stored_partitions().len());
    assert_eq!(vec![2, 3], tree.stored_partitions()[0].ids);
}

#[test]
fn prune_random_is_reproducible() {
    let mut first = eight_leaf_tree();
    let mut second = eight_leaf_tree();
    let count = TreeProcessor::new(&mut first).prune_random(3, 42).unwrap();
    TreeProcessor::new(&mut second).prune_random(3, 42).unwrap();

    assert_eq!(3, count.leaves);
    assert_eq!(5, first.num_leaves());
    assert_eq!(
        first.live_ids().collect::<Vec<_>>(),
        second.live_ids().collect::<Vec<_>>()
    );
    assert!(first.root().is_some());
    assert_tree_invariants(&first);
}

#[test]
fn prune_random_bounds() {
    let mut tree = eight_leaf_tree();
    let before = tree.generation();
    let count = TreeProcessor::new(&mut tree).prune_random(0, 7).unwrap();
    assert_eq!(PruneCount::default(), count);
    assert_eq!(8, tree.num_leaves());
    assert!(tree.generation() > before);

    // More leaves than the tree holds empties it
    let count = TreeProcessor::new(&mut tree).prune_random(20, 7).unwrap();
    assert_eq!(PruneCount { leaves: 8, nodes: 7 }, count);
    assert_eq!(0, tree.num_leaves());
    assert_eq!(None, tree.root());
}
