mod common;

use common::{chain_tree, eight_leaf_tree, example_tree};
use hctree::{
    nth_hue_color, Color, ColorOrder, ColorTable, Condition, HcTree, HcTreeError,
    PartitionEngine, PartitionMode, SelectionColors, TreeProcessor,
};
use rstest::rstest;

#[rstest]
fn largest_child_shares_color(
    #[values(ColorOrder::BySize, ColorOrder::ByHierarchy)] order: ColorOrder,
    #[values(example_tree(), eight_leaf_tree(), chain_tree())] tree: HcTree<f64>,
) {
    let colors = ColorTable::assign(&tree, order);
    for id in tree.cluster_ids() {
        let child = tree.largest_child(id).unwrap();
        assert_eq!(colors.color(id), colors.color(child), "cluster {id}");
    }
}

#[rstest]
#[case(ColorOrder::BySize)]
#[case(ColorOrder::ByHierarchy)]
fn separate_branches_get_separate_hues(#[case] order: ColorOrder) {
    let tree = eight_leaf_tree();
    let colors = ColorTable::assign(&tree, order);
    // 8 continues the root's hue through 10, 12 carries the hue of 13
    assert_eq!(colors.color(14), colors.color(8));
    assert_eq!(colors.color(13), colors.color(12));
    assert_ne!(colors.color(8), colors.color(12));
    assert_ne!(colors.color(10), colors.color(13));
}

#[test]
fn default_coloring_is_deterministic() {
    let tree = eight_leaf_tree();
    let first = ColorTable::assign(&tree, ColorOrder::BySize);
    let second = ColorTable::assign(&tree, ColorOrder::BySize);
    assert_eq!(first, second);
    assert_eq!(Some(nth_hue_color(0)), first.color(14));
}

#[test]
fn recolor_follows_largest_children() {
    let tree = eight_leaf_tree();
    let mut colors = ColorTable::assign(&tree, ColorOrder::BySize);
    let root_color = colors.color(14);
    colors.recolor_hierarchically(&tree, 12, Color::RED).unwrap();
    for id in [13, 12, 11, 4] {
        assert_eq!(Some(Color::RED), colors.color(id), "node {id}");
    }
    for id in [5, 6, 7] {
        assert_ne!(Some(Color::RED), colors.color(id), "node {id}");
    }
    // 13 is not the largest child of the root, so the root keeps its color
    assert_eq!(root_color, colors.color(14));
}

#[test]
fn color_branch_paints_subtree() {
    let tree = eight_leaf_tree();
    let mut colors = ColorTable::assign(&tree, ColorOrder::ByHierarchy);
    colors.color_branch(&tree, 10, Color::WHITE).unwrap();
    for id in [10, 8, 9, 0, 1, 2, 3] {
        assert_eq!(Some(Color::WHITE), colors.color(id));
    }
    assert_ne!(Some(Color::WHITE), colors.color(13));
    assert!(matches!(
        colors.color_branch(&tree, 30, Color::WHITE),
        Err(HcTreeError::OutOfBounds(30))
    ));
}

#[test]
fn stale_table_is_rejected() {
    let mut tree = example_tree();
    let mut colors = ColorTable::assign(&tree, ColorOrder::BySize);
    assert!(colors.is_current(&tree));
    TreeProcessor::new(&mut tree).prune_subtree(3).unwrap();
    assert!(matches!(
        colors.recolor_hierarchically(&tree, 4, Color::RED),
        Err(HcTreeError::StaleGeneration { .. })
    ));
}

#[test]
fn partition_colors_by_mode() {
    let tree = eight_leaf_tree();
    let colors = ColorTable::assign(&tree, ColorOrder::BySize);
    let partition = PartitionEngine::new(&tree)
        .partition(PartitionMode::HorizontalLevel, Condition::Count(2))
        .unwrap();

    let from_table = colors
        .partition_colors(&tree, &partition, SelectionColors::FromTable)
        .unwrap();
    assert_eq!(
        vec![colors.color(10).unwrap(), colors.color(13).unwrap()],
        from_table
    );
    let sequential = colors
        .partition_colors(&tree, &partition, SelectionColors::Sequential)
        .unwrap();
    assert_eq!(vec![nth_hue_color(0), nth_hue_color(1)], sequential);
}

#[test]
fn declared_black_colors_are_replaced() {
    let mut tree = eight_leaf_tree();
    tree.add_partition(vec![10, 13], 0.7, Some(vec![Color::RED, Color::BLACK]))
        .unwrap();
    let colors = ColorTable::uniform(&tree, Color::GREY);
    let partition = PartitionEngine::new(&tree).preloaded(0).unwrap();
    let resolved = colors
        .partition_colors(&tree, &partition, SelectionColors::FromTable)
        .unwrap();
    assert_eq!(vec![Color::RED, nth_hue_color(2)], resolved);
}

#[test]
fn stored_partitions_take_current_colors() {
    let mut tree = example_tree();
    tree.add_partition(vec![4, 5], 0.25, None).unwrap();
    let colors = ColorTable::uniform(&tree, Color::WHITE);
    tree.recolor_partitions(&colors).unwrap();
    assert_eq!(
        Some(vec![Color::WHITE, Color::WHITE]),
        tree.stored_partition(0).unwrap().colors
    );
}
