mod common;

use common::{chain_tree, eight_leaf_tree, example_tree};
use hctree::{
    Color, ColorOrder, ColorTable, Dendrogram, DendrogramParams, HcTree, HcTreeError, LayoutMode,
    TreeProcessor,
};
use rstest::rstest;

fn assert_close(expected: [f32; 2], actual: [f32; 2]) {
    assert!(
        (expected[0] - actual[0]).abs() < 1e-3 && (expected[1] - actual[1]).abs() < 1e-3,
        "expected {expected:?}, got {actual:?}"
    );
}

fn example_layout(tree: &HcTree<f64>) -> Dendrogram {
    let colors = ColorTable::assign(tree, ColorOrder::BySize);
    let params = DendrogramParams::builder()
        .size(400.0, 200.0)
        .offset(10.0, 20.0)
        .build();
    Dendrogram::layout(tree, &colors, &params).unwrap()
}

#[test]
fn layout_scales_and_positions() {
    let tree = example_tree();
    let dendrogram = example_layout(&tree);
    assert_eq!(Some(6), dendrogram.source());
    assert_eq!(100.0, dendrogram.x_unit());
    assert_eq!(100.0, dendrogram.y_unit());
    // Node 4 spans leaf slots 0..2, node 5 slots 2..4
    assert_close([210.0, 220.0], dendrogram.node_position(6).unwrap());
    assert_close([110.0, 120.0], dendrogram.node_position(4).unwrap());
    assert_close([310.0, 120.0], dendrogram.node_position(5).unwrap());
    assert_close([60.0, 20.0], dendrogram.node_position(0).unwrap());
}

#[test]
fn layout_segments() {
    let tree = example_tree();
    let dendrogram = example_layout(&tree);
    let segments = dendrogram.segments();
    // Two stubs and a bar per cluster plus the trunk
    assert_eq!(10, segments.len());

    let trunk = segments.last().unwrap();
    assert_close([210.0, 220.0], trunk.start);
    assert_close([210.0, 240.0], trunk.end);
    assert_eq!(Color::GREY, trunk.color);

    assert!(segments.iter().any(|segment| {
        (segment.start[0] - 110.0).abs() < 1e-3
            && (segment.start[1] - 220.0).abs() < 1e-3
            && (segment.end[0] - 310.0).abs() < 1e-3
    }));
    assert!(segments.iter().any(|segment| {
        (segment.start[0] - 110.0).abs() < 1e-3
            && (segment.start[1] - 120.0).abs() < 1e-3
            && (segment.end[1] - 220.0).abs() < 1e-3
    }));
}

#[test]
fn triangle_leaves_and_cut_line() {
    let tree = example_tree();
    let colors = ColorTable::assign(&tree, ColorOrder::BySize);
    let params = DendrogramParams::builder()
        .mode(LayoutMode::ByValue)
        .size(400.0, 180.0)
        .triangle_leaves(true)
        .cut_line(0.5)
        .build();
    let dendrogram = Dendrogram::layout(&tree, &colors, &params).unwrap();
    // Four slanted leaves, two stubs and a bar for 6, the trunk and the cut line
    assert_eq!(9, dendrogram.segments().len());

    let y_unit = 180.0 / 0.9;
    let cut = dendrogram.segments().last().unwrap();
    assert_eq!(Color::RED, cut.color);
    assert_close([0.0, 0.5 * y_unit], cut.start);
    assert_close([400.0, 0.5 * y_unit], cut.end);

    // Leaf 0 runs straight into the join point of 4
    let join = dendrogram.node_position(4).unwrap();
    assert!(dendrogram
        .segments()
        .iter()
        .any(|segment| (segment.start[0] - 50.0).abs() < 1e-3
            && (segment.end[0] - join[0]).abs() < 1e-3
            && (segment.end[1] - join[1]).abs() < 1e-3));
}

#[rstest]
fn hit_test_round_trip(
    #[values(LayoutMode::ByLevel, LayoutMode::ByValue)] mode: LayoutMode,
    #[values(example_tree(), eight_leaf_tree(), chain_tree())] tree: HcTree<f64>,
) {
    let colors = ColorTable::assign(&tree, ColorOrder::BySize);
    let params = DendrogramParams::builder()
        .mode(mode)
        .offset(15.0, 30.0)
        .build();
    let dendrogram = Dendrogram::layout(&tree, &colors, &params).unwrap();
    for id in tree.cluster_ids() {
        let [px, py] = dendrogram.node_position(id).unwrap();
        assert_eq!(Some(id), dendrogram.hit_test(&tree, px, py).unwrap(), "node {id}");
    }
}

#[test]
fn near_misses_and_empty_space() {
    let tree = example_tree();
    let dendrogram = example_layout(&tree);
    assert_eq!(Some(4), dendrogram.hit_test(&tree, 113.0, 117.0).unwrap());
    assert_eq!(None, dendrogram.hit_test(&tree, 160.0, 70.0).unwrap());
    // "No selection" is reported as the id above the source
    assert_eq!(7, dendrogram.clicked_node(&tree, 160.0, 70.0).unwrap());
    assert_eq!(6, dendrogram.clicked_node(&tree, 208.0, 222.0).unwrap());
}

#[rstest]
#[case(LayoutMode::ByLevel)]
#[case(LayoutMode::ByValue)]
fn leaves_are_never_selected(#[case] mode: LayoutMode) {
    let tree = example_tree();
    let colors = ColorTable::assign(&tree, ColorOrder::BySize);
    let params = DendrogramParams::builder().mode(mode).build();
    let dendrogram = Dendrogram::layout(&tree, &colors, &params).unwrap();
    for leaf in 0..4 {
        let [px, py] = dendrogram.node_position(leaf).unwrap();
        assert_eq!(None, dendrogram.hit_test(&tree, px, py).unwrap(), "leaf {leaf}");
        assert_eq!(7, dendrogram.clicked_node(&tree, px, py).unwrap());
    }
}

#[test]
fn drawing_area() {
    let tree = example_tree();
    let dendrogram = example_layout(&tree);
    assert!(dendrogram.contains_point(10.0, 20.0));
    assert!(dendrogram.contains_point(410.0, 220.0));
    assert!(!dendrogram.contains_point(9.0, 100.0));
    assert!(!dendrogram.contains_point(100.0, 221.0));
}

#[test]
fn sub_tree_layout() {
    let tree = eight_leaf_tree();
    let colors = ColorTable::assign(&tree, ColorOrder::BySize);
    let params = DendrogramParams::builder().source(13).size(400.0, 300.0).build();
    let dendrogram = Dendrogram::layout(&tree, &colors, &params).unwrap();
    assert_eq!(100.0, dendrogram.x_unit());
    assert_eq!(100.0, dendrogram.y_unit());
    assert_eq!(None, dendrogram.node_position(10));
    assert_eq!(14, dendrogram.clicked_node(&tree, 5.0, 299.0).unwrap());
}

#[test]
fn edits_invalidate_layout() {
    let mut tree = example_tree();
    let colors = ColorTable::assign(&tree, ColorOrder::BySize);
    let dendrogram = Dendrogram::layout(&tree, &colors, &DendrogramParams::default()).unwrap();
    TreeProcessor::new(&mut tree).prune_subtree(0).unwrap();
    assert!(!dendrogram.is_current(&tree));
    assert!(matches!(
        dendrogram.hit_test(&tree, 0.0, 0.0),
        Err(HcTreeError::StaleGeneration { .. })
    ));
    assert!(matches!(
        Dendrogram::layout(&tree, &colors, &DendrogramParams::default()),
        Err(HcTreeError::StaleGeneration { .. })
    ));
}

#[test]
fn empty_tree_layout() {
    let tree: HcTree<f64> = HcTree::new();
    let colors = ColorTable::assign(&tree, ColorOrder::BySize);
    let dendrogram = Dendrogram::layout(&tree, &colors, &DendrogramParams::default()).unwrap();
    assert!(dendrogram.segments().is_empty());
    assert_eq!(None, dendrogram.hit_test(&tree, 10.0, 10.0).unwrap());
}
