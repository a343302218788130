//! Explorer core for pre-computed hierarchical agglomerative clusterings, such as voxel or fiber
//! tract clusterings of brain imaging data. Generic over floating point merge values.
//!
//! The crate holds a merge tree built bottom-up from an external loader and answers the
//! questions an interactive viewer asks of it:
//!  1. Which parts of the tree does a region of interest cover? (`SelectionQuery`)
//!  2. How does the tree split into a partition when cut by value, by level, by branch length or
//!     by an optimized score? (`PartitionEngine`)
//!  3. Which colors do nodes and partitions get, so that a cluster keeps its hue while the tree
//!     is re-partitioned? (`ColorTable`)
//!  4. Where is each node drawn in a dendrogram, and which node was clicked? (`Dendrogram`)
//!
//! The tree can also be edited by pruning and collapsing (`TreeProcessor`). Every edit starts a
//! new tree generation, and derived data computed for an older generation is rejected with
//! `HcTreeError::StaleGeneration`.
//!
//! # Examples
//! ```
//!use hctree::{Condition, HcTree, PartitionEngine, PartitionMode, PartitionParams};
//!
//!// Leaves 0..4, then clusters 4 = (0, 1), 5 = (2, 3) and the root 6 = (4, 5)
//!let tree: HcTree<f32> =
//!    HcTree::from_merges(4, &[(0, 1, 0.2), (2, 3, 0.3), (4, 5, 0.9)]).unwrap();
//!assert_eq!(4, tree.node(6).unwrap().size());
//!assert_eq!(2, tree.node(6).unwrap().level());
//!
//!let params = PartitionParams::builder().exclude_leaves(true).build();
//!let engine = PartitionEngine::with_params(&tree, params);
//!let partition = engine
//!    .partition(PartitionMode::HorizontalValue, Condition::Value(0.25))
//!    .unwrap();
//!assert_eq!(vec![4, 5], partition.ids());
//! ```

pub use crate::color::{
    hsv_to_rgb, nth_hue_color, Color, ColorOrder, ColorTable, HueCursor, SelectionColors,
};
pub use crate::dendrogram::{Dendrogram, Segment};
pub use crate::error::{HcTreeError, HcTreeResult};
pub use crate::loader::{Declaration, TreeLoader};
pub use crate::locator::LeafLocator;
pub use crate::node::{MergeEdge, Node};
pub use crate::params::{
    DendrogramParams, DendrogramParamsBuilder, LayoutMode, PartitionParams, PartitionParamsBuilder,
};
pub use crate::partition::{
    Condition, Partition, PartitionEngine, PartitionEntry, PartitionMode, ScoreMetric,
};
pub use crate::processing::{PruneCount, PruneCriterion, TreeProcessor};
pub use crate::selection::{empty_mask, LeafMask, SelectionQuery};
pub use crate::tree::{HcTree, StoredPartition};

mod color;
mod dendrogram;
mod error;
mod loader;
mod locator;
mod node;
mod params;
mod partition;
mod processing;
mod selection;
mod tree;
mod union_find;
mod validation;
