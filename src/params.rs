use tracing::warn;

// Defaults for parameters
const EXCLUDE_LEAVES_DEFAULT: bool = false;
const SEARCH_DEPTH_DEFAULT: usize = 1;
const MIN_SIZE_DEFAULT: usize = 1;
const WIDTH_DEFAULT: f32 = 800.0;
const HEIGHT_DEFAULT: f32 = 400.0;
const OFFSET_DEFAULT: f32 = 0.0;
const TRIANGLE_LEAVES_DEFAULT: bool = false;
const LAYOUT_MODE_DEFAULT: LayoutMode = LayoutMode::ByLevel;

// Valid minimums/left bounds of parameters
const SEARCH_DEPTH_MINIMUM: usize = 1;
const MIN_SIZE_MINIMUM: usize = 1;
const EXTENT_MINIMUM: f32 = 1.0;

/// The vertical axis of a dendrogram: integer tree level or merge value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    ByLevel,
    ByValue,
}

/// Parameters shared by the partition searches. Use `PartitionParams::default()` unless a
/// setting needs tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionParams {
    pub(crate) source: Option<usize>,
    pub(crate) exclude_leaves: bool,
    pub(crate) search_depth: usize,
    pub(crate) min_size: usize,
}

/// Builder object to set custom partition parameters.
#[derive(Debug, Clone, Default)]
pub struct PartitionParamsBuilder {
    source: Option<usize>,
    exclude_leaves: Option<bool>,
    search_depth: Option<usize>,
    min_size: Option<usize>,
}

impl Default for PartitionParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PartitionParams {
    /// Enters the builder pattern.
    ///
    /// # Returns
    /// * the partition parameter builder
    pub fn builder() -> PartitionParamsBuilder {
        PartitionParamsBuilder::default()
    }

    pub fn source(&self) -> Option<usize> {
        self.source
    }

    pub fn exclude_leaves(&self) -> bool {
        self.exclude_leaves
    }

    pub fn search_depth(&self) -> usize {
        self.search_depth
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }
}

impl PartitionParamsBuilder {
    /// Sets the subtree to partition. Defaults to the root of the tree.
    pub fn source(mut self, source: usize) -> PartitionParamsBuilder {
        self.source = Some(source);
        self
    }

    /// Sets whether clusters whose children are all leaves are kept whole instead of being
    /// split into single leaves. Defaults to false.
    pub fn exclude_leaves(mut self, exclude_leaves: bool) -> PartitionParamsBuilder {
        self.exclude_leaves = Some(exclude_leaves);
        self
    }

    /// Sets how many levels below an entry the optimized search looks when refining it.
    /// Defaults to 1.
    ///
    /// # Parameters
    /// * search_depth - the refinement depth, at least 1
    ///
    /// # Returns
    /// * the partition parameter builder
    pub fn search_depth(mut self, search_depth: usize) -> PartitionParamsBuilder {
        let valid_search_depth =
            validate_input_left_bound(search_depth, SEARCH_DEPTH_MINIMUM, "search_depth");
        self.search_depth = Some(valid_search_depth);
        self
    }

    /// Sets the smallest node size the branch-length search may select. Defaults to 1.
    pub fn min_size(mut self, min_size: usize) -> PartitionParamsBuilder {
        let valid_min_size = validate_input_left_bound(min_size, MIN_SIZE_MINIMUM, "min_size");
        self.min_size = Some(valid_min_size);
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> PartitionParams {
        PartitionParams {
            source: self.source,
            exclude_leaves: self.exclude_leaves.unwrap_or(EXCLUDE_LEAVES_DEFAULT),
            search_depth: self.search_depth.unwrap_or(SEARCH_DEPTH_DEFAULT),
            min_size: self.min_size.unwrap_or(MIN_SIZE_DEFAULT),
        }
    }
}

/// Geometry and style of a dendrogram layout.
#[derive(Debug, Clone, PartialEq)]
pub struct DendrogramParams {
    pub(crate) source: Option<usize>,
    pub(crate) mode: LayoutMode,
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) x_offset: f32,
    pub(crate) y_offset: f32,
    pub(crate) triangle_leaves: bool,
    pub(crate) cut_line: Option<f64>,
}

/// Builder object to set custom dendrogram parameters.
#[derive(Debug, Clone, Default)]
pub struct DendrogramParamsBuilder {
    source: Option<usize>,
    mode: Option<LayoutMode>,
    width: Option<f32>,
    height: Option<f32>,
    x_offset: Option<f32>,
    y_offset: Option<f32>,
    triangle_leaves: Option<bool>,
    cut_line: Option<f64>,
}

impl Default for DendrogramParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DendrogramParams {
    pub fn builder() -> DendrogramParamsBuilder {
        DendrogramParamsBuilder::default()
    }

    pub fn source(&self) -> Option<usize> {
        self.source
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn offset(&self) -> (f32, f32) {
        (self.x_offset, self.y_offset)
    }

    pub fn triangle_leaves(&self) -> bool {
        self.triangle_leaves
    }

    pub fn cut_line(&self) -> Option<f64> {
        self.cut_line
    }
}

impl DendrogramParamsBuilder {
    /// Sets the subtree to draw. Defaults to the root of the tree.
    pub fn source(mut self, source: usize) -> DendrogramParamsBuilder {
        self.source = Some(source);
        self
    }

    /// Sets what the vertical axis shows. Defaults to `LayoutMode::ByLevel`.
    pub fn mode(mut self, mode: LayoutMode) -> DendrogramParamsBuilder {
        self.mode = Some(mode);
        self
    }

    /// Sets the drawing area in pixels. Both extents are at least 1. Defaults to 800 x 400.
    pub fn size(mut self, width: f32, height: f32) -> DendrogramParamsBuilder {
        self.width = Some(validate_extent(width, "width"));
        self.height = Some(validate_extent(height, "height"));
        self
    }

    /// Sets the pixel position of the lower left corner of the drawing area.
    pub fn offset(mut self, x_offset: f32, y_offset: f32) -> DendrogramParamsBuilder {
        self.x_offset = Some(x_offset);
        self.y_offset = Some(y_offset);
        self
    }

    /// Draws leaves as slanted lines into their parent's join point. Only used in
    /// `LayoutMode::ByValue`.
    pub fn triangle_leaves(mut self, triangle_leaves: bool) -> DendrogramParamsBuilder {
        self.triangle_leaves = Some(triangle_leaves);
        self
    }

    /// Marks a horizontal cut at `value` across the drawing. Only used in `LayoutMode::ByValue`.
    pub fn cut_line(mut self, value: f64) -> DendrogramParamsBuilder {
        self.cut_line = Some(value);
        self
    }

    pub fn build(self) -> DendrogramParams {
        DendrogramParams {
            source: self.source,
            mode: self.mode.unwrap_or(LAYOUT_MODE_DEFAULT),
            width: self.width.unwrap_or(WIDTH_DEFAULT),
            height: self.height.unwrap_or(HEIGHT_DEFAULT),
            x_offset: self.x_offset.unwrap_or(OFFSET_DEFAULT),
            y_offset: self.y_offset.unwrap_or(OFFSET_DEFAULT),
            triangle_leaves: self.triangle_leaves.unwrap_or(TRIANGLE_LEAVES_DEFAULT),
            cut_line: self.cut_line,
        }
    }
}

fn validate_input_left_bound(input_param: usize, left_bound: usize, param: &str) -> usize {
    if input_param < left_bound {
        warn!("{param} ({input_param}) cannot be lower than {left_bound}. Set to {left_bound}.");
        left_bound
    } else {
        input_param
    }
}

fn validate_extent(input_param: f32, param: &str) -> f32 {
    if input_param.is_nan() || input_param < EXTENT_MINIMUM {
        warn!(
            "{param} ({input_param}) cannot be lower than {EXTENT_MINIMUM}. \
            Set to {EXTENT_MINIMUM}."
        );
        EXTENT_MINIMUM
    } else {
        input_param
    }
}
