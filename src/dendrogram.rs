use crate::color::{Color, ColorTable};
use crate::params::{DendrogramParams, LayoutMode};
use crate::tree::HcTree;
use crate::HcTreeResult;
use num_traits::Float;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Pixel radius within which a click selects a node.
const HIT_TOLERANCE_PX: f32 = 5.0;
/// Length of the stem drawn above the source node.
const TRUNK_PX: f32 = 20.0;

/// A line of the dendrogram in pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: [f32; 2],
    pub end: [f32; 2],
    pub color: Color,
}

/// Where a node sits in tree space: x in leaf slots, y in levels or merge values.
#[derive(Debug, Clone, PartialEq)]
struct Placement {
    left: f32,
    right: f32,
    center: f32,
    height: f32,
    children: Vec<usize>,
}

/// A laid out dendrogram of one subtree, with the geometry kept for hit testing.
#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    source: Option<usize>,
    mode: LayoutMode,
    x_unit: f32,
    y_unit: f32,
    x_offset: f32,
    y_offset: f32,
    width: f32,
    height: f32,
    placements: HashMap<usize, Placement>,
    segments: Vec<Segment>,
    generation: u64,
}

impl Dendrogram {
    /// Lays out the subtree below `params.source` (the root by default).
    ///
    /// Children are placed biggest first from the left, each spanning as many leaf slots as it
    /// has leaves. A node is centered between its first and last child, at the height of its
    /// level or value.
    ///
    /// # Errors
    /// * `StaleGeneration` if `colors` was computed for another tree generation.
    /// * `OutOfBounds` if the configured source is not a live node.
    #[instrument(level = "debug", skip_all)]
    pub fn layout<T: Float>(
        tree: &HcTree<T>,
        colors: &ColorTable,
        params: &DendrogramParams,
    ) -> HcTreeResult<Self> {
        colors.ensure_current(tree)?;
        let mut dendrogram = Dendrogram {
            source: None,
            mode: params.mode,
            x_unit: 1.0,
            y_unit: 1.0,
            x_offset: params.x_offset,
            y_offset: params.y_offset,
            width: params.width,
            height: params.height,
            placements: HashMap::new(),
            segments: Vec::new(),
            generation: tree.generation(),
        };
        let source = match params.source {
            Some(source) => source,
            None => match tree.root() {
                Some(root) => root,
                None => return Ok(dendrogram),
            },
        };
        let source_node = tree.node(source)?;
        let max_height = height_of(source_node.level(), source_node.value(), params.mode);
        dendrogram.source = Some(source);
        dendrogram.x_unit = params.width / source_node.size() as f32;
        dendrogram.y_unit = if max_height > 0.0 {
            params.height / max_height
        } else {
            params.height
        };

        let order = dendrogram.place(tree, source)?;
        dendrogram.draw(tree, colors, &order, params);
        debug!(
            nodes = order.len(),
            segments = dendrogram.segments.len(),
            "dendrogram laid out"
        );
        Ok(dendrogram)
    }

    /// Assigns spans top-down and centers bottom-up. Returns the placed ids in ascending order.
    fn place<T: Float>(&mut self, tree: &HcTree<T>, source: usize) -> HcTreeResult<Vec<usize>> {
        let mut order = Vec::new();
        let mut stack = vec![(source, 0.0_f32)];
        while let Some((id, left)) = stack.pop() {
            let node = tree.node(id)?;
            let children = tree.sorted_children(id)?;
            let mut child_left = left;
            for &child in &children {
                stack.push((child, child_left));
                child_left += tree.size_of(child) as f32;
            }
            self.placements.insert(
                id,
                Placement {
                    left,
                    right: left + node.size() as f32,
                    center: left + 0.5,
                    height: height_of(node.level(), node.value(), self.mode),
                    children,
                },
            );
            order.push(id);
        }

        // Children carry lower ids than their parents
        order.sort_unstable();
        for &id in &order {
            let center = match self.placements.get(&id) {
                Some(placement) => match (placement.children.first(), placement.children.last()) {
                    (Some(first), Some(last)) => {
                        (self.center_of(*first) + self.center_of(*last)) * 0.5
                    }
                    _ => continue,
                },
                None => continue,
            };
            if let Some(placement) = self.placements.get_mut(&id) {
                placement.center = center;
            }
        }
        Ok(order)
    }

    fn draw<T: Float>(
        &mut self,
        tree: &HcTree<T>,
        colors: &ColorTable,
        order: &[usize],
        params: &DendrogramParams,
    ) {
        let triangles = params.triangle_leaves && params.mode == LayoutMode::ByValue;
        let mut lines = Vec::new();
        for &id in order {
            let placement = match self.placements.get(&id) {
                Some(placement) => placement,
                None => continue,
            };
            let color = colors.color(id).unwrap_or(Color::GREY);
            if placement.children.is_empty() {
                continue;
            }

            let mut low = f32::INFINITY;
            let mut high = f32::NEG_INFINITY;
            for child in &placement.children {
                let kid = match self.placements.get(child) {
                    Some(kid) => kid,
                    None => continue,
                };
                let kid_color = colors.color(*child).unwrap_or(Color::GREY);
                if triangles && tree.is_leaf(*child) {
                    lines.push((
                        [kid.center, kid.height],
                        [placement.center, placement.height],
                        kid_color,
                    ));
                    continue;
                }
                lines.push((
                    [kid.center, kid.height],
                    [kid.center, placement.height],
                    kid_color,
                ));
                low = low.min(kid.center);
                high = high.max(kid.center);
            }
            if triangles {
                low = low.min(placement.center);
                high = high.max(placement.center);
            }
            if low < high {
                lines.push(([low, placement.height], [high, placement.height], color));
            }
        }

        if let Some(top) = self.source.and_then(|source| self.placements.get(&source)) {
            let trunk = top.height + TRUNK_PX / self.y_unit;
            lines.push(([top.center, top.height], [top.center, trunk], Color::GREY));
        }
        self.segments = lines
            .into_iter()
            .map(|(start, end, color)| Segment {
                start: self.to_pixels(start),
                end: self.to_pixels(end),
                color,
            })
            .collect();

        if let (LayoutMode::ByValue, Some(cut)) = (params.mode, params.cut_line) {
            let y = cut as f32 * self.y_unit + self.y_offset;
            self.segments.push(Segment {
                start: [self.x_offset, y],
                end: [self.x_offset + self.width, y],
                color: Color::RED,
            });
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn source(&self) -> Option<usize> {
        self.source
    }

    /// Pixels per leaf slot.
    pub fn x_unit(&self) -> f32 {
        self.x_unit
    }

    /// Pixels per level or per unit of merge value.
    pub fn y_unit(&self) -> f32 {
        self.y_unit
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current<T: Float>(&self, tree: &HcTree<T>) -> bool {
        self.generation == tree.generation()
    }

    /// Pixel position of a node's join point, `None` for nodes outside the drawn subtree.
    pub fn node_position(&self, id: usize) -> Option<[f32; 2]> {
        self.placements
            .get(&id)
            .map(|placement| self.to_pixels([placement.center, placement.height]))
    }

    /// True if the pixel lies inside the drawing area.
    pub fn contains_point(&self, px: f32, py: f32) -> bool {
        px >= self.x_offset
            && px <= self.x_offset + self.width
            && py >= self.y_offset
            && py <= self.y_offset + self.height
    }

    /// Finds the node drawn at a pixel.
    ///
    /// Starting at the source, a node matches when its join point is within 5 pixels on both
    /// axes. Otherwise the search continues into the child whose span contains the pixel. Leaves
    /// are never selected: a pixel that falls into a leaf's span without matching its parent
    /// selects nothing.
    ///
    /// # Errors
    /// * `StaleGeneration` if the tree was edited after the layout.
    pub fn hit_test<T: Float>(
        &self,
        tree: &HcTree<T>,
        px: f32,
        py: f32,
    ) -> HcTreeResult<Option<usize>> {
        tree.ensure_generation(self.generation)?;
        let source = match self.source {
            Some(source) => source,
            None => return Ok(None),
        };
        let tx = (px - self.x_offset) / self.x_unit;
        let ty = (py - self.y_offset) / self.y_unit;
        let tolerance_x = HIT_TOLERANCE_PX / self.x_unit;
        let tolerance_y = HIT_TOLERANCE_PX / self.y_unit;

        let mut current = source;
        loop {
            let placement = match self.placements.get(&current) {
                Some(placement) => placement,
                None => return Ok(None),
            };
            if (placement.center - tx).abs() <= tolerance_x
                && (placement.height - ty).abs() <= tolerance_y
            {
                return Ok(Some(current));
            }
            let next = placement.children.iter().copied().find(|child| {
                self.placements
                    .get(child)
                    .map(|kid| kid.left <= tx && tx < kid.right)
                    .unwrap_or(false)
            });
            match next {
                Some(child) if !tree.is_leaf(child) => current = child,
                _ => return Ok(None),
            }
        }
    }

    /// [`Dendrogram::hit_test`] with "no selection" reported as the id one above the source,
    /// which never names a node of the drawn subtree.
    pub fn clicked_node<T: Float>(
        &self,
        tree: &HcTree<T>,
        px: f32,
        py: f32,
    ) -> HcTreeResult<usize> {
        let sentinel = self.source.map(|source| source + 1).unwrap_or(0);
        Ok(self.hit_test(tree, px, py)?.unwrap_or(sentinel))
    }

    fn center_of(&self, id: usize) -> f32 {
        self.placements
            .get(&id)
            .map(|placement| placement.center)
            .unwrap_or(0.0)
    }

    fn to_pixels(&self, point: [f32; 2]) -> [f32; 2] {
        [
            point[0] * self.x_unit + self.x_offset,
            point[1] * self.y_unit + self.y_offset,
        ]
    }
}

fn height_of<T: Float>(level: usize, value: T, mode: LayoutMode) -> f32 {
    match mode {
        LayoutMode::ByLevel => level as f32,
        LayoutMode::ByValue => value.to_f32().unwrap_or(0.0),
    }
}
