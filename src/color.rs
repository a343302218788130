use crate::partition::Partition;
use crate::selection::empty_mask;
use crate::tree::HcTree;
use crate::{HcTreeError, HcTreeResult};
use num_traits::Float;
use tracing::{debug, instrument};

const GOLDEN_RATIO_CONJUGATE: f64 = 0.618_033_988_749_895;
const PALETTE_SATURATION: f64 = 0.85;
const PALETTE_VALUE: f64 = 0.95;

/// An RGB display color with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);
    pub const GREY: Color = Color::new(0.5, 0.5, 0.5);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Color { r, g, b }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Color::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    pub fn to_rgb8(&self) -> [u8; 3] {
        [self.r, self.g, self.b].map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8)
    }

    pub fn is_black(&self) -> bool {
        *self == Color::BLACK
    }
}

/// Convert HSV (hue in degrees, saturation and value in 0..1) to a color.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Color {
    let h = h.rem_euclid(360.0);
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Color::new((r + m) as f32, (g + m) as f32, (b + m) as f32)
}

/// The n-th color of the default palette. Hues advance by the golden ratio, so consecutive
/// colors stay far apart on the color wheel.
pub fn nth_hue_color(n: usize) -> Color {
    let hue = (n as f64 * GOLDEN_RATIO_CONJUGATE).fract() * 360.0;
    hsv_to_rgb(hue, PALETTE_SATURATION, PALETTE_VALUE)
}

/// Running palette index handed through a coloring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HueCursor {
    next: usize,
}

impl HueCursor {
    pub fn starting_at(next: usize) -> Self {
        HueCursor { next }
    }

    /// Returns the next palette color and moves past it.
    pub fn advance(&mut self) -> Color {
        let color = nth_hue_color(self.next);
        self.next += 1;
        color
    }

    pub fn position(&self) -> usize {
        self.next
    }
}

/// Order in which the default coloring hands out hues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorOrder {
    /// Biggest nodes first.
    BySize,
    /// Highest ids first, i.e. from the top of the tree downwards.
    ByHierarchy,
}

/// How [`ColorTable::partition_colors`] colors partitions without declared colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionColors {
    /// Each entry keeps its color from the table.
    FromTable,
    /// Entries get consecutive palette colors, biggest first.
    Sequential,
}

/// One color per node id, valid for the tree generation it was built against.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    colors: Vec<Color>,
    generation: u64,
}

impl ColorTable {
    /// Default coloring. Each node not colored yet starts a new hue, which then flows down the
    /// chain of largest children, so a node always shares its color with its largest child.
    #[instrument(level = "debug", skip(tree))]
    pub fn assign<T: Float>(tree: &HcTree<T>, order: ColorOrder) -> Self {
        let mut ids: Vec<usize> = tree.live_ids().collect();
        match order {
            ColorOrder::BySize => tree.sort_by_size(&mut ids),
            ColorOrder::ByHierarchy => ids.sort_unstable_by(|a, b| b.cmp(a)),
        }

        let mut colors = vec![Color::BLACK; tree.id_bound()];
        let mut done = empty_mask(tree.id_bound());
        let mut cursor = HueCursor::default();
        for id in ids {
            if done[id] {
                continue;
            }
            let color = cursor.advance();
            let mut current = Some(id);
            while let Some(node) = current {
                colors[node] = color;
                done.set(node, true);
                current = tree.largest_child(node).filter(|&child| !done[child]);
            }
        }
        debug!(hues = cursor.position(), "default colors assigned");
        ColorTable {
            colors,
            generation: tree.generation(),
        }
    }

    /// Every node gets the same color.
    pub fn uniform<T: Float>(tree: &HcTree<T>, color: Color) -> Self {
        ColorTable {
            colors: vec![color; tree.id_bound()],
            generation: tree.generation(),
        }
    }

    /// Color of a node, `None` for ids the table does not cover.
    pub fn color(&self, id: usize) -> Option<Color> {
        self.colors.get(id).copied()
    }

    pub fn set_color(&mut self, id: usize, color: Color) -> HcTreeResult<()> {
        let slot = self.colors.get_mut(id).ok_or(HcTreeError::OutOfBounds(id))?;
        *slot = color;
        Ok(())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current<T: Float>(&self, tree: &HcTree<T>) -> bool {
        self.generation == tree.generation()
    }

    pub fn ensure_current<T: Float>(&self, tree: &HcTree<T>) -> HcTreeResult<()> {
        tree.ensure_generation(self.generation)
    }

    /// Paints `color` up the tree while the node is its parent's largest child, and down the
    /// chain of largest children.
    pub fn recolor_hierarchically<T: Float>(
        &mut self,
        tree: &HcTree<T>,
        id: usize,
        color: Color,
    ) -> HcTreeResult<()> {
        self.ensure_current(tree)?;
        tree.node(id)?;

        let mut current = id;
        while let Some(parent) = tree.node(current)?.parent() {
            if tree.largest_child(parent) != Some(current) {
                break;
            }
            self.set_color(parent, color)?;
            current = parent;
        }

        self.set_color(id, color)?;
        let mut current = id;
        while let Some(child) = tree.largest_child(current) {
            self.set_color(child, color)?;
            current = child;
        }
        Ok(())
    }

    /// Paints a whole subtree.
    pub fn color_branch<T: Float>(
        &mut self,
        tree: &HcTree<T>,
        id: usize,
        color: Color,
    ) -> HcTreeResult<()> {
        self.ensure_current(tree)?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = tree.node(current)?;
            self.set_color(current, color)?;
            stack.extend_from_slice(node.children());
        }
        Ok(())
    }

    /// One color per partition entry. Colors declared with a preloaded partition win, except
    /// black ones, which are replaced by palette colors following the declared ones.
    pub fn partition_colors<T: Float>(
        &self,
        tree: &HcTree<T>,
        partition: &Partition<T>,
        mode: SelectionColors,
    ) -> HcTreeResult<Vec<Color>> {
        self.ensure_current(tree)?;
        tree.ensure_generation(partition.generation())?;

        if let Some(declared) = partition.colors() {
            let mut cursor = HueCursor::starting_at(declared.len());
            return Ok(declared
                .iter()
                .map(|color| if color.is_black() { cursor.advance() } else { *color })
                .collect());
        }
        let colors = match mode {
            SelectionColors::FromTable => partition
                .entries()
                .iter()
                .map(|entry| self.color(entry.id).unwrap_or(Color::GREY))
                .collect(),
            SelectionColors::Sequential => (0..partition.len()).map(nth_hue_color).collect(),
        };
        Ok(colors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_primaries() {
        assert_eq!(Color::RED, hsv_to_rgb(0.0, 1.0, 1.0));
        assert_eq!(Color::new(0.0, 1.0, 0.0), hsv_to_rgb(120.0, 1.0, 1.0));
        assert_eq!(Color::new(0.0, 0.0, 1.0), hsv_to_rgb(240.0, 1.0, 1.0));
        assert_eq!(Color::WHITE, hsv_to_rgb(77.0, 0.0, 1.0));
    }

    #[test]
    fn palette_colors_are_distinct() {
        let colors: Vec<Color> = (0..64).map(nth_hue_color).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn cursor_walks_the_palette() {
        let mut cursor = HueCursor::starting_at(3);
        assert_eq!(nth_hue_color(3), cursor.advance());
        assert_eq!(nth_hue_color(4), cursor.advance());
        assert_eq!(5, cursor.position());
    }

    #[test]
    fn rgb8_round_trip() {
        let color = Color::from_rgb8(255, 128, 0);
        assert_eq!([255, 128, 0], color.to_rgb8());
    }
}
