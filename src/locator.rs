use crate::selection::{empty_mask, LeafMask};
use crate::tree::HcTree;
use crate::validation::CoordinateValidator;
use crate::{HcTreeError, HcTreeResult};
use kdtree::distance::squared_euclidean;
use kdtree::KdTree;
use num_traits::Float;
use tracing::debug;

/// Maps leaf ids to sample coordinates (e.g. voxel positions) and back.
pub struct LeafLocator<T: Float> {
    coordinates: Vec<Vec<T>>,
    index: Option<KdTree<T, usize, Vec<T>>>,
}

impl<T: Float> LeafLocator<T> {
    /// Indexes one coordinate vector per leaf id.
    ///
    /// # Errors
    /// * `InvalidCoordinates` if the vectors differ in dimension or hold non-finite values.
    pub fn new(coordinates: Vec<Vec<T>>) -> HcTreeResult<Self> {
        CoordinateValidator::new(&coordinates).validate()?;
        let index = match coordinates.first() {
            Some(first) => {
                let mut index = KdTree::new(first.len());
                for (leaf, point) in coordinates.iter().enumerate() {
                    index
                        .add(point.clone(), leaf)
                        .map_err(|err| HcTreeError::InvalidCoordinates(format!("{err:?}")))?;
                }
                Some(index)
            }
            None => None,
        };
        Ok(LeafLocator { coordinates, index })
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.coordinates.first().map(|point| point.len()).unwrap_or(0)
    }

    pub fn coordinates(&self, leaf: usize) -> HcTreeResult<&[T]> {
        self.coordinates
            .get(leaf)
            .map(|point| point.as_slice())
            .ok_or(HcTreeError::OutOfBounds(leaf))
    }

    /// The leaf closest to `point`, `None` when no leaves are indexed.
    pub fn nearest_leaf(&self, point: &[T]) -> HcTreeResult<Option<usize>> {
        Ok(self.nearest(point)?.map(|(_, leaf)| leaf))
    }

    /// The leaf sitting exactly at `point`.
    pub fn leaf_at(&self, point: &[T]) -> HcTreeResult<Option<usize>> {
        Ok(self
            .nearest(point)?
            .filter(|(dist, _)| *dist == T::zero())
            .map(|(_, leaf)| leaf))
    }

    /// Coordinates of every leaf under a node, in leaf id order.
    pub fn coordinates_for_node(&self, tree: &HcTree<T>, id: usize) -> HcTreeResult<Vec<&[T]>> {
        tree.leaf_set(id)?
            .iter()
            .map(|&leaf| self.coordinates(leaf))
            .collect()
    }

    /// Turns sample positions into a region-of-interest mask over the leaves of `tree`. Points
    /// that match no leaf are skipped.
    pub fn roi_from_points(&self, tree: &HcTree<T>, points: &[Vec<T>]) -> HcTreeResult<LeafMask> {
        let mut mask = empty_mask(tree.leaf_slots());
        let mut unmatched = 0;
        for point in points {
            match self.leaf_at(point)? {
                Some(leaf) if leaf < mask.len() => mask.set(leaf, true),
                _ => unmatched += 1,
            }
        }
        if unmatched > 0 {
            debug!(unmatched, "points without a leaf were left out of the mask");
        }
        Ok(mask)
    }

    fn nearest(&self, point: &[T]) -> HcTreeResult<Option<(T, usize)>> {
        let index = match &self.index {
            Some(index) => index,
            None => return Ok(None),
        };
        CoordinateValidator::new(&self.coordinates).validate_point(point)?;
        let found = index
            .nearest(point, 1, &squared_euclidean)
            .map_err(|err| HcTreeError::InvalidCoordinates(format!("{err:?}")))?;
        Ok(found.first().map(|(dist, leaf)| (*dist, **leaf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> LeafLocator<f64> {
        LeafLocator::new(vec![
            vec![0.0, 0.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![5.0, 5.0, 5.0],
        ])
        .unwrap()
    }

    #[test]
    fn nearest_and_exact_lookup() {
        let locator = grid();
        assert_eq!(Some(3), locator.nearest_leaf(&[4.0, 4.5, 5.0]).unwrap());
        assert_eq!(Some(1), locator.leaf_at(&[1.0, 0.0, 0.0]).unwrap());
        assert_eq!(None, locator.leaf_at(&[0.9, 0.0, 0.0]).unwrap());
    }

    #[test]
    fn wrong_query_dimension() {
        let locator = grid();
        assert!(matches!(
            locator.nearest_leaf(&[1.0, 0.0]),
            Err(HcTreeError::InvalidCoordinates(_))
        ));
    }

    #[test]
    fn empty_locator_finds_nothing() {
        let locator: LeafLocator<f64> = LeafLocator::new(Vec::new()).unwrap();
        assert!(locator.is_empty());
        assert_eq!(None, locator.nearest_leaf(&[0.0]).unwrap());
    }

    #[test]
    fn single_precision_coordinates() {
        let locator: LeafLocator<f32> =
            LeafLocator::new(vec![vec![0.0, 0.0], vec![2.0, 2.0], vec![-3.0, 1.0]]).unwrap();
        assert_eq!(3, locator.len());
        assert_eq!(Some(2), locator.nearest_leaf(&[-2.5f32, 0.5]).unwrap());
        assert_eq!(Some(1), locator.leaf_at(&[2.0f32, 2.0]).unwrap());
    }
}
