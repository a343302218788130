use crate::tree::{display_value, HcTree};
use crate::{HcTreeError, HcTreeResult};
use num_traits::Float;

/// Checks every structural invariant of a cluster tree and reports the first violation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TreeValidator<'a, T> {
    tree: &'a HcTree<T>,
}

impl<'a, T: Float> TreeValidator<'a, T> {
    pub(crate) fn new(tree: &'a HcTree<T>) -> Self {
        Self { tree }
    }

    pub(crate) fn validate(&self) -> HcTreeResult<()> {
        for node in self.tree.nodes() {
            let id = node.id();
            if let Some(parent_id) = node.parent() {
                let parent = self.tree.get(parent_id).ok_or_else(|| {
                    HcTreeError::InvalidReference(format!(
                        "node {id} points to removed parent {parent_id}"
                    ))
                })?;
                if !parent.children().contains(&id) {
                    return Err(HcTreeError::StructureError(format!(
                        "node {id} is not listed as a child of its parent {parent_id}"
                    )));
                }
            }
            if id < self.tree.leaf_slots() {
                self.validate_leaf(id)?;
            } else {
                self.validate_cluster(id)?;
            }
        }
        Ok(())
    }

    fn validate_leaf(&self, id: usize) -> HcTreeResult<()> {
        let node = self.tree.node(id)?;
        if node.is_cluster() || node.level() != 0 || node.leaves() != [id] {
            return Err(HcTreeError::StructureError(format!(
                "leaf {id} must have no children, level 0 and itself as only leaf"
            )));
        }
        Ok(())
    }

    fn validate_cluster(&self, id: usize) -> HcTreeResult<()> {
        let node = self.tree.node(id)?;
        if node.children().len() < 2 {
            return Err(HcTreeError::StructureError(format!(
                "cluster {id} has {} children",
                node.children().len()
            )));
        }
        if node.size() == 0 {
            return Err(HcTreeError::EmptyNode(id));
        }

        let mut level = 0;
        let mut leaves = Vec::with_capacity(node.size());
        for &child_id in node.children() {
            if child_id >= id {
                return Err(HcTreeError::StructureError(format!(
                    "child {child_id} was created after its parent {id}"
                )));
            }
            let child = self.tree.get(child_id).ok_or_else(|| {
                HcTreeError::InvalidReference(format!(
                    "cluster {id} lists removed child {child_id}"
                ))
            })?;
            if child.parent() != Some(id) {
                return Err(HcTreeError::StructureError(format!(
                    "child {child_id} of cluster {id} points to another parent"
                )));
            }
            if child.value() > node.value() {
                return Err(HcTreeError::OrderViolation(format!(
                    "cluster {id} at {} has child {child_id} at {}",
                    display_value(node.value()),
                    display_value(child.value())
                )));
            }
            level = level.max(child.level() + 1);
            leaves.extend_from_slice(child.leaves());
        }
        if level != node.level() {
            return Err(HcTreeError::StructureError(format!(
                "cluster {id} has level {} but its children imply {level}",
                node.level()
            )));
        }

        let child_total = leaves.len();
        leaves.sort_unstable();
        leaves.dedup();
        if leaves.len() != child_total {
            return Err(HcTreeError::StructureError(format!(
                "children of cluster {id} share leaves"
            )));
        }
        if leaves != node.leaves() {
            return Err(HcTreeError::StructureError(format!(
                "leaf set of cluster {id} differs from the union of its children"
            )));
        }
        Ok(())
    }
}

/// Checks a per-leaf coordinate table before it is indexed for lookups.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CoordinateValidator<'a, T> {
    coordinates: &'a [Vec<T>],
}

impl<'a, T: Float> CoordinateValidator<'a, T> {
    pub(crate) fn new(coordinates: &'a [Vec<T>]) -> Self {
        Self { coordinates }
    }

    pub(crate) fn validate(&self) -> HcTreeResult<()> {
        let dims_0th = match self.coordinates.first() {
            Some(point) => point.len(),
            None => return Ok(()),
        };
        if dims_0th == 0 {
            return Err(HcTreeError::InvalidCoordinates(String::from(
                "coordinates need at least one dimension",
            )));
        }
        for (n, point) in self.coordinates.iter().enumerate() {
            if point.iter().any(|element| !element.is_finite()) {
                return Err(HcTreeError::InvalidCoordinates(format!(
                    "leaf {n} has non-finite coordinate(s)"
                )));
            }
            let dims_nth = point.len();
            if dims_nth != dims_0th {
                return Err(HcTreeError::InvalidCoordinates(format!(
                    "leaf 0 has {dims_0th} dimensions, but leaf {n} has {dims_nth}"
                )));
            }
        }
        Ok(())
    }

    /// Checks a query point against the dimensionality of the table.
    pub(crate) fn validate_point(&self, point: &[T]) -> HcTreeResult<()> {
        let dims = self.coordinates.first().map(|p| p.len()).unwrap_or(0);
        if point.len() != dims {
            return Err(HcTreeError::InvalidCoordinates(format!(
                "query point has {} dimensions, expected {dims}",
                point.len()
            )));
        }
        if point.iter().any(|element| !element.is_finite()) {
            return Err(HcTreeError::InvalidCoordinates(String::from(
                "query point has non-finite coordinate(s)",
            )));
        }
        Ok(())
    }
}
