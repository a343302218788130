use thiserror::Error;

/// Possible errors raised while building, editing or querying a cluster tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HcTreeError {
    #[error("Node id {0} is out of bounds")]
    OutOfBounds(usize),

    #[error("Invalid node reference: {0}")]
    InvalidReference(String),

    #[error("Merge values must not decrease towards the root: {0}")]
    OrderViolation(String),

    #[error("Tree structure error: {0}")]
    StructureError(String),

    #[error("Node {0} contains no leaves")]
    EmptyNode(usize),

    #[error("No stored partition with index {0}")]
    MissingPartition(usize),

    #[error("Data computed for tree generation {computed}, but the tree is at {current}")]
    StaleGeneration { computed: u64, current: u64 },

    #[error("Invalid leaf coordinates: {0}")]
    InvalidCoordinates(String),
}

pub type HcTreeResult<T> = Result<T, HcTreeError>;
