use super::schema::NodeType;

/// Failures raised by the tree itself: bad positions and grammar violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Position {pos} out of range (content size {size})")]
    OutOfRange { pos: usize, size: usize },

    #[error("Invalid content for {0} node")]
    InvalidContent(NodeType),

    #[error("Replacement invalid: {0}")]
    ReplacementInvalid(String),

    #[error("Removing non-flat range")]
    NonFlatRange,

    #[error("Empty text nodes are not allowed")]
    EmptyText,
}
