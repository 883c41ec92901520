use thiserror::Error;

/// Errors returned by the fallible accessors of [`AvlTree`](crate::AvlTree).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The key is not present in the tree.
    #[error("key not found: {0:?}")]
    KeyNotFound(String),
}

/// Result type of the fallible accessors.
pub type Result<T> = std::result::Result<T, Error>;
