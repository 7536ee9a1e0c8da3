//! Error types for tree construction and queries.

use thiserror::Error;

/// Result type alias for tree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading documents or querying nodes.
#[derive(Error, Debug)]
pub enum Error {
    /// The source file could not be opened or read.
    #[error("File {0} not found!")]
    FileNotFound(String),

    /// The tokenizer rejected the input as not well-formed.
    ///
    /// The message carries the source path when the input came from a file.
    #[error("Input is not valid XML: {0}")]
    MalformedInput(String),

    /// An attribute key was looked up on a node that does not carry it.
    #[error("Attribute not found: {0}")]
    KeyNotFound(String),

    /// A child insertion index was past the end of the child list.
    #[error("Child index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}
