use alloc::string::String;
use thiserror::Error;

use crate::{Key, Kind};

/// Errors returned by tree spec decoding, encoding and unflattening.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PytreeError {
    /// The encoded tree spec is malformed.
    #[error("Malformed tree spec at byte {position}: {reason}")]
    Format {
        /// Byte offset in the encoded string where the problem was detected.
        position: usize,
        /// What was wrong at that offset.
        reason: FormatError,
    },

    /// The encoded tree spec nests deeper than the decoder allows.
    #[error("Tree spec nesting exceeds the configured depth limit of {limit}")]
    DepthLimitExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// The number of leaves handed to unflatten disagrees with the spec.
    #[error("Tree spec expects {expected} leaves but {actual} were provided")]
    LeafCountMismatch {
        /// Leaf count of the spec.
        expected: usize,
        /// Number of leaves provided.
        actual: usize,
    },

    /// A child index is past the end of a node's children.
    #[error("Child index {index} is out of range for a node with {len} children")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of children of the node.
        len: usize,
    },

    /// A dict lookup did not find the requested key.
    #[error("Key {0} not found in dict")]
    KeyNotFound(Key),

    /// A dict key cannot be written in the tree spec grammar.
    #[error("Key {key} cannot be encoded: {reason}")]
    InvalidKey {
        /// The offending key.
        key: Key,
        /// Why it cannot be encoded.
        reason: &'static str,
    },

    /// A custom node type label cannot be written in the tree spec grammar.
    #[error("Custom type label {0:?} is empty or contains a reserved character")]
    InvalidCustomType(String),

    /// The tree contains a node kind that has no encoding.
    #[error("Nodes of kind {0:?} cannot be encoded")]
    UnencodableKind(Kind),
}

/// Details of a [`PytreeError::Format`] error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The input ended where more data was expected.
    #[error("unexpected end of input")]
    UnexpectedEnd,
    /// A decimal number was expected.
    #[error("expected a digit, found {0:?}")]
    ExpectedDigit(char),
    /// A decimal number does not fit its target type.
    #[error("number is too large")]
    NumberOverflow,
    /// A specific delimiter was expected.
    #[error("expected {expected:?}, found {found:?}")]
    UnexpectedChar {
        /// The delimiter the grammar requires here.
        expected: char,
        /// The character actually present.
        found: char,
    },
    /// The character does not start any node kind.
    #[error("unknown node kind {0:?}")]
    UnknownKind(char),
    /// A custom type label is empty or contains a reserved character.
    #[error("invalid custom type label")]
    InvalidCustomType,
    /// A `)` without a matching `(`.
    #[error("unmatched closing bracket")]
    UnmatchedClose,
    /// A `,` outside of any children block.
    #[error("separator outside of a children block")]
    SeparatorOutsideGroup,
    /// A `(` that is never closed.
    #[error("children block is never closed")]
    UnclosedGroup,
    /// A quoted key that is never closed.
    #[error("quoted key is never closed")]
    UnterminatedKey,
    /// The number of `#` leaf count annotations differs from the child count.
    #[error("node declares {declared} children but has {annotations} leaf count annotations")]
    AnnotationCountMismatch {
        /// Declared child count.
        declared: usize,
        /// Number of annotations present.
        annotations: usize,
    },
    /// The children block holds a different number of children than declared.
    #[error("node declares {declared} children but its children block holds {actual}")]
    ChildCountMismatch {
        /// Declared child count.
        declared: usize,
        /// Number of children found.
        actual: usize,
    },
    /// A child's annotated leaf count differs from its decoded leaf count.
    #[error("child is annotated with {declared} leaves but contains {actual}")]
    LeafCountMismatch {
        /// Annotated leaf count.
        declared: usize,
        /// Leaf count of the decoded child.
        actual: usize,
    },
    /// Bytes remain after a complete node.
    #[error("unexpected data after the end of a node")]
    TrailingData,
}

impl PytreeError {
    pub(crate) fn format(position: usize, reason: FormatError) -> Self {
        Self::Format { position, reason }
    }
}
