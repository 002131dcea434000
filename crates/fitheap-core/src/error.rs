//! Allocator error taxonomy.

use thiserror::Error;

use crate::heap::check::ChainViolation;

/// Errors surfaced by allocator operations.
///
/// `InvalidSize` marks a request no arena state could ever satisfy, while
/// `OutOfMemory` marks a request that merely does not fit right now; the
/// distinction matters to callers that retry after freeing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("arena of {requested} bytes cannot hold a {minimum}-byte header")]
    InsufficientArena { requested: usize, minimum: usize },

    #[error("request of {requested} bytes exceeds the arena-wide limit of {limit}")]
    InvalidSize { requested: usize, limit: usize },

    #[error("no free block can hold {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("cannot free the null offset")]
    NullFree,

    #[error("offset {offset} does not name any block payload")]
    ForeignFree { offset: usize },

    #[error("block at payload offset {offset} is already free")]
    DoubleFree { offset: usize },

    #[error(transparent)]
    Corrupt(#[from] ChainViolation),
}
