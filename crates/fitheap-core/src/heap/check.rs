//! Validated chain walks.
//!
//! `walk_chain` re-derives every structural invariant from the stored
//! headers alone: the chain starts at offset zero, each block's `next`
//! lands exactly where its payload ends, the last payload ends exactly at
//! the arena end, and no two free blocks are adjacent in chain order.

use thiserror::Error;

use crate::heap::arena::Arena;
use crate::heap::header::HEADER_SIZE;

/// Structural invariant breach found in the header chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainViolation {
    #[error("header at offset {offset} does not fit in a {arena_len}-byte arena")]
    HeaderOutOfBounds { offset: usize, arena_len: usize },

    #[error("header at offset {offset} is corrupt: {reason}")]
    CorruptHeader { offset: usize, reason: String },

    #[error("payload of block at offset {offset} ends at {payload_end}, past the {arena_len}-byte arena")]
    PayloadOutOfBounds {
        offset: usize,
        payload_end: usize,
        arena_len: usize,
    },

    #[error("block at offset {offset} stores next offset {stored}, expected {expected}")]
    NextMismatch {
        offset: usize,
        stored: usize,
        expected: usize,
    },

    #[error("chain ends at offset {chain_end}, short of the arena end {arena_len}")]
    TrailingGap { chain_end: usize, arena_len: usize },

    #[error("blocks at offsets {first} and {second} are both free")]
    AdjacentFreeBlocks { first: usize, second: usize },

    #[error("counter {field} reads {counter} but the chain holds {observed}")]
    AccountingDrift {
        field: &'static str,
        counter: usize,
        observed: usize,
    },
}

/// Usage statistics computed by a validated walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainReport {
    /// Blocks in the chain.
    pub blocks: usize,
    /// Blocks currently handed out.
    pub allocated_blocks: usize,
    /// Blocks available for allocation.
    pub free_blocks: usize,
    /// Payload bytes in allocated blocks.
    pub allocated_bytes: usize,
    /// Payload bytes in free blocks.
    pub free_bytes: usize,
    /// Bytes consumed by header records.
    pub header_bytes: usize,
    /// Capacity of the largest free block.
    pub largest_free: usize,
}

/// Walks the chain from offset zero, checking structure as it goes.
pub(crate) fn walk_chain(arena: &Arena) -> Result<ChainReport, ChainViolation> {
    let arena_len = arena.len();
    let mut report = ChainReport::default();
    let mut cursor = 0usize;
    let mut prev_free: Option<usize> = None;

    loop {
        let header = arena.read_header(cursor)?;
        let payload_end = cursor
            .checked_add(HEADER_SIZE)
            .and_then(|header_end| header_end.checked_add(header.capacity))
            .ok_or_else(|| ChainViolation::CorruptHeader {
                offset: cursor,
                reason: String::from("capacity overflows the address space"),
            })?;
        if payload_end > arena_len {
            return Err(ChainViolation::PayloadOutOfBounds {
                offset: cursor,
                payload_end,
                arena_len,
            });
        }

        if header.allocated {
            report.allocated_blocks += 1;
            report.allocated_bytes += header.capacity;
        } else {
            if let Some(first) = prev_free {
                return Err(ChainViolation::AdjacentFreeBlocks {
                    first,
                    second: cursor,
                });
            }
            report.free_blocks += 1;
            report.free_bytes += header.capacity;
            report.largest_free = report.largest_free.max(header.capacity);
        }
        report.blocks += 1;
        report.header_bytes += HEADER_SIZE;
        prev_free = (!header.allocated).then_some(cursor);

        match header.next {
            Some(next) => {
                if next != payload_end {
                    return Err(ChainViolation::NextMismatch {
                        offset: cursor,
                        stored: next,
                        expected: payload_end,
                    });
                }
                cursor = next;
            }
            None => {
                if payload_end != arena_len {
                    return Err(ChainViolation::TrailingGap {
                        chain_end: payload_end,
                        arena_len,
                    });
                }
                return Ok(report);
            }
        }
    }
}
