//! In-band block header codec.
//!
//! Every block begins with a fixed 24-byte record: payload capacity, the
//! offset of the next header, and an allocation flag. All integer fields
//! are little-endian; the stored `next` field uses `u64::MAX` to encode
//! "last block in the chain".
//!
//! Record layout:
//!
//! ```text
//! offset  size  field
//! 0       8     capacity (u64)
//! 8       8     next header offset (u64, u64::MAX = none)
//! 16      1     status (0 = free, 1 = allocated)
//! 17      7     reserved, must be zero
//! ```

use core::fmt;

/// Size of the encoded header record in bytes.
pub const HEADER_SIZE: usize = 24;

/// Stored `next` value meaning "no successor".
const NEXT_NONE: u64 = u64::MAX;

const OFF_CAPACITY: usize = 0; // u64
const OFF_NEXT: usize = 8; // u64
const OFF_STATUS: usize = 16; // u8

const STATUS_FREE: u8 = 0;
const STATUS_ALLOCATED: u8 = 1;

/// Decoded view of one block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Payload bytes managed by this block, header excluded.
    pub capacity: usize,
    /// Whether the payload is currently handed out.
    pub allocated: bool,
    /// Offset of the next header, `None` for the last block.
    pub next: Option<usize>,
}

/// Reasons a stored record fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderDecodeError {
    /// The status byte is neither the free nor the allocated marker.
    BadStatus(u8),
    /// A stored field does not fit in this platform's address space.
    FieldOverflow,
}

impl fmt::Display for HeaderDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadStatus(value) => {
                write!(f, "status byte {value} is neither free nor allocated")
            }
            Self::FieldOverflow => write!(f, "stored field exceeds the address space"),
        }
    }
}

impl BlockHeader {
    /// A free block of `capacity` payload bytes with no successor.
    #[must_use]
    pub fn free_tail(capacity: usize) -> Self {
        Self {
            capacity,
            allocated: false,
            next: None,
        }
    }

    /// Encodes into the fixed little-endian record layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[OFF_CAPACITY..OFF_CAPACITY + 8].copy_from_slice(&(self.capacity as u64).to_le_bytes());
        let next = match self.next {
            Some(offset) => offset as u64,
            None => NEXT_NONE,
        };
        out[OFF_NEXT..OFF_NEXT + 8].copy_from_slice(&next.to_le_bytes());
        out[OFF_STATUS] = if self.allocated {
            STATUS_ALLOCATED
        } else {
            STATUS_FREE
        };
        out
    }

    /// Decodes a fixed record.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self, HeaderDecodeError> {
        let allocated = match bytes[OFF_STATUS] {
            STATUS_FREE => false,
            STATUS_ALLOCATED => true,
            other => return Err(HeaderDecodeError::BadStatus(other)),
        };
        let capacity = usize::try_from(read_u64(bytes, OFF_CAPACITY))
            .map_err(|_| HeaderDecodeError::FieldOverflow)?;
        let next_raw = read_u64(bytes, OFF_NEXT);
        let next = if next_raw == NEXT_NONE {
            None
        } else {
            Some(usize::try_from(next_raw).map_err(|_| HeaderDecodeError::FieldOverflow)?)
        };
        Ok(Self {
            capacity,
            allocated,
            next,
        })
    }
}

fn read_u64(bytes: &[u8; HEADER_SIZE], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}
