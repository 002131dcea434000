//! # fitheap-core
//!
//! A user-space allocator that manages a single fixed-size byte arena.
//! All bookkeeping lives in-band: every block starts with a 24-byte header
//! carrying the payload capacity, an allocation flag, and the offset of the
//! next header, so the arena is self-describing and can be walked, rendered,
//! and validated from its bytes alone.
//!
//! "Pointers" in this crate are arena-relative byte offsets into an owned
//! buffer. Nothing here touches raw memory: the crate denies `unsafe` and
//! every header access is bounds-checked.

#![deny(unsafe_code)]

pub mod error;
pub mod heap;
pub mod policy;

pub use error::HeapError;
pub use heap::allocator::{ArenaAllocator, DeallocOutcome};
pub use heap::check::{ChainReport, ChainViolation};
pub use heap::events::{EventLevel, HeapEvent};
pub use heap::header::{BlockHeader, HEADER_SIZE};
pub use heap::layout::{LayoutRecord, SegmentKind, render_layout};
pub use policy::FreePolicy;
