//! Fixed-arena block management.
//!
//! The arena is partitioned into blocks by a singly-linked chain of in-band
//! headers that starts at offset zero and covers every byte:
//!
//! - `header`: the 24-byte record codec
//! - `arena`: the owned byte buffer with bounds-checked header access
//! - `allocator`: best-fit allocation, split-on-allocate, coalescing free
//! - `layout`: introspection records and the tab-separated dump format
//! - `check`: the validated chain walk and its violation taxonomy
//! - `events`: structured lifecycle records

pub mod allocator;
pub(crate) mod arena;
pub mod check;
pub mod events;
pub mod header;
pub mod layout;

pub use allocator::{ArenaAllocator, DeallocOutcome};
pub use check::{ChainReport, ChainViolation};
pub use events::{EventLevel, HeapEvent};
pub use header::{BlockHeader, HEADER_SIZE};
pub use layout::{LayoutRecord, SegmentKind, render_layout};
