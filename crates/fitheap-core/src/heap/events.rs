//! Structured lifecycle records.
//!
//! The allocator records one event per decision it makes: arena creation,
//! every allocation and deallocation, and every denied or ignored request.
//! Events carry a monotonic sequence number, a correlation id, and a
//! snapshot of the accounting counters at the time of recording. The core
//! never writes to any sink itself; callers drain the buffer and forward
//! records wherever they want them.

/// Severity of a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl EventLevel {
    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// One allocator decision, with counter snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapEvent {
    /// Monotonic event id, starting at 1 for arena creation.
    pub seq: u64,
    /// Correlation id of the form `heap::<op>::<seq hex>`.
    pub trace_id: String,
    pub level: EventLevel,
    /// Operation that produced the event (`new`, `allocate`, `deallocate`).
    pub op: &'static str,
    /// Event kind (`arena_init`, `alloc`, `free`, `free_null`, ...).
    pub event: &'static str,
    /// Payload offset involved, if any.
    pub offset: Option<usize>,
    /// Byte size involved, if any.
    pub size: Option<usize>,
    /// Machine-readable outcome label (`success`, `denied`, `ignored`, ...).
    pub outcome: &'static str,
    /// Free-form context for debugging.
    pub details: String,
    /// Snapshot: blocks in the chain.
    pub block_count: usize,
    /// Snapshot: blocks currently handed out.
    pub allocated_blocks: usize,
    /// Snapshot: payload bytes in allocated blocks.
    pub allocated_bytes: usize,
    /// Snapshot: payload bytes in free blocks.
    pub free_bytes: usize,
}
