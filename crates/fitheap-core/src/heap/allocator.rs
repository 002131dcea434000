//! Best-fit arena allocator.
//!
//! One `ArenaAllocator` owns one arena. Allocation walks the header chain
//! and picks the smallest free block that can hold the request, splitting
//! off the tail when the leftover can stand as a block of its own.
//! Deallocation flips the block free and merges it with free neighbors in
//! chain order, so no two free blocks are ever adjacent.

use crate::error::HeapError;
use crate::heap::arena::Arena;
use crate::heap::check::{self, ChainReport, ChainViolation};
use crate::heap::events::{EventLevel, HeapEvent};
use crate::heap::header::{BlockHeader, HEADER_SIZE};
use crate::heap::layout::{LayoutRecord, SegmentKind};
use crate::policy::FreePolicy;

/// Outcome of a deallocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum DeallocOutcome {
    /// Block freed; neither neighbor was free.
    Freed,
    /// Block freed and absorbed into its free predecessor.
    FreedCoalescedPrev,
    /// Block freed and absorbed its free successor.
    FreedCoalescedNext,
    /// Block freed and merged with both neighbors.
    FreedCoalescedBoth,
    /// The null offset; nothing to release.
    IgnoredNull,
    /// The offset names no block payload; state untouched.
    IgnoredForeign,
    /// The block was already free; state untouched.
    IgnoredDoubleFree,
}

impl DeallocOutcome {
    /// Whether a block actually returned to the free chain.
    #[must_use]
    pub fn released(self) -> bool {
        matches!(
            self,
            Self::Freed
                | Self::FreedCoalescedPrev
                | Self::FreedCoalescedNext
                | Self::FreedCoalescedBoth
        )
    }
}

/// Fixed-arena best-fit allocator.
///
/// Instance-scoped: each value owns its arena, so independent allocators
/// coexist and tests need no global resets. The payload offset `0` is
/// never handed out (the first header lives there), which makes it usable
/// as a null value by callers.
#[derive(Debug)]
pub struct ArenaAllocator {
    arena: Arena,
    policy: FreePolicy,
    /// Headers currently in the chain.
    block_count: usize,
    /// Blocks currently handed out.
    allocated_blocks: usize,
    /// Payload bytes in allocated blocks (capacity, not request).
    allocated_bytes: usize,
    /// Monotonic lifecycle sequence.
    next_seq: u64,
    events: Vec<HeapEvent>,
}

impl ArenaAllocator {
    /// Creates an allocator over a fresh zeroed arena of `total_bytes`,
    /// with the default lenient free policy.
    pub fn new(total_bytes: usize) -> Result<Self, HeapError> {
        Self::with_policy(total_bytes, FreePolicy::default())
    }

    /// Creates an allocator with an explicit free policy.
    ///
    /// The arena must hold at least one header; everything after it becomes
    /// a single free block, possibly of capacity zero.
    pub fn with_policy(total_bytes: usize, policy: FreePolicy) -> Result<Self, HeapError> {
        if total_bytes < HEADER_SIZE {
            return Err(HeapError::InsufficientArena {
                requested: total_bytes,
                minimum: HEADER_SIZE,
            });
        }
        let mut arena = Arena::new(total_bytes);
        arena.write_header(0, &BlockHeader::free_tail(total_bytes - HEADER_SIZE))?;
        let mut state = Self {
            arena,
            policy,
            block_count: 1,
            allocated_blocks: 0,
            allocated_bytes: 0,
            next_seq: 1,
            events: Vec::new(),
        };
        state.record_event(
            EventLevel::Info,
            "new",
            "arena_init",
            None,
            Some(total_bytes),
            "success",
            format!(
                "policy={} capacity={}",
                policy.as_str(),
                total_bytes - HEADER_SIZE
            ),
        );
        Ok(state)
    }

    /// Total bytes in the arena.
    #[must_use]
    pub fn arena_len(&self) -> usize {
        self.arena.len()
    }

    /// Size of the in-band header records.
    #[must_use]
    pub const fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    /// Largest request this arena could ever serve, fully coalesced.
    #[must_use]
    pub fn max_request(&self) -> usize {
        self.arena.len() - HEADER_SIZE
    }

    /// The free policy this instance was built with.
    #[must_use]
    pub fn policy(&self) -> FreePolicy {
        self.policy
    }

    /// Payload bytes currently allocated, counted by block capacity.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    /// Blocks currently handed out.
    #[must_use]
    pub fn allocated_blocks(&self) -> usize {
        self.allocated_blocks
    }

    /// Blocks in the chain, free and allocated.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Payload bytes currently free.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.arena
            .len()
            .saturating_sub(self.block_count * HEADER_SIZE)
            .saturating_sub(self.allocated_bytes)
    }

    /// Allocates `requested` payload bytes and returns the payload's
    /// arena-relative offset.
    ///
    /// Best fit: the smallest free block that holds the request wins, the
    /// earliest in chain order on ties. The winner is split when the
    /// leftover can carry a header and at least one payload byte;
    /// otherwise the caller receives the block's full capacity as slack.
    pub fn allocate(&mut self, requested: usize) -> Result<usize, HeapError> {
        let limit = self.max_request();
        if requested > limit {
            self.record_event(
                EventLevel::Warn,
                "allocate",
                "invalid_size",
                None,
                Some(requested),
                "denied",
                format!("limit={limit}"),
            );
            return Err(HeapError::InvalidSize { requested, limit });
        }

        let mut best: Option<(usize, BlockHeader)> = None;
        for (offset, header) in self.blocks()? {
            if header.allocated || header.capacity < requested {
                continue;
            }
            let better = match &best {
                Some((_, incumbent)) => header.capacity < incumbent.capacity,
                None => true,
            };
            if better {
                best = Some((offset, header));
            }
        }
        let Some((offset, mut chosen)) = best else {
            self.record_event(
                EventLevel::Warn,
                "allocate",
                "alloc",
                None,
                Some(requested),
                "oom",
                "no free block fits",
            );
            return Err(HeapError::OutOfMemory { requested });
        };

        // Split only when the leftover can stand as a block of its own; an
        // exact or near fit keeps its full capacity and its `next` intact.
        let leftover = chosen
            .capacity
            .checked_sub(requested)
            .and_then(|rest| rest.checked_sub(HEADER_SIZE))
            .filter(|rest| *rest > 0);
        let mut split = false;
        if let Some(rest) = leftover {
            let tail_offset = offset + HEADER_SIZE + requested;
            self.arena.write_header(
                tail_offset,
                &BlockHeader {
                    capacity: rest,
                    allocated: false,
                    next: chosen.next,
                },
            )?;
            chosen.capacity = requested;
            chosen.next = Some(tail_offset);
            self.block_count += 1;
            split = true;
        }
        chosen.allocated = true;
        self.arena.write_header(offset, &chosen)?;

        self.allocated_blocks += 1;
        self.allocated_bytes += chosen.capacity;

        let payload = offset + HEADER_SIZE;
        self.record_event(
            EventLevel::Trace,
            "allocate",
            "alloc",
            Some(payload),
            Some(requested),
            "success",
            format!(
                "block_offset={offset} capacity={} split={split}",
                chosen.capacity
            ),
        );
        Ok(payload)
    }

    /// Releases the block whose payload starts at `ptr`, merging it with
    /// free neighbors.
    ///
    /// The null offset, offsets naming no block payload, and blocks that
    /// are already free never touch allocator state. Under the lenient
    /// policy they come back as `Ignored*` outcomes, under the strict
    /// policy as errors; neither path terminates anything.
    pub fn deallocate(&mut self, ptr: usize) -> Result<DeallocOutcome, HeapError> {
        if ptr == 0 {
            return if self.policy.is_strict() {
                self.record_event(
                    EventLevel::Warn,
                    "deallocate",
                    "free_null",
                    Some(ptr),
                    None,
                    "denied",
                    "null offset",
                );
                Err(HeapError::NullFree)
            } else {
                self.record_event(
                    EventLevel::Trace,
                    "deallocate",
                    "free_null",
                    Some(ptr),
                    None,
                    "noop",
                    "null offset",
                );
                Ok(DeallocOutcome::IgnoredNull)
            };
        }

        let chain = self.blocks()?;
        let Some(pos) = chain
            .iter()
            .position(|&(offset, _)| offset + HEADER_SIZE == ptr)
        else {
            return if self.policy.is_strict() {
                self.record_event(
                    EventLevel::Warn,
                    "deallocate",
                    "unknown_free_offset",
                    Some(ptr),
                    None,
                    "denied",
                    "offset matches no block payload",
                );
                Err(HeapError::ForeignFree { offset: ptr })
            } else {
                self.record_event(
                    EventLevel::Warn,
                    "deallocate",
                    "unknown_free_offset",
                    Some(ptr),
                    None,
                    "ignored",
                    "offset matches no block payload",
                );
                Ok(DeallocOutcome::IgnoredForeign)
            };
        };

        let (offset, header) = chain[pos];
        if !header.allocated {
            return if self.policy.is_strict() {
                self.record_event(
                    EventLevel::Warn,
                    "deallocate",
                    "double_free_detected",
                    Some(ptr),
                    None,
                    "denied",
                    "block already free",
                );
                Err(HeapError::DoubleFree { offset: ptr })
            } else {
                self.record_event(
                    EventLevel::Warn,
                    "deallocate",
                    "double_free_detected",
                    Some(ptr),
                    None,
                    "ignored",
                    "block already free",
                );
                Ok(DeallocOutcome::IgnoredDoubleFree)
            };
        }

        let mut anchor_offset = offset;
        let mut anchor = BlockHeader {
            allocated: false,
            ..header
        };
        let mut merged_prev = false;
        let mut merged_next = false;

        // Backward merge: fold this block into a free predecessor.
        if pos > 0 {
            let (prev_offset, prev) = chain[pos - 1];
            if !prev.allocated {
                anchor = BlockHeader {
                    capacity: prev.capacity + HEADER_SIZE + anchor.capacity,
                    allocated: false,
                    next: anchor.next,
                };
                anchor_offset = prev_offset;
                merged_prev = true;
            }
        }

        // Forward merge: absorb a free successor.
        if let Some(&(_, next)) = chain.get(pos + 1)
            && !next.allocated
        {
            anchor.capacity += HEADER_SIZE + next.capacity;
            anchor.next = next.next;
            merged_next = true;
        }

        // One write covers the whole merge; absorbed headers become plain
        // payload bytes of the surviving block.
        self.arena.write_header(anchor_offset, &anchor)?;

        match self.allocated_bytes.checked_sub(header.capacity) {
            Some(rest) => self.allocated_bytes = rest,
            None => {
                self.allocated_bytes = 0;
                self.record_event(
                    EventLevel::Error,
                    "deallocate",
                    "invariant_allocated_bytes_underflow",
                    Some(ptr),
                    Some(header.capacity),
                    "recovered",
                    "counter reset to zero",
                );
            }
        }
        match self.allocated_blocks.checked_sub(1) {
            Some(rest) => self.allocated_blocks = rest,
            None => {
                self.allocated_blocks = 0;
                self.record_event(
                    EventLevel::Error,
                    "deallocate",
                    "invariant_allocated_blocks_underflow",
                    Some(ptr),
                    None,
                    "recovered",
                    "counter reset to zero",
                );
            }
        }
        self.block_count = self
            .block_count
            .saturating_sub(usize::from(merged_prev) + usize::from(merged_next));

        let outcome = match (merged_prev, merged_next) {
            (false, false) => DeallocOutcome::Freed,
            (true, false) => DeallocOutcome::FreedCoalescedPrev,
            (false, true) => DeallocOutcome::FreedCoalescedNext,
            (true, true) => DeallocOutcome::FreedCoalescedBoth,
        };
        self.record_event(
            EventLevel::Trace,
            "deallocate",
            "free",
            Some(ptr),
            Some(header.capacity),
            "success",
            format!("block_offset={offset} merged_prev={merged_prev} merged_next={merged_next}"),
        );
        Ok(outcome)
    }

    /// Walks the chain and emits one record per header and one per payload.
    ///
    /// Diagnostic only: the walk renders whatever is reachable, stops at
    /// the first unreadable header, and is bounded by the number of
    /// headers that could physically fit, so it terminates even on a
    /// corrupt chain. `validate` is the checked walk.
    #[must_use]
    pub fn dump_layout(&self) -> Vec<LayoutRecord> {
        let mut records = Vec::new();
        let mut cursor = Some(0usize);
        let max_headers = self.arena.len() / HEADER_SIZE + 1;
        for _ in 0..max_headers {
            let Some(offset) = cursor else { break };
            let Ok(header) = self.arena.read_header(offset) else {
                break;
            };
            records.push(LayoutRecord {
                offset,
                len: HEADER_SIZE,
                kind: SegmentKind::Header,
            });
            records.push(LayoutRecord {
                offset: offset + HEADER_SIZE,
                len: header.capacity,
                kind: if header.allocated {
                    SegmentKind::Allocated
                } else {
                    SegmentKind::Free
                },
            });
            cursor = header.next;
        }
        records
    }

    /// Verifies every structural invariant of the chain, cross-checks the
    /// accounting counters, and returns usage statistics.
    pub fn validate(&self) -> Result<ChainReport, ChainViolation> {
        let report = check::walk_chain(&self.arena)?;
        for (field, counter, observed) in [
            ("block_count", self.block_count, report.blocks),
            (
                "allocated_blocks",
                self.allocated_blocks,
                report.allocated_blocks,
            ),
            (
                "allocated_bytes",
                self.allocated_bytes,
                report.allocated_bytes,
            ),
        ] {
            if counter != observed {
                return Err(ChainViolation::AccountingDrift {
                    field,
                    counter,
                    observed,
                });
            }
        }
        Ok(report)
    }

    /// Lifecycle events recorded so far.
    #[must_use]
    pub fn lifecycle_events(&self) -> &[HeapEvent] {
        &self.events
    }

    /// Takes all recorded lifecycle events, leaving the buffer empty.
    pub fn drain_lifecycle_events(&mut self) -> Vec<HeapEvent> {
        std::mem::take(&mut self.events)
    }

    /// Snapshot of the chain as `(offset, header)` pairs.
    ///
    /// Bails out with a corruption error instead of looping when a stored
    /// `next` fails to advance.
    fn blocks(&self) -> Result<Vec<(usize, BlockHeader)>, ChainViolation> {
        let mut out = Vec::new();
        let mut cursor = Some(0usize);
        while let Some(offset) = cursor {
            let header = self.arena.read_header(offset)?;
            if let Some(next) = header.next
                && next <= offset
            {
                return Err(ChainViolation::CorruptHeader {
                    offset,
                    reason: format!("next offset {next} does not advance"),
                });
            }
            cursor = header.next;
            out.push((offset, header));
        }
        Ok(out)
    }

    fn record_event(
        &mut self,
        level: EventLevel,
        op: &'static str,
        event: &'static str,
        offset: Option<usize>,
        size: Option<usize>,
        outcome: &'static str,
        details: impl Into<String>,
    ) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.events.push(HeapEvent {
            seq,
            trace_id: format!("heap::{op}::{seq:016x}"),
            level,
            op,
            event,
            offset,
            size,
            outcome,
            details: details.into(),
            block_count: self.block_count,
            allocated_blocks: self.allocated_blocks,
            allocated_bytes: self.allocated_bytes,
            free_bytes: self.free_bytes(),
        });
    }
}
