//! Trace harness for the fitheap allocator.
//!
//! This crate provides:
//! - Trace fixtures: JSON scripts of allocate/free/dump operations
//! - Trace runner: executes fixtures against a fresh allocator and captures
//!   layout transcripts with per-operation outcomes
//! - Verification: compares transcripts against pinned expectations with
//!   line diffs and SHA-256 digests
//! - Structured JSONL operation logs mirrored from core lifecycle events
//! - Markdown verification reports

#![forbid(unsafe_code)]

pub mod fixtures;
pub mod oplog;
pub mod report;
pub mod runner;

pub use fixtures::{TraceFixture, TraceOp, demo_fixture};
pub use runner::{TraceError, TraceOutcome, TraceRunner, VerificationResult};
