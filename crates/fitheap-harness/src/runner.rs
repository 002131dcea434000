//! Trace execution and verification.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use fitheap_core::{
    ArenaAllocator, DeallocOutcome, FreePolicy, HeapError, HeapEvent, render_layout,
};

use crate::fixtures::{TraceFixture, TraceOp};

/// Hard failures that abort a trace.
///
/// Allocator-level refusals (out of memory, invalid sizes, strict-policy
/// frees) are recorded as per-operation failures and the trace continues;
/// only broken scripts and unusable arenas land here.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("fixture: {0}")]
    Fixture(#[from] serde_json::Error),

    #[error("heap: {0}")]
    Heap(#[from] HeapError),

    #[error("op {index}: tag '{tag}' is not bound to an offset")]
    UnknownTag { index: usize, tag: String },

    #[error("op {index}: tag '{tag}' is already bound")]
    DuplicateTag { index: usize, tag: String },
}

/// What one scripted operation did.
#[derive(Debug, Clone)]
pub struct OpRecord {
    pub index: usize,
    /// Human-readable form of the scripted operation.
    pub action: String,
    /// Machine-readable outcome label.
    pub outcome: String,
    pub ok: bool,
}

/// Everything captured from executing one fixture.
#[derive(Debug, Clone)]
pub struct TraceOutcome {
    pub name: String,
    pub policy: String,
    /// Concatenated dump renderings, one blank line after each.
    pub transcript: String,
    /// SHA-256 hex digest of the transcript.
    pub digest: String,
    pub ops: Vec<OpRecord>,
    /// Operations that did not succeed.
    pub failures: usize,
    /// Core lifecycle events drained after the run.
    pub events: Vec<HeapEvent>,
}

/// Comparison of a trace outcome against its pinned expectation.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub case_name: String,
    pub policy: String,
    pub passed: bool,
    /// The pinned transcript; equals `actual` for fixtures with none.
    pub expected: String,
    /// The transcript the run produced.
    pub actual: String,
    /// Line-oriented mismatch summary, present only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Executes trace fixtures, each against a fresh allocator.
#[derive(Debug, Default)]
pub struct TraceRunner {
    /// Policy override; when unset the fixture's own policy applies.
    policy: Option<FreePolicy>,
}

impl TraceRunner {
    #[must_use]
    pub fn new() -> Self {
        Self { policy: None }
    }

    #[must_use]
    pub fn with_policy(policy: FreePolicy) -> Self {
        Self {
            policy: Some(policy),
        }
    }

    fn effective_policy(&self, fixture: &TraceFixture) -> FreePolicy {
        self.policy.unwrap_or_else(|| {
            fixture
                .policy
                .as_deref()
                .map(FreePolicy::from_str_loose)
                .unwrap_or_default()
        })
    }

    /// Runs a fixture to completion and captures its transcript.
    pub fn run(&self, fixture: &TraceFixture) -> Result<TraceOutcome, TraceError> {
        let policy = self.effective_policy(fixture);
        let mut heap = ArenaAllocator::with_policy(fixture.arena_bytes, policy)?;
        let mut bindings: BTreeMap<String, usize> = BTreeMap::new();
        let mut transcript = String::new();
        let mut ops = Vec::with_capacity(fixture.ops.len());

        for (index, op) in fixture.ops.iter().enumerate() {
            let record = match op {
                TraceOp::Alloc { size, tag } => {
                    if bindings.contains_key(tag) {
                        return Err(TraceError::DuplicateTag {
                            index,
                            tag: tag.clone(),
                        });
                    }
                    let action = format!("alloc {tag} {size}");
                    match usize::try_from(*size) {
                        Ok(requested) => match heap.allocate(requested) {
                            Ok(ptr) => {
                                bindings.insert(tag.clone(), ptr);
                                OpRecord {
                                    index,
                                    action,
                                    outcome: format!("payload={ptr}"),
                                    ok: true,
                                }
                            }
                            Err(err) => OpRecord {
                                index,
                                action,
                                outcome: heap_error_label(&err),
                                ok: false,
                            },
                        },
                        // Negative or unrepresentable sizes never reach
                        // the allocator.
                        Err(_) => OpRecord {
                            index,
                            action,
                            outcome: String::from("invalid_size"),
                            ok: false,
                        },
                    }
                }
                TraceOp::Free { tag } => {
                    let Some(ptr) = bindings.get(tag).copied() else {
                        return Err(TraceError::UnknownTag {
                            index,
                            tag: tag.clone(),
                        });
                    };
                    free_record(&mut heap, index, format!("free {tag}"), ptr)
                }
                TraceOp::FreeNull => free_record(&mut heap, index, String::from("free_null"), 0),
                TraceOp::FreeAt { offset } => {
                    free_record(&mut heap, index, format!("free_at {offset}"), *offset)
                }
                TraceOp::Dump => {
                    let records = heap.dump_layout();
                    transcript.push_str(&render_layout(&records));
                    transcript.push('\n');
                    OpRecord {
                        index,
                        action: String::from("dump"),
                        outcome: format!("records={}", records.len()),
                        ok: true,
                    }
                }
            };
            ops.push(record);
        }

        let digest = transcript_digest(&transcript);
        let failures = ops.iter().filter(|record| !record.ok).count();
        Ok(TraceOutcome {
            name: fixture.name.clone(),
            policy: String::from(policy.as_str()),
            transcript,
            digest,
            ops,
            failures,
            events: heap.drain_lifecycle_events(),
        })
    }

    /// Runs a fixture and compares its transcript against the pinned
    /// expectation.
    ///
    /// A fixture without an expectation passes as long as the run itself
    /// completes.
    pub fn verify(
        &self,
        fixture: &TraceFixture,
    ) -> Result<(TraceOutcome, VerificationResult), TraceError> {
        let outcome = self.run(fixture)?;
        let expected = fixture
            .expected
            .clone()
            .unwrap_or_else(|| outcome.transcript.clone());
        let passed = expected == outcome.transcript;
        let result = VerificationResult {
            case_name: fixture.name.clone(),
            policy: outcome.policy.clone(),
            passed,
            diff: (!passed).then(|| render_diff(&expected, &outcome.transcript)),
            actual: outcome.transcript.clone(),
            expected,
        };
        Ok((outcome, result))
    }
}

fn free_record(heap: &mut ArenaAllocator, index: usize, action: String, ptr: usize) -> OpRecord {
    match heap.deallocate(ptr) {
        Ok(outcome) => OpRecord {
            index,
            action,
            outcome: String::from(dealloc_label(outcome)),
            ok: true,
        },
        Err(err) => OpRecord {
            index,
            action,
            outcome: heap_error_label(&err),
            ok: false,
        },
    }
}

fn dealloc_label(outcome: DeallocOutcome) -> &'static str {
    match outcome {
        DeallocOutcome::Freed => "freed",
        DeallocOutcome::FreedCoalescedPrev => "freed_coalesced_prev",
        DeallocOutcome::FreedCoalescedNext => "freed_coalesced_next",
        DeallocOutcome::FreedCoalescedBoth => "freed_coalesced_both",
        DeallocOutcome::IgnoredNull => "ignored_null",
        DeallocOutcome::IgnoredForeign => "ignored_foreign",
        DeallocOutcome::IgnoredDoubleFree => "ignored_double_free",
    }
}

fn heap_error_label(err: &HeapError) -> String {
    match err {
        HeapError::InsufficientArena { .. } => String::from("insufficient_arena"),
        HeapError::InvalidSize { .. } => String::from("invalid_size"),
        HeapError::OutOfMemory { .. } => String::from("out_of_memory"),
        HeapError::NullFree => String::from("null_free"),
        HeapError::ForeignFree { .. } => String::from("foreign_free"),
        HeapError::DoubleFree { .. } => String::from("double_free"),
        HeapError::Corrupt(violation) => format!("corrupt: {violation}"),
    }
}

/// SHA-256 hex digest of a transcript.
#[must_use]
pub fn transcript_digest(transcript: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(transcript.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn render_diff(expected: &str, actual: &str) -> String {
    let expected_lines: Vec<&str> = expected.lines().collect();
    let actual_lines: Vec<&str> = actual.lines().collect();
    let rows = expected_lines.len().max(actual_lines.len());
    let mut out = String::new();
    for row in 0..rows {
        let want = expected_lines.get(row).copied().unwrap_or("<absent>");
        let got = actual_lines.get(row).copied().unwrap_or("<absent>");
        if want != got {
            out.push_str(&format!("line {}: expected `{want}`, got `{got}`\n", row + 1));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::demo_fixture;

    #[test]
    fn demo_transcript_matches_pinned_expectation() {
        let fixture = demo_fixture();
        let outcome = TraceRunner::new().run(&fixture).unwrap();
        assert_eq!(outcome.transcript, fixture.expected.unwrap());
        assert_eq!(outcome.failures, 0);
        assert_eq!(outcome.policy, "lenient");
        assert_eq!(outcome.digest.len(), 64);
        assert!(outcome.digest.chars().all(|c| c.is_ascii_hexdigit()));
        // Arena creation plus three allocs and three frees.
        assert_eq!(outcome.events.len(), 7);

        // A second run is byte-for-byte identical.
        let rerun = TraceRunner::new().run(&demo_fixture()).unwrap();
        assert_eq!(rerun.transcript, outcome.transcript);
        assert_eq!(rerun.digest, outcome.digest);
    }

    #[test]
    fn demo_fixture_verifies_against_itself() {
        let fixture = demo_fixture();
        let (outcome, result) = TraceRunner::new().verify(&fixture).unwrap();
        assert!(result.passed);
        assert_eq!(result.expected, result.actual);
        assert_eq!(result.actual, outcome.transcript);
        assert!(result.diff.is_none());
    }

    #[test]
    fn tampered_expectation_fails_with_line_diff() {
        let mut fixture = demo_fixture();
        let expected = fixture.expected.take().unwrap();
        fixture.expected = Some(expected.replacen("24\t30\tallocated", "24\t31\tallocated", 1));

        let (_, result) = TraceRunner::new().verify(&fixture).unwrap();
        assert!(!result.passed);
        assert_ne!(result.expected, result.actual);
        let diff = result.diff.unwrap();
        assert!(diff.contains("line 2:"));
        assert!(diff.contains("24\t31\tallocated"));
        assert!(diff.contains("24\t30\tallocated"));
    }

    #[test]
    fn negative_size_is_a_recorded_failure_not_an_abort() {
        let fixture = TraceFixture::from_json(
            r#"{
                "version": "v1",
                "name": "negative-size",
                "arena_bytes": 100,
                "ops": [
                    {"op": "alloc", "size": -5, "tag": "bad"},
                    {"op": "alloc", "size": 10, "tag": "good"},
                    {"op": "dump"}
                ]
            }"#,
        )
        .unwrap();
        let outcome = TraceRunner::new().run(&fixture).unwrap();
        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.ops[0].outcome, "invalid_size");
        assert!(!outcome.ops[0].ok);
        assert_eq!(outcome.ops[1].outcome, "payload=24");
        assert!(outcome.transcript.contains("24\t10\tallocated"));
    }

    #[test]
    fn invalid_frees_are_inert_under_the_lenient_policy() {
        let fixture = TraceFixture::from_json(
            r#"{
                "version": "v1",
                "name": "invalid-frees",
                "arena_bytes": 200,
                "ops": [
                    {"op": "alloc", "size": 30, "tag": "a"},
                    {"op": "dump"},
                    {"op": "free_null"},
                    {"op": "free_at", "offset": 9999},
                    {"op": "free", "tag": "a"},
                    {"op": "free", "tag": "a"},
                    {"op": "dump"}
                ]
            }"#,
        )
        .unwrap();
        let outcome = TraceRunner::new().run(&fixture).unwrap();
        assert_eq!(outcome.failures, 0);
        assert_eq!(outcome.ops[2].outcome, "ignored_null");
        assert_eq!(outcome.ops[3].outcome, "ignored_foreign");
        assert_eq!(outcome.ops[4].outcome, "freed");
        assert_eq!(outcome.ops[5].outcome, "ignored_double_free");
    }

    #[test]
    fn strict_policy_turns_invalid_frees_into_failures() {
        let fixture = TraceFixture::from_json(
            r#"{
                "version": "v1",
                "name": "strict-frees",
                "arena_bytes": 200,
                "policy": "strict",
                "ops": [
                    {"op": "alloc", "size": 30, "tag": "a"},
                    {"op": "free_null"},
                    {"op": "free_at", "offset": 9999},
                    {"op": "free", "tag": "a"},
                    {"op": "free", "tag": "a"}
                ]
            }"#,
        )
        .unwrap();
        let outcome = TraceRunner::new().run(&fixture).unwrap();
        assert_eq!(outcome.policy, "strict");
        assert_eq!(outcome.failures, 3);
        assert_eq!(outcome.ops[1].outcome, "null_free");
        assert_eq!(outcome.ops[2].outcome, "foreign_free");
        assert_eq!(outcome.ops[3].outcome, "freed");
        assert_eq!(outcome.ops[4].outcome, "double_free");
    }

    #[test]
    fn runner_policy_overrides_the_fixture() {
        let mut fixture = demo_fixture();
        fixture.policy = Some(String::from("strict"));
        let outcome = TraceRunner::with_policy(FreePolicy::Lenient)
            .run(&fixture)
            .unwrap();
        assert_eq!(outcome.policy, "lenient");
    }

    #[test]
    fn unknown_tag_aborts_the_trace() {
        let fixture = TraceFixture::from_json(
            r#"{
                "version": "v1",
                "name": "unknown-tag",
                "arena_bytes": 100,
                "ops": [{"op": "free", "tag": "ghost"}]
            }"#,
        )
        .unwrap();
        let err = TraceRunner::new().run(&fixture).unwrap_err();
        assert!(matches!(err, TraceError::UnknownTag { index: 0, .. }));
    }

    #[test]
    fn duplicate_tag_aborts_the_trace() {
        let fixture = TraceFixture::from_json(
            r#"{
                "version": "v1",
                "name": "duplicate-tag",
                "arena_bytes": 200,
                "ops": [
                    {"op": "alloc", "size": 10, "tag": "a"},
                    {"op": "alloc", "size": 10, "tag": "a"}
                ]
            }"#,
        )
        .unwrap();
        let err = TraceRunner::new().run(&fixture).unwrap_err();
        assert!(matches!(err, TraceError::DuplicateTag { index: 1, .. }));
    }

    #[test]
    fn undersized_arena_aborts_the_trace() {
        let fixture = TraceFixture::from_json(
            r#"{"version": "v1", "name": "tiny", "arena_bytes": 10, "ops": []}"#,
        )
        .unwrap();
        let err = TraceRunner::new().run(&fixture).unwrap_err();
        assert!(matches!(
            err,
            TraceError::Heap(HeapError::InsufficientArena {
                requested: 10,
                minimum: 24
            })
        ));
    }

    #[test]
    fn digest_is_stable_for_equal_transcripts() {
        assert_eq!(transcript_digest(""), transcript_digest(""));
        assert_eq!(
            transcript_digest("0\t24\theader\n"),
            transcript_digest("0\t24\theader\n")
        );
        assert_ne!(transcript_digest("a"), transcript_digest("b"));
    }
}
