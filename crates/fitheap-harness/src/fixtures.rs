//! Trace fixture loading and management.
//!
//! A fixture is a JSON script of allocator operations plus the arena it
//! runs in. Allocations bind their resulting payload offset to a tag so
//! later frees can name it; `free_at` releases a literal offset instead,
//! which is how scripts probe foreign-pointer handling.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::runner::TraceError;

/// One scripted allocator operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceOp {
    /// Request `size` payload bytes and bind the result to `tag`.
    ///
    /// The size is signed so scripts can probe negative requests; those
    /// are rejected at the harness boundary and recorded as failures.
    Alloc { size: i64, tag: String },
    /// Release the offset bound to `tag`.
    Free { tag: String },
    /// Release the null offset.
    FreeNull,
    /// Release a literal offset.
    FreeAt { offset: usize },
    /// Append the rendered layout to the transcript.
    Dump,
}

/// A scripted allocator session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceFixture {
    /// Schema version.
    pub version: String,
    /// Trace identifier.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Arena size handed to the allocator.
    pub arena_bytes: usize,
    /// Free policy name; lenient when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    /// Operations in execution order.
    pub ops: Vec<TraceOp>,
    /// Pinned transcript for verification, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

impl TraceFixture {
    /// Loads a fixture from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Loads a fixture from a file.
    pub fn from_file(path: &Path) -> Result<Self, TraceError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }
}

/// Expected transcript for [`demo_fixture`]: one rendered layout per dump,
/// each followed by a blank separator line.
const DEMO_EXPECTED: &str = concat!(
    "0\t24\theader\n24\t30\tallocated\n54\t24\theader\n78\t122\tfree\n\n",
    "0\t24\theader\n24\t30\tallocated\n54\t24\theader\n78\t40\tallocated\n",
    "118\t24\theader\n142\t58\tfree\n\n",
    "0\t24\theader\n24\t30\tallocated\n54\t24\theader\n78\t40\tallocated\n",
    "118\t24\theader\n142\t30\tallocated\n172\t24\theader\n196\t4\tfree\n\n",
    "0\t24\theader\n24\t30\tfree\n54\t24\theader\n78\t40\tallocated\n",
    "118\t24\theader\n142\t30\tallocated\n172\t24\theader\n196\t4\tfree\n\n",
    "0\t24\theader\n24\t94\tfree\n118\t24\theader\n142\t30\tallocated\n",
    "172\t24\theader\n196\t4\tfree\n\n",
    "0\t24\theader\n24\t176\tfree\n\n",
);

/// The classic walkthrough: a 200-byte arena, three allocations, three
/// frees, a layout dump after every operation. The final dump shows the
/// arena recoalesced into a single 176-byte free block.
#[must_use]
pub fn demo_fixture() -> TraceFixture {
    fn alloc(size: i64, tag: &str) -> TraceOp {
        TraceOp::Alloc {
            size,
            tag: String::from(tag),
        }
    }
    fn free(tag: &str) -> TraceOp {
        TraceOp::Free {
            tag: String::from(tag),
        }
    }
    TraceFixture {
        version: String::from("v1"),
        name: String::from("demo-200"),
        description: Some(String::from(
            "Split and recoalesce walkthrough over a 200-byte arena",
        )),
        arena_bytes: 200,
        policy: None,
        ops: vec![
            alloc(30, "a"),
            TraceOp::Dump,
            alloc(40, "b"),
            TraceOp::Dump,
            alloc(30, "c"),
            TraceOp::Dump,
            free("a"),
            TraceOp::Dump,
            free("b"),
            TraceOp::Dump,
            free("c"),
            TraceOp::Dump,
        ],
        expected: Some(String::from(DEMO_EXPECTED)),
    }
}
