//! Markdown verification reports.

use crate::runner::{VerificationResult, transcript_digest};

/// Renders a markdown summary for a set of verification results, with a
/// diff section per failed case. Transcripts are shown as truncated
/// SHA-256 digests to keep the table readable.
#[must_use]
pub fn render_report(title: &str, results: &[VerificationResult]) -> String {
    let passed = results.iter().filter(|result| result.passed).count();
    let mut out = String::new();
    out.push_str(&format!("# {title}\n\n"));
    out.push_str(&format!(
        "- cases: {}\n- passed: {passed}\n- failed: {}\n\n",
        results.len(),
        results.len() - passed
    ));
    out.push_str("| case | policy | status | expected digest | actual digest |\n");
    out.push_str("|------|--------|--------|-----------------|---------------|\n");
    for result in results {
        out.push_str(&format!(
            "| {} | {} | {} | `{}` | `{}` |\n",
            result.case_name,
            result.policy,
            if result.passed { "pass" } else { "FAIL" },
            short_digest(&result.expected),
            short_digest(&result.actual),
        ));
    }
    for result in results.iter().filter(|result| !result.passed) {
        if let Some(diff) = &result.diff {
            out.push_str(&format!("\n## {}\n\n```\n{diff}```\n", result.case_name));
        }
    }
    out
}

fn short_digest(transcript: &str) -> String {
    let mut digest = transcript_digest(transcript);
    digest.truncate(12);
    digest
}
