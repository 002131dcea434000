//! End-to-end trace flows: JSON fixture in, transcript and logs out.

use fitheap_core::FreePolicy;
use fitheap_harness::fixtures::{TraceFixture, demo_fixture};
use fitheap_harness::oplog::{LogEmitter, validate_log_line};
use fitheap_harness::report::render_report;
use fitheap_harness::runner::TraceRunner;

/// The walkthrough transcript, pinned independently of the fixture module.
const WALKTHROUGH: &str = concat!(
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

#[test]
fn demo_script_from_raw_json_reproduces_the_walkthrough() {
    let fixture = TraceFixture::from_json(
        r#"{
            "version": "v1",
            "name": "walkthrough",
            "arena_bytes": 200,
            "ops": [
                {"op": "alloc", "size": 30, "tag": "a"},
                {"op": "dump"},
                {"op": "alloc", "size": 40, "tag": "b"},
                {"op": "dump"},
                {"op": "alloc", "size": 30, "tag": "c"},
                {"op": "dump"},
                {"op": "free", "tag": "a"},
                {"op": "dump"},
                {"op": "free", "tag": "b"},
                {"op": "dump"},
                {"op": "free", "tag": "c"},
                {"op": "dump"}
            ]
        }"#,
    )
    .unwrap();

    let outcome = TraceRunner::new().run(&fixture).unwrap();
    assert_eq!(outcome.transcript, WALKTHROUGH);
    assert_eq!(outcome.failures, 0);
}

#[test]
fn probe_scripts_render_identically_under_both_policies() {
    let json = r#"{
        "version": "v1",
        "name": "probes",
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
    }"#;
    let fixture = TraceFixture::from_json(json).unwrap();

    let lenient = TraceRunner::with_policy(FreePolicy::Lenient)
        .run(&fixture)
        .unwrap();
    let strict = TraceRunner::with_policy(FreePolicy::Strict)
        .run(&fixture)
        .unwrap();

    // Invalid frees never touch the arena, so the rendered layouts agree;
    // the policies differ only in how the operations are classified.
    assert_eq!(lenient.transcript, strict.transcript);
    assert_eq!(lenient.failures, 0);
    assert_eq!(strict.failures, 3);
}

#[test]
fn fixtures_roundtrip_through_files_and_verify() {
    let path = std::env::temp_dir().join(format!("fitheap-fixture-{}.json", std::process::id()));
    std::fs::write(&path, demo_fixture().to_json().unwrap()).unwrap();

    let fixture = TraceFixture::from_file(&path).unwrap();
    let (outcome, result) = TraceRunner::new().verify(&fixture).unwrap();
    assert!(result.passed);
    assert_eq!(outcome.transcript, WALKTHROUGH);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn lifecycle_logs_written_to_disk_validate_line_by_line() {
    let path = std::env::temp_dir().join(format!("fitheap-log-{}.jsonl", std::process::id()));
    let outcome = TraceRunner::new().run(&demo_fixture()).unwrap();

    let mut emitter = LogEmitter::to_file(&path, &outcome.name).unwrap();
    for event in &outcome.events {
        emitter.emit_heap_event(event).unwrap();
    }
    emitter.flush().unwrap();
    drop(emitter);

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), outcome.events.len());
    for (number, line) in lines.iter().enumerate() {
        let entry = validate_log_line(line, number + 1).unwrap();
        assert!(entry.trace_id.starts_with("heap::"));
    }

    let _ = std::fs::remove_file(&path);
}

#[test]
fn failed_verification_surfaces_in_the_report() {
    let mut fixture = demo_fixture();
    fixture.expected = Some(String::from("0\t24\theader\n24\t176\tfree\n\n"));

    let (_, result) = TraceRunner::new().verify(&fixture).unwrap();
    assert!(!result.passed);

    let report = render_report("fitheap verification", &[result]);
    assert!(report.contains("| demo-200 | lenient | FAIL |"));
    assert!(report.contains("## demo-200"));
    assert!(report.contains("- failed: 1"));
}
