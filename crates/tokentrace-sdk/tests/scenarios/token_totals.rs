//! Token Total Tests
//!
//! Verifies the session maximum and current total read straight from a
//! transcript, including incremental reads of a growing file.

use anyhow::Result;
use std::io::Write;
use tokentrace_sdk::{
    Allocation, Client, Confidence, MemoryStore, Measure, TokenUsage, get_current_token_total,
    get_session_maximum_tokens,
};
use tokentrace_testing::TranscriptBuilder;

#[test]
fn test_two_usage_records() -> Result<()> {
    let file = TranscriptBuilder::new()
        .usage_only("m1", 100, TokenUsage::new(10, 5, 0, 0))
        .usage_only("m2", 200, TokenUsage::new(20, 5, 100, 0))
        .write_temp()?;
    let client = Client::new(MemoryStore::new());

    assert_eq!(client.session_maximum_tokens(file.path()), 125);
    assert_eq!(client.current_token_total(file.path()), 125);

    let bundles = client.correlate_operations("s", Some(file.path()));
    assert_eq!(bundles.len(), 2);
    assert!(
        bundles
            .iter()
            .flat_map(|b| &b.operations)
            .all(|op| op.allocation == Allocation::Exact)
    );
    Ok(())
}

#[test]
fn test_empty_transcript() -> Result<()> {
    let file = TranscriptBuilder::new().write_temp()?;
    let client = Client::new(MemoryStore::new());

    assert!(client.correlate_operations("s", Some(file.path())).is_empty());
    assert_eq!(client.session_maximum_tokens(file.path()), 0);
    assert_eq!(client.current_token_total(file.path()), 0);
    Ok(())
}

#[test]
fn test_maximum_is_running_maximum_not_last() -> Result<()> {
    let file = TranscriptBuilder::new()
        .usage_only("m1", 100, TokenUsage::new(40, 10, 0, 0))
        .usage_only("m2", 200, TokenUsage::new(200, 20, 0, 80))
        .usage_only("m3", 300, TokenUsage::new(90, 10, 0, 0))
        .user("u1", 400, "no usage on this line")
        .write_temp()?;

    assert_eq!(get_session_maximum_tokens(file.path()), 300);
    assert_eq!(get_current_token_total(file.path()), 100);
    Ok(())
}

#[test]
fn test_prefix_maximum_never_exceeds_full_maximum() -> Result<()> {
    let builder = TranscriptBuilder::new()
        .usage_only("m1", 1, TokenUsage::new(5, 1, 0, 0))
        .usage_only("m2", 2, TokenUsage::new(500, 1, 0, 0))
        .usage_only("m3", 3, TokenUsage::new(7, 1, 0, 0))
        .usage_only("m4", 4, TokenUsage::new(900, 1, 0, 0));
    let full = builder.build();
    let full_file = builder.write_temp()?;
    let full_max = get_session_maximum_tokens(full_file.path());
    assert_eq!(full_max, 901);

    let lines: Vec<&str> = full.lines().collect();
    for end in 1..=lines.len() {
        let mut prefix = tempfile::NamedTempFile::new()?;
        writeln!(prefix, "{}", lines[..end].join("\n"))?;
        prefix.flush()?;
        assert!(get_session_maximum_tokens(prefix.path()) <= full_max);
    }
    Ok(())
}

#[test]
fn test_message_usage_counts_like_top_level_usage() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        r#"{{"type":"assistant","uuid":"a","timestamp":"2025-01-01T00:00:00Z","message":{{"role":"assistant","content":"hi","usage":{{"input_tokens":3,"output_tokens":4,"cache_read_input_tokens":5}}}}}}"#
    )?;
    file.flush()?;

    assert_eq!(get_current_token_total(file.path()), 12);
    assert_eq!(get_session_maximum_tokens(file.path()), 12);
    Ok(())
}

#[test]
fn test_missing_transcript_reads_zero() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.jsonl");
    let client = Client::new(MemoryStore::new());

    assert_eq!(client.session_maximum_tokens(&missing), 0);
    assert_eq!(client.current_token_total(&missing), 0);
    assert!(client.correlate_operations("s", Some(&missing)).is_empty());
}

#[test]
fn test_unparseable_transcript_falls_back_to_size_estimate() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    for _ in 0..10 {
        writeln!(file, "{}", "#".repeat(99))?;
    }
    file.flush()?;

    let client = Client::new(MemoryStore::new());
    let reading = client.token_reading(file.path(), Measure::SessionMaximum);
    assert_eq!(reading.tokens, 10);
    assert_eq!(reading.confidence, Confidence::Estimated);
    Ok(())
}

#[test]
fn test_growing_transcript_is_read_incrementally() -> Result<()> {
    let mut file = TranscriptBuilder::new()
        .usage_only("m1", 100, TokenUsage::new(100, 0, 0, 0))
        .write_temp()?;
    let client = Client::new(MemoryStore::new());
    assert_eq!(client.session_maximum_tokens(file.path()), 100);

    let appended = TranscriptBuilder::new()
        .usage_only("m2", 200, TokenUsage::new(400, 0, 0, 0))
        .usage_only("m3", 300, TokenUsage::new(50, 0, 0, 0))
        .build();
    file.write_all(appended.as_bytes())?;
    file.flush()?;

    assert_eq!(client.session_maximum_tokens(file.path()), 400);
    assert_eq!(client.current_token_total(file.path()), 50);
    Ok(())
}
