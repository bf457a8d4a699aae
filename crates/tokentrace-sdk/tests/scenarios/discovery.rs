//! Transcript Discovery Tests
//!
//! Verifies that sessions are located under the transcripts root by id.

use anyhow::Result;
use tokentrace_sdk::{Client, MemoryStore};
use tokentrace_testing::{TestWorld, TranscriptBuilder};

#[test]
fn test_find_transcript_across_projects() -> Result<()> {
    let transcript = TranscriptBuilder::new().user("u1", 1, "hello");
    let world = TestWorld::new()
        .with_transcript("-home-me-alpha", "sess-a", &transcript)
        .with_transcript("-home-me-beta", "sess-b", &transcript);

    let client = Client::builder()
        .transcripts_root(world.transcripts_root())
        .store(MemoryStore::new())
        .build();

    assert_eq!(
        client.find_transcript("sess-b")?,
        Some(world.transcript_path("-home-me-beta", "sess-b"))
    );
    assert_eq!(client.find_transcript("sess-c")?, None);
    Ok(())
}

#[test]
fn test_correlate_session_by_id() -> Result<()> {
    let world = TestWorld::new().with_transcript(
        "-home-me-alpha",
        "sess-a",
        &TranscriptBuilder::new().user("u1", 1, "hello").user("u2", 2, "again"),
    );
    let client = Client::builder()
        .transcripts_root(world.transcripts_root())
        .build();

    let bundles = client.correlate_session("sess-a")?;
    assert_eq!(bundles.len(), 2);
    assert!(!client.store_available());
    Ok(())
}
