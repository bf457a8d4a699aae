//! Transcript reading tests over generated JSONL files.

use anyhow::Result;
use serde_json::json;
use tokentrace_testing::{TestWorld, TranscriptBuilder, uuid_for};
use tokentrace_transcript::{
    MessageKind, TranscriptReader, classify, list_transcripts, read_transcript,
};
use tokentrace_types::TokenUsage;

#[test]
fn test_roles_of_a_linked_session() -> Result<()> {
    let file = TranscriptBuilder::new()
        .linked()
        .system("sys", 10, "session started")
        .user("u1", 100, "what time is it")
        .tool_use("a1", 200, "toolu_1", "Bash", json!({"command": "date"}), None)
        .tool_result("r1", 300, "toolu_1", "Mon Jan  1 00:00:00 UTC 2025")
        .assistant("a2", 400, "midnight", Some(TokenUsage::new(10, 2, 0, 0)))
        .write_temp()?;

    let records = read_transcript(file.path())?;
    let kinds: Vec<MessageKind> = records.iter().map(classify).collect();
    assert_eq!(
        kinds,
        vec![
            MessageKind::System,
            MessageKind::User,
            MessageKind::Assistant,
            MessageKind::ToolResult,
            MessageKind::Assistant,
        ]
    );

    assert_eq!(records[2].parent_uuid(), Some(uuid_for("u1").as_str()));
    assert_eq!(records[4].effective_usage(), Some(TokenUsage::new(10, 2, 0, 0)));
    Ok(())
}

#[test]
fn test_truncated_tail_line_is_skipped() -> Result<()> {
    let file = TranscriptBuilder::new()
        .user("u1", 1, "first")
        .raw_line("not json")
        .user("u2", 2, "second")
        .raw_line(r#"{"id":"u3","timestamp":3,"content":{"message":{"role":"us"#)
        .write_temp()?;

    let mut reader = TranscriptReader::open(file.path())?;
    let ids: Vec<String> = reader.by_ref().map(|r| r.id).collect();
    assert_eq!(ids, vec!["u1", "u2"]);
    assert_eq!(reader.stats().parsed, 2);
    assert_eq!(reader.stats().skipped, 2);
    Ok(())
}

#[test]
fn test_sidechain_flag_survives_reading() -> Result<()> {
    let file = TranscriptBuilder::new()
        .user("u1", 1, "main")
        .sidechain()
        .user("s1", 2, "side")
        .main_line()
        .user("u2", 3, "main again")
        .write_temp()?;

    let flags: Vec<bool> = read_transcript(file.path())?
        .iter()
        .map(|r| r.is_sidechain)
        .collect();
    assert_eq!(flags, vec![false, true, false]);
    Ok(())
}

#[test]
fn test_listing_skips_empty_and_foreign_files() -> Result<()> {
    let world = TestWorld::new()
        .with_transcript("-a", "one", &TranscriptBuilder::new().user("u", 1, "x"))
        .with_transcript("-b", "two", &TranscriptBuilder::new().user("u", 1, "y"))
        .with_transcript("-b", "empty", &TranscriptBuilder::new());
    std::fs::write(world.transcripts_root().join("-a").join("notes.txt"), "hello")?;

    let mut sessions: Vec<String> = list_transcripts(world.transcripts_root())?
        .into_iter()
        .map(|t| t.session_id)
        .collect();
    sessions.sort();
    assert_eq!(sessions, vec!["one", "two"]);
    Ok(())
}
