//! Correlation Tests
//!
//! Verifies the client facade against transcripts and operation stores:
//! store pairing, snapshot-backed stores, sub-agent folding and linking.

use anyhow::Result;
use serde_json::json;
use tokentrace_sdk::{
    Allocation, Client, Config, MemoryStore, OperationKind, TokenUsage, UnavailableStore,
    correlate_operations, linked_operations, summarize_bundles,
};
use tokentrace_testing::{TestStore, TestWorld, TranscriptBuilder};

fn read_session() -> TranscriptBuilder {
    TranscriptBuilder::new()
        .linked()
        .user("u1", 1_000, "read the config")
        .tool_use(
            "a1",
            2_000,
            "toolu_read",
            "Read",
            json!({"file_path": "/etc/app.toml"}),
            Some(TokenUsage::new(1_200, 30, 400, 0)),
        )
        .tool_result("r1", 3_000, "toolu_read", "[server]\nport = 8080")
        .assistant(
            "a2",
            4_000,
            "The server listens on 8080.",
            Some(TokenUsage::new(1_300, 12, 0, 1_200)),
        )
}

#[test]
fn test_snapshot_store_from_config() -> Result<()> {
    let world = TestWorld::new().with_transcript("-srv-app", "sess-1", &read_session());
    let snapshot = world.write_snapshot(
        "store.json",
        &TestStore::new("sess-1").tool_response(
            3_000,
            "Read",
            "toolu_read",
            2_048,
            Some(TokenUsage::new(0, 512, 0, 0)),
        ),
    )?;

    let config_path = world.write_config(&format!(
        "transcripts_root = {:?}\n\n[store]\nsnapshot_path = {:?}\n",
        world.transcripts_root().display().to_string(),
        snapshot.display().to_string()
    ))?;
    let client = Client::connect(&config_path)?;
    assert!(client.store_available());

    let bundles = client.correlate_session("sess-1")?;
    let ids: Vec<&str> = bundles.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "a1", "r1", "a2"]);

    let response = &bundles[2].operations[0];
    assert_eq!(response.kind, OperationKind::ToolResponse);
    assert_eq!(response.tokens, 512);
    assert_eq!(response.allocation, Allocation::Exact);
    assert_eq!(response.details.as_deref(), Some("2.0 KB · ~554 tokens"));
    Ok(())
}

#[test]
fn test_same_session_without_store() -> Result<()> {
    let file = read_session().write_temp()?;
    let bundles = correlate_operations(&UnavailableStore, "sess-1", Some(file.path()));

    let response = &bundles[2].operations[0];
    assert_eq!(response.tool, "Read");
    assert_eq!(response.allocation, Allocation::Estimated);
    assert!(response.details.is_none());

    let summary = summarize_bundles(&bundles);
    assert_eq!(summary.tokens.exact, 42);
    assert_eq!(summary.tokens.context_growth, 400);
    Ok(())
}

#[test]
fn test_unknown_session_is_not_found() {
    let world = TestWorld::new();
    let client = Client::builder()
        .config(Config::default())
        .transcripts_root(world.transcripts_root())
        .store(MemoryStore::new())
        .build();
    assert!(matches!(
        client.correlate_session("nope"),
        Err(tokentrace_sdk::Error::NotFound(_))
    ));
}

#[test]
fn test_sub_agent_run_is_linked_to_its_task() -> Result<()> {
    let file = TranscriptBuilder::new()
        .linked()
        .user("u1", 100, "audit the repo")
        .task("a1", 200, "toolu_task", "list every TODO", "general-purpose")
        .sidechain()
        .parent(None)
        .user("s1", 300, "list every TODO")
        .tool_use(
            "s2",
            310,
            "toolu_grep",
            "Grep",
            json!({"pattern": "TODO"}),
            Some(TokenUsage::new(10, 9, 0, 0)),
        )
        .tool_result("s3", 320, "toolu_grep", "src/lib.rs:12: TODO")
        .assistant("s4", 330, "one TODO found", Some(TokenUsage::new(20, 6, 0, 0)))
        .main_line()
        .parent(Some("a1"))
        .tool_result("r1", 400, "toolu_task", "one TODO found")
        .write_temp()?;

    let client = Client::new(MemoryStore::new());
    let bundles = client.correlate_operations("s", Some(file.path()));

    let ids: Vec<&str> = bundles.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "a1", "toolu_task-subagent", "r1"]);

    let sub = &bundles[2];
    let info = sub.sub_agent.as_ref().unwrap();
    assert_eq!(info.operation_count, 4);
    assert_eq!(info.duration_ms, 30);
    assert_eq!(
        sub.total_tokens,
        sub.operations.iter().map(|op| op.tokens).sum::<u64>()
    );

    let linked = linked_operations(&bundles, "toolu_task");
    assert_eq!(linked.len(), 6);
    assert!(linked.iter().any(|op| op.tool == "Grep"));
    Ok(())
}
