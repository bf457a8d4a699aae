use serde_json::json;
use tokentrace_engine::{
    EngineOptions, correlate_operations, linked_operations, summarize_bundles,
};
use tokentrace_store::{MemoryStore, UnavailableStore};
use tokentrace_testing::assertions::{assert_allocation, assert_bundle_ids, assert_bundle_totals};
use tokentrace_testing::{TestStore, TranscriptBuilder};
use tokentrace_types::{Allocation, Bundle, OperationKind, RawOperation, TokenUsage};

fn correlate(transcript: &TranscriptBuilder, store: &MemoryStore) -> Vec<Bundle> {
    let file = transcript.write_temp().unwrap();
    correlate_operations(store, "s", file.path(), &EngineOptions::default())
}

#[test]
fn test_usage_only_records_become_exact_bundles() {
    let transcript = TranscriptBuilder::new()
        .usage_only("m1", 100, TokenUsage::new(10, 5, 0, 0))
        .usage_only("m2", 200, TokenUsage::new(20, 5, 100, 0));
    let bundles = correlate(&transcript, &MemoryStore::new());

    assert_bundle_ids(&bundles, &["m1", "m2"]).unwrap();
    assert_allocation(&bundles, "m1", Allocation::Exact).unwrap();
    assert_allocation(&bundles, "m2", Allocation::Exact).unwrap();
    assert_eq!(bundles[1].operations[0].context_growth, 100);

    insta::assert_json_snapshot!(bundles, @r#"
    [
      {
        "id": "m1",
        "timestamp": 100,
        "operations": [
          {
            "tool": "Assistant",
            "kind": "assistant",
            "tokens": 5,
            "generation_cost": 5,
            "context_growth": 0,
            "allocation": "exact",
            "response_size": 0,
            "timestamp": 100,
            "elapsed_ms": 0,
            "session_id": "s",
            "content_part_index": 0
          }
        ],
        "total_tokens": 5,
        "is_sidechain": false
      },
      {
        "id": "m2",
        "timestamp": 200,
        "operations": [
          {
            "tool": "Assistant",
            "kind": "assistant",
            "tokens": 5,
            "generation_cost": 5,
            "context_growth": 100,
            "allocation": "exact",
            "response_size": 0,
            "timestamp": 200,
            "elapsed_ms": 100,
            "session_id": "s",
            "content_part_index": 0
          }
        ],
        "total_tokens": 5,
        "is_sidechain": false
      }
    ]
    "#);
}

#[test]
fn test_empty_and_missing_transcripts() {
    let bundles = correlate(&TranscriptBuilder::new(), &MemoryStore::new());
    assert!(bundles.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.jsonl");
    let bundles =
        correlate_operations(&MemoryStore::new(), "s", &missing, &EngineOptions::default());
    assert!(bundles.is_empty());
}

#[test]
fn test_malformed_lines_are_skipped() {
    let transcript = TranscriptBuilder::new()
        .user("u1", 100, "hello")
        .raw_line("{\"id\":\"broken\",\"timest")
        .raw_line("")
        .assistant("a1", 200, "hi", Some(TokenUsage::new(3, 4, 0, 0)));
    let bundles = correlate(&transcript, &MemoryStore::new());
    assert_bundle_ids(&bundles, &["u1", "a1"]).unwrap();
}

#[test]
fn test_totals_match_operations() {
    let transcript = TranscriptBuilder::new()
        .system("sys", 50, "You are a helpful assistant with a long preamble.")
        .user("u1", 100, "please read the file")
        .tool_use(
            "a1",
            200,
            "toolu_1",
            "Read",
            json!({"file_path": "/tmp/x"}),
            Some(TokenUsage::new(0, 17, 0, 0)),
        )
        .tool_result("r1", 300, "toolu_1", "file contents here")
        .assistant("a2", 400, "done", None);
    let bundles = correlate(&transcript, &MemoryStore::new());

    assert_eq!(bundles.len(), 5);
    assert_bundle_totals(&bundles).unwrap();
    assert_allocation(&bundles, "a1", Allocation::Exact).unwrap();
    assert_allocation(&bundles, "a2", Allocation::Estimated).unwrap();

    let summary = summarize_bundles(&bundles);
    assert_eq!(summary.bundle_count, 5);
    assert_eq!(summary.tokens.exact, 17);
    assert_eq!(
        summary.tokens.total,
        bundles.iter().map(|b| b.total_tokens).sum::<u64>()
    );
}

#[test]
fn test_store_usage_makes_tool_response_exact() {
    let transcript = TranscriptBuilder::new()
        .tool_use("a1", 200, "toolu_1", "Read", json!({"file_path": "/big"}), None)
        .tool_result("r1", 300, "toolu_1", "truncated");
    let store = TestStore::new("s")
        .tool_response(250, "Read", "toolu_1", 12_595, Some(TokenUsage::new(0, 40, 0, 0)))
        .build();
    let bundles = correlate(&transcript, &store);

    let response = &bundles[1].operations[0];
    assert_eq!(response.kind, OperationKind::ToolResponse);
    assert_eq!(response.tool, "Read");
    assert_eq!(response.tokens, 40);
    assert_eq!(response.allocation, Allocation::Exact);
    assert_eq!(response.response_size, 12_595);
    assert_eq!(response.details.as_deref(), Some("12.3 KB · ~3.4k tokens"));

    assert_allocation(&bundles, "a1", Allocation::Estimated).unwrap();
}

#[test]
fn test_store_without_usage_estimates_from_response_size() {
    let transcript = TranscriptBuilder::new()
        .tool_use("a1", 200, "toolu_1", "Bash", json!({"command": "ls"}), None)
        .tool_result("r1", 300, "toolu_1", "x");
    let store = TestStore::new("s")
        .tool_response(250, "Bash", "toolu_1", 370, None)
        .raw_document(260, "{not json")
        .build();
    let bundles = correlate(&transcript, &store);

    let response = &bundles[1].operations[0];
    assert_eq!(response.tokens, 100);
    assert_eq!(response.allocation, Allocation::Estimated);
}

#[test]
fn test_operation_bound_to_tool_use_is_charged_once() {
    let transcript = TranscriptBuilder::new()
        .tool_use("a1", 200, "toolu_1", "Read", json!({"file_path": "/a"}), None)
        .tool_result("r1", 300, "toolu_1", "contents");
    let store = TestStore::new("s")
        .operation(
            200,
            RawOperation {
                tool: "Read".to_string(),
                message_id: Some("msg_a1".to_string()),
                tool_use_id: Some("toolu_1".to_string()),
                usage: Some(TokenUsage::new(0, 40, 0, 0)),
                ..Default::default()
            },
        )
        .build();
    let bundles = correlate(&transcript, &store);

    assert_allocation(&bundles, "a1", Allocation::Estimated).unwrap();
    assert_allocation(&bundles, "r1", Allocation::Exact).unwrap();
    assert_eq!(bundles[1].total_tokens, 40);

    let summary = summarize_bundles(&bundles);
    assert_eq!(summary.tokens.exact, 40);
}

#[test]
fn test_extreme_timestamps_do_not_overflow() {
    let transcript = TranscriptBuilder::new()
        .user("u1", i64::MIN, "first")
        .user("u2", 1, "second")
        .user("u3", i64::MAX, "third");
    let bundles = correlate(&transcript, &MemoryStore::new());

    assert_bundle_ids(&bundles, &["u1", "u2", "u3"]).unwrap();
    assert_eq!(bundles[1].operations[0].elapsed_ms, i64::MAX as u64);
    assert_eq!(bundles[2].operations[0].elapsed_ms, (i64::MAX - 1) as u64);
    assert_eq!(summarize_bundles(&bundles).duration_ms, i64::MAX);
}

#[test]
fn test_unavailable_store_degrades_to_estimates() {
    let transcript = TranscriptBuilder::new()
        .tool_use("a1", 200, "toolu_1", "Read", json!({}), None)
        .tool_result("r1", 300, "toolu_1", "0123456789");
    let file = transcript.write_temp().unwrap();

    for store in [
        Box::new(UnavailableStore) as Box<dyn tokentrace_store::OperationStore>,
        Box::new(
            TestStore::new("s")
                .tool_response(250, "Read", "toolu_1", 10_000, None)
                .unavailable()
                .build(),
        ),
    ] {
        let bundles =
            correlate_operations(store.as_ref(), "s", file.path(), &EngineOptions::default());
        assert_eq!(bundles.len(), 2);
        let response = &bundles[1].operations[0];
        assert_eq!(response.allocation, Allocation::Estimated);
        assert_eq!(response.response_size, 10);
        assert!(response.details.is_none());
    }
}

#[test]
fn test_parent_graph_orders_depth_first() {
    // u1 ─┬─ a1 ── r1
    //     └─ a2
    let transcript = TranscriptBuilder::new()
        .parent(None)
        .user("u1", 500, "start")
        .parent(Some("u1"))
        .assistant("a1", 100, "first", None)
        .parent(Some("u1"))
        .assistant("a2", 50, "second", None)
        .parent(Some("a1"))
        .user("r1", 10, "follow-up");
    let bundles = correlate(&transcript, &MemoryStore::new());
    assert_bundle_ids(&bundles, &["u1", "a1", "r1", "a2"]).unwrap();
}

#[test]
fn test_timestamp_order_without_graph() {
    let transcript = TranscriptBuilder::new()
        .user("late", 300, "c")
        .user("early", 100, "a")
        .user("tie", 100, "b");
    let bundles = correlate(&transcript, &MemoryStore::new());
    assert_bundle_ids(&bundles, &["early", "tie", "late"]).unwrap();
}

fn delegating_session() -> TranscriptBuilder {
    TranscriptBuilder::new()
        .linked()
        .user("u1", 100, "investigate the bug")
        .task("a1", 200, "toolu_task", "find the failing test", "Explore")
}

#[test]
fn test_sub_agent_bundle_follows_delegation() {
    let transcript = delegating_session()
        .sidechain()
        .parent(None)
        .user("s1", 300, "find the failing test")
        .assistant("s2", 350, "found it", Some(TokenUsage::new(50, 7, 0, 0)))
        .main_line()
        .parent(Some("a1"))
        .tool_result("r1", 400, "toolu_task", "the test is flaky");
    let bundles = correlate(&transcript, &MemoryStore::new());

    assert_bundle_ids(&bundles, &["u1", "a1", "toolu_task-subagent", "r1"]).unwrap();
    assert_bundle_totals(&bundles).unwrap();

    let sub = &bundles[2];
    let info = sub.sub_agent.as_ref().unwrap();
    assert_eq!(info.sub_agent_type, "Explore");
    assert_eq!(info.parent_task_id, "toolu_task");
    assert_eq!(info.operation_count, 2);
    assert_eq!(info.duration_ms, 50);
    assert_eq!(sub.timestamp, 300);
    assert!(sub.operations.iter().all(|op| {
        op.parent_task_id.as_deref() == Some("toolu_task")
            && op.sub_agent_type.as_deref() == Some("Explore")
    }));

    let linked = linked_operations(&bundles, "toolu_task");
    let kinds: Vec<OperationKind> = linked.iter().map(|op| op.kind).collect();
    assert_eq!(
        kinds,
        vec![
            OperationKind::Assistant,
            OperationKind::User,
            OperationKind::Assistant,
            OperationKind::ToolResponse
        ]
    );
}

#[test]
fn test_delegation_without_sidechain_records() {
    let transcript = delegating_session().tool_result("r1", 400, "toolu_task", "nothing happened");
    let bundles = correlate(&transcript, &MemoryStore::new());

    assert_bundle_ids(&bundles, &["u1", "a1", "r1"]).unwrap();
    assert!(bundles.iter().all(|b| !b.is_sub_agent()));
    assert_eq!(bundles[1].operations.len(), 1);
    assert_eq!(bundles[1].operations[0].tool, "Task");
}

#[test]
fn test_unanswered_delegation_is_not_folded() {
    let transcript = delegating_session()
        .sidechain()
        .parent(None)
        .user("s1", 300, "find the failing test");
    let bundles = correlate(&transcript, &MemoryStore::new());
    assert_bundle_ids(&bundles, &["u1", "a1"]).unwrap();
}

#[test]
fn test_self_referential_sidechain_terminates() {
    let transcript = delegating_session()
        .sidechain()
        .parent(Some("s1"))
        .user("s1", 300, "find the failing test")
        .main_line()
        .parent(Some("a1"))
        .tool_result("r1", 400, "toolu_task", "done");
    let bundles = correlate(&transcript, &MemoryStore::new());

    let sub = bundles.iter().find(|b| b.is_sub_agent()).unwrap();
    assert_eq!(sub.operations.len(), 1);
    assert_eq!(sub.sub_agent.as_ref().unwrap().operation_count, 1);
    assert_eq!(sub.sub_agent.as_ref().unwrap().duration_ms, 0);
}

#[test]
fn test_sub_agent_duration_saturates() {
    let transcript = delegating_session()
        .sidechain()
        .parent(None)
        .user("s1", i64::MIN, "find the failing test")
        .assistant("s2", i64::MAX, "found it", None)
        .main_line()
        .parent(Some("a1"))
        .tool_result("r1", 400, "toolu_task", "done");
    let bundles = correlate(&transcript, &MemoryStore::new());

    let sub = bundles.iter().find(|b| b.is_sub_agent()).unwrap();
    assert_eq!(sub.sub_agent.as_ref().unwrap().duration_ms, i64::MAX);
}
