use tokentrace_store::RawOperationIndex;
use tokentrace_types::{Bundle, EstimationConfig, OperationKind, format_bytes, format_tokens};

/// Attach a size / estimated-token description to every tool response that
/// was paired with a captured operation, e.g. `"12.3 KB · ~3.3k tokens"`.
///
/// Operations that already carry details are left alone.
pub fn enrich_details(
    bundles: &mut [Bundle],
    index: &RawOperationIndex,
    estimation: &EstimationConfig,
) {
    if index.is_empty() {
        return;
    }
    for op in bundles.iter_mut().flat_map(|b| b.operations.iter_mut()) {
        if op.kind != OperationKind::ToolResponse || op.details.is_some() {
            continue;
        }
        let tool_use_id = op.tool_use_id.as_deref();
        let Some(raw) = index.find(tool_use_id, op.message_id.as_deref(), op.timestamp) else {
            continue;
        };
        let size = raw.size_bytes();
        op.details = Some(format!(
            "{} · ~{} tokens",
            format_bytes(size),
            format_tokens(estimation.tokens_for_bytes(size))
        ));
    }
}
