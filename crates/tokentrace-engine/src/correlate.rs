use std::path::Path;

use serde::{Deserialize, Serialize};
use tokentrace_store::{OperationStore, RawOperationIndex};
use tokentrace_transcript::read_transcript;
use tokentrace_types::{Bundle, EstimationConfig, Operation, TranscriptRecord};

use crate::enrich::enrich_details;
use crate::factory::OperationFactory;
use crate::ordering::order_bundles;
use crate::subagent::fold_sub_agents;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub estimation: EstimationConfig,
}

/// Correlate a session's transcript with the operations captured for it.
///
/// Never fails: a missing or unreadable transcript yields no bundles, and an
/// unreachable store degrades every operation to estimated allocation.
pub fn correlate_operations(
    store: &dyn OperationStore,
    session_id: &str,
    transcript: &Path,
    options: &EngineOptions,
) -> Vec<Bundle> {
    let records = match read_transcript(transcript) {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!("Cannot read transcript {}: {}", transcript.display(), err);
            return Vec::new();
        }
    };
    if records.is_empty() {
        return Vec::new();
    }

    let index = RawOperationIndex::load(store, session_id);
    correlate_records(&records, &index, session_id, options)
}

/// The correlation pipeline over already-read records.
///
/// 1. convert each record to operations, one bundle per productive record
/// 2. split main line from sidechain
/// 3. describe paired tool responses
/// 4. order the main line (parent graph, else timestamp)
/// 5. splice sub-agent bundles after their delegating bundle
pub fn correlate_records(
    records: &[TranscriptRecord],
    index: &RawOperationIndex,
    session_id: &str,
    options: &EngineOptions,
) -> Vec<Bundle> {
    let mut factory = OperationFactory::new(session_id, index, options.estimation);
    let mut bundles = Vec::new();
    let mut previous: Option<i64> = None;

    for record in records {
        let elapsed_ms =
            previous.map_or(0, |prev| record.timestamp.saturating_sub(prev).max(0) as u64);
        previous = Some(record.timestamp);

        let operations = factory.build(record, elapsed_ms);
        if !operations.is_empty() {
            bundles.push(Bundle::new(record.id.clone(), operations, record.is_sidechain));
        }
    }

    enrich_details(&mut bundles, index, &options.estimation);

    let (sidechain, main): (Vec<Bundle>, Vec<Bundle>) =
        bundles.into_iter().partition(|b| b.is_sidechain);
    tracing::debug!(
        "Session {}: {} main-line and {} sidechain bundles",
        session_id,
        main.len(),
        sidechain.len()
    );

    let main = order_bundles(main, records);
    fold_sub_agents(main, &sidechain, records)
}

/// Every operation tied to a tool invocation: the invocation itself, its
/// response, and all operations of a sub-agent it started.
pub fn linked_operations(bundles: &[Bundle], tool_use_id: &str) -> Vec<Operation> {
    bundles
        .iter()
        .flat_map(|b| b.operations.iter())
        .filter(|op| {
            op.tool_use_id.as_deref() == Some(tool_use_id)
                || op.parent_task_id.as_deref() == Some(tool_use_id)
        })
        .cloned()
        .collect()
}
