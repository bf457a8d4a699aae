use std::collections::{HashMap, HashSet};

use tokentrace_types::{Bundle, TranscriptRecord};

/// Whether any record's `parentUuid` names another record's `uuid`.
pub fn has_parent_graph(records: &[TranscriptRecord]) -> bool {
    let uuids: HashSet<&str> = records.iter().filter_map(|r| r.uuid()).collect();
    records
        .iter()
        .filter_map(|r| r.parent_uuid())
        .any(|parent| uuids.contains(parent))
}

/// Record indices in depth-first pre-order from the roots (records without a
/// `parentUuid`), children in file order. Each record is visited at most
/// once; records unreachable from a root are omitted.
pub fn depth_first_order(records: &[TranscriptRecord]) -> Vec<usize> {
    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (i, record) in records.iter().enumerate() {
        match record.parent_uuid() {
            Some(parent) => children.entry(parent).or_default().push(i),
            None => roots.push(i),
        }
    }

    let mut order = Vec::with_capacity(records.len());
    let mut visited = HashSet::new();
    let mut stack: Vec<usize> = roots.into_iter().rev().collect();
    while let Some(i) = stack.pop() {
        if !visited.insert(i) {
            continue;
        }
        order.push(i);
        if let Some(kids) = records[i].uuid().and_then(|uuid| children.get(uuid)) {
            stack.extend(kids.iter().rev().filter(|k| !visited.contains(*k)));
        }
    }
    order
}

/// Order bundles by the transcript's parent/child graph when there is one,
/// otherwise by ascending timestamp (stable).
///
/// In graph order, bundles whose records are unreachable from a root keep
/// their original relative order after the reachable ones.
pub fn order_bundles(bundles: Vec<Bundle>, records: &[TranscriptRecord]) -> Vec<Bundle> {
    if !has_parent_graph(records) {
        let mut bundles = bundles;
        bundles.sort_by_key(|b| b.timestamp);
        return bundles;
    }

    let mut by_id: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, bundle) in bundles.iter().enumerate() {
        by_id.entry(bundle.id.as_str()).or_default().push(i);
    }

    let mut sequence = Vec::with_capacity(bundles.len());
    let mut placed = vec![false; bundles.len()];
    for record_index in depth_first_order(records) {
        if let Some(indices) = by_id.get(records[record_index].id.as_str()) {
            for &i in indices {
                if !placed[i] {
                    placed[i] = true;
                    sequence.push(i);
                }
            }
        }
    }
    let reachable = sequence.len();
    sequence.extend((0..bundles.len()).filter(|&i| !placed[i]));
    if sequence.len() > reachable {
        tracing::debug!(
            "{} bundles unreachable from a root, kept in file order",
            sequence.len() - reachable
        );
    }

    let mut slots: Vec<Option<Bundle>> = bundles.into_iter().map(Some).collect();
    sequence
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}
