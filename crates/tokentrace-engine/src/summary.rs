use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokentrace_types::{Allocation, Bundle};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSummary {
    pub bundle_count: usize,
    pub operation_count: usize,
    pub sub_agent_count: usize,
    pub tokens: TokenBreakdown,
    /// Tokens per tool label, sorted by label.
    pub tools: BTreeMap<String, u64>,
    /// Last minus first bundle timestamp, in milliseconds.
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBreakdown {
    pub total: u64,
    pub exact: u64,
    pub proportional: u64,
    pub estimated: u64,
    pub context_growth: u64,
}

impl TokenBreakdown {
    /// Share of tokens backed by real usage counters, 0.0 to 1.0.
    pub fn exact_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.exact.saturating_add(self.proportional) as f64 / self.total as f64
    }
}

pub fn summarize_bundles(bundles: &[Bundle]) -> BundleSummary {
    let mut summary = BundleSummary {
        bundle_count: bundles.len(),
        ..Default::default()
    };

    for bundle in bundles {
        if bundle.is_sub_agent() {
            summary.sub_agent_count += 1;
        }
        for op in &bundle.operations {
            summary.operation_count += 1;
            let tokens = &mut summary.tokens;
            tokens.total = tokens.total.saturating_add(op.tokens);
            tokens.context_growth = tokens.context_growth.saturating_add(op.context_growth);
            let bucket = match op.allocation {
                Allocation::Exact => &mut tokens.exact,
                Allocation::Proportional => &mut tokens.proportional,
                Allocation::Estimated => &mut tokens.estimated,
            };
            *bucket = bucket.saturating_add(op.tokens);
            let tool = summary.tools.entry(op.tool.clone()).or_insert(0);
            *tool = tool.saturating_add(op.tokens);
        }
    }

    let first = bundles.iter().map(|b| b.timestamp).min();
    let last = bundles.iter().map(|b| b.timestamp).max();
    if let (Some(first), Some(last)) = (first, last) {
        summary.duration_ms = last.saturating_sub(first);
    }

    summary
}
