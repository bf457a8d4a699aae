//! Custom assertions for bundle output.
//!
//! Provides high-level checks that make tests more readable:
//! - bundle totals match their operations
//! - bundle id sequences
//! - allocation of every operation in a bundle

use anyhow::{Context, Result};
use tokentrace_types::{Allocation, Bundle};

/// Assert that every bundle's total equals the sum of its operations.
pub fn assert_bundle_totals(bundles: &[Bundle]) -> Result<()> {
    for bundle in bundles {
        let sum = bundle
            .operations
            .iter()
            .fold(0u64, |sum, op| sum.saturating_add(op.tokens));
        if sum != bundle.total_tokens {
            anyhow::bail!(
                "Bundle {} reports {} tokens but its operations sum to {}",
                bundle.id,
                bundle.total_tokens,
                sum
            );
        }
    }
    Ok(())
}

/// Assert the exact sequence of bundle ids.
pub fn assert_bundle_ids(bundles: &[Bundle], expected: &[&str]) -> Result<()> {
    let actual: Vec<&str> = bundles.iter().map(|b| b.id.as_str()).collect();
    if actual != expected {
        anyhow::bail!("Expected bundles {:?}, got {:?}", expected, actual);
    }
    Ok(())
}

/// Assert that every operation of the bundle `id` has the given allocation.
pub fn assert_allocation(bundles: &[Bundle], id: &str, allocation: Allocation) -> Result<()> {
    let bundle = bundles
        .iter()
        .find(|b| b.id == id)
        .with_context(|| format!("No bundle with id {}", id))?;

    for (i, op) in bundle.operations.iter().enumerate() {
        if op.allocation != allocation {
            anyhow::bail!(
                "Operation {} of bundle {} is {} but expected {}",
                i,
                id,
                op.allocation.as_str(),
                allocation.as_str()
            );
        }
    }
    Ok(())
}
