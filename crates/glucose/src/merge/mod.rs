//! Merging fresh feed data into the cached series

mod dedup;
mod hybrid;

pub use dedup::{MergeResult, dedupe, merge_into_baseline};
pub use hybrid::{HybridFetch, HybridMerger, LegOutcome, LegPlan, LegRange, plan_legs};
