//! Per-project analytics over stored pull-request records.
//!
//! - [`merge_latency`]: pull-request count and floored mean merge latency
//! - [`contributor_periods`]: per-submitter activity and contributors gained per period
//! - [`aggregate_project`]: both of the above, persisted onto the project's document

mod aggregator;
mod contributor_periods;
mod merge_latency;

pub use aggregator::{
    aggregate_project, aggregate_records, distinct_projects, find_project, load_records, persist_aggregate, register_project,
    tracked_repositories,
};
pub use contributor_periods::{ContributorActivity, contributor_periods};
pub use merge_latency::{MergeLatency, merge_latency};
