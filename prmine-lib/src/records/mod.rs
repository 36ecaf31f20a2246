//! Typed entities flowing through the pipeline
//!
//! [`PullRequestRecord`] is produced by the crawler and stored in the `pull_requests`
//! collection. [`ProjectAggregate`] is derived from those records and upserted into the
//! `projects` collection.

mod project_aggregate;
mod pull_request;

pub use project_aggregate::{PeriodBucket, ProjectAggregate, SubmitterActivity};
pub use pull_request::PullRequestRecord;
