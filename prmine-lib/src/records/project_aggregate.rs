use crate::StoreError;
use crate::store::{Document, into_document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One equal-width slice of a project's lifetime.
///
/// `count` is the number of contributors whose first merged pull request falls in
/// `[start, end)`. The last bucket of a project is closed at `end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: u64,
}

/// Activity of one submitter within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitterActivity {
    pub contributions: u64,
    pub first_pull_request: DateTime<Utc>,
    pub last_pull_request: DateTime<Utc>,
}

/// Derived summary of a project's merged pull requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAggregate {
    /// `owner/repo`
    pub project: String,
    pub amount_of_pull_requests: u64,
    /// Floor of the mean merge latency, in seconds
    pub average_pull_request_merge_time: i64,
    pub first_pull_request: DateTime<Utc>,
    pub last_pull_request: DateTime<Utc>,
    pub periods: Vec<PeriodBucket>,
    pub submitters: BTreeMap<String, SubmitterActivity>,
}

impl ProjectAggregate {
    /// The field set written to the project's document on every aggregation run.
    pub fn to_fields(&self) -> Result<Document, StoreError> {
        let value = serde_json::to_value(self).map_err(|e| StoreError::serde(format!("serializing aggregate of '{}'", self.project), e))?;
        into_document(value)
    }

    /// Number of distinct submitters.
    #[must_use]
    pub fn distinct_submitters(&self) -> usize {
        self.submitters.len()
    }
}
