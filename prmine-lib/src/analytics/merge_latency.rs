use crate::AggregationError;
use crate::records::PullRequestRecord;

/// Merge-latency summary of a set of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeLatency {
    pub amount_of_pull_requests: u64,

    /// Floor of the mean `merged_at - created_at`, in whole seconds
    pub average_pull_request_merge_time: i64,
}

/// Compute the merge-latency summary of `records`, which all belong to `project`.
pub fn merge_latency(project: &str, records: &[PullRequestRecord]) -> Result<MergeLatency, AggregationError> {
    if records.is_empty() {
        return Err(AggregationError::empty(project));
    }

    let total: i128 = records.iter().map(|r| i128::from(r.merge_latency_seconds())).sum();
    let count = records.len() as u64;
    let average = total.div_euclid(i128::from(count));

    Ok(MergeLatency {
        amount_of_pull_requests: count,
        // The mean of i64 values always fits in an i64
        average_pull_request_merge_time: i64::try_from(average).unwrap_or(i64::MAX),
    })
}
