//! Contributor acquisition over a project's lifetime.
//!
//! The span between a project's first and last pull request is cut into a fixed number of
//! equal-width periods. Each submitter is counted once, in the period holding their first
//! merged pull request, so the period counts show how quickly a project gains new
//! contributors.
//!
//! Period arithmetic is done on integer nanoseconds. A timestamp at offset `o` from the
//! start of a span `s` cut into `p` periods lands in period `floor(o * p / s)`, and period `i`
//! starts at `ceil(s * i / p)`; together these keep every record inside the bounds reported
//! for its period.

use crate::records::{PeriodBucket, PullRequestRecord, SubmitterActivity};
use chrono::{DateTime, TimeDelta, Utc};
use core::num::NonZeroUsize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Contributor activity of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorActivity {
    pub first_pull_request: DateTime<Utc>,
    pub last_pull_request: DateTime<Utc>,
    pub periods: Vec<PeriodBucket>,
    pub submitters: BTreeMap<String, SubmitterActivity>,
}

/// Compute contributor activity, or `None` when there are no records.
///
/// The result does not depend on the order of `records`.
#[must_use]
pub fn contributor_periods(records: &[PullRequestRecord], periods: NonZeroUsize) -> Option<ContributorActivity> {
    let mut ordered: Vec<&PullRequestRecord> = records.iter().collect();
    ordered.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.submitter.cmp(&b.submitter))
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.merged_at.cmp(&b.merged_at))
    });

    let start = ordered.first()?.created_at;
    let end = ordered.last()?.created_at;
    let grid = Grid::new(start, end, periods);

    let mut counts = vec![0_u64; periods.get()];
    let mut submitters: BTreeMap<String, SubmitterActivity> = BTreeMap::new();

    for record in ordered {
        match submitters.entry(record.submitter.clone()) {
            Entry::Vacant(slot) => {
                counts[grid.index_of(record.created_at)] += 1;
                let _ = slot.insert(SubmitterActivity {
                    contributions: 1,
                    first_pull_request: record.created_at,
                    last_pull_request: record.created_at,
                });
            }
            Entry::Occupied(mut slot) => {
                let activity = slot.get_mut();
                activity.contributions += 1;
                activity.first_pull_request = activity.first_pull_request.min(record.created_at);
                activity.last_pull_request = activity.last_pull_request.max(record.created_at);
            }
        }
    }

    let periods = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| PeriodBucket {
            start: grid.bound(i),
            end: grid.bound(i + 1),
            count,
        })
        .collect();

    Some(ContributorActivity {
        first_pull_request: start,
        last_pull_request: end,
        periods,
        submitters,
    })
}

/// Equal-width partition of `[start, end]`.
struct Grid {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    span_nanos: i128,
    periods: i128,
}

impl Grid {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>, periods: NonZeroUsize) -> Self {
        Self {
            start,
            end,
            span_nanos: nanos(end - start),
            periods: periods.get() as i128,
        }
    }

    /// Period holding `t`; `end` itself belongs to the last period.
    fn index_of(&self, t: DateTime<Utc>) -> usize {
        if self.span_nanos == 0 {
            return 0;
        }

        let index = (nanos(t - self.start) * self.periods / self.span_nanos).clamp(0, self.periods - 1);
        usize::try_from(index).unwrap_or_default()
    }

    /// Lower bound of period `i`; `bound(periods)` is `end`.
    fn bound(&self, i: usize) -> DateTime<Utc> {
        let i = i as i128;
        if i >= self.periods {
            return self.end;
        }

        let offset = (self.span_nanos * i + self.periods - 1) / self.periods;
        self.start + from_nanos(offset)
    }
}

fn nanos(delta: TimeDelta) -> i128 {
    i128::from(delta.num_seconds()) * NANOS_PER_SECOND + i128::from(delta.subsec_nanos())
}

fn from_nanos(nanos: i128) -> TimeDelta {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND)).unwrap_or(i64::MAX);
    let subsec = u32::try_from(nanos.rem_euclid(NANOS_PER_SECOND)).unwrap_or_default();
    TimeDelta::new(secs, subsec).unwrap_or(TimeDelta::MAX)
}
