//! Repository admission.
//!
//! Decides which candidate repositories are worth tracking by counting their merged,
//! human-authored pull requests and checking the count against an [`AdmissionPolicy`].
//! Nothing is persisted here.

use super::{Crawler, RepoSpec};
use crate::CrawlError;
use core::fmt::{Display, Formatter};
use futures_util::{StreamExt, stream};
use std::collections::HashSet;

const LOG_TARGET: &str = " qualifier";

/// Bounds on the number of merged pull requests a repository must have to be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub min: u64,
    pub min_inclusive: bool,

    /// `None` leaves the range open-ended
    pub max: Option<u64>,
    pub max_inclusive: bool,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            min: 100,
            min_inclusive: true,
            max: Some(1000),
            max_inclusive: true,
        }
    }
}

impl AdmissionPolicy {
    /// Whether the policy admits any count at all.
    #[must_use]
    pub fn is_satisfiable(&self) -> bool {
        if self.max.is_none() {
            return true;
        }

        let lowest = if self.min_inclusive { Some(self.min) } else { self.min.checked_add(1) };
        lowest.is_some_and(|lowest| !self.exceeds_max(lowest))
    }

    fn reaches_min(&self, count: u64) -> bool {
        if self.min_inclusive { count >= self.min } else { count > self.min }
    }

    fn exceeds_max(&self, count: u64) -> bool {
        match self.max {
            None => false,
            Some(max) if self.max_inclusive => count > max,
            Some(max) => count >= max,
        }
    }

    /// Whether a final count is admitted.
    #[must_use]
    pub fn admits(&self, count: u64) -> bool {
        self.reaches_min(count) && !self.exceeds_max(count)
    }

    /// The verdict for a complete count.
    #[must_use]
    pub fn verdict(&self, count: u64) -> Verdict {
        if self.admits(count) {
            Verdict::Admitted { merged: count }
        } else if self.exceeds_max(count) {
            Verdict::TooMany { at_least: count }
        } else {
            Verdict::TooFew { merged: count }
        }
    }

    /// A verdict that no further pull requests could change, if one exists for a partial count.
    #[must_use]
    pub fn early_verdict(&self, count_so_far: u64) -> Option<Verdict> {
        if self.exceeds_max(count_so_far) {
            return Some(Verdict::TooMany { at_least: count_so_far });
        }

        if self.max.is_none() && self.reaches_min(count_so_far) {
            return Some(Verdict::Admitted { merged: count_so_far });
        }

        None
    }
}

impl Display for AdmissionPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let open = if self.min_inclusive { '[' } else { '(' };
        match self.max {
            Some(max) => {
                let close = if self.max_inclusive { ']' } else { ')' };
                write!(f, "{open}{}, {max}{close}", self.min)
            }
            None => write!(f, "{open}{}, ∞)", self.min),
        }
    }
}

/// The outcome of evaluating one candidate.
#[derive(Debug)]
pub enum Verdict {
    /// The count is within bounds. When the range has no upper bound, `merged` may be
    /// the count at which crawling stopped.
    Admitted { merged: u64 },

    /// The repository has too few merged pull requests
    TooFew { merged: u64 },

    /// The upper bound was exceeded; crawling stopped at `at_least`
    TooMany { at_least: u64 },

    /// The crawl failed, so no verdict could be reached
    Failed(CrawlError),
}

impl Verdict {
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Admitted { merged } => write!(f, "admitted ({merged} merged)"),
            Self::TooFew { merged } => write!(f, "too few ({merged} merged)"),
            Self::TooMany { at_least } => write!(f, "too many (at least {at_least} merged)"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Verdicts for a batch of candidates, in input order.
#[derive(Debug, Default)]
pub struct QualificationReport {
    pub verdicts: Vec<(RepoSpec, Verdict)>,
}

impl QualificationReport {
    /// Admitted repositories with their merged pull-request counts.
    pub fn admitted(&self) -> impl Iterator<Item = (&RepoSpec, u64)> {
        self.verdicts.iter().filter_map(|(repo, verdict)| match verdict {
            Verdict::Admitted { merged } => Some((repo, *merged)),
            _ => None,
        })
    }

    /// Repositories whose crawl failed.
    pub fn failed(&self) -> impl Iterator<Item = (&RepoSpec, &CrawlError)> {
        self.verdicts.iter().filter_map(|(repo, verdict)| match verdict {
            Verdict::Failed(e) => Some((repo, e)),
            _ => None,
        })
    }
}

/// Applies an [`AdmissionPolicy`] to candidate repositories.
#[derive(Debug, Clone)]
pub struct Qualifier {
    crawler: Crawler,
    policy: AdmissionPolicy,
    max_concurrent_repos: usize,
}

impl Qualifier {
    #[must_use]
    pub fn new(crawler: Crawler, policy: AdmissionPolicy, max_concurrent_repos: usize) -> Self {
        Self {
            crawler,
            policy,
            max_concurrent_repos: max_concurrent_repos.max(1),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Crawl one candidate until its verdict is decided.
    pub async fn evaluate(&self, repo: &RepoSpec) -> Verdict {
        let mut merged = 0_u64;
        let mut records = core::pin::pin!(self.crawler.crawl(repo));

        while let Some(item) = records.next().await {
            if let Err(e) = item {
                log::warn!(target: LOG_TARGET, "Excluding '{repo}': {e}");
                return Verdict::Failed(e);
            }

            merged += 1;
            if let Some(verdict) = self.policy.early_verdict(merged) {
                log::debug!(target: LOG_TARGET, "'{repo}' decided early: {verdict}");
                return verdict;
            }
        }

        let verdict = self.policy.verdict(merged);
        log::debug!(target: LOG_TARGET, "'{repo}': {verdict}");
        verdict
    }

    /// Evaluate a batch of candidates. Duplicates are evaluated once; a failing candidate
    /// does not affect the others.
    pub async fn qualify(&self, candidates: impl IntoIterator<Item = RepoSpec>) -> QualificationReport {
        let mut seen = HashSet::new();
        let unique: Vec<RepoSpec> = candidates.into_iter().filter(|repo| seen.insert(repo.clone())).collect();

        log::info!(target: LOG_TARGET, "Qualifying {} candidate(s) against {}", unique.len(), self.policy);

        let verdicts = stream::iter(unique)
            .map(|repo| async move {
                let verdict = self.evaluate(&repo).await;
                (repo, verdict)
            })
            .buffered(self.max_concurrent_repos)
            .collect::<Vec<_>>()
            .await;

        let report = QualificationReport { verdicts };
        log::info!(target: LOG_TARGET, "{} candidate(s) admitted", report.admitted().count());
        report
    }
}
