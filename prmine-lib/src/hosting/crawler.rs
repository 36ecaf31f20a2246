//! Paginated pull-request crawler.
//!
//! Walks the closed pull-request listing of one repository page by page, following the
//! `Link: rel="next"` continuation until it runs out, and turns every merged,
//! human-authored entry into a [`PullRequestRecord`].

use super::client::{Account, AccountKind, ApiResult, Client, PullRequest};
use super::resilient_http::RetryPolicy;
use super::{RepoSpec, Throttler};
use crate::records::PullRequestRecord;
use crate::{CrawlError, MalformedRecordError};
use chrono::{DateTime, Utc};
use core::time::Duration;
use futures_util::{Stream, StreamExt, TryStreamExt, stream};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

const LOG_TARGET: &str = "   crawler";

/// Number of consecutive rate-limit waits tolerated for a single page.
const MAX_RATE_LIMIT_WAITS: u32 = 3;

/// Settings for a [`Crawler`].
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub api_base_url: String,
    pub page_size: u8,
    pub max_pages: u32,
    pub retry: RetryPolicy,
    pub max_rate_limit_wait: Duration,
    pub max_concurrent_requests: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            page_size: 100,
            max_pages: 500,
            retry: RetryPolicy::default(),
            max_rate_limit_wait: Duration::from_hours(1),
            max_concurrent_requests: 4,
        }
    }
}

/// Everything a finished crawl produced.
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Records yielded before the crawl ended
    pub records: Vec<PullRequestRecord>,

    /// Why the crawl stopped early, if it did
    pub error: Option<CrawlError>,
}

impl CrawlOutcome {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Crawls pull-request listings.
///
/// Cloning is cheap; clones share the HTTP connection pool and the throttler.
#[derive(Debug, Clone)]
pub struct Crawler {
    client: Client,
    throttler: Arc<Throttler>,
    page_size: u8,
    max_pages: u32,
    max_rate_limit_wait: Duration,
}

/// One decoded page of the listing.
struct Page {
    entries: Vec<serde_json::Value>,
    next: Option<String>,
}

/// Identity used to drop entries repeated across pages.
#[derive(Debug, PartialEq, Eq, Hash)]
enum EntryKey {
    Number(u64),
    Fields(DateTime<Utc>, String, String),
}

impl EntryKey {
    fn of(number: Option<u64>, record: &PullRequestRecord) -> Self {
        number.map_or_else(
            || Self::Fields(record.created_at, record.submitter.clone(), record.title.clone()),
            Self::Number,
        )
    }
}

/// Where a crawl is in the continuation chain.
struct Cursor {
    crawler: Crawler,
    project: String,
    next_url: Option<String>,
    visited: HashSet<String>,
    seen: HashSet<EntryKey>,
    pages: u32,
}

impl Crawler {
    /// Create a crawler with its own throttler.
    pub fn new(config: &CrawlerConfig, token: Option<&str>) -> crate::Result<Self> {
        Self::with_throttler(config, token, Throttler::new(config.max_concurrent_requests))
    }

    /// Create a crawler that shares `throttler` with other work.
    pub fn with_throttler(config: &CrawlerConfig, token: Option<&str>, throttler: Arc<Throttler>) -> crate::Result<Self> {
        Ok(Self {
            client: Client::new(token, config.api_base_url.as_str(), config.retry)?,
            throttler,
            page_size: config.page_size.clamp(1, 100),
            max_pages: config.max_pages.max(1),
            max_rate_limit_wait: config.max_rate_limit_wait,
        })
    }

    /// Lazily crawl the merged, human-authored pull requests of `repo`.
    ///
    /// Each call starts again from the first page. The stream ends after the last page,
    /// or right after yielding an error; records already yielded stay valid.
    pub fn crawl(&self, repo: &RepoSpec) -> impl Stream<Item = Result<PullRequestRecord, CrawlError>> + Send + use<> {
        let cursor = Cursor {
            crawler: self.clone(),
            project: repo.project(),
            next_url: Some(self.client.closed_pulls_url(repo.owner(), repo.repo(), self.page_size)),
            visited: HashSet::new(),
            seen: HashSet::new(),
            pages: 0,
        };

        stream::try_unfold(cursor, Cursor::advance)
            .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, CrawlError>)))
            .try_flatten()
    }

    /// Drain a crawl, keeping whatever was collected before any failure.
    pub async fn collect(&self, repo: &RepoSpec) -> CrawlOutcome {
        log::info!(target: LOG_TARGET, "Crawling pull requests of '{repo}'");

        let mut records = Vec::new();
        let mut stream = core::pin::pin!(self.crawl(repo));

        while let Some(item) = stream.next().await {
            match item {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Crawl of '{repo}' stopped after {} record(s): {e}", records.len());
                    return CrawlOutcome { records, error: Some(e) };
                }
            }
        }

        log::info!(target: LOG_TARGET, "Collected {} merged pull request(s) from '{repo}'", records.len());
        CrawlOutcome { records, error: None }
    }

    /// Fetch one page, waiting out primary rate limits.
    async fn fetch_page(&self, url: &str) -> Result<Page, CrawlError> {
        let mut rate_limit_waits = 0;

        loop {
            if self.throttler.is_paused() {
                log::debug!(target: LOG_TARGET, "Waiting for rate-limit pause before fetching '{url}'");
            }

            let permit = self.throttler.acquire().await;
            log::debug!(target: LOG_TARGET, "Fetching '{url}'");

            match self.client.api_call(url).await {
                ApiResult::Success(resp) => {
                    let next = super::client::next_page_url(resp.headers());
                    let body = resp.text().await.map_err(|source| CrawlError::Transport {
                        url: url.to_string(),
                        source,
                    })?;
                    drop(permit);

                    let entries = serde_json::from_str::<Vec<serde_json::Value>>(&body).map_err(|e| CrawlError::Decode {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })?;

                    return Ok(Page { entries, next });
                }

                ApiResult::RateLimited { info, status, body } => {
                    drop(permit);

                    let too_far = (info.reset_at - Utc::now()).to_std().is_ok_and(|wait| wait > self.max_rate_limit_wait);
                    if too_far || rate_limit_waits >= MAX_RATE_LIMIT_WAITS {
                        return Err(CrawlError::upstream(status, body));
                    }

                    let wait = self.throttler.pause_until(info.reset_at, self.max_rate_limit_wait);
                    log::warn!(
                        target: LOG_TARGET,
                        "Rate limit exhausted, pausing requests until {} ({}s)",
                        info.reset_at.format("%H:%M:%S"),
                        wait.as_secs()
                    );

                    rate_limit_waits += 1;
                }

                ApiResult::Failed(e) => return Err(e),
            }
        }
    }
}

impl Cursor {
    async fn advance(mut self) -> Result<Option<(Vec<PullRequestRecord>, Self)>, CrawlError> {
        let Some(url) = self.next_url.take() else {
            return Ok(None);
        };

        if self.pages >= self.crawler.max_pages || !self.visited.insert(url.clone()) {
            return Err(CrawlError::PaginationLoop { pages: self.pages, url });
        }

        let page = self.crawler.fetch_page(&url).await?;
        self.pages += 1;

        if page.entries.is_empty() {
            log::debug!(target: LOG_TARGET, "Page {} of '{}' is empty, stopping", self.pages, self.project);
            return Ok(None);
        }

        let total = page.entries.len();
        let mut records = Vec::with_capacity(total);
        for entry in page.entries {
            if let Some(record) = self.ingest(entry) {
                records.push(record);
            }
        }

        log::debug!(
            target: LOG_TARGET,
            "Page {} of '{}': kept {} of {} entries",
            self.pages,
            self.project,
            records.len(),
            total
        );

        self.next_url = page.next;
        Ok(Some((records, self)))
    }

    /// Turn a raw listing entry into a record, dropping duplicates and malformed entries.
    fn ingest(&mut self, entry: serde_json::Value) -> Option<PullRequestRecord> {
        let pr = match serde_json::from_value::<PullRequest>(entry) {
            Ok(pr) => pr,
            Err(e) => {
                let e = MalformedRecordError::Undecodable { reason: e.to_string() };
                log::debug!(target: LOG_TARGET, "Skipping entry in '{}': {e}", self.project);
                return None;
            }
        };

        let number = pr.number;
        match normalize(&self.project, pr) {
            Ok(Some(record)) => self.seen.insert(EntryKey::of(number, &record)).then_some(record),
            Ok(None) => None,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Skipping entry in '{}': {e}", self.project);
                None
            }
        }
    }
}

/// Build a record from a listing entry.
///
/// Returns `Ok(None)` for entries that are legitimately excluded: unmerged pull requests
/// and those not authored by a human account.
pub fn normalize(project: &str, pr: PullRequest) -> Result<Option<PullRequestRecord>, MalformedRecordError> {
    let Some(merged_at) = pr.merged_at else {
        return Ok(None);
    };

    let user = pr.user.ok_or(MalformedRecordError::MissingField { field: "user" })?;
    if user.kind != AccountKind::User {
        return Ok(None);
    }

    let created_at = pr.created_at.ok_or(MalformedRecordError::MissingField { field: "created_at" })?;

    let record = PullRequestRecord {
        project: project.to_string(),
        title: pr.title,
        created_at,
        merged_at,
        submitter: user.login,
        reviewers: logins(pr.requested_reviewers),
        assignees: logins(pr.assignees),
    };

    record.validate()?;
    Ok(Some(record))
}

fn logins(accounts: Option<Vec<Account>>) -> BTreeSet<String> {
    accounts.into_iter().flatten().map(|a| a.login).collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn pr(value: serde_json::Value) -> PullRequest {
        serde_json::from_value(value).unwrap()
    }

    fn merged(login: &str, kind: &str) -> serde_json::Value {
        json!({
            "number": 1,
            "title": "Improve docs",
            "created_at": "2024-01-01T00:00:00Z",
            "merged_at": "2024-01-01T06:00:00Z",
            "user": { "login": login, "type": kind },
            "requested_reviewers": [{ "login": "rev1", "type": "User" }, { "login": "rev2", "type": "User" }],
            "assignees": [{ "login": "rev1", "type": "User" }]
        })
    }

    #[test]
    fn test_normalize_merged_human() {
        let record = normalize("a/b", pr(merged("alice", "User"))).unwrap().unwrap();

        assert_eq!(record.project, "a/b");
        assert_eq!(record.title, "Improve docs");
        assert_eq!(record.submitter, "alice");
        assert_eq!(record.merge_latency_seconds(), 6 * 3600);
        assert_eq!(record.reviewers, BTreeSet::from(["rev1".to_string(), "rev2".to_string()]));
        assert_eq!(record.assignees, BTreeSet::from(["rev1".to_string()]));
    }

    #[test]
    fn test_normalize_skips_unmerged() {
        let mut value = merged("alice", "User");
        value["merged_at"] = serde_json::Value::Null;
        assert_eq!(normalize("a/b", pr(value)).unwrap(), None);
    }

    #[test]
    fn test_normalize_skips_non_humans() {
        assert_eq!(normalize("a/b", pr(merged("dependabot[bot]", "Bot"))).unwrap(), None);
        assert_eq!(normalize("a/b", pr(merged("rust-lang", "Organization"))).unwrap(), None);
        assert_eq!(normalize("a/b", pr(merged("ghost", "Mannequin"))).unwrap(), None);
    }

    #[test]
    fn test_normalize_missing_fields() {
        let mut no_user = merged("alice", "User");
        no_user["user"] = serde_json::Value::Null;
        assert_eq!(
            normalize("a/b", pr(no_user)),
            Err(MalformedRecordError::MissingField { field: "user" })
        );

        let mut no_created = merged("alice", "User");
        let _ = no_created.as_object_mut().unwrap().remove("created_at");
        assert_eq!(
            normalize("a/b", pr(no_created)),
            Err(MalformedRecordError::MissingField { field: "created_at" })
        );
    }

    #[test]
    fn test_normalize_rejects_merge_before_creation() {
        let mut value = merged("alice", "User");
        value["merged_at"] = json!("2023-12-31T00:00:00Z");
        assert!(matches!(
            normalize("a/b", pr(value)),
            Err(MalformedRecordError::MergedBeforeCreated { .. })
        ));
    }

    #[test]
    fn test_normalize_null_collections_are_empty() {
        let mut value = merged("alice", "User");
        value["requested_reviewers"] = serde_json::Value::Null;
        let _ = value.as_object_mut().unwrap().remove("assignees");

        let record = normalize("a/b", pr(value)).unwrap().unwrap();
        assert!(record.reviewers.is_empty());
        assert!(record.assignees.is_empty());
    }

    fn cursor() -> Cursor {
        Cursor {
            crawler: Crawler::new(&CrawlerConfig::default(), None).unwrap(),
            project: "a/b".to_string(),
            next_url: None,
            visited: HashSet::new(),
            seen: HashSet::new(),
            pages: 0,
        }
    }

    #[test]
    fn test_ingest_drops_duplicates_by_number() {
        let mut cursor = cursor();
        assert!(cursor.ingest(merged("alice", "User")).is_some());
        assert!(cursor.ingest(merged("alice", "User")).is_none());

        let mut other = merged("alice", "User");
        other["number"] = json!(2);
        assert!(cursor.ingest(other).is_some());
    }

    #[test]
    fn test_ingest_dedupes_by_fields_without_number() {
        let mut cursor = cursor();
        let mut value = merged("alice", "User");
        let _ = value.as_object_mut().unwrap().remove("number");

        assert!(cursor.ingest(value.clone()).is_some());
        assert!(cursor.ingest(value.clone()).is_none());

        value["title"] = json!("Another change");
        assert!(cursor.ingest(value).is_some());
    }

    #[test]
    fn test_ingest_skips_undecodable_entries() {
        let mut cursor = cursor();
        assert!(cursor.ingest(json!("not an object")).is_none());
        assert!(cursor.ingest(json!({ "created_at": "yesterday" })).is_none());
    }

    #[tokio::test]
    async fn test_advance_without_next_url_ends() {
        assert!(cursor().advance().await.unwrap().is_none());
    }
}
