//! GitHub API client
//!
//! Minimal client for the pull-request listing endpoint: wire types, response
//! classification, rate-limit and pagination header parsing.

use super::resilient_http::{RetryPolicy, resilient_get};
use crate::CrawlError;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, LINK};
use serde::Deserialize;
use std::sync::LazyLock;

/// Extracts the continuation URL from a `Link` header
static NEXT_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).expect("invalid regex"));

/// A pull request as returned by `GET /repos/{owner}/{repo}/pulls`, with only the fields we need
#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub number: Option<u64>,
    #[serde(default)]
    pub title: String,
    pub created_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub user: Option<Account>,
    pub requested_reviewers: Option<Vec<Account>>,
    pub assignees: Option<Vec<Account>>,
}

/// An account reference embedded in a pull request
#[derive(Debug, Deserialize)]
pub struct Account {
    pub login: String,
    #[serde(rename = "type", default)]
    pub kind: AccountKind,
}

/// The kind of account behind a login
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountKind {
    /// An individual
    User,
    /// An app or automation account
    Bot,
    Organization,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy)]
pub struct RateLimitInfo {
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
}

/// Result of a listing API call
#[derive(Debug)]
pub enum ApiResult {
    /// Request succeeded
    Success(reqwest::Response),

    /// The primary rate limit is exhausted; retry after `info.reset_at`
    RateLimited { info: RateLimitInfo, status: u16, body: String },

    /// Request failed permanently
    Failed(CrawlError),
}

/// GitHub API client
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl Client {
    /// Create a client with optional authentication token, base URL and retry policy
    pub fn new(token: Option<&str>, base_url: impl Into<String>, retry: RetryPolicy) -> crate::Result<Self> {
        use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};

        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}"))?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = reqwest::Client::builder()
            .user_agent("prmine")
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// URL of the first page of closed pull requests for a repository
    #[must_use]
    pub fn closed_pulls_url(&self, owner: &str, repo: &str, page_size: u8) -> String {
        format!("{}/repos/{owner}/{repo}/pulls?state=closed&per_page={page_size}", self.base_url)
    }

    /// Make an API call and classify the result
    pub async fn api_call(&self, url: &str) -> ApiResult {
        let resp = match resilient_get(&self.client, url, &self.retry).await {
            Ok(r) => r,
            Err(e) => return ApiResult::Failed(e),
        };

        let status = resp.status();
        if status.is_success() {
            return ApiResult::Success(resp);
        }

        let rate_limit = extract_rate_limit_from_headers(resp.headers());
        let body = resp.text().await.unwrap_or_default();

        if matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS)
            && let Some(info) = rate_limit.filter(|rl| rl.remaining == 0)
        {
            return ApiResult::RateLimited {
                info,
                status: status.as_u16(),
                body,
            };
        }

        ApiResult::Failed(CrawlError::upstream(status.as_u16(), body))
    }
}

/// Extract rate limit information from API response headers
pub fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<usize>().ok()?;
    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}

/// Extract the `rel="next"` continuation URL from a `Link` header, if any
pub fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    NEXT_LINK_REGEX.captures(link).map(|caps| caps[1].to_string())
}
