//! Resilient HTTP request utilities using retry and timeout middleware.
//!
//! Wraps GET requests with [`seatbelt`] retry and timeout middleware so that transient
//! network failures and server errors are masked automatically. Exhaustion of the primary
//! rate limit is not retried here; callers pause until the advertised reset instead.

use crate::CrawlError;
use core::time::Duration;
use layered::{Execute, Service, Stack};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use seatbelt::retry::{Backoff, Retry};
use seatbelt::timeout::Timeout;
use seatbelt::{RecoveryInfo, ResilienceContext};
use tick::Clock;

const LOG_TARGET: &str = "      http";

/// Maximum retry attempts (on top of the original request).
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between retries.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default per-attempt timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay used for 429 responses that carry no `Retry-After`.
const DEFAULT_TOO_MANY_REQUESTS_DELAY: Duration = Duration::from_secs(5);

/// How many times, how patiently, and for how long each request is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retry_attempts: u32,
    pub base_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Parse the `Retry-After` header value as seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()
}

fn primary_limit_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|h| h.to_str().ok())
        .is_some_and(|s| s.trim() == "0")
}

/// Retry delay for a response, or `None` when it should be returned as-is.
///
/// `Some(None)` means "retry with the regular backoff".
fn retry_delay(status: StatusCode, headers: &HeaderMap) -> Option<Option<Duration>> {
    if status.is_server_error() {
        return Some(None);
    }

    // Exhausted primary limits surface to the caller, which knows the reset time
    if matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS) && primary_limit_exhausted(headers) {
        return None;
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => Some(Some(
            parse_retry_after(headers).map_or(DEFAULT_TOO_MANY_REQUESTS_DELAY, Duration::from_secs),
        )),

        // Secondary rate limit
        StatusCode::FORBIDDEN => parse_retry_after(headers).map(|secs| Some(Duration::from_secs(secs))),

        _ => None,
    }
}

/// Classify the outcome of one attempt for retry purposes.
fn classify(result: &Result<reqwest::Response, CrawlError>) -> RecoveryInfo {
    match result {
        // Connection failures and timeouts are transient.
        Err(_) => RecoveryInfo::retry(),

        Ok(resp) => match retry_delay(resp.status(), resp.headers()) {
            None => RecoveryInfo::never(),
            Some(None) => RecoveryInfo::retry(),
            Some(Some(delay)) => RecoveryInfo::retry().delay(delay),
        },
    }
}

/// Send an HTTP GET request with automatic retry and timeout.
///
/// Retries on network errors, timeouts, 5xx, 429, and 403 responses that carry
/// `Retry-After`. The final response is returned as-is, whatever its status; only
/// transport failures or timeouts on the last attempt produce an error.
pub async fn resilient_get(client: &reqwest::Client, url: &str, policy: &RetryPolicy) -> Result<reqwest::Response, CrawlError> {
    let clock = Clock::new_tokio();
    let context = ResilienceContext::new(&clock).name("http_get");

    let client = client.clone();
    let timeout_url = url.to_string();
    let request_timeout = policy.request_timeout;

    let service = (
        Retry::layer("retry", &context)
            .clone_input()
            .recovery_with(|result: &Result<reqwest::Response, CrawlError>, _| classify(result))
            .max_retry_attempts(policy.max_retry_attempts)
            .base_delay(policy.base_delay)
            .backoff(Backoff::Exponential)
            .on_retry(|_output, args| {
                log::debug!(
                    target: LOG_TARGET,
                    "retrying HTTP GET (attempt {}, delay {}ms)",
                    args.attempt().index() + 1,
                    args.retry_delay().as_millis(),
                );
            }),
        Timeout::layer("timeout", &context)
            .timeout_error(move |_| CrawlError::Timeout {
                url: timeout_url.clone(),
                after: request_timeout,
            })
            .timeout(request_timeout),
        Execute::new(move |url: String| {
            let client = client.clone();
            async move {
                client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|source| CrawlError::Transport { url, source })
            }
        }),
    )
        .into_service();

    service.execute(url.to_string()).await
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retry_attempts: 3,
            base_delay: Duration::from_millis(1),
            request_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn retry_delay_for_statuses() {
        let empty = HeaderMap::new();
        assert_eq!(retry_delay(StatusCode::OK, &empty), None);
        assert_eq!(retry_delay(StatusCode::NOT_FOUND, &empty), None);
        assert_eq!(retry_delay(StatusCode::BAD_GATEWAY, &empty), Some(None));
        assert_eq!(retry_delay(StatusCode::FORBIDDEN, &empty), None);
        assert_eq!(retry_delay(StatusCode::TOO_MANY_REQUESTS, &empty), Some(Some(DEFAULT_TOO_MANY_REQUESTS_DELAY)));
    }

    #[test]
    fn retry_delay_honors_retry_after() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_delay(StatusCode::FORBIDDEN, &headers), Some(Some(Duration::from_secs(7))));
        assert_eq!(retry_delay(StatusCode::TOO_MANY_REQUESTS, &headers), Some(Some(Duration::from_secs(7))));
    }

    #[test]
    fn retry_delay_leaves_exhausted_primary_limit_to_caller() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        let _ = headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_delay(StatusCode::FORBIDDEN, &headers), None);
        assert_eq!(retry_delay(StatusCode::TOO_MANY_REQUESTS, &headers), None);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let resp = resilient_get(&client, &format!("{}/flaky", server.uri()), &fast_policy()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
    async fn gives_up_after_max_attempts() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let policy = RetryPolicy {
            max_retry_attempts: 2,
            ..fast_policy()
        };
        let resp = resilient_get(&client, &format!("{}/down", server.uri()), &policy).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let resp = resilient_get(&client, &format!("{}/missing", server.uri()), &fast_policy()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
    async fn slow_responses_time_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let policy = RetryPolicy {
            max_retry_attempts: 0,
            base_delay: Duration::from_millis(1),
            request_timeout: Duration::from_millis(50),
        };
        let err = resilient_get(&client, &format!("{}/slow", server.uri()), &policy).await.unwrap_err();
        assert!(matches!(err, CrawlError::Timeout { .. }), "unexpected error: {err}");
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
    async fn transport_errors_surface_after_retries() {
        let client = reqwest::Client::new();
        let policy = RetryPolicy {
            max_retry_attempts: 1,
            ..fast_policy()
        };

        // Port 9 on localhost is reserved for discard and is not listening in test environments
        let err = resilient_get(&client, "http://127.0.0.1:9/", &policy).await.unwrap_err();
        assert!(matches!(err, CrawlError::Transport { .. }));
    }
}
