//! Upstream code-hosting access.
//!
//! The [`Crawler`] turns a [`RepoSpec`] into a lazy stream of pull-request records; the
//! [`Qualifier`] uses it to decide which repositories meet an [`AdmissionPolicy`].

mod client;
mod crawler;
mod qualifier;
mod repo_spec;
mod resilient_http;
mod throttler;

pub use client::{Account, AccountKind, PullRequest, RateLimitInfo};
pub use crawler::{CrawlOutcome, Crawler, CrawlerConfig, normalize};
pub use qualifier::{AdmissionPolicy, QualificationReport, Qualifier, Verdict};
pub use repo_spec::RepoSpec;
pub use resilient_http::RetryPolicy;
pub use throttler::Throttler;
