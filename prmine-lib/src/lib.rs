#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for prmine
//!
//! prmine collects merged pull-request history for a set of repositories and derives
//! per-project analytics from it: merge latency, per-contributor activity windows, and
//! the rate at which new contributors are gained over a project's lifetime.
//!
//! # Module Organization
//!
//! - [`hosting`]: Upstream API access, the paginated crawler, and the repository qualifier
//! - [`records`]: Typed pull-request records and project aggregates
//! - [`analytics`]: Merge latency and contributor-period aggregation
//! - [`store`]: Document store abstraction and its implementations
//! - [`commands`]: Command-line interface and orchestration

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod analytics;
pub mod commands;
mod error;
pub mod hosting;
pub mod records;
pub mod store;

pub use crate::commands::{Host, run};
pub use crate::error::{AggregationError, CrawlError, MalformedRecordError, StoreError};
