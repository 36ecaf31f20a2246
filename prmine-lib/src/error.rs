//! Error types for the crawl and aggregation pipeline

use thiserror::Error;

/// Errors that abort the crawl of a single repository.
///
/// Records already yielded before the error are not rolled back; the caller decides
/// whether to keep them.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The listing API answered with a non-success status
    #[error("upstream returned HTTP {status}: {body}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// The continuation chain did not terminate within the page ceiling, or revisited a page
    #[error("pagination did not terminate after {pages} page(s) (last page '{url}')")]
    PaginationLoop {
        /// Pages fetched before giving up
        pages: u32,
        /// The continuation reference that tripped the guard
        url: String,
    },

    /// The request could not be completed (connection, timeout, TLS)
    #[error("request to '{url}' failed: {source}")]
    Transport {
        /// URL being fetched
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// No response arrived within the per-request timeout
    #[error("request to '{url}' timed out after {}s", after.as_secs())]
    Timeout {
        /// URL being fetched
        url: String,
        /// The timeout that elapsed
        after: core::time::Duration,
    },

    /// The page body was not a JSON array of pull requests
    #[error("could not decode pull request listing from '{url}': {reason}")]
    Decode {
        /// URL of the offending page
        url: String,
        /// Decoder message
        reason: String,
    },
}

impl CrawlError {
    /// Create an Upstream error, truncating overly long bodies
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        const MAX_BODY: usize = 2048;

        let mut body = body.into();
        if body.len() > MAX_BODY {
            let mut cut = MAX_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("...");
        }

        Self::Upstream { status, body }
    }

    /// Whether this error originated from the upstream service rather than the local client.
    ///
    /// Pagination guard trips count as upstream failures.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::PaginationLoop { .. })
    }
}

/// A listing entry that lacks a field required to build a record.
///
/// Entries like this are filtered out during ingestion rather than raised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedRecordError {
    /// A required field is absent or null
    #[error("pull request entry is missing '{field}'")]
    MissingField {
        /// Name of the missing field
        field: &'static str,
    },

    /// The merge timestamp precedes the creation timestamp
    #[error("pull request '{title}' was merged before it was created")]
    MergedBeforeCreated {
        /// Title of the offending entry
        title: String,
    },

    /// The entry could not be decoded at all
    #[error("pull request entry could not be decoded: {reason}")]
    Undecodable {
        /// Decoder message
        reason: String,
    },
}

/// Errors raised while computing or persisting a project aggregate.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// The project has no qualifying records, so no average can be computed
    #[error("project '{project}' has no merged pull requests to aggregate")]
    Empty {
        /// Project key
        project: String,
    },

    /// A stored record could not be read back as a pull request
    #[error("stored record for project '{project}' is invalid: {source}")]
    InvalidRecord {
        /// Project key
        project: String,
        /// Why the record was rejected
        #[source]
        source: MalformedRecordError,
    },

    /// The store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AggregationError {
    /// Create an Empty error
    #[inline]
    pub fn empty(project: impl Into<String>) -> Self {
        Self::Empty { project: project.into() }
    }
}

/// Errors raised by a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("{context}: {source}")]
    Io {
        /// What the store was doing
        context: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A stored line or document could not be (de)serialized
    #[error("{context}: {source}")]
    Serde {
        /// What the store was doing
        context: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// A value given to the store is not a JSON object
    #[error("documents must be JSON objects, got {kind}")]
    NotAnObject {
        /// The JSON kind that was supplied
        kind: &'static str,
    },
}

impl StoreError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn serde(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serde {
            context: context.into(),
            source,
        }
    }
}
