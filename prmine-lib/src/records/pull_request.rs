use crate::store::{Document, into_document};
use crate::{MalformedRecordError, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One merged pull request authored by a human account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    /// `owner/repo`
    pub project: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: DateTime<Utc>,
    pub submitter: String,
    #[serde(default)]
    pub reviewers: BTreeSet<String>,
    #[serde(default)]
    pub assignees: BTreeSet<String>,
}

impl PullRequestRecord {
    /// Time from creation to merge, truncated to whole seconds.
    #[must_use]
    pub fn merge_latency_seconds(&self) -> i64 {
        (self.merged_at - self.created_at).num_seconds()
    }

    /// Check the record's invariants.
    pub fn validate(&self) -> Result<(), MalformedRecordError> {
        if self.submitter.is_empty() {
            return Err(MalformedRecordError::MissingField { field: "submitter" });
        }

        if self.merged_at < self.created_at {
            return Err(MalformedRecordError::MergedBeforeCreated { title: self.title.clone() });
        }

        Ok(())
    }

    /// Convert to a store document.
    pub fn to_document(&self) -> Result<Document, StoreError> {
        let value = serde_json::to_value(self).map_err(|e| StoreError::serde(format!("serializing pull request '{}'", self.title), e))?;
        into_document(value)
    }

    /// Read a record back from a store document, validating it.
    pub fn from_document(doc: Document) -> Result<Self, MalformedRecordError> {
        let record: Self = serde_json::from_value(serde_json::Value::Object(doc))
            .map_err(|e| MalformedRecordError::Undecodable { reason: e.to_string() })?;
        record.validate()?;
        Ok(record)
    }
}
