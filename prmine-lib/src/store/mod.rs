//! Document store abstraction
//!
//! The pipeline treats storage as a generic document store with two logical
//! collections: raw pull-request records and derived project documents. Anything that
//! can append documents, return the documents matching a [`Filter`], and set fields on
//! matching documents can back the pipeline.
//!
//! Two implementations are provided:
//! - [`MemoryStore`]: process-local, used by tests and dry runs
//! - [`JsonLinesStore`]: one JSON-lines file per collection in a data directory

mod filter;
mod json_lines;
mod memory;

pub use filter::{Filter, Predicate};
pub use json_lines::JsonLinesStore;
pub use memory::MemoryStore;

use crate::StoreError;
use crate::records::PullRequestRecord;
use core::fmt::{Debug, Display, Formatter};

/// A stored document: a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Lazy sequence of documents returned by [`RecordStore::find_all`].
pub type DocumentIter<'a> = Box<dyn Iterator<Item = Result<Document, StoreError>> + Send + 'a>;

/// The logical collections used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// One document per merged pull request
    PullRequests,

    /// One document per tracked project, carrying its aggregate fields
    Projects,
}

impl Collection {
    /// Stable collection name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PullRequests => "pull_requests",
            Self::Projects => "projects",
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertOutcome {
    /// Number of existing documents that matched the filter and were updated
    pub matched: usize,

    /// Whether a new document was inserted because nothing matched
    pub inserted: bool,
}

/// Storage operations required by the pipeline.
pub trait RecordStore: Debug + Send + Sync {
    /// Append documents. No uniqueness is enforced.
    fn insert_many(&self, collection: Collection, documents: Vec<Document>) -> Result<usize, StoreError>;

    /// Return the documents in `collection` that match `filter`.
    fn find_all(&self, collection: Collection, filter: &Filter) -> Result<DocumentIter<'_>, StoreError>;

    /// Set `fields` on every document matching `filter`, leaving other fields untouched.
    ///
    /// When nothing matches, a single document is inserted, made of the filter's equality
    /// predicates plus `fields`. Calling this repeatedly with the same arguments leaves the
    /// store in the same state.
    fn upsert_fields(&self, collection: Collection, filter: &Filter, fields: &Document) -> Result<UpsertOutcome, StoreError>;
}

/// Store crawled records in the `pull_requests` collection.
pub fn insert_pull_requests<S: RecordStore + ?Sized>(store: &S, records: &[PullRequestRecord]) -> Result<usize, StoreError> {
    if records.is_empty() {
        return Ok(0);
    }

    let docs = records.iter().map(PullRequestRecord::to_document).collect::<Result<Vec<_>, _>>()?;
    store.insert_many(Collection::PullRequests, docs)
}

/// Set `fields` on a single document, in place.
fn apply_fields(doc: &mut Document, fields: &Document) {
    for (key, value) in fields {
        let _ = doc.insert(key.clone(), value.clone());
    }
}

/// Build the document inserted when an upsert matches nothing.
fn upsert_seed(filter: &Filter, fields: &Document) -> Document {
    let mut doc = Document::new();
    for (field, value) in filter.equality_fields() {
        let _ = doc.insert(field.to_string(), value.clone());
    }
    apply_fields(&mut doc, fields);
    doc
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Turn an arbitrary JSON value into a document.
pub fn into_document(value: serde_json::Value) -> Result<Document, StoreError> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StoreError::NotAnObject { kind: json_kind(&other) }),
    }
}
