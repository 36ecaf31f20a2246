use super::{Collection, Document, DocumentIter, Filter, RecordStore, UpsertOutcome, apply_fields, upsert_seed};
use crate::StoreError;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// An in-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    #[must_use]
    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&collection)
            .map_or(0, Vec::len)
    }
}

impl RecordStore for MemoryStore {
    fn insert_many(&self, collection: Collection, documents: Vec<Document>) -> Result<usize, StoreError> {
        let count = documents.len();
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection)
            .or_default()
            .extend(documents);
        Ok(count)
    }

    fn find_all(&self, collection: Collection, filter: &Filter) -> Result<DocumentIter<'_>, StoreError> {
        let guard = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        let matching: Vec<Document> = guard
            .get(&collection)
            .into_iter()
            .flatten()
            .filter(|doc| filter.is_match(doc))
            .cloned()
            .collect();

        Ok(Box::new(matching.into_iter().map(Ok)))
    }

    fn upsert_fields(&self, collection: Collection, filter: &Filter, fields: &Document) -> Result<UpsertOutcome, StoreError> {
        let mut guard = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        let docs = guard.entry(collection).or_default();

        let mut outcome = UpsertOutcome::default();
        for doc in docs.iter_mut().filter(|doc| filter.is_match(doc)) {
            apply_fields(doc, fields);
            outcome.matched += 1;
        }

        if outcome.matched == 0 {
            docs.push(upsert_seed(filter, fields));
            outcome.inserted = true;
        }

        Ok(outcome)
    }
}
