// In-memory document store
//
// Collections live in a shared map behind a RwLock. Cloning the store shares
// the same collections.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};

use super::{parse_dump, Document, DocumentStore, Filter};

#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot dump (see `parse_dump`).
    pub fn from_dump(json: &str) -> Result<Self> {
        let store = MemoryStore::new();
        for (collection, docs) in parse_dump(json)? {
            store.insert_many(&collection, docs)?;
        }
        Ok(store)
    }

    pub fn insert(&self, collection: &str, doc: Document) -> Result<()> {
        self.insert_many(collection, std::iter::once(doc))
    }

    pub fn insert_many<I>(&self, collection: &str, docs: I) -> Result<()>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        collections
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
        Ok(())
    }

    /// Number of documents held in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|collections| collections.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl DocumentStore for MemoryStore {
    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;

        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default())
    }

    fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;

        Ok(collections
            .get(collection)
            .map_or(0, |docs| docs.iter().filter(|doc| filter.matches(doc)).count() as u64))
    }
}
