use std::collections::{BTreeMap, HashMap};

use super::{Backend, Document, Fields};
use crate::error::Result;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: HashMap<String, BTreeMap<String, Fields>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    fn put(&mut self, collection: &str, doc: &Document) -> Result<()> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(doc.id.clone(), doc.fields.clone());
        Ok(())
    }

    fn scan(&self, collection: &str) -> Result<Vec<Document>> {
        Ok(self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
