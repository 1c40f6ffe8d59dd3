use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Document, DocumentStore, Guard, StoreError, WriteBatch};

#[derive(Debug, Clone)]
struct StoredDoc {
    id: String,
    fields: Map<String, Value>,
}

/// In-memory [`DocumentStore`] with the hosted backend's visible
/// semantics, down to merge-style partial updates and all-or-nothing
/// guarded batches. Backs the demo binary and the tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<Mutex<HashMap<String, Vec<StoredDoc>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn as_object(value: Value) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidDocument),
    }
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.lock().await;
        let docs = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|doc| Document {
                        id: doc.id.clone(),
                        fields: Value::Object(doc.fields.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.lock().await;
        let doc = collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .map(|doc| Document {
                id: doc.id.clone(),
                fields: Value::Object(doc.fields.clone()),
            });
        Ok(doc)
    }

    async fn create(&self, collection: &str, fields: Value) -> Result<String, StoreError> {
        let fields = as_object(fields)?;
        let id = Uuid::new_v4().simple().to_string();
        let mut collections = self.collections.lock().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(StoredDoc {
                id: id.clone(),
                fields,
            });
        Ok(id)
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> Result<(), StoreError> {
        let patch = as_object(patch)?;
        let mut collections = self.collections.lock().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| not_found(collection, id))?;
        for (key, value) in patch {
            doc.fields.insert(key, value);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().await;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection, id))?;
        let before = docs.len();
        docs.retain(|doc| doc.id != id);
        if docs.len() == before {
            return Err(not_found(collection, id));
        }
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().await;

        // First pass proves every target exists and every guard holds;
        // the second pass applies. Nothing is written when the first
        // pass fails.
        for write in batch.writes() {
            if !write.patch.is_object() {
                return Err(StoreError::InvalidDocument);
            }
            let doc = collections
                .get(&write.collection)
                .and_then(|docs| docs.iter().find(|doc| doc.id == write.id))
                .ok_or_else(|| not_found(&write.collection, &write.id))?;
            for guard in &write.guards {
                match guard {
                    Guard::FieldEquals { field, value } => {
                        if doc.fields.get(field) != Some(value) {
                            return Err(StoreError::PreconditionFailed {
                                collection: write.collection.clone(),
                                id: write.id.clone(),
                                field: field.clone(),
                            });
                        }
                    }
                }
            }
        }

        for write in batch.writes() {
            let patch = match write.patch.as_object() {
                Some(patch) => patch,
                None => continue,
            };
            if let Some(doc) = collections
                .get_mut(&write.collection)
                .and_then(|docs| docs.iter_mut().find(|doc| doc.id == write.id))
            {
                for (key, value) in patch {
                    doc.fields.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }
}
