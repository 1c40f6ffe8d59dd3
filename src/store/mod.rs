use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod memory;

pub use memory::InMemoryStore;

/// Names of the document collections used by the app.
pub mod collections {
    pub const PRODUCTION_ORDERS: &str = "production_orders";
    pub const PRODUCTS: &str = "products";
    pub const RAW_MATERIALS: &str = "raw_materials";
}

/// Errors returned by document store backends.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Precondition failed on {collection}/{id}: {field} has changed")]
    PreconditionFailed {
        collection: String,
        id: String,
        field: String,
    },

    #[error("Document body must be a JSON object")]
    InvalidDocument,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A raw document: the backend-assigned id plus its JSON field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Value,
}

/// Precondition checked against the current contents of a document before
/// a batched write is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    /// The named field must hold exactly this value.
    FieldEquals { field: String, value: Value },
}

impl Guard {
    pub fn field_equals(field: impl Into<String>, value: Value) -> Self {
        Guard::FieldEquals {
            field: field.into(),
            value,
        }
    }
}

/// One guarded partial update inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub struct BatchWrite {
    pub collection: String,
    pub id: String,
    pub patch: Value,
    pub guards: Vec<Guard>,
}

/// A group of partial updates that commit atomically: either every write
/// applies or none do.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<BatchWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a partial update with no preconditions.
    pub fn update(self, collection: &str, id: &str, patch: Value) -> Self {
        self.update_guarded(collection, id, patch, Vec::new())
    }

    /// Queues a partial update that only applies while every guard holds.
    pub fn update_guarded(
        mut self,
        collection: &str,
        id: &str,
        patch: Value,
        guards: Vec<Guard>,
    ) -> Self {
        self.writes.push(BatchWrite {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
            guards,
        });
        self
    }

    pub fn writes(&self) -> &[BatchWrite] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Interface to the hosted document database. The app never talks to the
/// backend directly; everything goes through this trait so tests and the
/// demo can run against [`InMemoryStore`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns every document in a collection, in stable insertion order.
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Returns a single document, or `None` when the id is unknown.
    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Stores a new document and returns its backend-assigned id.
    async fn create(&self, collection: &str, fields: Value) -> Result<String, StoreError>;

    /// Merges the patch into an existing document; only named fields change.
    async fn update_fields(&self, collection: &str, id: &str, patch: Value)
        -> Result<(), StoreError>;

    /// Removes a document.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Applies a guarded batch atomically. When any target is missing or
    /// any guard fails, nothing is written.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
