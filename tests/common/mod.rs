use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use pcp_confeccao::board::KanbanBoard;
use pcp_confeccao::events::{event_channel, Event, EventSender};
use pcp_confeccao::models::{
    CreateMaterialInput, CreateOrderInput, CreateProductInput, OrderPriority, OrderStatus,
    Product, ProductionOrder, RawMaterial, RequiredMaterialInput,
};
use pcp_confeccao::services::materials::MaterialService;
use pcp_confeccao::services::orders::OrderService;
use pcp_confeccao::services::production::ProductionFlowService;
use pcp_confeccao::services::products::ProductService;
use pcp_confeccao::store::{Document, DocumentStore, InMemoryStore, StoreError, WriteBatch};

/// Helper harness wiring every service to one shared store, with the
/// event channel held open so tests can assert on what was published.
pub struct TestApp {
    pub store: Arc<dyn DocumentStore>,
    pub materials: MaterialService,
    pub products: ProductService,
    pub orders: OrderService,
    pub flow: ProductionFlowService,
    event_sender: EventSender,
    events: mpsc::Receiver<Event>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    /// Construct the harness over a caller-supplied store backend.
    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        let (event_sender, events) = event_channel(256);
        Self {
            materials: MaterialService::new(store.clone(), Some(event_sender.clone())),
            products: ProductService::new(store.clone(), Some(event_sender.clone())),
            orders: OrderService::new(store.clone(), Some(event_sender.clone())),
            flow: ProductionFlowService::new(store.clone(), Some(event_sender.clone())),
            store,
            event_sender,
            events,
        }
    }

    /// A board over this app's services, publishing to the same channel.
    pub fn board(&self) -> KanbanBoard {
        KanbanBoard::new(
            self.orders.clone(),
            self.flow.clone(),
            Some(self.event_sender.clone()),
        )
    }

    /// Everything published since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    pub async fn seed_material(
        &self,
        name: &str,
        stock: Decimal,
        threshold: Decimal,
    ) -> RawMaterial {
        self.materials
            .create_material(CreateMaterialInput {
                name: name.to_string(),
                description: String::new(),
                unit: "m".to_string(),
                stock_quantity: stock,
                low_stock_threshold: threshold,
            })
            .await
            .expect("seed material for tests")
    }

    pub async fn seed_product(&self, name: &str, lines: &[(&str, Decimal)]) -> Product {
        self.products
            .create_product(CreateProductInput {
                name: name.to_string(),
                required_materials: lines
                    .iter()
                    .map(|(material_id, quantity_per_unit)| RequiredMaterialInput {
                        material_id: material_id.to_string(),
                        quantity_per_unit: *quantity_per_unit,
                    })
                    .collect(),
            })
            .await
            .expect("seed product for tests")
    }

    pub async fn seed_order(
        &self,
        label: &str,
        product_id: &str,
        quantity: u32,
    ) -> ProductionOrder {
        self.orders
            .create_order(CreateOrderInput {
                order_id: label.to_string(),
                product_id: product_id.to_string(),
                quantity,
                priority: OrderPriority::Normal,
                status: None,
                due_date: Utc::now().date_naive() + Duration::days(7),
                notes: None,
            })
            .await
            .expect("seed order for tests")
    }

    /// Current persisted stock for a material.
    pub async fn stock_of(&self, material_id: &str) -> Decimal {
        self.materials
            .get_material(material_id)
            .await
            .expect("material exists")
            .stock_quantity
    }

    /// Current persisted status for an order.
    pub async fn order_status(&self, order_id: &str) -> OrderStatus {
        self.orders
            .get_order(order_id)
            .await
            .expect("order exists")
            .status
    }
}

/// Store whose reads work but whose writes all fail, for proving that
/// rejected operations never got as far as a write.
#[allow(dead_code)]
pub struct FailingStore {
    inner: InMemoryStore,
}

#[allow(dead_code)]
impl FailingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self { inner }
    }

    fn unavailable() -> StoreError {
        StoreError::Unavailable("writes are disabled in this test".to_string())
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.inner.list_all(collection).await
    }

    async fn get_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        self.inner.get_by_id(collection, id).await
    }

    async fn create(&self, _collection: &str, _fields: Value) -> Result<String, StoreError> {
        Err(Self::unavailable())
    }

    async fn update_fields(
        &self,
        _collection: &str,
        _id: &str,
        _patch: Value,
    ) -> Result<(), StoreError> {
        Err(Self::unavailable())
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<(), StoreError> {
        Err(Self::unavailable())
    }

    async fn commit(&self, _batch: WriteBatch) -> Result<(), StoreError> {
        Err(Self::unavailable())
    }
}

/// Store that lets a test sneak one write in between a service's reads
/// and its commit, modelling a second operator racing the transition.
#[allow(dead_code)]
pub struct RacingStore {
    inner: InMemoryStore,
    interloper: Mutex<Option<(String, String, Value)>>,
}

#[allow(dead_code)]
impl RacingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            interloper: Mutex::new(None),
        }
    }

    /// Queue a write to apply right before the next commit.
    pub async fn set_interloper(&self, collection: &str, id: &str, patch: Value) {
        let mut slot = self.interloper.lock().await;
        *slot = Some((collection.to_string(), id.to_string(), patch));
    }
}

#[async_trait]
impl DocumentStore for RacingStore {
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.inner.list_all(collection).await
    }

    async fn get_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        self.inner.get_by_id(collection, id).await
    }

    async fn create(&self, collection: &str, fields: Value) -> Result<String, StoreError> {
        self.inner.create(collection, fields).await
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> Result<(), StoreError> {
        self.inner.update_fields(collection, id, patch).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, id).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let queued = self.interloper.lock().await.take();
        if let Some((collection, id, patch)) = queued {
            self.inner.update_fields(&collection, &id, patch).await?;
        }
        self.inner.commit(batch).await
    }
}
