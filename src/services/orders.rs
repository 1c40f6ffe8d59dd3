use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde_json::json;
use tracing::{info, instrument};
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{CreateOrderInput, Product, ProductionOrder, UpdateOrderInput};
use crate::store::{collections, DocumentStore};

/// Service for registering and editing production orders. Status never
/// changes here; that is the flow service's job.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn DocumentStore>,
    event_sender: Option<EventSender>,
}

impl OrderService {
    pub fn new(store: Arc<dyn DocumentStore>, event_sender: Option<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Registers a new order. The product name is copied onto the order
    /// so cards and lists render without a second lookup; a missing
    /// product leaves it blank.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        input: CreateOrderInput,
    ) -> Result<ProductionOrder, ServiceError> {
        input.validate()?;

        let product_name = match self
            .store
            .get_by_id(collections::PRODUCTS, &input.product_id)
            .await?
        {
            Some(doc) => Product::from_document(&doc)
                .map(|product| product.name)
                .unwrap_or_default(),
            None => String::new(),
        };

        let mut order = ProductionOrder {
            id: String::new(),
            order_id: input.order_id,
            product_id: input.product_id,
            product_name,
            quantity: input.quantity,
            priority: input.priority,
            status: input.status.unwrap_or_default(),
            date: Utc::now().date_naive(),
            due_date: input.due_date,
            notes: input.notes.unwrap_or_default(),
        };
        let fields = serde_json::to_value(&order)?;
        order.id = self
            .store
            .create(collections::PRODUCTION_ORDERS, fields)
            .await?;

        counter!("orders.created", 1);
        info!(order = %order.order_id, id = %order.id, "Production order created");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderCreated {
                    order_id: order.id.clone(),
                    label: order.order_id.clone(),
                })
                .await;
        }

        Ok(order)
    }

    /// Every order in the store, oldest first. Documents that fail to
    /// decode are skipped.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<ProductionOrder>, ServiceError> {
        let docs = self.store.list_all(collections::PRODUCTION_ORDERS).await?;
        Ok(docs
            .iter()
            .filter_map(|doc| {
                super::decode_or_skip(
                    collections::PRODUCTION_ORDERS,
                    doc,
                    ProductionOrder::from_document,
                )
            })
            .collect())
    }

    /// The last `limit` orders registered, newest first.
    #[instrument(skip(self))]
    pub async fn recent_orders(&self, limit: usize) -> Result<Vec<ProductionOrder>, ServiceError> {
        let mut orders = self.list_orders().await?;
        let start = orders.len().saturating_sub(limit);
        let mut recent: Vec<ProductionOrder> = orders.drain(start..).collect();
        recent.reverse();
        Ok(recent)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: &str) -> Result<ProductionOrder, ServiceError> {
        let doc = self
            .store
            .get_by_id(collections::PRODUCTION_ORDERS, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Production order {} not found", id)))?;
        Ok(ProductionOrder::from_document(&doc)?)
    }

    /// Full-form edit of an order. Status and the registration date are
    /// not form fields and stay untouched.
    #[instrument(skip(self))]
    pub async fn update_order(
        &self,
        id: &str,
        input: UpdateOrderInput,
    ) -> Result<ProductionOrder, ServiceError> {
        input.validate()?;
        let order = self.get_order(id).await?;

        let product_name = match self
            .store
            .get_by_id(collections::PRODUCTS, &input.product_id)
            .await?
        {
            Some(doc) => Product::from_document(&doc)
                .map(|product| product.name)
                .unwrap_or_default(),
            None => String::new(),
        };

        let updated = ProductionOrder {
            id: order.id.clone(),
            order_id: input.order_id,
            product_id: input.product_id,
            product_name,
            quantity: input.quantity,
            priority: input.priority,
            status: order.status,
            date: order.date,
            due_date: input.due_date,
            notes: input.notes.unwrap_or_default(),
        };
        self.store
            .update_fields(
                collections::PRODUCTION_ORDERS,
                id,
                json!({
                    "orderId": updated.order_id,
                    "productId": updated.product_id,
                    "productName": updated.product_name,
                    "quantity": updated.quantity,
                    "priority": updated.priority,
                    "dueDate": updated.due_date,
                    "notes": updated.notes,
                }),
            )
            .await?;

        counter!("orders.updated", 1);
        info!(order = %updated.order_id, id = %updated.id, "Production order updated");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderUpdated {
                    order_id: updated.id.clone(),
                    label: updated.order_id.clone(),
                })
                .await;
        }

        Ok(updated)
    }
}
