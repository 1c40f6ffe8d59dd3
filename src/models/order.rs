use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::Document;

/// Lifecycle states of a production order. The wire values double as the
/// column ids of the factory-floor board.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pendente,
    EmProducao,
    Concluida,
    Cancelada,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pendente
    }
}

impl OrderStatus {
    /// Column title as displayed on the board.
    pub fn title(&self) -> &'static str {
        match self {
            OrderStatus::Pendente => "Pendente",
            OrderStatus::EmProducao => "Em Produção",
            OrderStatus::Concluida => "Concluída",
            OrderStatus::Cancelada => "Cancelada",
        }
    }

    /// Terminal orders never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Concluida | OrderStatus::Cancelada)
    }
}

/// Scheduling priority of a production order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderPriority {
    Baixa,
    Normal,
    Alta,
    Urgente,
}

impl Default for OrderPriority {
    fn default() -> Self {
        OrderPriority::Normal
    }
}

/// A document from the `production_orders` collection.
///
/// Field names follow the camelCase convention of the hosted database, so
/// documents written by earlier versions of the app deserialize unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionOrder {
    /// Backend-assigned document id; never stored inside the body.
    #[serde(skip)]
    pub id: String,

    /// Human-facing order label, e.g. "OP-001". Unique by convention only.
    pub order_id: String,

    pub product_id: String,

    /// Product name captured at creation time so cards render without a
    /// second lookup. Blank when the product was already gone.
    #[serde(default)]
    pub product_name: String,

    /// Units to produce.
    pub quantity: u32,

    #[serde(default)]
    pub priority: OrderPriority,

    #[serde(default)]
    pub status: OrderStatus,

    /// Date the order was registered.
    pub date: NaiveDate,

    pub due_date: NaiveDate,

    #[serde(default)]
    pub notes: String,
}

impl ProductionOrder {
    /// Decodes a raw document, attaching the backend id.
    pub fn from_document(doc: &Document) -> Result<Self, serde_json::Error> {
        let mut order: ProductionOrder = serde_json::from_value(doc.fields.clone())?;
        order.id = doc.id.clone();
        Ok(order)
    }
}

/// Payload for registering a new production order.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    #[validate(length(min = 1, message = "Order label must not be empty"))]
    pub order_id: String,
    #[validate(length(min = 1, message = "Product reference must not be empty"))]
    pub product_id: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    #[serde(default)]
    pub priority: OrderPriority,
    /// Initial status; `pendente` when omitted.
    #[serde(default)]
    pub status: Option<OrderStatus>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Full-form edit of an existing order. Status is not part of the form;
/// it only changes through the production flow.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct UpdateOrderInput {
    #[validate(length(min = 1, message = "Order label must not be empty"))]
    pub order_id: String,
    #[validate(length(min = 1, message = "Product reference must not be empty"))]
    pub product_id: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    pub priority: OrderPriority,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}
