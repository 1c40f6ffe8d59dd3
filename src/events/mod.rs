use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::OrderStatus;

/// Cloneable handle for emitting events into the processing channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Wraps the sending half of the channel.
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Queues an event for the processing loop.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Event channel send failed: {}", e))
    }

    /// Sends an event, logging delivery failure instead of returning it.
    /// Event delivery is best-effort and must not fail the action that
    /// produced the event.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event not delivered: {}", e);
        }
    }
}

/// Creates the bounded channel that wires services to the processing loop.
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Everything the services announce while they change documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated {
        order_id: String,
        label: String,
    },
    OrderUpdated {
        order_id: String,
        label: String,
    },
    OrderStatusChanged {
        order_id: String,
        label: String,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },

    // Production flow events
    StockGateRejected {
        order_id: String,
        label: String,
        shortages: Vec<String>,
    },
    StockDeducted {
        material_id: String,
        name: String,
        previous: Decimal,
        remaining: Decimal,
    },
    MaterialLowStock {
        material_id: String,
        name: String,
        remaining: Decimal,
        threshold: Decimal,
    },

    // Board events
    CardMoved {
        order_id: String,
        label: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    // Master data events
    ProductCreated {
        product_id: String,
        name: String,
    },
    MaterialCreated {
        material_id: String,
        name: String,
    },
    MaterialUpdated {
        material_id: String,
        name: String,
    },
    MaterialDeleted {
        material_id: String,
    },
}

/// Processes incoming events, writing one operator-facing log line per
/// event. Runs until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Event processing started");

    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderCreated { order_id, label } => {
                info!("Production order {} registered ({})", label, order_id);
            }
            Event::OrderUpdated { order_id: _, label } => {
                info!("Production order {} updated", label);
            }
            Event::OrderStatusChanged {
                label,
                old_status,
                new_status,
                ..
            } => {
                info!(
                    "Order {} moved from {} to {}",
                    label, old_status, new_status
                );
            }
            Event::StockGateRejected { label, shortages, .. } => {
                warn!(
                    "Order {} held back by the stock gate: {}",
                    label,
                    shortages.join("; ")
                );
            }
            Event::StockDeducted {
                name,
                previous,
                remaining,
                ..
            } => {
                info!("Stock of {} moved from {} to {}", name, previous, remaining);
            }
            Event::MaterialLowStock {
                name,
                remaining,
                threshold,
                ..
            } => {
                warn!(
                    "Low stock alert: {} has only {} remaining (threshold {})",
                    name, remaining, threshold
                );
            }
            Event::CardMoved { label, from, to, .. } => {
                info!(
                    "Card {} dragged from {} to {}",
                    label,
                    from.title(),
                    to.title()
                );
            }
            Event::ProductCreated { name, .. } => {
                info!("Product {} registered", name);
            }
            Event::MaterialCreated { name, .. } => {
                info!("Raw material {} registered", name);
            }
            Event::MaterialUpdated { name, .. } => {
                info!("Raw material {} updated", name);
            }
            Event::MaterialDeleted { material_id } => {
                info!("Raw material {} removed", material_id);
            }
        }
    }

    warn!("All event senders dropped; processing stopped");
}
