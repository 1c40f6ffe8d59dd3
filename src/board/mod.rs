use std::str::FromStr;

use metrics::counter;
use strum::IntoEnumIterator;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{OrderStatus, ProductionOrder};
use crate::services::orders::OrderService;
use crate::services::production::ProductionFlowService;

/// One rendered column of the board.
#[derive(Clone, Debug)]
pub struct BoardColumn {
    pub status: OrderStatus,
    pub title: String,
    pub cards: Vec<ProductionOrder>,
}

/// The card currently being dragged and the column it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragState {
    pub order_id: String,
    pub origin: OrderStatus,
}

/// What a drop did. `Ignored` means the card snapped back without any
/// write being issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    Ignored,
    Moved {
        from: OrderStatus,
        to: OrderStatus,
    },
}

/// Headless controller for the production Kanban board. Holds a local
/// snapshot of the orders plus the active drag; rendering belongs to
/// the host UI.
///
/// Column membership is always derived from the snapshot. Drops go
/// through [`ProductionFlowService::advance`], so a drag cannot bypass
/// the stock gate, and a rejected drop rolls the local move back.
pub struct KanbanBoard {
    orders: OrderService,
    flow: ProductionFlowService,
    event_sender: Option<EventSender>,
    snapshot: Vec<ProductionOrder>,
    drag: Option<DragState>,
}

impl KanbanBoard {
    pub fn new(
        orders: OrderService,
        flow: ProductionFlowService,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            orders,
            flow,
            event_sender,
            snapshot: Vec::new(),
            drag: None,
        }
    }

    /// Refetches every order and drops any drag in flight.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> Result<(), ServiceError> {
        self.snapshot = self.orders.list_orders().await?;
        self.drag = None;
        info!(cards = self.snapshot.len(), "Board loaded");
        Ok(())
    }

    /// The four fixed columns in board order. Every snapshot order lands
    /// in exactly one column; within a column, cards keep the backing
    /// list's order.
    pub fn columns(&self) -> Vec<BoardColumn> {
        OrderStatus::iter()
            .map(|status| BoardColumn {
                status,
                title: status.title().to_string(),
                cards: self
                    .snapshot
                    .iter()
                    .filter(|order| order.status == status)
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    pub fn cards_in(&self, status: OrderStatus) -> Vec<&ProductionOrder> {
        self.snapshot
            .iter()
            .filter(|order| order.status == status)
            .collect()
    }

    /// Card count per column, in board order. Drives the column header
    /// badges.
    pub fn column_counts(&self) -> Vec<(OrderStatus, usize)> {
        OrderStatus::iter()
            .map(|status| (status, self.cards_in(status).len()))
            .collect()
    }

    pub fn active_drag(&self) -> Option<&DragState> {
        self.drag.as_ref()
    }

    pub fn dragged_card(&self) -> Option<&ProductionOrder> {
        let drag = self.drag.as_ref()?;
        self.snapshot.iter().find(|order| order.id == drag.order_id)
    }

    /// Records the card being dragged. Nothing is written until the
    /// drop.
    pub fn drag_start(&mut self, order_id: &str) -> Result<(), ServiceError> {
        let card = self
            .snapshot
            .iter()
            .find(|order| order.id == order_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} is not on the board", order_id))
            })?;
        self.drag = Some(DragState {
            order_id: card.id.clone(),
            origin: card.status,
        });
        Ok(())
    }

    /// Resolves a drop. `target` is the column id under the cursor, or
    /// `None` when the card was released outside the board.
    ///
    /// The card moves locally first so the UI does not stutter, and the
    /// transition service decides for real; a rejected move is rolled
    /// back and the error returned for the caller to surface. The drag
    /// is cleared either way.
    #[instrument(skip(self))]
    pub async fn drop_on(&mut self, target: Option<&str>) -> Result<DropOutcome, ServiceError> {
        let drag = match self.drag.take() {
            Some(drag) => drag,
            None => return Ok(DropOutcome::Ignored),
        };
        let target = match target.and_then(|column| OrderStatus::from_str(column).ok()) {
            Some(status) => status,
            None => return Ok(DropOutcome::Ignored),
        };
        if target == drag.origin {
            return Ok(DropOutcome::Ignored);
        }

        // Optimistic local move; the flow service has the final word.
        self.set_local_status(&drag.order_id, target);
        match self.flow.advance(&drag.order_id, target).await {
            Ok(order) => {
                counter!("board.cards.moved", 1);
                info!(
                    order = %order.order_id,
                    from = %drag.origin,
                    to = %target,
                    "Card moved"
                );
                if let Some(sender) = &self.event_sender {
                    sender
                        .send_or_log(Event::CardMoved {
                            order_id: order.id.clone(),
                            label: order.order_id.clone(),
                            from: drag.origin,
                            to: target,
                        })
                        .await;
                }
                self.replace_card(order);
                Ok(DropOutcome::Moved {
                    from: drag.origin,
                    to: target,
                })
            }
            Err(err) => {
                counter!("board.moves.rejected", 1);
                self.set_local_status(&drag.order_id, drag.origin);
                Err(err)
            }
        }
    }

    fn set_local_status(&mut self, order_id: &str, status: OrderStatus) {
        if let Some(card) = self.snapshot.iter_mut().find(|order| order.id == order_id) {
            card.status = status;
        }
    }

    fn replace_card(&mut self, order: ProductionOrder) {
        if let Some(card) = self.snapshot.iter_mut().find(|card| card.id == order.id) {
            *card = order;
        }
    }
}
