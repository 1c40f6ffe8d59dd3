use std::sync::Arc;

use metrics::{counter, histogram};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{OrderStatus, Product, ProductionOrder, RawMaterial};
use crate::store::{collections, DocumentStore, Guard, StoreError, WriteBatch};

/// Quantity of one raw material needed to start an order.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialRequirement {
    pub material_id: String,
    pub required: Decimal,
}

/// One material the stock gate found short.
#[derive(Clone, Debug, PartialEq)]
pub struct StockShortage {
    pub material_id: String,
    pub name: String,
    pub required: Decimal,
    pub available: Decimal,
    pub shortage: Decimal,
}

impl StockShortage {
    /// Operator-facing one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{}: required {}, available {}",
            self.name, self.required, self.available
        )
    }
}

/// Outcome of checking an order's requirements against current stock.
#[derive(Clone, Debug)]
pub struct StockAvailability {
    pub can_start: bool,
    pub shortages: Vec<StockShortage>,
}

/// Planned stock movement for one material.
#[derive(Clone, Debug, PartialEq)]
pub struct StockDeduction {
    pub material_id: String,
    pub previous: Decimal,
    pub deducted: Decimal,
    pub remaining: Decimal,
}

/// Expands a product's bill of materials for the ordered quantity.
pub fn material_requirements(product: &Product, quantity: u32) -> Vec<MaterialRequirement> {
    product
        .required_materials
        .iter()
        .map(|line| MaterialRequirement {
            material_id: line.material_id.clone(),
            required: line.quantity_per_unit * Decimal::from(quantity),
        })
        .collect()
}

/// Checks every requirement against the materials on hand. A material
/// that is not in `materials` counts as zero available; an empty
/// requirement list passes.
pub fn check_availability(
    requirements: &[MaterialRequirement],
    materials: &[RawMaterial],
) -> StockAvailability {
    let mut shortages = Vec::new();
    for requirement in requirements {
        let material = materials.iter().find(|m| m.id == requirement.material_id);
        let available = material
            .map(|m| m.stock_quantity)
            .unwrap_or(Decimal::ZERO);
        if available < requirement.required {
            shortages.push(StockShortage {
                material_id: requirement.material_id.clone(),
                name: material
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|| requirement.material_id.clone()),
                required: requirement.required,
                available,
                shortage: requirement.required - available,
            });
        }
    }
    StockAvailability {
        can_start: shortages.is_empty(),
        shortages,
    }
}

/// Plans the stock deduction for every requirement whose material exists.
/// Remaining stock is floored at zero; with guarded commits the floor no
/// longer hides a concurrent overdraft, the commit fails instead.
pub fn plan_deductions(
    requirements: &[MaterialRequirement],
    materials: &[RawMaterial],
) -> Vec<StockDeduction> {
    requirements
        .iter()
        .filter_map(|requirement| {
            let material = materials.iter().find(|m| m.id == requirement.material_id)?;
            let previous = material.stock_quantity;
            let remaining = (previous - requirement.required).max(Decimal::ZERO);
            Some(StockDeduction {
                material_id: requirement.material_id.clone(),
                previous,
                deducted: previous - remaining,
                remaining,
            })
        })
        .collect()
}

/// Legal edges of the order status machine.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    match (from, to) {
        (OrderStatus::Pendente, OrderStatus::EmProducao) => true,
        (OrderStatus::EmProducao, OrderStatus::Concluida) => true,
        // Cancellation is allowed while the order is still moving.
        (OrderStatus::Pendente, OrderStatus::Cancelada) => true,
        (OrderStatus::EmProducao, OrderStatus::Cancelada) => true,
        _ => false,
    }
}

fn ensure_transition(order: &ProductionOrder, target: OrderStatus) -> Result<(), ServiceError> {
    if order.status == target {
        return Err(ServiceError::InvalidOperation(format!(
            "Order {} is already {}",
            order.order_id, target
        )));
    }
    if order.status.is_terminal() {
        return Err(ServiceError::InvalidStatus(format!(
            "Order {} is {} and can no longer change",
            order.order_id, order.status
        )));
    }
    if !is_valid_transition(order.status, target) {
        return Err(ServiceError::InvalidStatus(format!(
            "Order {} cannot move from {} to {}",
            order.order_id, order.status, target
        )));
    }
    Ok(())
}

/// Drives production orders through their status machine.
///
/// This is the single path for status changes; the board's drop handler
/// and any list-view action both land here, so the stock gate cannot be
/// bypassed. Every transition re-reads the documents it depends on and
/// commits through a guarded batch: a stale snapshot surfaces as
/// [`ServiceError::Conflict`] instead of a silent overwrite.
#[derive(Clone)]
pub struct ProductionFlowService {
    store: Arc<dyn DocumentStore>,
    event_sender: Option<EventSender>,
}

impl ProductionFlowService {
    pub fn new(store: Arc<dyn DocumentStore>, event_sender: Option<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Moves an order to `target`, running whatever checks that edge
    /// requires.
    #[instrument(skip(self))]
    pub async fn advance(
        &self,
        order_id: &str,
        target: OrderStatus,
    ) -> Result<ProductionOrder, ServiceError> {
        match target {
            OrderStatus::EmProducao => self.start_production(order_id).await,
            OrderStatus::Concluida => self.finish_production(order_id).await,
            OrderStatus::Cancelada => self.cancel_order(order_id).await,
            OrderStatus::Pendente => Err(ServiceError::InvalidStatus(
                "Orders cannot be moved back to pendente".to_string(),
            )),
        }
    }

    /// Starts production: runs the stock gate, then deducts the consumed
    /// materials and flips the order to `em_producao` in one guarded
    /// batch.
    #[instrument(skip(self))]
    pub async fn start_production(
        &self,
        order_id: &str,
    ) -> Result<ProductionOrder, ServiceError> {
        let order = self.fetch_order(order_id).await?;
        ensure_transition(&order, OrderStatus::EmProducao)?;

        // Fresh reads at transition time; nothing is trusted from an
        // earlier screen load.
        let requirements = match self.fetch_product(&order.product_id).await? {
            Some(product) => material_requirements(&product, order.quantity),
            // An order pointing at a removed product has nothing to check.
            None => Vec::new(),
        };
        let materials = self.fetch_materials(&requirements).await?;

        let availability = check_availability(&requirements, &materials);
        if !availability.can_start {
            let shortages: Vec<String> = availability
                .shortages
                .iter()
                .map(StockShortage::summary)
                .collect();
            counter!("production.flow.gate_rejected", 1);
            warn!(
                order = %order.order_id,
                "Stock gate rejected the order: {}",
                shortages.join("; ")
            );
            if let Some(sender) = &self.event_sender {
                sender
                    .send_or_log(Event::StockGateRejected {
                        order_id: order.id.clone(),
                        label: order.order_id.clone(),
                        shortages: shortages.clone(),
                    })
                    .await;
            }
            return Err(ServiceError::InsufficientStock(shortages.join("; ")));
        }

        let deductions = plan_deductions(&requirements, &materials);
        let mut batch = WriteBatch::new();
        for deduction in &deductions {
            batch = batch.update_guarded(
                collections::RAW_MATERIALS,
                &deduction.material_id,
                json!({ "stockQuantity": deduction.remaining }),
                vec![Guard::field_equals(
                    "stockQuantity",
                    json!(deduction.previous),
                )],
            );
        }
        batch = batch.update_guarded(
            collections::PRODUCTION_ORDERS,
            &order.id,
            json!({ "status": OrderStatus::EmProducao }),
            vec![Guard::field_equals("status", json!(order.status))],
        );
        self.commit_guarded(batch).await?;

        counter!("production.flow.started", 1);
        histogram!("production.flow.quantity", f64::from(order.quantity));
        self.publish_deductions(&deductions, &materials).await;
        self.publish_status_change(&order, OrderStatus::EmProducao)
            .await;
        info!(
            order = %order.order_id,
            materials = deductions.len(),
            "Production started, stock deducted"
        );

        Ok(ProductionOrder {
            status: OrderStatus::EmProducao,
            ..order
        })
    }

    /// Marks an order as produced. No stock moves here; the materials
    /// were consumed when production started.
    #[instrument(skip(self))]
    pub async fn finish_production(
        &self,
        order_id: &str,
    ) -> Result<ProductionOrder, ServiceError> {
        let order = self.fetch_order(order_id).await?;
        ensure_transition(&order, OrderStatus::Concluida)?;

        let batch = WriteBatch::new().update_guarded(
            collections::PRODUCTION_ORDERS,
            &order.id,
            json!({ "status": OrderStatus::Concluida }),
            vec![Guard::field_equals("status", json!(order.status))],
        );
        self.commit_guarded(batch).await?;

        counter!("production.flow.completed", 1);
        self.publish_status_change(&order, OrderStatus::Concluida)
            .await;
        info!(order = %order.order_id, "Production finished");

        Ok(ProductionOrder {
            status: OrderStatus::Concluida,
            ..order
        })
    }

    /// Cancels an order that has not finished. Stock already consumed by
    /// a started order is not returned.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<ProductionOrder, ServiceError> {
        let order = self.fetch_order(order_id).await?;
        ensure_transition(&order, OrderStatus::Cancelada)?;

        let batch = WriteBatch::new().update_guarded(
            collections::PRODUCTION_ORDERS,
            &order.id,
            json!({ "status": OrderStatus::Cancelada }),
            vec![Guard::field_equals("status", json!(order.status))],
        );
        self.commit_guarded(batch).await?;

        counter!("production.flow.cancelled", 1);
        self.publish_status_change(&order, OrderStatus::Cancelada)
            .await;
        info!(order = %order.order_id, from = %order.status, "Order cancelled");

        Ok(ProductionOrder {
            status: OrderStatus::Cancelada,
            ..order
        })
    }

    async fn fetch_order(&self, order_id: &str) -> Result<ProductionOrder, ServiceError> {
        let doc = self
            .store
            .get_by_id(collections::PRODUCTION_ORDERS, order_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Production order {} not found", order_id))
            })?;
        Ok(ProductionOrder::from_document(&doc)?)
    }

    async fn fetch_product(&self, product_id: &str) -> Result<Option<Product>, ServiceError> {
        let doc = self
            .store
            .get_by_id(collections::PRODUCTS, product_id)
            .await?;
        match doc {
            Some(doc) => match Product::from_document(&doc) {
                Ok(product) => Ok(Some(product)),
                Err(err) => {
                    warn!(id = %doc.id, error = %err, "Skipping product that failed to decode");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Fetches the materials referenced by the requirements. Missing or
    /// undecodable documents are left out and count as zero available.
    async fn fetch_materials(
        &self,
        requirements: &[MaterialRequirement],
    ) -> Result<Vec<RawMaterial>, ServiceError> {
        let mut materials = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            let doc = self
                .store
                .get_by_id(collections::RAW_MATERIALS, &requirement.material_id)
                .await?;
            if let Some(doc) = doc {
                match RawMaterial::from_document(&doc) {
                    Ok(material) => materials.push(material),
                    Err(err) => {
                        warn!(id = %doc.id, error = %err, "Skipping material that failed to decode");
                    }
                }
            }
        }
        Ok(materials)
    }

    async fn commit_guarded(&self, batch: WriteBatch) -> Result<(), ServiceError> {
        match self.store.commit(batch).await {
            Ok(()) => Ok(()),
            Err(StoreError::PreconditionFailed {
                collection,
                id,
                field,
            }) => {
                counter!("production.flow.conflicts", 1);
                warn!(%collection, %id, %field, "Guarded commit hit a stale document");
                Err(ServiceError::Conflict(format!(
                    "{} changed while the order was being moved, reload and retry",
                    field
                )))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn publish_status_change(&self, order: &ProductionOrder, to: OrderStatus) {
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id: order.id.clone(),
                    label: order.order_id.clone(),
                    old_status: order.status,
                    new_status: to,
                })
                .await;
        }
    }

    /// Emits stock movement events, flagging materials that crossed their
    /// low-stock threshold with this deduction.
    async fn publish_deductions(
        &self,
        deductions: &[StockDeduction],
        materials: &[RawMaterial],
    ) {
        if let Some(sender) = &self.event_sender {
            for deduction in deductions {
                let material = match materials.iter().find(|m| m.id == deduction.material_id) {
                    Some(material) => material,
                    None => continue,
                };
                sender
                    .send_or_log(Event::StockDeducted {
                        material_id: deduction.material_id.clone(),
                        name: material.name.clone(),
                        previous: deduction.previous,
                        remaining: deduction.remaining,
                    })
                    .await;
                let crossed = deduction.previous > material.low_stock_threshold
                    && deduction.remaining <= material.low_stock_threshold;
                if crossed {
                    counter!("materials.low_stock_alerts", 1);
                    sender
                        .send_or_log(Event::MaterialLowStock {
                            material_id: deduction.material_id.clone(),
                            name: material.name.clone(),
                            remaining: deduction.remaining,
                            threshold: material.low_stock_threshold,
                        })
                        .await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequiredMaterial;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn material(id: &str, name: &str, stock: Decimal) -> RawMaterial {
        RawMaterial {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            unit: "m".to_string(),
            stock_quantity: stock,
            low_stock_threshold: Decimal::ZERO,
        }
    }

    fn product(lines: &[(&str, Decimal)]) -> Product {
        Product {
            id: "p1".to_string(),
            name: "Camiseta Básica".to_string(),
            required_materials: lines
                .iter()
                .map(|(id, quantity)| RequiredMaterial {
                    material_id: id.to_string(),
                    quantity_per_unit: *quantity,
                })
                .collect(),
        }
    }

    #[test]
    fn test_requirements_scale_with_the_ordered_quantity() {
        let product = product(&[("tecido", dec!(2)), ("linha", dec!(0.35))]);
        let requirements = material_requirements(&product, 3);
        assert_eq!(requirements[0].required, dec!(6));
        assert_eq!(requirements[1].required, dec!(1.05));
    }

    #[test]
    fn test_an_empty_bom_passes_the_gate() {
        let availability = check_availability(&[], &[material("m1", "Tecido", dec!(0))]);
        assert!(availability.can_start);
        assert!(availability.shortages.is_empty());
    }

    #[test]
    fn test_exact_stock_passes_the_gate() {
        let product = product(&[("tecido", dec!(2))]);
        let requirements = material_requirements(&product, 3);
        let availability =
            check_availability(&requirements, &[material("tecido", "Tecido", dec!(6))]);
        assert!(availability.can_start);
    }

    #[test]
    fn test_shortages_report_exact_numbers() {
        // 3 shirts at 2m each against 5m of fabric.
        let product = product(&[("tecido", dec!(2))]);
        let requirements = material_requirements(&product, 3);
        let availability =
            check_availability(&requirements, &[material("tecido", "Tecido", dec!(5))]);

        assert!(!availability.can_start);
        assert_eq!(availability.shortages.len(), 1);
        let shortage = &availability.shortages[0];
        assert_eq!(shortage.required, dec!(6));
        assert_eq!(shortage.available, dec!(5));
        assert_eq!(shortage.shortage, dec!(1));
        assert_eq!(shortage.summary(), "Tecido: required 6, available 5");
    }

    #[test]
    fn test_a_missing_material_counts_as_zero_available() {
        let product = product(&[("fantasma", dec!(1))]);
        let requirements = material_requirements(&product, 1);
        let availability = check_availability(&requirements, &[]);

        assert!(!availability.can_start);
        assert_eq!(availability.shortages[0].available, Decimal::ZERO);
        assert_eq!(availability.shortages[0].name, "fantasma");
    }

    #[test]
    fn test_deductions_floor_at_zero() {
        let product = product(&[("tecido", dec!(7))]);
        let requirements = material_requirements(&product, 1);
        let deductions =
            plan_deductions(&requirements, &[material("tecido", "Tecido", dec!(5))]);

        assert_eq!(deductions.len(), 1);
        assert_eq!(deductions[0].previous, dec!(5));
        assert_eq!(deductions[0].deducted, dec!(5));
        assert_eq!(deductions[0].remaining, Decimal::ZERO);
    }

    #[test]
    fn test_deductions_skip_unknown_materials() {
        let product = product(&[("fantasma", dec!(1)), ("tecido", dec!(2))]);
        let requirements = material_requirements(&product, 1);
        let deductions =
            plan_deductions(&requirements, &[material("tecido", "Tecido", dec!(5))]);

        assert_eq!(deductions.len(), 1);
        assert_eq!(deductions[0].material_id, "tecido");
        assert_eq!(deductions[0].remaining, dec!(3));
    }

    #[test]
    fn test_the_status_machine_edges() {
        use OrderStatus::*;
        assert!(is_valid_transition(Pendente, EmProducao));
        assert!(is_valid_transition(EmProducao, Concluida));
        assert!(is_valid_transition(Pendente, Cancelada));
        assert!(is_valid_transition(EmProducao, Cancelada));

        assert!(!is_valid_transition(Pendente, Concluida));
        assert!(!is_valid_transition(EmProducao, Pendente));
        assert!(!is_valid_transition(Cancelada, Pendente));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        use strum::IntoEnumIterator;
        for from in [OrderStatus::Concluida, OrderStatus::Cancelada] {
            for to in OrderStatus::iter() {
                assert!(!is_valid_transition(from, to));
            }
        }
    }

    proptest! {
        #[test]
        fn prop_gate_agrees_with_its_shortage_list(
            stock in 0u32..500,
            per_unit in 1u32..20,
            quantity in 1u32..50,
        ) {
            let product = product(&[("tecido", Decimal::from(per_unit))]);
            let requirements = material_requirements(&product, quantity);
            let availability = check_availability(
                &requirements,
                &[material("tecido", "Tecido", Decimal::from(stock))],
            );

            prop_assert_eq!(availability.can_start, availability.shortages.is_empty());
            prop_assert_eq!(
                availability.can_start,
                u64::from(per_unit) * u64::from(quantity) <= u64::from(stock)
            );
        }

        #[test]
        fn prop_deductions_never_overdraw(
            stock in 0u32..500,
            per_unit in 1u32..20,
            quantity in 1u32..50,
        ) {
            let product = product(&[("tecido", Decimal::from(per_unit))]);
            let requirements = material_requirements(&product, quantity);
            let materials = [material("tecido", "Tecido", Decimal::from(stock))];
            let deductions = plan_deductions(&requirements, &materials);

            for deduction in &deductions {
                prop_assert!(deduction.remaining >= Decimal::ZERO);
                prop_assert!(deduction.deducted <= deduction.previous);
                prop_assert_eq!(
                    deduction.previous - deduction.deducted,
                    deduction.remaining
                );
            }
        }

        #[test]
        fn prop_approved_orders_consume_exactly_what_they_need(
            stock in 0u32..500,
            per_unit in 1u32..20,
            quantity in 1u32..50,
        ) {
            let product = product(&[("tecido", Decimal::from(per_unit))]);
            let requirements = material_requirements(&product, quantity);
            let materials = [material("tecido", "Tecido", Decimal::from(stock))];

            if check_availability(&requirements, &materials).can_start {
                let deductions = plan_deductions(&requirements, &materials);
                prop_assert_eq!(deductions.len(), requirements.len());
                for (deduction, requirement) in deductions.iter().zip(&requirements) {
                    prop_assert_eq!(deduction.deducted, requirement.required);
                }
            }
        }
    }
}
