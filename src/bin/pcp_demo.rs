//! End-to-end walkthrough of the production board.
//!
//! Run with: cargo run --bin pcp-demo
//!
//! Seeds a small catalog, then drags two orders across the Kanban board:
//! one that the stock gate rejects and one that goes all the way to
//! concluida, deducting fabric on the way.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal_macros::dec;
use tracing::{info, warn};

use pcp_confeccao::board::KanbanBoard;
use pcp_confeccao::config;
use pcp_confeccao::events::{event_channel, process_events};
use pcp_confeccao::models::{
    CreateMaterialInput, CreateOrderInput, CreateProductInput, OrderPriority,
    RequiredMaterialInput,
};
use pcp_confeccao::services::materials::MaterialService;
use pcp_confeccao::services::orders::OrderService;
use pcp_confeccao::services::production::ProductionFlowService;
use pcp_confeccao::services::products::ProductService;
use pcp_confeccao::store::{DocumentStore, InMemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("=== PCP Confecção demo ===");

    let (event_sender, event_rx) = event_channel(cfg.event_buffer_size);
    tokio::spawn(process_events(event_rx));

    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
    let materials = MaterialService::new(store.clone(), Some(event_sender.clone()));
    let products = ProductService::new(store.clone(), Some(event_sender.clone()));
    let orders = OrderService::new(store.clone(), Some(event_sender.clone()));
    let flow = ProductionFlowService::new(store.clone(), Some(event_sender.clone()));
    let mut board = KanbanBoard::new(orders.clone(), flow, Some(event_sender.clone()));

    // Seed the catalog: 5m of fabric, shirts that take 2m each.
    info!("Seeding catalog...");
    let fabric = materials
        .create_material(CreateMaterialInput {
            name: "Tecido Algodão".to_string(),
            description: "Malha 30.1 penteada".to_string(),
            unit: "m".to_string(),
            stock_quantity: dec!(5),
            low_stock_threshold: dec!(2),
        })
        .await?;
    let shirt = products
        .create_product(CreateProductInput {
            name: "Camiseta Básica".to_string(),
            required_materials: vec![RequiredMaterialInput {
                material_id: fabric.id.clone(),
                quantity_per_unit: dec!(2),
            }],
        })
        .await?;

    let due = Utc::now().date_naive() + ChronoDuration::days(7);
    let op101 = orders
        .create_order(CreateOrderInput {
            order_id: "OP-101".to_string(),
            product_id: shirt.id.clone(),
            quantity: 3,
            priority: OrderPriority::Alta,
            status: None,
            due_date: due,
            notes: Some("Pedido da loja do centro".to_string()),
        })
        .await?;
    let op102 = orders
        .create_order(CreateOrderInput {
            order_id: "OP-102".to_string(),
            product_id: shirt.id.clone(),
            quantity: 2,
            priority: OrderPriority::Normal,
            status: None,
            due_date: due,
            notes: None,
        })
        .await?;

    board.load().await?;
    print_board(&board);

    // OP-101 needs 6m but only 5m is on hand; the drop is rejected and
    // the card snaps back to pendente.
    info!("Dragging {} to em_producao...", op101.order_id);
    board.drag_start(&op101.id)?;
    match board.drop_on(Some("em_producao")).await {
        Ok(outcome) => info!("Unexpected outcome: {:?}", outcome),
        Err(err) => warn!("Move rejected: {}", err),
    }
    let stock = materials.get_material(&fabric.id).await?;
    info!("{} still has {}{}", stock.name, stock.stock_quantity, stock.unit);

    // OP-102 needs 4m, which fits; the fabric drops to 1m and crosses
    // the low-stock threshold.
    info!("Dragging {} to em_producao...", op102.order_id);
    board.drag_start(&op102.id)?;
    board.drop_on(Some("em_producao")).await?;
    let stock = materials.get_material(&fabric.id).await?;
    info!("{} now has {}{}", stock.name, stock.stock_quantity, stock.unit);

    info!("Dragging {} to concluida...", op102.order_id);
    board.drag_start(&op102.id)?;
    board.drop_on(Some("concluida")).await?;

    print_board(&board);

    let low = materials.low_stock_materials().await?;
    for material in &low {
        info!(
            "Low stock: {} ({}{} on hand, threshold {}{})",
            material.name,
            material.stock_quantity,
            material.unit,
            material.low_stock_threshold,
            material.unit
        );
    }

    // Let the event loop drain before the runtime shuts down.
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}

fn print_board(board: &KanbanBoard) {
    info!("--- Board ---");
    for column in board.columns() {
        let cards: Vec<String> = column
            .cards
            .iter()
            .map(|card| format!("{} ({}x {})", card.order_id, card.quantity, card.product_name))
            .collect();
        info!("{:<12} | {}", column.title, cards.join(", "));
    }
}
