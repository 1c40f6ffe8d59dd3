//! PCP Confecção
//!
//! Production planning and control for a small garment shop. Orders
//! move through a stock-gated status engine, driven directly or from
//! the headless Kanban board controller; master-data services cover
//! the catalog around them. Storage goes through the
//! [`store::DocumentStore`] trait; the bundled backend is in-memory.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod board;
pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod services;
pub mod store;

pub use errors::ServiceError;

pub mod prelude {
    pub use crate::board::{DropOutcome, KanbanBoard};
    pub use crate::errors::ServiceError;
    pub use crate::events::{event_channel, Event, EventSender};
    pub use crate::models::*;
    pub use crate::services::materials::MaterialService;
    pub use crate::services::orders::OrderService;
    pub use crate::services::production::ProductionFlowService;
    pub use crate::services::products::ProductService;
    pub use crate::store::{DocumentStore, InMemoryStore};
}
