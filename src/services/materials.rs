use std::sync::Arc;

use metrics::counter;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument};
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{CreateMaterialInput, RawMaterial, UpdateMaterialInput};
use crate::store::{collections, DocumentStore};

fn ensure_non_negative(field: &str, value: Decimal) -> Result<(), ServiceError> {
    if value < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be negative",
            field
        )));
    }
    Ok(())
}

/// Service for the raw-material inventory.
#[derive(Clone)]
pub struct MaterialService {
    store: Arc<dyn DocumentStore>,
    event_sender: Option<EventSender>,
}

impl MaterialService {
    pub fn new(store: Arc<dyn DocumentStore>, event_sender: Option<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn create_material(
        &self,
        input: CreateMaterialInput,
    ) -> Result<RawMaterial, ServiceError> {
        input.validate()?;
        ensure_non_negative("stock_quantity", input.stock_quantity)?;
        ensure_non_negative("low_stock_threshold", input.low_stock_threshold)?;

        let mut material = RawMaterial {
            id: String::new(),
            name: input.name,
            description: input.description,
            unit: input.unit,
            stock_quantity: input.stock_quantity,
            low_stock_threshold: input.low_stock_threshold,
        };
        let fields = serde_json::to_value(&material)?;
        material.id = self
            .store
            .create(collections::RAW_MATERIALS, fields)
            .await?;

        counter!("materials.created", 1);
        info!(material = %material.name, id = %material.id, "Raw material registered");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::MaterialCreated {
                    material_id: material.id.clone(),
                    name: material.name.clone(),
                })
                .await;
        }

        Ok(material)
    }

    /// Every material in the store. Documents that fail to decode are
    /// skipped.
    #[instrument(skip(self))]
    pub async fn list_materials(&self) -> Result<Vec<RawMaterial>, ServiceError> {
        let docs = self.store.list_all(collections::RAW_MATERIALS).await?;
        Ok(docs
            .iter()
            .filter_map(|doc| {
                super::decode_or_skip(
                    collections::RAW_MATERIALS,
                    doc,
                    RawMaterial::from_document,
                )
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_material(&self, id: &str) -> Result<RawMaterial, ServiceError> {
        let doc = self
            .store
            .get_by_id(collections::RAW_MATERIALS, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Raw material {} not found", id)))?;
        Ok(RawMaterial::from_document(&doc)?)
    }

    /// Full-form edit, including manual stock corrections.
    #[instrument(skip(self))]
    pub async fn update_material(
        &self,
        id: &str,
        input: UpdateMaterialInput,
    ) -> Result<RawMaterial, ServiceError> {
        input.validate()?;
        ensure_non_negative("stock_quantity", input.stock_quantity)?;
        ensure_non_negative("low_stock_threshold", input.low_stock_threshold)?;
        let current = self.get_material(id).await?;

        let updated = RawMaterial {
            id: current.id,
            name: input.name,
            description: input.description,
            unit: input.unit,
            stock_quantity: input.stock_quantity,
            low_stock_threshold: input.low_stock_threshold,
        };
        self.store
            .update_fields(
                collections::RAW_MATERIALS,
                id,
                json!({
                    "name": updated.name,
                    "description": updated.description,
                    "unit": updated.unit,
                    "stockQuantity": updated.stock_quantity,
                    "lowStockThreshold": updated.low_stock_threshold,
                }),
            )
            .await?;

        counter!("materials.updated", 1);
        info!(material = %updated.name, id = %updated.id, "Raw material updated");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::MaterialUpdated {
                    material_id: updated.id.clone(),
                    name: updated.name.clone(),
                })
                .await;
        }

        Ok(updated)
    }

    /// Removes a material. Orders referencing it are left alone; the
    /// stock gate treats the missing material as zero available.
    #[instrument(skip(self))]
    pub async fn delete_material(&self, id: &str) -> Result<(), ServiceError> {
        // Surface a NotFound before touching the store.
        let material = self.get_material(id).await?;
        self.store.delete(collections::RAW_MATERIALS, id).await?;

        counter!("materials.deleted", 1);
        info!(material = %material.name, id = %id, "Raw material deleted");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::MaterialDeleted {
                    material_id: id.to_string(),
                })
                .await;
        }

        Ok(())
    }

    /// Materials at or below their low-stock threshold.
    #[instrument(skip(self))]
    pub async fn low_stock_materials(&self) -> Result<Vec<RawMaterial>, ServiceError> {
        let materials = self.list_materials().await?;
        Ok(materials
            .into_iter()
            .filter(RawMaterial::is_low_stock)
            .collect())
    }
}
