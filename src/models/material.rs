use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::Document;

/// A document from the `raw_materials` collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMaterial {
    #[serde(skip)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Unit of measure, e.g. "m" or "kg".
    #[serde(default)]
    pub unit: String,

    /// Current stock on hand. Never driven below zero by the app.
    pub stock_quantity: Decimal,

    /// Stock at or below this level triggers the low-stock alert.
    #[serde(default)]
    pub low_stock_threshold: Decimal,
}

impl RawMaterial {
    pub fn from_document(doc: &Document) -> Result<Self, serde_json::Error> {
        let mut material: RawMaterial = serde_json::from_value(doc.fields.clone())?;
        material.id = doc.id.clone();
        Ok(material)
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }
}

/// Payload for registering a raw material.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CreateMaterialInput {
    #[validate(length(min = 1, message = "Material name must not be empty"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: String,
    pub stock_quantity: Decimal,
    #[serde(default)]
    pub low_stock_threshold: Decimal,
}

/// Full-form edit of an existing material.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct UpdateMaterialInput {
    #[validate(length(min = 1, message = "Material name must not be empty"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: String,
    pub stock_quantity: Decimal,
    #[serde(default)]
    pub low_stock_threshold: Decimal,
}
