use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::Document;

/// One bill-of-materials line: how much of a raw material each unit of
/// the product consumes. Fractional consumption (0.35 m of fabric per
/// piece) is normal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredMaterial {
    pub material_id: String,
    pub quantity_per_unit: Decimal,
}

/// A document from the `products` collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(skip)]
    pub id: String,

    pub name: String,

    /// Bill of materials. Products without one start production unchecked.
    #[serde(default)]
    pub required_materials: Vec<RequiredMaterial>,
}

impl Product {
    pub fn from_document(doc: &Document) -> Result<Self, serde_json::Error> {
        let mut product: Product = serde_json::from_value(doc.fields.clone())?;
        product.id = doc.id.clone();
        Ok(product)
    }
}

/// Payload for registering a product and its bill of materials.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, message = "Product name must not be empty"))]
    pub name: String,
    #[serde(default)]
    pub required_materials: Vec<RequiredMaterialInput>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RequiredMaterialInput {
    pub material_id: String,
    pub quantity_per_unit: Decimal,
}
