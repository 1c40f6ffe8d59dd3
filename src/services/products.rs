use std::sync::Arc;

use metrics::counter;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{CreateProductInput, Product, RequiredMaterial};
use crate::store::{collections, DocumentStore};

/// Service for the product catalog and its bills of materials.
#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn DocumentStore>,
    event_sender: Option<EventSender>,
}

impl ProductService {
    pub fn new(store: Arc<dyn DocumentStore>, event_sender: Option<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Registers a product. Material references are stored as given;
    /// nothing checks that they point at live materials.
    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<Product, ServiceError> {
        input.validate()?;
        for line in &input.required_materials {
            if line.material_id.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "Every material line needs a material reference".to_string(),
                ));
            }
            if line.quantity_per_unit <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "Quantity per unit for {} must be greater than zero",
                    line.material_id
                )));
            }
        }

        let mut product = Product {
            id: String::new(),
            name: input.name,
            required_materials: input
                .required_materials
                .into_iter()
                .map(|line| RequiredMaterial {
                    material_id: line.material_id,
                    quantity_per_unit: line.quantity_per_unit,
                })
                .collect(),
        };
        let fields = serde_json::to_value(&product)?;
        product.id = self.store.create(collections::PRODUCTS, fields).await?;

        counter!("products.created", 1);
        info!(product = %product.name, id = %product.id, "Product registered");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::ProductCreated {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                })
                .await;
        }

        Ok(product)
    }

    /// Every product in the catalog. Documents that fail to decode are
    /// skipped.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        let docs = self.store.list_all(collections::PRODUCTS).await?;
        Ok(docs
            .iter()
            .filter_map(|doc| {
                super::decode_or_skip(collections::PRODUCTS, doc, Product::from_document)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &str) -> Result<Product, ServiceError> {
        let doc = self
            .store
            .get_by_id(collections::PRODUCTS, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
        Ok(Product::from_document(&doc)?)
    }
}
