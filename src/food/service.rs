use log::info;
use std::sync::Arc;
use thiserror::Error;

use crate::database::{DatabaseError, ProductStore};
use crate::food::api::{CatalogError, ProductCatalog};
use crate::food::models::{Product, ProductAttributes};

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Product not found: {0}")]
    NotFound(String),
    #[error("Invalid EAN {0:?}: expected digits only")]
    InvalidEan(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// Resolves barcodes to stored products, importing from the catalog on a miss.
#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn ProductStore>,
    catalog: Arc<dyn ProductCatalog>,
}

impl ProductService {
    pub fn new(store: Arc<dyn ProductStore>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { store, catalog }
    }

    pub fn store(&self) -> &Arc<dyn ProductStore> {
        &self.store
    }

    pub async fn resolve(&self, ean: &str) -> Result<Product, LookupError> {
        let ean = ean.trim();
        if ean.is_empty() {
            return Err(LookupError::NotFound("empty EAN".to_string()));
        }
        if !ean.chars().all(|c| c.is_ascii_digit()) {
            return Err(LookupError::InvalidEan(ean.to_string()));
        }

        if let Some(product) = self.store.find_by_ean(ean).await? {
            return Ok(product);
        }

        match self.catalog.fetch_by_ean(ean).await? {
            Some(attributes) => {
                let product = self.store.upsert(attributes).await?;
                info!("Imported product {} (EAN: {}) from catalog", product.id, ean);
                Ok(product)
            }
            None => Err(LookupError::NotFound(ean.to_string())),
        }
    }

    /// Fills in a missing product name from caller-supplied data.
    pub async fn ensure_name(&self, product: Product, name: &str) -> Result<Product, LookupError> {
        let name = name.trim();
        if !product.name.trim().is_empty() || name.is_empty() {
            return Ok(product);
        }

        let mut attributes = ProductAttributes::from(product);
        attributes.name = name.to_string();
        Ok(self.store.upsert(attributes).await?)
    }
}
