pub mod openfoodfacts;

use async_trait::async_trait;
use thiserror::Error;

use crate::food::models::ProductAttributes;

// Re-export common types
pub use openfoodfacts::OpenFoodFactsClient;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Request(String),
    #[error("Failed to parse catalog response: {0}")]
    Decode(String),
}

/// External product catalog consulted for EANs unknown locally.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn fetch_by_ean(&self, ean: &str) -> Result<Option<ProductAttributes>, CatalogError>;
}
