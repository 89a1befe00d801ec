use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::DatabaseError;
use crate::food::models::{Analysis, AnalysisTexts, Product, ProductAttributes, ProductId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Paging and name filter for product listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub skip: u32,
    pub limit: u32,
    pub search: Option<String>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 10,
            search: None,
        }
    }
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Never matches an empty EAN.
    async fn find_by_ean(&self, ean: &str) -> Result<Option<Product>, DatabaseError>;

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, DatabaseError>;

    /// Inserts the product, or updates the existing row carrying the same EAN.
    async fn upsert(&self, product: ProductAttributes) -> Result<Product, DatabaseError>;

    /// Products with a non-empty EAN, optionally filtered by a case-insensitive name match.
    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>, DatabaseError>;

    async fn list_analyses_for_product(
        &self,
        id: ProductId,
        order: AnalysisOrder,
    ) -> Result<Vec<Analysis>, DatabaseError>;

    async fn latest_analysis(&self, id: ProductId) -> Result<Option<Analysis>, DatabaseError>;

    async fn insert_analysis(
        &self,
        product_id: ProductId,
        texts: AnalysisTexts,
        created_at: DateTime<Utc>,
    ) -> Result<Analysis, DatabaseError>;
}
