//! Serves cached analyses and regenerates stale ones, at most one regeneration
//! per product at a time.
//!
//! Exclusion is per process only. Several processes sharing one database can each
//! regenerate the same stale product once.

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::engine::AnalysisEngine;
use super::freshness::{Clock, FreshnessPolicy};
use crate::database::{AnalysisOrder, DatabaseError, ProductStore};
use crate::food::models::{Analysis, AnalysisTexts, Product, ProductId, ProductInput};
use crate::providers::traits::LlmError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),
    #[error("Analysis generation failed: {0}")]
    GenerationFailed(#[from] LlmError),
    #[error("Failed to persist analysis: {0}")]
    PersistenceFailure(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Analysis task failed: {0}")]
    TaskFailed(String),
}

impl From<DatabaseError> for AnalysisError {
    fn from(e: DatabaseError) -> Self {
        AnalysisError::Storage(e.to_string())
    }
}

type Regeneration = Shared<BoxFuture<'static, Result<Analysis, AnalysisError>>>;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub freshness: FreshnessPolicy,
    /// Total tries for the analysis insert after a successful generation.
    pub persist_attempts: u32,
    pub persist_backoff: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            freshness: FreshnessPolicy::default(),
            persist_attempts: 3,
            persist_backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Clone)]
pub struct AnalysisCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn ProductStore>,
    engine: AnalysisEngine,
    clock: Arc<dyn Clock>,
    settings: CoordinatorSettings,
    in_flight: Mutex<HashMap<ProductId, Regeneration>>,
}

impl AnalysisCoordinator {
    pub fn new(
        store: Arc<dyn ProductStore>,
        engine: AnalysisEngine,
        clock: Arc<dyn Clock>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                engine,
                clock,
                settings,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the product's analysis if it is still fresh, otherwise joins or
    /// starts the product's regeneration.
    pub async fn get_or_refresh_analysis(
        &self,
        product_id: ProductId,
    ) -> Result<Analysis, AnalysisError> {
        let product = self
            .inner
            .store
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| AnalysisError::ProductNotFound(product_id.to_string()))?;

        if let Some(current) = self.inner.fresh_analysis(product_id).await? {
            debug!("Serving cached analysis {} for product {}", current.id, product_id);
            return Ok(current);
        }

        self.regeneration_for(product).await
    }

    /// All analyses of a product, newest first.
    pub async fn history(&self, product_id: ProductId) -> Result<Vec<Analysis>, AnalysisError> {
        if self.inner.store.find_by_id(product_id).await?.is_none() {
            return Err(AnalysisError::ProductNotFound(product_id.to_string()));
        }

        Ok(self
            .inner
            .store
            .list_analyses_for_product(product_id, AnalysisOrder::NewestFirst)
            .await?)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    fn regeneration_for(&self, product: Product) -> Regeneration {
        let mut in_flight = self.inner.in_flight.lock();

        if let Some(existing) = in_flight.get(&product.id) {
            debug!("Joining in-flight analysis for product {}", product.id);
            return existing.clone();
        }

        let product_id = product.id;
        let inner = Arc::clone(&self.inner);
        // Spawned so that callers dropping out do not cancel the work. The task
        // clears its own entry when it finishes, panics or is aborted; it cannot
        // do so before the insert below because the registry lock is held until then.
        let task = tokio::spawn(async move {
            let _entry = InFlightEntry {
                inner: Arc::clone(&inner),
                product_id,
            };
            inner.regenerate(product).await
        });

        let regeneration = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(AnalysisError::TaskFailed(e.to_string())),
            }
        }
        .boxed()
        .shared();

        in_flight.insert(product_id, regeneration.clone());
        regeneration
    }
}

/// Removes a product's registry entry when dropped.
struct InFlightEntry {
    inner: Arc<Inner>,
    product_id: ProductId,
}

impl Drop for InFlightEntry {
    fn drop(&mut self) {
        self.inner.in_flight.lock().remove(&self.product_id);
    }
}

impl Inner {
    async fn fresh_analysis(&self, product_id: ProductId) -> Result<Option<Analysis>, AnalysisError> {
        let latest = self.store.latest_analysis(product_id).await?;
        let now = self.clock.now();
        Ok(latest.filter(|analysis| self.settings.freshness.is_fresh(analysis, now)))
    }

    async fn regenerate(&self, product: Product) -> Result<Analysis, AnalysisError> {
        // Another regeneration may have finished between the caller's check and this one.
        if let Some(current) = self.fresh_analysis(product.id).await? {
            debug!("Analysis for product {} was refreshed meanwhile", product.id);
            return Ok(current);
        }

        info!(
            "Generating analysis for product {} ({}) with {}",
            product.id,
            product.name,
            self.engine.model_name()
        );

        let input = ProductInput::from_product(&product);
        let texts = self.engine.generate(&input).await.map_err(|e| {
            warn!("Analysis generation failed for product {}: {}", product.id, e);
            AnalysisError::GenerationFailed(e)
        })?;

        self.persist(product.id, texts).await
    }

    /// Retries only the write; the generated texts are never thrown away for a
    /// second model call.
    async fn persist(
        &self,
        product_id: ProductId,
        texts: AnalysisTexts,
    ) -> Result<Analysis, AnalysisError> {
        let attempts = self.settings.persist_attempts.max(1);
        let created_at = self.clock.now();
        let mut attempt = 1;

        loop {
            match self
                .store
                .insert_analysis(product_id, texts.clone(), created_at)
                .await
            {
                Ok(analysis) => {
                    info!("Stored analysis {} for product {}", analysis.id, product_id);
                    return Ok(analysis);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "Storing analysis for product {} failed (attempt {}/{}): {}",
                        product_id, attempt, attempts, e
                    );
                    tokio::time::sleep(self.settings.persist_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        "Giving up storing analysis for product {} after {} attempts: {}",
                        product_id, attempts, e
                    );
                    return Err(AnalysisError::PersistenceFailure(e.to_string()));
                }
            }
        }
    }
}
