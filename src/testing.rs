//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use crate::database::{AnalysisOrder, Database, DatabaseError, ProductQuery, ProductStore};
use crate::food::analysis::Clock;
use crate::food::api::{CatalogError, ProductCatalog};
use crate::food::models::{
    Analysis, AnalysisTexts, Product, ProductAttributes, ProductId,
};
use crate::providers::traits::{CompletionProvider, LlmError};

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Scripted model that counts how often it is called.
pub struct FakeProvider {
    reply: Mutex<Result<String, LlmError>>,
    delay: Option<Duration>,
    panics: AtomicUsize,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl FakeProvider {
    pub fn replying(raw: &str) -> Self {
        Self {
            reply: Mutex::new(Ok(raw.to_string())),
            delay: None,
            panics: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn returning(reality: &str, consumption: &str, health: &str) -> Self {
        Self::replying(&analysis_reply(reality, consumption, health))
    }

    pub fn failing(error: LlmError) -> Self {
        let provider = Self::replying("");
        *provider.reply.lock() = Err(error);
        provider
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Panics on the first `n` calls.
    pub fn with_panics(self, n: usize) -> Self {
        self.panics.store(n, Ordering::SeqCst);
        self
    }

    pub fn set_reply(&self, reply: Result<String, LlmError>) {
        *self.reply.lock() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().clone()
    }

    /// Most calls that were running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock() = Some(prompt.to_string());

        let panicking = self
            .panics
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if panicking {
            panic!("provider bug");
        }

        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.reply.lock().clone()
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

pub fn analysis_reply(reality: &str, consumption: &str, health: &str) -> String {
    json!({
        "reality_check": reality,
        "consumption_advice": consumption,
        "health_implications": health,
    })
    .to_string()
}

/// In-memory catalog keyed by EAN.
#[derive(Default)]
pub struct FakeCatalog {
    products: HashMap<String, ProductAttributes>,
    calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn with_product(mut self, product: ProductAttributes) -> Self {
        self.products.insert(product.ean.clone(), product);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn fetch_by_ean(&self, ean: &str) -> Result<Option<ProductAttributes>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.products.get(ean).cloned())
    }
}

/// Delegates to a real database but fails the first `n` analysis inserts.
pub struct FlakyStore {
    inner: Database,
    failing_inserts: AtomicU32,
    insert_attempts: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: Database, failing_inserts: u32) -> Self {
        Self {
            inner,
            failing_inserts: AtomicU32::new(failing_inserts),
            insert_attempts: AtomicU32::new(0),
        }
    }

    pub fn insert_attempts(&self) -> u32 {
        self.insert_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductStore for FlakyStore {
    async fn find_by_ean(&self, ean: &str) -> Result<Option<Product>, DatabaseError> {
        self.inner.find_by_ean(ean).await
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, DatabaseError> {
        self.inner.find_by_id(id).await
    }

    async fn upsert(&self, product: ProductAttributes) -> Result<Product, DatabaseError> {
        self.inner.upsert(product).await
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>, DatabaseError> {
        self.inner.list_products(query).await
    }

    async fn list_analyses_for_product(
        &self,
        id: ProductId,
        order: AnalysisOrder,
    ) -> Result<Vec<Analysis>, DatabaseError> {
        self.inner.list_analyses_for_product(id, order).await
    }

    async fn latest_analysis(&self, id: ProductId) -> Result<Option<Analysis>, DatabaseError> {
        self.inner.latest_analysis(id).await
    }

    async fn insert_analysis(
        &self,
        product_id: ProductId,
        texts: AnalysisTexts,
        created_at: DateTime<Utc>,
    ) -> Result<Analysis, DatabaseError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_inserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_inserts.store(remaining - 1, Ordering::SeqCst);
            return Err(DatabaseError::Connection("database is locked".to_string()));
        }
        self.inner.insert_analysis(product_id, texts, created_at).await
    }
}

pub fn choco_bar(ean: &str) -> ProductAttributes {
    let mut nutrition = serde_json::Map::new();
    nutrition.insert("sugars_100g".to_string(), json!(48.0));

    ProductAttributes {
        ean: ean.to_string(),
        name: "Choco Bar".to_string(),
        ingredients: "sugar, cocoa butter, milk solids, emulsifier (E322)".to_string(),
        nutritional_info: nutrition,
        brand: "Acme".to_string(),
        category: "Snacks & Branded Foods".to_string(),
        ..ProductAttributes::default()
    }
}
