use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use crate::config::Config;
use crate::database::{Database, ProductStore};
use crate::food::analysis::{
    AnalysisCoordinator, AnalysisEngine, CoordinatorSettings, FreshnessPolicy, SystemClock,
};
use crate::food::api::OpenFoodFactsClient;
use crate::food::ProductService;
use crate::providers::build_provider;

/// Everything request handlers and commands need, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub products: ProductService,
    pub coordinator: AnalysisCoordinator,
    pub engine: AnalysisEngine,
}

impl AppState {
    pub fn new(
        products: ProductService,
        coordinator: AnalysisCoordinator,
        engine: AnalysisEngine,
    ) -> Self {
        Self {
            products,
            coordinator,
            engine,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Database::new(&config.database_path)
            .await
            .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
        let store: Arc<dyn ProductStore> = Arc::new(db);

        let provider = build_provider(&config.provider);
        info!(
            "Using {:?} model {} for analyses",
            config.provider.kind,
            provider.model_name()
        );
        let engine = AnalysisEngine::new(provider, config.llm_timeout);

        let settings = CoordinatorSettings {
            freshness: FreshnessPolicy::new(config.freshness_window),
            persist_attempts: config.persist_attempts,
            ..CoordinatorSettings::default()
        };
        let coordinator =
            AnalysisCoordinator::new(store.clone(), engine.clone(), Arc::new(SystemClock), settings);

        let catalog = Arc::new(OpenFoodFactsClient::new(config.catalog.clone()));
        let products = ProductService::new(store, catalog);

        Ok(Self::new(products, coordinator, engine))
    }
}
