use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use validator::{Validate, ValidationErrors};

use crate::database::ProductQuery;
use crate::food::analysis::AnalysisError;
use crate::food::models::{Analysis, AnalysisTexts, Product};
use crate::food::LookupError;
use crate::providers::traits::LlmError;
use crate::state::AppState;

const MAX_PAGE_SIZE: u32 = 100;

#[derive(Deserialize, Validate)]
pub struct AnalyzeRequest {
    #[validate(length(min = 1, max = 32))]
    ean: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    name: String,
}

#[derive(Deserialize, Validate)]
pub struct AdhocRequest {
    #[validate(length(min = 1, max = 255))]
    name: String,
    #[serde(default)]
    #[validate(length(max = 10000))]
    ingredients: String,
}

#[derive(Deserialize, Default)]
pub struct ListParams {
    skip: Option<u32>,
    limit: Option<u32>,
    search: Option<String>,
}

#[derive(Serialize)]
pub struct AdhocResponse {
    analysis: AnalysisTexts,
}

#[derive(Serialize)]
struct ApiResponse {
    status: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("Analysis generation failed: {0}")]
    Generation(#[from] LlmError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Lookup(LookupError::InvalidEan(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Lookup(LookupError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Analysis(AnalysisError::ProductNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Lookup(_) | ApiError::Analysis(_) | ApiError::Generation(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Create and configure the API router
pub fn create_api(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_check))
        .route("/products", get(list_products))
        .route("/products/analyze", post(analyze_product))
        .route("/products/:ean", get(get_product))
        .route("/products/:ean/analyses", get(product_analyses))
        .route("/analyze", post(analyze_adhoc))
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse {
        status: "ok".to_string(),
    })
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<Product>> {
    let query = ProductQuery {
        skip: params.skip.unwrap_or(0),
        limit: params.limit.unwrap_or(10).clamp(1, MAX_PAGE_SIZE),
        search: params.search,
    };

    let products = state
        .products
        .store()
        .list_products(query)
        .await
        .map_err(LookupError::from)?;
    Ok(Json(products))
}

async fn get_product(
    State(state): State<AppState>,
    Path(ean): Path<String>,
) -> ApiResult<Product> {
    Ok(Json(state.products.resolve(&ean).await?))
}

async fn analyze_product(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Analysis> {
    request.validate()?;

    let product = state.products.resolve(&request.ean).await?;
    let product = state.products.ensure_name(product, &request.name).await?;
    info!("Analysis requested for {} (EAN: {})", product.name, product.ean);

    let analysis = state.coordinator.get_or_refresh_analysis(product.id).await?;
    Ok(Json(analysis))
}

async fn product_analyses(
    State(state): State<AppState>,
    Path(ean): Path<String>,
) -> ApiResult<Vec<Analysis>> {
    let product = state
        .products
        .store()
        .find_by_ean(&ean)
        .await
        .map_err(LookupError::from)?
        .ok_or_else(|| LookupError::NotFound(ean.clone()))?;

    Ok(Json(state.coordinator.history(product.id).await?))
}

async fn analyze_adhoc(
    State(state): State<AppState>,
    Json(request): Json<AdhocRequest>,
) -> ApiResult<AdhocResponse> {
    request.validate()?;

    let analysis = state
        .engine
        .analyze_adhoc(&request.name, &request.ingredients)
        .await?;
    Ok(Json(AdhocResponse { analysis }))
}
