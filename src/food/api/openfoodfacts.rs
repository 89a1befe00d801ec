use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{CatalogError, ProductCatalog};
use crate::food::config::CatalogConfig;
use crate::food::models::{NutritionalInfo, ProductAttributes};

#[derive(Debug, Deserialize)]
struct OffResponse {
    #[serde(default)]
    status: i64,
    product: Option<OffProduct>,
}

#[derive(Debug, Default, Deserialize)]
struct OffProduct {
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    ingredients_text: Option<String>,
    #[serde(default)]
    nutriments: NutritionalInfo,
    #[serde(default)]
    brands: Option<String>,
    #[serde(default)]
    categories: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    generic_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenFoodFactsClient {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl OpenFoodFactsClient {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url,
            user_agent: config.user_agent,
        }
    }
}

#[async_trait]
impl ProductCatalog for OpenFoodFactsClient {
    async fn fetch_by_ean(&self, ean: &str) -> Result<Option<ProductAttributes>, CatalogError> {
        let url = product_url(&self.base_url, ean)?;
        debug!("Fetching {} from Open Food Facts", ean);

        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| CatalogError::Request(format!("Failed to send request: {}", e)))?;

        // Unknown barcodes come back as 404 with a status-0 body.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CatalogError::Request(format!(
                "Open Food Facts returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Request(format!("Failed to read response: {}", e)))?;

        let attributes = parse_product(ean, &body)?;
        if let Some(found) = &attributes {
            info!("Found {} ({}) in Open Food Facts", found.name, ean);
        }
        Ok(attributes)
    }
}

/// `{base}/api/v2/product/{ean}.json` with the barcode escaped as a single segment.
fn product_url(base_url: &str, ean: &str) -> Result<Url, CatalogError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| CatalogError::Request(format!("Invalid catalog URL {}: {}", base_url, e)))?;

    let file = format!("{}.json", ean);
    url.path_segments_mut()
        .map_err(|_| CatalogError::Request(format!("Catalog URL {} cannot take a path", base_url)))?
        .pop_if_empty()
        .extend(["api", "v2", "product", file.as_str()]);

    Ok(url)
}

fn parse_product(ean: &str, body: &str) -> Result<Option<ProductAttributes>, CatalogError> {
    let data: OffResponse =
        serde_json::from_str(body).map_err(|e| CatalogError::Decode(e.to_string()))?;

    if data.status != 1 {
        return Ok(None);
    }

    Ok(data.product.map(|product| attributes_from(ean, product)))
}

fn attributes_from(ean: &str, product: OffProduct) -> ProductAttributes {
    let clean = |value: Option<String>| value.map(|v| v.trim().to_string()).unwrap_or_default();

    ProductAttributes {
        ean: ean.to_string(),
        name: clean(product.product_name),
        ingredients: clean(product.ingredients_text),
        nutritional_info: product.nutriments,
        about: clean(product.generic_name),
        brand: clean(product.brands),
        category: clean(product.categories),
        image_url: product
            .image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty()),
    }
}
