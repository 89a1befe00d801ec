use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type ProductId = i64;
pub type AnalysisId = i64;

/// Nutriment name to value, as reported by the catalog.
pub type NutritionalInfo = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Empty when the product has no barcode; such products cannot be looked up by EAN.
    pub ean: String,
    pub name: String,
    pub ingredients: String,
    pub nutritional_info: NutritionalInfo,
    pub about: String,
    pub brand: String,
    pub category: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything about a product except its identity and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductAttributes {
    pub ean: String,
    pub name: String,
    pub ingredients: String,
    pub nutritional_info: NutritionalInfo,
    pub about: String,
    pub brand: String,
    pub category: String,
    pub image_url: Option<String>,
}

impl From<Product> for ProductAttributes {
    fn from(product: Product) -> Self {
        Self {
            ean: product.ean,
            name: product.name,
            ingredients: product.ingredients,
            nutritional_info: product.nutritional_info,
            about: product.about,
            brand: product.brand,
            category: product.category,
            image_url: product.image_url,
        }
    }
}

/// A stored analysis. Rows are append-only; a newer row supersedes an older one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: AnalysisId,
    pub product_id: ProductId,
    pub reality_check: String,
    pub consumption_advice: String,
    pub health_implications: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisTexts {
    pub reality_check: String,
    pub consumption_advice: String,
    pub health_implications: String,
}

/// What the analysis engine needs to know about a product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub ingredients: String,
    pub nutritional_info: String,
    pub additives: String,
    pub allergies: String,
    pub diseases: String,
}

impl ProductInput {
    /// Builds the input for a stored product. User-specific context (allergies,
    /// diseases) is left empty.
    pub fn from_product(product: &Product) -> Self {
        let nutritional_info = if product.nutritional_info.is_empty() {
            String::new()
        } else {
            Value::Object(product.nutritional_info.clone()).to_string()
        };

        Self {
            name: product.name.clone(),
            ingredients: product.ingredients.clone(),
            nutritional_info,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_from_product_serializes_nutrition() {
        let mut nutrition = NutritionalInfo::new();
        nutrition.insert("sugars_100g".to_string(), json!(42.5));

        let now = Utc::now();
        let product = Product {
            id: 7,
            ean: "8901234567890".to_string(),
            name: "Choco Bar".to_string(),
            ingredients: "sugar, cocoa".to_string(),
            nutritional_info: nutrition,
            about: String::new(),
            brand: "Acme".to_string(),
            category: "Snacks".to_string(),
            image_url: None,
            created_at: now,
            updated_at: now,
        };

        let input = ProductInput::from_product(&product);
        assert_eq!(input.name, "Choco Bar");
        assert_eq!(input.nutritional_info, r#"{"sugars_100g":42.5}"#);
        assert!(input.additives.is_empty());
        assert!(input.allergies.is_empty());
        assert!(input.diseases.is_empty());
    }
}
