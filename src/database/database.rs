use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_rusqlite::Connection;

use super::traits::{AnalysisOrder, ProductQuery, ProductStore};
use crate::food::models::{
    Analysis, AnalysisTexts, NutritionalInfo, Product, ProductAttributes, ProductId,
};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("Database connection error: {0}")]
    Connection(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

const PRODUCT_COLUMNS: &str = "id, ean, name, ingredients, nutritional_info, about, brand, category, image_url, created_at, updated_at";
const ANALYSIS_COLUMNS: &str = "id, product_id, reality_check, consumption_advice, health_implications, created_at";

#[derive(Clone)]
pub struct Database {
    conn: Arc<Connection>,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Self::with_connection(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let db = Self {
            conn: Arc::new(conn),
        };
        db.register_functions().await?;
        db.initialize().await?;
        Ok(db)
    }

    /// SQLite's own `lower()` and `LIKE` only fold ASCII; `casefold()` folds any script.
    async fn register_functions(&self) -> Result<(), DatabaseError> {
        self.conn
            .call(|conn| {
                conn.create_scalar_function(
                    "casefold",
                    1,
                    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
                    |ctx| {
                        let value = ctx.get::<Option<String>>(0)?;
                        Ok(value.map(|v| v.to_lowercase()))
                    },
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn initialize(&self) -> Result<(), DatabaseError> {
        // A NULL ean keeps barcode-less products out of the unique index.
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "PRAGMA foreign_keys = ON;
                    CREATE TABLE IF NOT EXISTS products (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        ean TEXT UNIQUE,
                        name TEXT NOT NULL DEFAULT '',
                        ingredients TEXT NOT NULL DEFAULT '',
                        nutritional_info TEXT NOT NULL DEFAULT '{}',
                        about TEXT NOT NULL DEFAULT '',
                        brand TEXT NOT NULL DEFAULT '',
                        category TEXT NOT NULL DEFAULT '',
                        image_url TEXT,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_products_name ON products (name);
                    CREATE TABLE IF NOT EXISTS analyses (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        product_id INTEGER NOT NULL REFERENCES products (id),
                        reality_check TEXT NOT NULL,
                        consumption_advice TEXT NOT NULL,
                        health_implications TEXT NOT NULL,
                        created_at TEXT NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_analyses_product_created
                        ON analyses (product_id, created_at);",
                )?;
                Ok(())
            })
            .await?;

        info!("Database initialized successfully");
        Ok(())
    }

    pub async fn count_analyses(&self, product_id: ProductId) -> Result<i64, DatabaseError> {
        let count = self
            .conn
            .call(move |conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM analyses WHERE product_id = ?1",
                    [product_id],
                    |row| row.get::<_, i64>(0),
                )?;
                Ok(count)
            })
            .await?;

        Ok(count)
    }
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let nutrition_text: String = row.get(4)?;
    let nutritional_info = if nutrition_text.trim().is_empty() {
        NutritionalInfo::new()
    } else {
        serde_json::from_str(&nutrition_text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?
    };

    Ok(Product {
        id: row.get(0)?,
        ean: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        name: row.get(2)?,
        ingredients: row.get(3)?,
        nutritional_info,
        about: row.get(5)?,
        brand: row.get(6)?,
        category: row.get(7)?,
        image_url: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn analysis_from_row(row: &Row<'_>) -> rusqlite::Result<Analysis> {
    Ok(Analysis {
        id: row.get(0)?,
        product_id: row.get(1)?,
        reality_check: row.get(2)?,
        consumption_advice: row.get(3)?,
        health_implications: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn select_product(
    conn: &rusqlite::Connection,
    id: ProductId,
) -> rusqlite::Result<Option<Product>> {
    conn.query_row(
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS),
        [id],
        product_from_row,
    )
    .optional()
}

#[async_trait]
impl ProductStore for Database {
    async fn find_by_ean(&self, ean: &str) -> Result<Option<Product>, DatabaseError> {
        let ean = ean.trim().to_string();
        if ean.is_empty() {
            return Ok(None);
        }

        let product = self
            .conn
            .call(move |conn| {
                let product = conn
                    .query_row(
                        &format!("SELECT {} FROM products WHERE ean = ?1", PRODUCT_COLUMNS),
                        [&ean],
                        product_from_row,
                    )
                    .optional()?;
                Ok(product)
            })
            .await?;

        Ok(product)
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, DatabaseError> {
        let product = self
            .conn
            .call(move |conn| Ok(select_product(conn, id)?))
            .await?;

        Ok(product)
    }

    async fn upsert(&self, product: ProductAttributes) -> Result<Product, DatabaseError> {
        let nutritional_info = serde_json::to_string(&product.nutritional_info)?;
        let ean = Some(product.ean.trim().to_string()).filter(|ean| !ean.is_empty());
        let now = Utc::now();

        let stored = self
            .conn
            .call(move |conn| {
                let id: ProductId = conn.query_row(
                    "INSERT INTO products
                        (ean, name, ingredients, nutritional_info, about, brand, category, image_url, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                     ON CONFLICT (ean) DO UPDATE SET
                        name = excluded.name,
                        ingredients = excluded.ingredients,
                        nutritional_info = excluded.nutritional_info,
                        about = excluded.about,
                        brand = excluded.brand,
                        category = excluded.category,
                        image_url = excluded.image_url,
                        updated_at = excluded.updated_at
                     RETURNING id",
                    params![
                        ean,
                        product.name,
                        product.ingredients,
                        nutritional_info,
                        product.about,
                        product.brand,
                        product.category,
                        product.image_url,
                        now,
                    ],
                    |row| row.get(0),
                )?;

                let stored = select_product(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
                Ok(stored)
            })
            .await?;

        debug!("Upserted product {} (EAN: {})", stored.id, stored.ean);
        Ok(stored)
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>, DatabaseError> {
        let pattern = query
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let products = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM products
                     WHERE ean IS NOT NULL AND ean != ''
                       AND (?1 IS NULL OR casefold(name) LIKE ?1)
                     ORDER BY id
                     LIMIT ?2 OFFSET ?3",
                    PRODUCT_COLUMNS
                ))?;

                let rows = stmt.query_map(
                    params![pattern, query.limit, query.skip],
                    product_from_row,
                )?;

                let mut products = Vec::new();
                for row in rows {
                    products.push(row?);
                }

                Ok(products)
            })
            .await?;

        Ok(products)
    }

    async fn list_analyses_for_product(
        &self,
        id: ProductId,
        order: AnalysisOrder,
    ) -> Result<Vec<Analysis>, DatabaseError> {
        let direction = match order {
            AnalysisOrder::NewestFirst => "DESC",
            AnalysisOrder::OldestFirst => "ASC",
        };

        let analyses = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM analyses
                     WHERE product_id = ?1
                     ORDER BY created_at {dir}, id {dir}",
                    ANALYSIS_COLUMNS,
                    dir = direction
                ))?;

                let rows = stmt.query_map([id], analysis_from_row)?;

                let mut analyses = Vec::new();
                for row in rows {
                    analyses.push(row?);
                }

                Ok(analyses)
            })
            .await?;

        Ok(analyses)
    }

    async fn latest_analysis(&self, id: ProductId) -> Result<Option<Analysis>, DatabaseError> {
        let analysis = self
            .conn
            .call(move |conn| {
                let analysis = conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM analyses
                             WHERE product_id = ?1
                             ORDER BY created_at DESC, id DESC
                             LIMIT 1",
                            ANALYSIS_COLUMNS
                        ),
                        [id],
                        analysis_from_row,
                    )
                    .optional()?;
                Ok(analysis)
            })
            .await?;

        Ok(analysis)
    }

    async fn insert_analysis(
        &self,
        product_id: ProductId,
        texts: AnalysisTexts,
        created_at: DateTime<Utc>,
    ) -> Result<Analysis, DatabaseError> {
        let analysis = self
            .conn
            .call(move |conn| {
                let analysis = conn.query_row(
                    &format!(
                        "INSERT INTO analyses
                            (product_id, reality_check, consumption_advice, health_implications, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)
                         RETURNING {}",
                        ANALYSIS_COLUMNS
                    ),
                    params![
                        product_id,
                        texts.reality_check,
                        texts.consumption_advice,
                        texts.health_implications,
                        created_at,
                    ],
                    analysis_from_row,
                )?;
                Ok(analysis)
            })
            .await?;

        debug!("Stored analysis {} for product {}", analysis.id, product_id);
        Ok(analysis)
    }
}
