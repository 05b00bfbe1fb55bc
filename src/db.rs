use image::RgbImage;
use serde::Deserialize;
use std::sync::Arc;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

use crate::config::DatabaseConfig;
use crate::embedding::Embedder;
use crate::error::SearchError;
use crate::models::{ProductRecord, ScoredProduct};

/// Query vectors are computed from either modality.
pub enum VectorQuery<'a> {
    Text(&'a str),
    Image(&'a RgbImage),
}

/// Handle on the product collection in the vector database.
///
/// Built once per process and shared; every query goes through the same
/// connection and embedder.
pub struct ProductCollection {
    db: Surreal<Any>,
    table: String,
    embedder: Arc<dyn Embedder>,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: i64,
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

impl ProductCollection {
    pub async fn connect(
        config: &DatabaseConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, SearchError> {
        if !is_identifier(&config.collection) {
            return Err(SearchError::Config(format!(
                "invalid collection name '{}'",
                config.collection
            )));
        }

        tracing::info!(
            "Connecting to vector database at {} (collection: {})",
            config.endpoint,
            config.collection
        );
        let db = any::connect(config.endpoint.as_str()).await?;
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await?;
        }
        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;

        Ok(Self {
            db,
            table: config.collection.clone(),
            embedder,
        })
    }

    pub fn name(&self) -> &str {
        &self.table
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub async fn ensure_schema(&self) -> Result<(), SearchError> {
        self.db
            .query(format!(
                "
                DEFINE TABLE {table} SCHEMAFULL;
                DEFINE FIELD name ON {table} TYPE string;
                DEFINE FIELD price ON {table} TYPE number;
                DEFINE FIELD category ON {table} TYPE string;
                DEFINE FIELD base64_image ON {table} TYPE string;
                DEFINE FIELD uri ON {table} TYPE string;
                DEFINE FIELD embedding ON {table} TYPE array<float>;

                DEFINE INDEX idx_{table}_uri ON {table} FIELDS uri UNIQUE;
                DEFINE INDEX idx_{table}_category ON {table} FIELDS category;
            ",
                table = self.table
            ))
            .await?
            .check()?;
        Ok(())
    }

    pub async fn insert(&self, record: ProductRecord) -> Result<(), SearchError> {
        let created: Vec<ProductRecord> = self
            .db
            .create(self.table.as_str())
            .content(record)
            .await?;
        if created.is_empty() {
            tracing::warn!("Record created in '{}' but none returned", self.table);
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<usize, SearchError> {
        let counts: Vec<CountResult> = self
            .db
            .query("SELECT count() AS count FROM type::table($table) GROUP ALL")
            .bind(("table", self.table.as_str()))
            .await?
            .take(0)?;
        Ok(counts.first().map_or(0, |c| c.count.max(0) as usize))
    }

    /// Nearest products first, as ranked by the database.
    pub async fn query(
        &self,
        query: VectorQuery<'_>,
        n_results: usize,
    ) -> Result<Vec<ScoredProduct>, SearchError> {
        let vector = match query {
            VectorQuery::Text(text) => self.embedder.embed_text(text)?,
            VectorQuery::Image(image) => self.embedder.embed_image(image)?,
        };
        if n_results == 0 {
            return Ok(Vec::new());
        }

        let products: Vec<ScoredProduct> = self
            .db
            .query(format!(
                "SELECT name, price, category, base64_image, uri,
                    vector::similarity::cosine(embedding, $vector) AS score
                 FROM type::table($table)
                 ORDER BY score DESC
                 LIMIT {}",
                n_results
            ))
            .bind(("table", self.table.as_str()))
            .bind(("vector", vector))
            .await?
            .take(0)?;

        tracing::debug!("Collection '{}' returned {} matches", self.table, products.len());
        Ok(products)
    }
}
