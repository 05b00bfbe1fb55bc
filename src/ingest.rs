//! Loads a product catalog into the collection.
//!
//! A catalog directory holds product photos plus a `catalog.json` describing
//! them:
//!
//! ```json
//! [{ "file": "boots/forest.jpg", "name": "Forest Boot", "price": 120.0, "category": "Boots" }]
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::codec::{base64_to_rgb, file_to_base64};
use crate::db::ProductCollection;
use crate::error::SearchError;
use crate::models::ProductRecord;

pub const CATALOG_FILE: &str = "catalog.json";

const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif"];

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogEntry {
    /// Image path relative to the catalog directory.
    pub file: String,
    pub name: String,
    pub price: f64,
    pub category: String,
}

fn is_supported_image(path: &Path) -> bool {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());
    let is_image_mime = mime_guess::from_path(path)
        .first()
        .map_or(false, |mime| mime.type_() == mime_guess::mime::IMAGE);

    is_image_mime
        && extension
            .as_deref()
            .map_or(false, |ext| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext))
}

fn relative_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn read_catalog(dir: &Path) -> Result<Vec<CatalogEntry>, SearchError> {
    let content = fs::read_to_string(dir.join(CATALOG_FILE))?;
    Ok(serde_json::from_str(&content)?)
}

async fn index_image(
    collection: &ProductCollection,
    path: &Path,
    entry: &CatalogEntry,
) -> Result<(), SearchError> {
    let base64_image = file_to_base64(path)?;
    let image = base64_to_rgb(&base64_image)?;
    let embedding = collection.embedder().embed_image(&image)?;

    collection
        .insert(ProductRecord {
            name: entry.name.clone(),
            price: entry.price,
            category: entry.category.clone(),
            base64_image,
            uri: path.to_string_lossy().to_string(),
            embedding,
        })
        .await
}

/// Indexes every catalogued image under `dir`. Returns how many were stored.
///
/// Images without a catalog entry, unsupported files and per-image failures
/// are logged and skipped.
pub async fn ingest_catalog(
    collection: &ProductCollection,
    dir: &Path,
) -> Result<usize, SearchError> {
    let mut entries: HashMap<String, CatalogEntry> = read_catalog(dir)?
        .into_iter()
        .map(|entry| (entry.file.trim_start_matches("./").to_string(), entry))
        .collect();
    collection.ensure_schema().await?;

    let mut indexed = 0;
    for dir_entry in WalkDir::new(dir).sort_by_file_name() {
        let dir_entry = dir_entry?;
        if !dir_entry.file_type().is_file() {
            continue;
        }
        let path: PathBuf = dir_entry.path().to_path_buf();
        if path.file_name().map_or(false, |n| n == CATALOG_FILE) {
            continue;
        }
        if !is_supported_image(&path) {
            tracing::info!("Skipping unsupported file: {}", path.display());
            continue;
        }

        let key = relative_key(dir, &path);
        let Some(entry) = entries.remove(&key) else {
            tracing::warn!("No catalog entry for {}, skipping", key);
            continue;
        };

        match index_image(collection, &path, &entry).await {
            Ok(()) => {
                tracing::info!("Indexed '{}' from {}", entry.name, key);
                indexed += 1;
            }
            Err(e) => tracing::error!("Error indexing {}: {}", path.display(), e),
        }
    }

    for missing in entries.keys() {
        tracing::warn!("Catalog entry '{}' has no image file", missing);
    }
    tracing::info!("Indexed {} product(s) into '{}'", indexed, collection.name());
    Ok(indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::memory_config;
    use crate::db::VectorQuery;
    use crate::embedding::tests::ColorEmbedder;
    use image::{Rgb, RgbImage};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write_catalog(dir: &Path) -> Result<(), SearchError> {
        fs::create_dir_all(dir.join("boots"))?;
        RgbImage::from_pixel(4, 4, Rgb([240, 20, 20])).save(dir.join("red.png"))?;
        RgbImage::from_pixel(4, 4, Rgb([20, 220, 20])).save(dir.join("boots/forest.png"))?;
        RgbImage::from_pixel(4, 4, Rgb([20, 20, 230])).save(dir.join("uncatalogued.png"))?;
        fs::write(dir.join("notes.txt"), "not a product")?;
        fs::write(dir.join("broken.png"), "not really a png")?;
        fs::write(
            dir.join(CATALOG_FILE),
            r#"[
                {"file": "red.png", "name": "Red Runner", "price": 59.99, "category": "Sneakers"},
                {"file": "./boots/forest.png", "name": "Forest Boot", "price": 120.0, "category": "Boots"},
                {"file": "broken.png", "name": "Broken", "price": 1.0, "category": "None"},
                {"file": "missing.png", "name": "Ghost", "price": 2.0, "category": "None"}
            ]"#,
        )?;
        Ok(())
    }

    #[tokio::test]
    async fn test_catalog_images_are_indexed() -> Result<(), SearchError> {
        let dir = TempDir::new()?;
        write_catalog(dir.path())?;
        let collection = ProductCollection::connect(&memory_config(), Arc::new(ColorEmbedder)).await?;

        let indexed = ingest_catalog(&collection, dir.path()).await?;
        assert_eq!(indexed, 2);
        assert_eq!(collection.count().await?, 2);

        let results = collection.query(VectorQuery::Text("green boots"), 1).await?;
        assert_eq!(results[0].name, "Forest Boot");
        assert_eq!(results[0].category, "Boots");
        assert_eq!(base64_to_rgb(&results[0].base64_image)?.get_pixel(0, 0), &Rgb([20, 220, 20]));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_catalog_is_an_error() -> Result<(), SearchError> {
        let dir = TempDir::new()?;
        let collection = ProductCollection::connect(&memory_config(), Arc::new(ColorEmbedder)).await?;
        assert!(matches!(
            ingest_catalog(&collection, dir.path()).await,
            Err(SearchError::Io(_))
        ));
        Ok(())
    }

    #[test]
    fn test_supported_images_and_keys() {
        assert!(is_supported_image(Path::new("a/b/Shoe.JPG")));
        assert!(is_supported_image(Path::new("shoe.webp")));
        assert!(!is_supported_image(Path::new("shoe.txt")));
        assert!(!is_supported_image(Path::new("shoe")));
        assert_eq!(
            relative_key(Path::new("/data/catalog"), Path::new("/data/catalog/boots/a.png")),
            "boots/a.png"
        );
    }
}
