use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Product metadata as it travels between the tool service and the query side.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ItemMetadata {
    pub name: String,
    pub price: f64,
    pub category: String,
    pub base64_image: String,
}

/// One record of a search tool response.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolItem {
    pub metadata: ItemMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

/// Row stored in the product collection.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProductRecord {
    pub name: String,
    pub price: f64,
    pub category: String,
    pub base64_image: String,
    pub uri: String,
    pub embedding: Vec<f32>,
}

/// A collection row together with its similarity to the query.
#[derive(Debug, Deserialize, Clone)]
pub struct ScoredProduct {
    pub name: String,
    pub price: f64,
    pub category: String,
    pub base64_image: String,
    pub uri: String,
    pub score: f32,
}

impl From<ScoredProduct> for ToolItem {
    fn from(product: ScoredProduct) -> Self {
        ToolItem {
            distance: Some(1.0 - product.score),
            metadata: ItemMetadata {
                name: product.name,
                price: product.price,
                category: product.category,
                base64_image: product.base64_image,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct GalleryItem {
    pub image: RgbImage,
    pub caption: String,
}

impl GalleryItem {
    pub fn caption_for(metadata: &ItemMetadata) -> String {
        format!("{} — ${} — {}", metadata.name, metadata.price, metadata.category)
    }
}
