//! Joint text/image embeddings.
//!
//! Text and image vectors must live in the same space so that a text query can
//! rank product photos. CLIP ViT-B/32 provides both halves.

use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use image::RgbImage;
use std::sync::Mutex;

use crate::codec::rgb_to_png;
use crate::error::SearchError;

pub trait Embedder: Send + Sync {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, SearchError>;
    fn embed_image(&self, image: &RgbImage) -> Result<Vec<f32>, SearchError>;
}

pub struct ClipEmbedder {
    text: Mutex<TextEmbedding>,
    vision: Mutex<ImageEmbedding>,
}

impl ClipEmbedder {
    pub fn new() -> Result<Self, SearchError> {
        let text = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::ClipVitB32).with_show_download_progress(true),
        )
        .map_err(|e| SearchError::Embedding(e.to_string()))?;
        let vision = ImageEmbedding::try_new(
            ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
                .with_show_download_progress(true),
        )
        .map_err(|e| SearchError::Embedding(e.to_string()))?;

        tracing::info!("CLIP ViT-B/32 text and vision models loaded");
        Ok(Self {
            text: Mutex::new(text),
            vision: Mutex::new(vision),
        })
    }
}

fn first_embedding(mut embeddings: Vec<Vec<f32>>) -> Result<Vec<f32>, SearchError> {
    if embeddings.is_empty() {
        return Err(SearchError::Embedding("model returned no embedding".to_string()));
    }
    Ok(embeddings.swap_remove(0))
}

impl Embedder for ClipEmbedder {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let model = self
            .text
            .lock()
            .map_err(|_| SearchError::Embedding("text model lock poisoned".to_string()))?;
        let embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| SearchError::Embedding(e.to_string()))?;
        first_embedding(embeddings)
    }

    fn embed_image(&self, image: &RgbImage) -> Result<Vec<f32>, SearchError> {
        let png = rgb_to_png(image)?;
        let model = self
            .vision
            .lock()
            .map_err(|_| SearchError::Embedding("vision model lock poisoned".to_string()))?;
        let embeddings = model
            .embed_bytes(&[png.as_slice()], None)
            .map_err(|e| SearchError::Embedding(e.to_string()))?;
        first_embedding(embeddings)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Deterministic stand-in for CLIP: keyword hits for text, mean colour for images.
    /// Both land in the same three dimensional "red, green, blue" space.
    pub(crate) struct ColorEmbedder;

    impl Embedder for ColorEmbedder {
        fn embed_text(&self, text: &str) -> Result<Vec<f32>, SearchError> {
            let text = text.to_lowercase();
            let hit = |word: &str| if text.contains(word) { 1.0 } else { 0.05 };
            Ok(vec![hit("red"), hit("green"), hit("blue")])
        }

        fn embed_image(&self, image: &RgbImage) -> Result<Vec<f32>, SearchError> {
            let count = (image.width() * image.height()).max(1) as f32;
            let mut sums = [0.0f32; 3];
            for pixel in image.pixels() {
                for (sum, channel) in sums.iter_mut().zip(pixel.0.iter()) {
                    *sum += *channel as f32 / 255.0;
                }
            }
            Ok(sums.iter().map(|s| s / count).collect())
        }
    }

    #[test]
    fn test_color_embedder_aligns_text_and_images() -> Result<(), SearchError> {
        let embedder = ColorEmbedder;
        let red = embedder.embed_image(&RgbImage::from_pixel(2, 2, image::Rgb([255, 0, 0])))?;
        assert_eq!(red, vec![1.0, 0.0, 0.0]);
        assert_eq!(embedder.embed_text("Red sneakers")?, vec![1.0, 0.05, 0.05]);
        Ok(())
    }

    #[test]
    fn test_empty_model_output_is_an_error() {
        assert!(matches!(first_embedding(Vec::new()), Err(SearchError::Embedding(_))));
        assert_eq!(first_embedding(vec![vec![0.5]]).ok(), Some(vec![0.5]));
    }
}
