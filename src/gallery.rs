use serde::Deserialize;
use serde_json::Value;

use crate::codec::base64_to_rgb;
use crate::error::SearchError;
use crate::models::{GalleryItem, ToolItem};

fn tool_items(envelope: &Value) -> Result<Vec<ToolItem>, SearchError> {
    let items = envelope
        .get("structuredContent")
        .and_then(|content| content.get("result"))
        .ok_or_else(|| SearchError::Tool("response has no structuredContent.result".to_string()))?;
    Ok(Vec::<ToolItem>::deserialize(items)?)
}

fn build_gallery(envelope: &Value) -> Result<Vec<GalleryItem>, SearchError> {
    tool_items(envelope)?
        .iter()
        .map(|item| {
            Ok(GalleryItem {
                image: base64_to_rgb(&item.metadata.base64_image)?,
                caption: GalleryItem::caption_for(&item.metadata),
            })
        })
        .collect()
}

/// Turns a search tool response into gallery entries, in response order.
///
/// A response that does not have the expected shape yields an empty gallery;
/// the reason is logged.
pub fn gallery_items(envelope: &Value) -> Vec<GalleryItem> {
    tracing::info!("Transforming tool result into gallery items");
    match build_gallery(envelope) {
        Ok(items) => {
            tracing::info!("Successfully created {} gallery items", items.len());
            items
        }
        Err(e) => {
            tracing::error!("Error processing gallery items: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::codec::rgb_to_base64;
    use image::{Rgb, RgbImage};
    use serde_json::json;

    pub(crate) fn item_json(name: &str, price: f64, category: &str, color: [u8; 3]) -> Value {
        let image = RgbImage::from_pixel(2, 3, Rgb(color));
        json!({
            "metadata": {
                "name": name,
                "price": price,
                "category": category,
                "base64_image": rgb_to_base64(&image).expect("encode"),
            },
            "distance": 0.1,
        })
    }

    fn envelope(items: Vec<Value>) -> Value {
        json!({
            "content": [{"type": "text", "text": "..."}],
            "structuredContent": {"result": items},
            "isError": false,
        })
    }

    #[test]
    fn test_every_item_becomes_a_captioned_entry_in_order() {
        let response = envelope(vec![
            item_json("Red Runner", 59.99, "Sneakers", [250, 0, 0]),
            item_json("Forest Boot", 120.5, "Boots", [0, 200, 0]),
            item_json("Ocean Loafer", 75.0, "Loafers", [0, 0, 240]),
        ]);

        let gallery = gallery_items(&response);
        let captions: Vec<&str> = gallery.iter().map(|g| g.caption.as_str()).collect();
        assert_eq!(
            captions,
            vec![
                "Red Runner — $59.99 — Sneakers",
                "Forest Boot — $120.5 — Boots",
                "Ocean Loafer — $75 — Loafers",
            ]
        );
        assert_eq!(gallery[1].image.get_pixel(0, 0), &Rgb([0, 200, 0]));
        assert_eq!(gallery[0].image.dimensions(), (2, 3));
    }

    #[test]
    fn test_empty_result_list_is_an_empty_gallery() {
        assert!(gallery_items(&envelope(Vec::new())).is_empty());
    }

    #[test]
    fn test_missing_metadata_degrades_to_empty() {
        let mut broken = item_json("Red Runner", 59.99, "Sneakers", [250, 0, 0]);
        let metadata = broken["metadata"].take();
        broken["base64_image"] = metadata["base64_image"].clone();
        broken.as_object_mut().expect("object").remove("metadata");

        let response = envelope(vec![item_json("Ok", 1.0, "Boots", [1, 1, 1]), broken]);
        assert!(gallery_items(&response).is_empty());
    }

    #[test]
    fn test_malformed_envelopes_degrade_to_empty() {
        assert!(gallery_items(&json!({})).is_empty());
        assert!(gallery_items(&json!({"structuredContent": {"items": []}})).is_empty());
        assert!(gallery_items(&json!({"structuredContent": {"result": "nope"}})).is_empty());

        let mut bad_image = item_json("Red Runner", 59.99, "Sneakers", [250, 0, 0]);
        bad_image["metadata"]["base64_image"] = json!("bm90IGFuIGltYWdl");
        assert!(gallery_items(&envelope(vec![bad_image])).is_empty());
    }
}
