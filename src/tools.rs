//! Search tool service exposed over MCP (streamable HTTP).
//!
//! Both tools are read-only: they embed the query, ask the collection for the
//! nearest products and return them in the database's rank order. Failures are
//! logged and answered with an empty list.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, ErrorCode, ErrorData, Implementation, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    schemars, tool, tool_handler, tool_router, ServerHandler,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::codec::base64_to_rgb;
use crate::config::ToolServerConfig;
use crate::db::{ProductCollection, VectorQuery};
use crate::error::SearchError;
use crate::models::{ScoredProduct, ToolItem};

pub const TEXT_TO_IMAGE_TOOL: &str = "text_to_image_search_tool";
pub const IMAGE_TO_IMAGE_TOOL: &str = "image_to_image_search_tool";
pub const MCP_PATH: &str = "/mcp";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TextSearchParams {
    /// Free-text description of the product to look for.
    pub text_query: String,
    /// Number of nearest products to return.
    pub top_k: usize,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImageSearchParams {
    /// Base64-encoded query image (any common raster format).
    pub image_query: String,
    /// Number of nearest products to return.
    pub top_k: usize,
}

fn to_items(products: Vec<ScoredProduct>) -> Vec<ToolItem> {
    products.into_iter().map(ToolItem::from).collect()
}

pub async fn text_to_image_search(
    collection: &ProductCollection,
    text_query: &str,
    top_k: usize,
) -> Vec<ToolItem> {
    tracing::info!(
        "Calling 'text_to_image_search' with query: '{}' and top_k: {}",
        text_query,
        top_k
    );
    match collection.query(VectorQuery::Text(text_query), top_k).await {
        Ok(products) => to_items(products),
        Err(e) => {
            tracing::error!(
                "An error occurred during the text-to-image search for query '{}': {}",
                text_query,
                e
            );
            Vec::new()
        }
    }
}

async fn search_by_image(
    collection: &ProductCollection,
    image_query: &str,
    top_k: usize,
) -> Result<Vec<ScoredProduct>, SearchError> {
    let image = base64_to_rgb(image_query)?;
    collection.query(VectorQuery::Image(&image), top_k).await
}

pub async fn image_to_image_search(
    collection: &ProductCollection,
    image_query: &str,
    top_k: usize,
) -> Vec<ToolItem> {
    tracing::info!("Calling 'image_to_image_search' with top_k: {}", top_k);
    match search_by_image(collection, image_query, top_k).await {
        Ok(products) => to_items(products),
        Err(e) => {
            tracing::error!("An error occurred during the image-to-image search: {}", e);
            Vec::new()
        }
    }
}

fn make_error(message: impl Into<String>) -> ErrorData {
    ErrorData {
        code: ErrorCode::INTERNAL_ERROR,
        message: Cow::from(message.into()),
        data: None,
    }
}

fn structured_result(items: Vec<ToolItem>) -> Result<CallToolResult, ErrorData> {
    let result = serde_json::to_value(&items)
        .map_err(|e| make_error(format!("Failed to serialize response: {}", e)))?;
    Ok(CallToolResult::structured(serde_json::json!({ "result": result })))
}

/// MCP handler exposing the two product search tools.
#[derive(Clone)]
pub struct SearchTools {
    collection: Arc<ProductCollection>,
    server_name: String,
    tool_router: ToolRouter<Self>,
}

impl SearchTools {
    pub fn new(collection: Arc<ProductCollection>, server_name: impl Into<String>) -> Self {
        Self {
            collection,
            server_name: server_name.into(),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl SearchTools {
    #[tool(
        description = "Find products whose images best match a text description. Returns a list of items, each with metadata (name, price, category, base64_image)."
    )]
    async fn text_to_image_search_tool(
        &self,
        Parameters(params): Parameters<TextSearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let items = text_to_image_search(&self.collection, &params.text_query, params.top_k).await;
        structured_result(items)
    }

    #[tool(
        description = "Find products whose images look most like a base64-encoded query image. Returns a list of items, each with metadata (name, price, category, base64_image)."
    )]
    async fn image_to_image_search_tool(
        &self,
        Parameters(params): Parameters<ImageSearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let items = image_to_image_search(&self.collection, &params.image_query, params.top_k).await;
        structured_result(items)
    }
}

#[tool_handler]
impl ServerHandler for SearchTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.server_name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Multimodal Product Search".to_string()),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Product search over the '{}' collection. Use '{}' for text queries and '{}' \
                 for base64-encoded image queries.",
                self.collection.name(),
                TEXT_TO_IMAGE_TOOL,
                IMAGE_TO_IMAGE_TOOL
            )),
        }
    }
}

/// Serves the tools on an already bound listener until ctrl-c.
pub async fn serve_on(
    listener: TcpListener,
    collection: Arc<ProductCollection>,
    server_name: String,
) -> Result<(), SearchError> {
    let service = StreamableHttpService::new(
        move || Ok(SearchTools::new(collection.clone(), server_name.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = axum::Router::new().nest_service(MCP_PATH, service);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

pub async fn serve(
    config: &ToolServerConfig,
    collection: Arc<ProductCollection>,
) -> Result<(), SearchError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| SearchError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Launching search tool service '{}' on http://{}{}", config.name, addr, MCP_PATH);
    serve_on(listener, collection, config.name.clone()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::rgb_to_base64;
    use crate::db::tests::seeded_collection;
    use image::{Rgb, RgbImage};

    #[tokio::test]
    async fn test_text_search_returns_ranked_items() {
        let collection = seeded_collection().await;

        let items = text_to_image_search(&collection, "red sneakers", 2).await;
        let names: Vec<&str> = items.iter().map(|i| i.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["Red Runner", "Crimson Trainer"]);
        assert!(items.iter().all(|i| !i.metadata.base64_image.is_empty()));
        assert!(items[0].distance <= items[1].distance);
    }

    #[tokio::test]
    async fn test_image_search_decodes_the_query() -> Result<(), SearchError> {
        let collection = seeded_collection().await;
        let query = rgb_to_base64(&RgbImage::from_pixel(5, 5, Rgb([20, 210, 30])))?;

        let items = image_to_image_search(&collection, &query, 1).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].metadata.name, "Forest Boot");
        assert_eq!(items[0].metadata.category, "Boots");
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_image_payload_yields_empty_list() {
        let collection = seeded_collection().await;
        assert!(image_to_image_search(&collection, "not base64 at all!", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_structured_result_wraps_items() -> Result<(), serde_json::Error> {
        let collection = seeded_collection().await;
        let items = text_to_image_search(&collection, "blue", 1).await;

        let result = structured_result(items.clone()).expect("structured result");
        let envelope = serde_json::to_value(&result)?;
        let wire: Vec<ToolItem> = serde_json::from_value(envelope["structuredContent"]["result"].clone())?;
        assert_eq!(wire, items);
        Ok(())
    }

    #[tokio::test]
    async fn test_router_exposes_both_tools() {
        let tools = SearchTools::new(Arc::new(seeded_collection().await), "test");
        let mut names: Vec<String> = tools
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec![IMAGE_TO_IMAGE_TOOL, TEXT_TO_IMAGE_TOOL]);
    }
}
