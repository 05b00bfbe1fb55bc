//! Client side of the search tools.
//!
//! A session is opened per request and closed when the request is done.

use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};

use crate::config::ToolClientConfig;
use crate::error::SearchError;

#[async_trait]
pub trait ToolSession: Send {
    async fn list_tools(&mut self) -> Result<Vec<String>, SearchError>;

    /// Returns the raw tool result envelope.
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, SearchError>;

    async fn close(self: Box<Self>) -> Result<(), SearchError>;
}

#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ToolSession>, SearchError>;
}

/// Connects to the tool service over MCP streamable HTTP.
pub struct McpToolConnector {
    url: String,
}

impl McpToolConnector {
    pub fn new(config: &ToolClientConfig) -> Self {
        tracing::info!("Tool service URL: {}", config.server_url);
        Self {
            url: config.server_url.clone(),
        }
    }
}

struct McpSession {
    service: RunningService<RoleClient, ()>,
}

#[async_trait]
impl ToolConnector for McpToolConnector {
    async fn connect(&self) -> Result<Box<dyn ToolSession>, SearchError> {
        let transport = StreamableHttpClientTransport::from_uri(self.url.as_str());
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| SearchError::Tool(format!("Failed to connect to {}: {}", self.url, e)))?;
        Ok(Box::new(McpSession { service }))
    }
}

#[async_trait]
impl ToolSession for McpSession {
    async fn list_tools(&mut self) -> Result<Vec<String>, SearchError> {
        tracing::info!("Fetching tools from the tool service");
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|e| SearchError::Tool(e.to_string()))?;
        Ok(tools.into_iter().map(|tool| tool.name.to_string()).collect())
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, SearchError> {
        tracing::info!("Calling tool '{}' with arguments: {:?}", name, arguments.keys());
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| SearchError::Tool(format!("'{}' failed: {}", name, e)))?;

        if result.is_error == Some(true) {
            return Err(SearchError::Tool(format!("'{}' reported an error", name)));
        }
        Ok(serde_json::to_value(&result)?)
    }

    async fn close(self: Box<Self>) -> Result<(), SearchError> {
        self.service
            .cancel()
            .await
            .map_err(|e| SearchError::Tool(format!("Failed to close session: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::seeded_collection;
    use crate::gallery::gallery_items;
    use crate::tools::{serve_on, IMAGE_TO_IMAGE_TOOL, MCP_PATH, TEXT_TO_IMAGE_TOOL};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn spawn_service() -> ToolClientConfig {
        let collection = Arc::new(seeded_collection().await);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(serve_on(listener, collection, "test-search".to_string()));
        ToolClientConfig {
            server_url: format!("http://{}{}", addr, MCP_PATH),
            tool_timeout_secs: 10,
        }
    }

    #[tokio::test]
    async fn test_session_lists_and_calls_tools_over_http() -> Result<(), SearchError> {
        let config = spawn_service().await;
        let connector = McpToolConnector::new(&config);
        let mut session = connector.connect().await?;

        let mut tools = session.list_tools().await?;
        tools.sort();
        assert_eq!(tools, vec![IMAGE_TO_IMAGE_TOOL, TEXT_TO_IMAGE_TOOL]);

        let arguments = json!({"text_query": "red sneakers", "top_k": 2});
        let envelope = session
            .call_tool(TEXT_TO_IMAGE_TOOL, arguments.as_object().cloned().unwrap_or_default())
            .await?;
        session.close().await?;

        let captions: Vec<String> = gallery_items(&envelope).into_iter().map(|g| g.caption).collect();
        assert_eq!(
            captions,
            vec!["Red Runner — $59.99 — Sneakers", "Crimson Trainer — $89 — Sneakers"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_connecting_to_nothing_fails() {
        let config = ToolClientConfig {
            server_url: "http://127.0.0.1:9/mcp".to_string(),
            tool_timeout_secs: 2,
        };
        let result = McpToolConnector::new(&config).connect().await;
        assert!(matches!(result, Err(SearchError::Tool(_))));
    }
}
