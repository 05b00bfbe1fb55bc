use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{ToolConnector, ToolSession};
use crate::codec::file_to_base64;
use crate::config::RouterConfig;
use crate::error::{QueryError, SearchError};
use crate::gallery::gallery_items;
use crate::metrics::LatencyMetrics;
use crate::models::GalleryItem;
use crate::query::{audio_duration, validate_audio_duration, Query, QueryInputs, TopK};
use crate::tools::{IMAGE_TO_IMAGE_TOOL, TEXT_TO_IMAGE_TOOL};
use crate::transcribe::{speech_text, Transcriber};

/// What one search hands back to the user.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub gallery: Vec<GalleryItem>,
    /// Recognized speech, for audio queries.
    pub transcript: Option<String>,
    pub metrics: LatencyMetrics,
}

impl SearchOutcome {
    /// No results and zeroed metrics, returned when the remote stage fails.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn total_latency(&self) -> f64 {
        self.metrics.total()
    }
}

/// A query reduced to the tool call that answers it.
#[derive(Debug, Clone, PartialEq)]
enum ToolRequest {
    TextToImage(String),
    ImageToImage(String),
}

impl ToolRequest {
    fn tool_name(&self) -> &'static str {
        match self {
            ToolRequest::TextToImage(_) => TEXT_TO_IMAGE_TOOL,
            ToolRequest::ImageToImage(_) => IMAGE_TO_IMAGE_TOOL,
        }
    }

    fn arguments(&self, top_k: TopK) -> Map<String, Value> {
        let mut arguments = Map::new();
        match self {
            ToolRequest::TextToImage(text) => arguments.insert("text_query".to_string(), json!(text)),
            ToolRequest::ImageToImage(image) => arguments.insert("image_query".to_string(), json!(image)),
        };
        arguments.insert("top_k".to_string(), json!(top_k.get()));
        arguments
    }
}

/// Dispatches single-modality queries to the search tools.
pub struct QueryRouter {
    connector: Arc<dyn ToolConnector>,
    transcriber: Arc<dyn Transcriber>,
    config: RouterConfig,
    tool_timeout: Duration,
}

impl QueryRouter {
    pub fn new(
        connector: Arc<dyn ToolConnector>,
        transcriber: Arc<dyn Transcriber>,
        config: RouterConfig,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            transcriber,
            config,
            tool_timeout,
        }
    }

    /// Runs one search.
    ///
    /// Input and transcription problems come back as `Err`. Anything that goes
    /// wrong once the query is valid (reading the image, reaching the tool
    /// service, mapping its answer) is logged and turned into an empty outcome.
    pub async fn search(
        &self,
        inputs: QueryInputs,
        top_k: usize,
    ) -> Result<SearchOutcome, QueryError> {
        let query = Query::parse(inputs)?;
        let top_k = TopK::new(top_k)?;
        let modality = query.modality();
        tracing::info!("Processing {} query...", modality);

        let mut metrics = LatencyMetrics::new();
        let mut transcript = None;

        let request = match query {
            Query::Audio(path) => {
                let duration = audio_duration(&path)?;
                validate_audio_duration(duration, self.config.min_audio_seconds)?;

                let start = LatencyMetrics::start_timer();
                let text = self.transcribe(&path).await?;
                metrics.transcription = LatencyMetrics::end_timer(start);
                transcript = Some(text.clone());
                ToolRequest::TextToImage(text)
            }
            Query::Text(text) => ToolRequest::TextToImage(text),
            Query::Image(path) => match file_to_base64(&path) {
                Ok(encoded) => ToolRequest::ImageToImage(encoded),
                Err(e) => {
                    tracing::error!("Error processing image query {}: {}", path.display(), e);
                    return Ok(SearchOutcome::empty());
                }
            },
        };

        // Dropping the session on timeout also tears the connection down.
        let remote = tokio::time::timeout(
            self.tool_timeout,
            self.invoke(&request, top_k, &mut metrics),
        )
        .await
        .unwrap_or(Err(SearchError::Timeout(self.tool_timeout)));

        match remote {
            Ok(gallery) => {
                let outcome = SearchOutcome {
                    gallery,
                    transcript,
                    metrics,
                };
                outcome.total_latency();
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("Error processing {} query: {}", modality, e);
                Ok(SearchOutcome::empty())
            }
        }
    }

    async fn transcribe(&self, path: &Path) -> Result<String, QueryError> {
        let transcript = self.transcriber.transcribe(path).await.map_err(|e| {
            tracing::error!("Error during speech-to-text transcription: {}", e);
            QueryError::Transcription(e.to_string())
        })?;
        let text = speech_text(&transcript).map_err(|e| {
            tracing::error!("Invalid transcription for audio file {}: {:?}", path.display(), transcript.segments);
            e
        })?;
        tracing::info!("Successful transcription for audio file {}, text: {}", path.display(), text);
        Ok(text)
    }

    async fn invoke(
        &self,
        request: &ToolRequest,
        top_k: TopK,
        metrics: &mut LatencyMetrics,
    ) -> Result<Vec<GalleryItem>, SearchError> {
        let mut session = self.connector.connect().await?;
        let outcome = call_and_map(session.as_mut(), request, top_k, metrics).await;
        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close tool session: {}", e);
        }
        outcome
    }
}

async fn call_and_map(
    session: &mut dyn ToolSession,
    request: &ToolRequest,
    top_k: TopK,
    metrics: &mut LatencyMetrics,
) -> Result<Vec<GalleryItem>, SearchError> {
    let start = LatencyMetrics::start_timer();
    let response = session
        .call_tool(request.tool_name(), request.arguments(top_k))
        .await?;
    metrics.tool_call = LatencyMetrics::end_timer(start);

    let start = LatencyMetrics::start_timer();
    let gallery = gallery_items(&response);
    metrics.post_processing = LatencyMetrics::end_timer(start);
    Ok(gallery)
}
