//! Speech to text through an OpenAI-compatible transcription server
//! (faster-whisper, whisper.cpp server and similar).

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;

use crate::config::TranscriberConfig;
use crate::error::{QueryError, SearchError};

/// What a model emits for silence or noise instead of an empty transcript.
pub const SILENCE_SENTINELS: &[&str] = &[" .", ".", "...", " ", "\n", "\t"];

/// Recognized speech, one entry per segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub segments: Vec<String>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript, SearchError>;
}

/// The query text carried by a transcript, or `NoValidSpeech` when there is none.
pub fn speech_text(transcript: &Transcript) -> Result<String, QueryError> {
    let first = transcript.segments.first().ok_or(QueryError::NoValidSpeech)?;
    let text = first.trim();
    if text.is_empty() || SILENCE_SENTINELS.contains(&text) || SILENCE_SENTINELS.contains(&first.as_str()) {
        return Err(QueryError::NoValidSpeech);
    }
    Ok(text.to_string())
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Option<Vec<Segment>>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    text: String,
}

impl From<VerboseTranscription> for Transcript {
    fn from(response: VerboseTranscription) -> Self {
        let segments = match response.segments {
            Some(segments) => segments.into_iter().map(|s| s.text).collect(),
            None if response.text.is_empty() => Vec::new(),
            None => vec![response.text],
        };
        Transcript { segments }
    }
}

pub struct HttpTranscriber {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpTranscriber {
    pub fn new(config: &TranscriberConfig) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        tracing::info!(
            "Transcription via {} using model '{}'",
            config.base_url,
            config.model
        );
        Ok(Self {
            client,
            endpoint: format!("{}/v1/audio/transcriptions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript, SearchError> {
        tracing::info!("Starting transcription for audio file: {}", audio_path.display());

        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "query.wav".to_string());
        let mime = mime_guess::from_path(audio_path).first_or_octet_stream();

        let form = Form::new()
            .text("model", self.model.clone())
            .text("task", "transcribe")
            .text("response_format", "verbose_json")
            .part("file", Part::bytes(bytes).file_name(file_name).mime_str(mime.as_ref())?);

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SearchError::Transcription(format!(
                "HTTP {} from {}: {}",
                status, self.endpoint, error_text
            )));
        }

        let body: VerboseTranscription = response.json().await?;
        let transcript = Transcript::from(body);
        tracing::info!(
            "Transcribed {} into {} segment(s)",
            audio_path.display(),
            transcript.segments.len()
        );
        Ok(transcript)
    }
}
