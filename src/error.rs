use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Tool call error: {0}")]
    Tool(String),
    #[error("Transcription error: {0}")]
    Transcription(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("WalkDir error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Transcription(err.to_string())
    }
}

/// Errors reported straight back to the person issuing a query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Please provide at least one query (text, image, or audio).")]
    Missing,
    #[error("Please provide only one query (text, image, or audio). Do not fill more than one field.")]
    Ambiguous,
    #[error("Invalid audio file: {0}")]
    InvalidAudio(String),
    #[error("Audio too short ({duration:.2}s). Please speak for at least {min:.2}s.")]
    AudioTooShort { duration: f64, min: f64 },
    #[error("top_k must be between 1 and {max}, got {got}")]
    TopKOutOfRange { got: usize, max: usize },
    #[error("Please provide a valid audio query. No speech detected, or audio with only silence.")]
    NoValidSpeech,
    #[error("Transcription failed: {0}")]
    Transcription(String),
}
