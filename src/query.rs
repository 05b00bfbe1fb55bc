use std::path::{Path, PathBuf};

use crate::error::QueryError;

pub const MAX_TOP_K: usize = 4;
pub const DEFAULT_MIN_AUDIO_SECONDS: f64 = 1.0;

/// A single-modality search request.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Audio(PathBuf),
    Text(String),
    Image(PathBuf),
}

/// Raw inputs as they come from the user, any of which may be missing or blank.
#[derive(Debug, Clone, Default)]
pub struct QueryInputs {
    pub audio: Option<PathBuf>,
    pub text: Option<String>,
    pub image: Option<PathBuf>,
}

impl Query {
    /// Accepts the inputs only when exactly one of them is non-empty.
    pub fn parse(inputs: QueryInputs) -> Result<Query, QueryError> {
        let audio = inputs.audio.filter(|p| !p.as_os_str().is_empty());
        let text = inputs.text.filter(|t| !t.is_empty());
        let image = inputs.image.filter(|p| !p.as_os_str().is_empty());

        match (audio, text, image) {
            (None, None, None) => Err(QueryError::Missing),
            (Some(audio), None, None) => Ok(Query::Audio(audio)),
            (None, Some(text), None) => Ok(Query::Text(text)),
            (None, None, Some(image)) => Ok(Query::Image(image)),
            _ => Err(QueryError::Ambiguous),
        }
    }

    pub fn modality(&self) -> &'static str {
        match self {
            Query::Audio(_) => "audio",
            Query::Text(_) => "text",
            Query::Image(_) => "image",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopK(usize);

impl TopK {
    pub fn new(value: usize) -> Result<Self, QueryError> {
        if (1..=MAX_TOP_K).contains(&value) {
            Ok(TopK(value))
        } else {
            Err(QueryError::TopKOutOfRange { got: value, max: MAX_TOP_K })
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

/// Duration of a WAV file in seconds: frame count over sample rate.
pub fn audio_duration(path: &Path) -> Result<f64, QueryError> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| QueryError::InvalidAudio(format!("{}: {}", path.display(), e)))?;
    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return Err(QueryError::InvalidAudio(format!("{}: zero sample rate", path.display())));
    }
    Ok(reader.duration() as f64 / sample_rate as f64)
}

pub fn validate_audio_duration(duration: f64, min_seconds: f64) -> Result<(), QueryError> {
    if duration < min_seconds {
        return Err(QueryError::AudioTooShort { duration, min: min_seconds });
    }
    Ok(())
}
