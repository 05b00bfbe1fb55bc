//! Runtime configuration.
//!
//! Every setting can be passed on the command line or through the environment
//! variable named next to it.

use clap::Args;
use std::time::Duration;

use crate::query::DEFAULT_MIN_AUDIO_SECONDS;

/// Vector database connection.
#[derive(Args, Debug, Clone)]
pub struct DatabaseConfig {
    /// Database endpoint: ws://host:port, rocksdb://path or mem://
    #[arg(long = "db-endpoint", env = "SURREALDB_ENDPOINT", default_value = "ws://localhost:8000")]
    pub endpoint: String,

    #[arg(long = "db-namespace", env = "SURREALDB_NAMESPACE", default_value = "products")]
    pub namespace: String,

    #[arg(long = "db-database", env = "SURREALDB_DATABASE", default_value = "catalog")]
    pub database: String,

    /// Table holding the product embeddings and metadata
    #[arg(long = "collection", env = "SURREALDB_COLLECTION", default_value = "men_shoes")]
    pub collection: String,

    #[arg(long = "db-user", env = "SURREALDB_USER")]
    pub username: Option<String>,

    #[arg(long = "db-pass", env = "SURREALDB_PASS", hide_env_values = true)]
    pub password: Option<String>,
}

/// Where the search tool service listens.
#[derive(Args, Debug, Clone)]
pub struct ToolServerConfig {
    #[arg(long = "name", env = "MCP_SERVER_NAME", default_value = "multimodal-search")]
    pub name: String,

    #[arg(long = "host", env = "MCP_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long = "port", env = "MCP_SERVER_PORT", default_value_t = 8001)]
    pub port: u16,
}

/// How the query side reaches the tool service.
#[derive(Args, Debug, Clone)]
pub struct ToolClientConfig {
    #[arg(long = "server-url", env = "MCP_SERVER_URL", default_value = "http://127.0.0.1:8001/mcp")]
    pub server_url: String,

    /// Upper bound for connecting, calling the tool and closing the session
    #[arg(long = "tool-timeout", env = "TOOL_TIMEOUT_SECS", default_value_t = 30)]
    pub tool_timeout_secs: u64,
}

impl ToolClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

#[derive(Args, Debug, Clone)]
pub struct TranscriberConfig {
    /// Base URL of an OpenAI-compatible transcription server
    #[arg(long = "transcription-url", env = "TRANSCRIPTION_URL", default_value = "http://127.0.0.1:8002")]
    pub base_url: String,

    #[arg(long = "whisper-model", env = "WHISPER_MODEL_NAME", default_value = "base")]
    pub model: String,

    #[arg(long = "transcription-api-key", env = "TRANSCRIPTION_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long = "transcription-timeout", env = "TRANSCRIPTION_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,
}

impl TranscriberConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Args, Debug, Clone)]
pub struct RouterConfig {
    /// Shortest accepted audio query, in seconds
    #[arg(long = "min-audio-seconds", env = "MIN_AUDIO_SECONDS", default_value_t = DEFAULT_MIN_AUDIO_SECONDS)]
    pub min_audio_seconds: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            min_audio_seconds: DEFAULT_MIN_AUDIO_SECONDS,
        }
    }
}
