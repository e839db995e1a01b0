//! Async client for the LLM Testing Tool backend.
//!
//! The crate sends JSON requests to the backend's `/api` endpoints and decodes
//! the server-sent event stream produced by `POST /api/chat-stream` into typed
//! [`ChatResponseChunk`](types::chat::ChatResponseChunk)s. Streaming is exposed
//! both as a pull-based [`ChatStream`](types::chat::ChatStream) and as a
//! callback adapter ([`ApiClient::send_chat_message`]).

use std::sync::Arc;

use thiserror::Error;

use self::transport::Transport;
use self::types::ApiError;

pub mod builder;
pub mod client;
pub mod parser;
pub mod transport;
pub mod types;

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport + Send + Sync>,
    api_prefix: String,
    default_headers: reqwest::header::HeaderMap,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Client error: {0}")]
    Client(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(ApiError),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Converts any error into the [`ApiError`] shape handed to stream callbacks.
    ///
    /// HTTP-level errors keep their status; everything else is reported as a
    /// 500 carrying the error's message.
    pub fn to_api_error(&self) -> ApiError {
        match self {
            Error::Api(err) => err.clone(),
            Error::Transport(err) => ApiError::internal(err.to_string()),
            Error::Client(msg) | Error::Protocol(msg) => ApiError::internal(msg.clone()),
            Error::JsonParse(err) => ApiError::internal(err.to_string()),
        }
    }
}

impl From<ApiError> for Error {
    fn from(value: ApiError) -> Self {
        Error::Api(value)
    }
}
