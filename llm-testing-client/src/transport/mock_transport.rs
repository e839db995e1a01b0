use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[cfg(feature = "tracing")]
use tracing::instrument;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt};

use crate::transport::Transport;
use crate::types::{HttpRequest, HttpResponse, HttpStreamResponse};
use crate::{Error, Result};

/// A mock implementation of the [`Transport`] trait for testing purposes.
///
/// Responses are configured per request path (including the API prefix, e.g.
/// `/api/health`) and replayed on every matching request. Paths without a
/// configured response answer `404 {"detail":"Not Found"}`. Every request is
/// recorded and can be inspected with [`MockTransport::requests`].
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

#[derive(Clone, Debug)]
enum MockResponse {
    /// The request fails before any response is received.
    Unreachable(String),
    Reply {
        status: u16,
        /// Body chunks in delivery order; `None` means no body at all.
        chunks: Option<Vec<Bytes>>,
        /// Error raised after the chunks have been delivered.
        read_error: Option<String>,
    },
}

impl MockTransport {
    /// Creates a new, empty [`MockTransport`].
    pub fn new() -> Self {
        Self::default()
    }

    fn with(self, path: impl Into<String>, response: MockResponse) -> Self {
        self.responses.lock().unwrap().insert(path.into(), response);
        self
    }

    /// Answers `path` with `status` and the given body in a single chunk.
    pub fn with_response(self, path: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        self.with_stream_response(path, status, vec![body.into()])
    }

    /// Answers `path` with `status` and `body` serialized as JSON.
    pub fn with_json_response(self, path: impl Into<String>, status: u16, body: serde_json::Value) -> Self {
        self.with_response(path, status, body.to_string())
    }

    /// Answers `path` with a body delivered as the given sequence of chunks.
    pub fn with_stream_response<B: Into<Bytes>>(
        self,
        path: impl Into<String>,
        status: u16,
        chunks: Vec<B>,
    ) -> Self {
        let chunks = chunks.into_iter().map(Into::into).collect();
        self.with(
            path,
            MockResponse::Reply {
                status,
                chunks: Some(chunks),
                read_error: None,
            },
        )
    }

    /// Answers `path` with the given chunks, then fails the read with `message`.
    pub fn with_read_error<B: Into<Bytes>>(
        self,
        path: impl Into<String>,
        status: u16,
        chunks: Vec<B>,
        message: impl Into<String>,
    ) -> Self {
        let chunks = chunks.into_iter().map(Into::into).collect();
        self.with(
            path,
            MockResponse::Reply {
                status,
                chunks: Some(chunks),
                read_error: Some(message.into()),
            },
        )
    }

    /// Answers `path` with `status` and no body at all.
    pub fn with_missing_body(self, path: impl Into<String>, status: u16) -> Self {
        self.with(
            path,
            MockResponse::Reply {
                status,
                chunks: None,
                read_error: None,
            },
        )
    }

    /// Makes requests to `path` fail as if the server could not be reached.
    pub fn with_unreachable(self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.with(path, MockResponse::Unreachable(message.into()))
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn respond_to(&self, request: HttpRequest) -> MockResponse {
        let response = self.responses.lock().unwrap().get(&request.url).cloned();
        self.requests.lock().unwrap().push(request);
        response.unwrap_or_else(|| MockResponse::Reply {
            status: 404,
            chunks: Some(vec![Bytes::from_static(br#"{"detail":"Not Found"}"#)]),
            read_error: None,
        })
    }
}

#[async_trait]
impl Transport for MockTransport {
    /// Mocks a buffered request by concatenating the configured chunks.
    #[cfg_attr(feature = "tracing", instrument(skip(self, request)))]
    async fn send_http_request(&self, request: HttpRequest) -> Result<HttpResponse> {
        match self.respond_to(request) {
            MockResponse::Unreachable(message) => Err(Error::Client(message)),
            MockResponse::Reply {
                read_error: Some(message),
                ..
            } => Err(Error::Protocol(message)),
            MockResponse::Reply { status, chunks, .. } => {
                let body = chunks.map(|chunks| {
                    chunks
                        .iter()
                        .fold(BytesMut::new(), |mut acc, chunk| {
                            acc.extend_from_slice(chunk);
                            acc
                        })
                        .freeze()
                });
                Ok(HttpResponse { status, body })
            }
        }
    }

    /// Mocks a streaming request, delivering each configured chunk separately.
    #[cfg_attr(feature = "tracing", instrument(skip(self, request)))]
    async fn send_http_stream_request(&self, request: HttpRequest) -> Result<HttpStreamResponse> {
        match self.respond_to(request) {
            MockResponse::Unreachable(message) => Err(Error::Client(message)),
            MockResponse::Reply {
                status,
                chunks,
                read_error,
            } => {
                let body = chunks.map(|chunks| {
                    let tail = read_error.map(|message| Err(Error::Protocol(message)));
                    stream::iter(chunks.into_iter().map(Ok).chain(tail)).boxed()
                });
                Ok(HttpStreamResponse { status, body })
            }
        }
    }
}
