use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
#[cfg(feature = "metrics")]
use metrics::counter;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::builder::ApiClientBuilder;
use crate::types::chat::{ChatRequest, ChatResponseChunk, ChatStream, ChatStreamEvent};
use crate::types::prompt::{
    ExtractVariablesRequest, SuccessResponse, ValidateVariablesRequest, VariableExtraction,
    VariableValidation,
};
use crate::types::{
    ApiError, AvailableModelsResponse, ByteStream, HealthReport, HttpRequest, ServerConfig,
    UNREADABLE_STREAM_DETAIL,
};
use crate::ApiClient;
use crate::{Error, Result};

const CHAT_STREAM_ENDPOINT: &str = "/chat-stream";
const CONFIG_ENDPOINT: &str = "/config";
const HEALTH_ENDPOINT: &str = "/health";
const MODELS_ENDPOINT: &str = "/models";
const EXTRACT_VARIABLES_ENDPOINT: &str = "/extract-variables";
const VALIDATE_VARIABLES_ENDPOINT: &str = "/validate-variables";

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Sends one JSON request to `endpoint` (relative to the API prefix) and
    /// decodes the JSON response as `T`.
    ///
    /// `request.url` names the endpoint, e.g. `HttpRequest::new("/config")`.
    /// `Content-Type: application/json` is sent unless the request overrides it.
    ///
    /// # Errors
    ///
    /// - [`Error::Api`] for a non-2xx status, carrying the body's `detail`.
    /// - [`Error::JsonParse`] if a successful body is not valid JSON for `T`.
    /// - [`Error::Transport`] / [`Error::Client`] if no response was received.
    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(endpoint = %request.url)))]
    pub async fn api_call<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let request = self.prepare(request);
        let response = self.transport.send_http_request(request).await?;

        if !response.is_success() {
            let body = response.body.unwrap_or_default();
            return Err(self.api_error(response.status, &body));
        }

        match response.body {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(Error::Protocol("Missing response body".into())),
        }
    }

    /// Starts a streamed chat completion.
    ///
    /// The returned [`ChatStream`] yields one [`ChatStreamEvent::Chunk`] per
    /// `data:` record and finishes with [`ChatStreamEvent::Completed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] when the backend rejects the request or the
    /// response has no body, and a transport error if it cannot be reached.
    #[cfg_attr(feature = "tracing", instrument(skip(self, request)))]
    pub async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream> {
        let request = self.prepare(HttpRequest::new(CHAT_STREAM_ENDPOINT).post().body(request)?);
        let response = self.transport.send_http_stream_request(request).await?;

        if !response.is_success() {
            let body = match response.body {
                Some(stream) => collect_body(stream).await?,
                None => Bytes::new(),
            };
            return Err(self.api_error(response.status, &body));
        }

        match response.body {
            Some(stream) => Ok(ChatStream::from_bytes_stream(stream)),
            None => Err(ApiError::internal(UNREADABLE_STREAM_DETAIL).into()),
        }
    }

    /// Streams a chat completion into callbacks.
    ///
    /// `on_chunk` runs for every decoded chunk in order. Afterwards exactly one
    /// of `on_complete` (the stream ended normally) or `on_error` (anything
    /// failed) runs. Failures without an HTTP status are reported as 500.
    #[cfg_attr(feature = "tracing", instrument(skip_all))]
    pub async fn send_chat_message<C, E, D>(
        &self,
        request: ChatRequest,
        mut on_chunk: C,
        on_error: E,
        on_complete: D,
    ) where
        C: FnMut(ChatResponseChunk),
        E: FnOnce(ApiError),
        D: FnOnce(),
    {
        let result = match self.chat_stream(request).await {
            Ok(stream) => forward_chunks(stream, &mut on_chunk).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => on_complete(),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %err, "chat stream failed");
                on_error(err.to_api_error());
            }
        }
    }

    /// Fetches the backend's configuration.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn get_server_config(&self) -> Result<ServerConfig> {
        self.api_call(HttpRequest::new(CONFIG_ENDPOINT)).await
    }

    /// Fetches the backend's health report.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn health_check(&self) -> Result<HealthReport> {
        self.api_call(HttpRequest::new(HEALTH_ENDPOINT)).await
    }

    /// Returns whether the health check succeeds. Failures are logged, never returned.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn check_server_status(&self) -> bool {
        match self.health_check().await {
            Ok(_) => true,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %_err, "failed to reach server");
                false
            }
        }
    }

    /// Lists the models the backend can answer with.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn list_models(&self) -> Result<AvailableModelsResponse> {
        self.api_call(HttpRequest::new(MODELS_ENDPOINT)).await
    }

    /// Asks the backend which `{{variables}}` a prompt uses.
    #[cfg_attr(feature = "tracing", instrument(skip(self, prompt)))]
    pub async fn extract_variables(
        &self,
        prompt: &str,
    ) -> Result<SuccessResponse<VariableExtraction>> {
        let request = HttpRequest::new(EXTRACT_VARIABLES_ENDPOINT)
            .post()
            .body(ExtractVariablesRequest { prompt })?;
        self.api_call(request).await
    }

    /// Checks `variables` against the placeholders of `prompt`.
    #[cfg_attr(feature = "tracing", instrument(skip(self, prompt, variables)))]
    pub async fn validate_variables(
        &self,
        prompt: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<SuccessResponse<VariableValidation>> {
        let request = HttpRequest::new(VALIDATE_VARIABLES_ENDPOINT)
            .post()
            .body(ValidateVariablesRequest { prompt, variables })?;
        self.api_call(request).await
    }

    /// Resolves the endpoint under the API prefix and layers the headers:
    /// JSON content type, then client defaults, then the request's own.
    fn prepare(&self, mut request: HttpRequest) -> HttpRequest {
        let endpoint = if request.url.starts_with('/') {
            request.url
        } else {
            format!("/{}", request.url)
        };
        request.url = format!("{}{}", self.api_prefix, endpoint);

        #[cfg(feature = "metrics")]
        counter!("llm_testing_client.requests_total", "endpoint" => request.url.clone())
            .increment(1);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        merge_headers(&mut headers, &self.default_headers);
        merge_headers(&mut headers, &request.headers);
        request.headers = headers;
        request
    }

    fn api_error(&self, status: u16, body: &[u8]) -> Error {
        let err = ApiError::from_response(status, body);
        #[cfg(feature = "tracing")]
        tracing::debug!(status, detail = %err.detail, "backend returned an error");
        Error::Api(err)
    }
}

/// Replaces every header of `target` that `overrides` also sets.
fn merge_headers(target: &mut HeaderMap, overrides: &HeaderMap) {
    for name in overrides.keys() {
        target.remove(name);
    }
    for (name, value) in overrides {
        target.append(name.clone(), value.clone());
    }
}

async fn collect_body(mut stream: ByteStream) -> Result<Bytes> {
    let mut body = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk?);
    }
    Ok(body.freeze())
}

async fn forward_chunks<C>(mut stream: ChatStream, on_chunk: &mut C) -> Result<()>
where
    C: FnMut(ChatResponseChunk),
{
    while let Some(event) = stream.next().await {
        match event? {
            ChatStreamEvent::Chunk(chunk) => on_chunk(chunk),
            ChatStreamEvent::Completed => return Ok(()),
        }
    }
    Err(Error::Protocol("Chat stream ended without completing".into()))
}
