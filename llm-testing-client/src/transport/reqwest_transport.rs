#[cfg(feature = "tracing")]
use tracing::instrument;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};

use crate::transport::Transport;
use crate::types::{HttpRequest, HttpResponse, HttpStreamResponse, HttpVerb};
use crate::{Error, Result};

/// A [`Transport`] implementation that uses the `reqwest` crate for making HTTP requests.
///
/// This is the default transport used by [`ApiClient`](crate::ApiClient) if no custom transport
/// is provided. Request paths are appended to the path of `base_url`, so a
/// backend mounted under `http://host/llm/` is reached at `http://host/llm/api/..`.
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Creates a new `ReqwestTransport`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Client`] if the `reqwest` client cannot be built.
    pub fn new(base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    async fn build_and_send_request(&self, request: HttpRequest) -> Result<reqwest::Response> {
        let url = endpoint_url(&self.base_url, &request.url);

        let mut request_builder = match request.verb {
            HttpVerb::GET => self.client.get(url),
            HttpVerb::POST => self.client.post(url),
            HttpVerb::PUT => self.client.put(url),
            HttpVerb::DELETE => self.client.delete(url),
        };

        request_builder = request_builder.headers(request.headers);

        if let Some(body) = request.body {
            let body = serde_json::to_vec(&body)?;
            request_builder = request_builder.body(body);
        }

        request_builder.send().await.map_err(Error::Transport)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    /// Sends a request using `reqwest` and reads the full body.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Transport`] if the request fails or the body cannot be read.
    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(url = %request.url)))]
    async fn send_http_request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.build_and_send_request(request).await?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(Error::Transport)?;
        Ok(HttpResponse {
            status,
            body: Some(body),
        })
    }

    /// Sends a request using `reqwest` and streams the body as it arrives.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Transport`] if the request fails. Read errors surface
    /// later, as items of the returned stream.
    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(url = %request.url)))]
    async fn send_http_stream_request(&self, request: HttpRequest) -> Result<HttpStreamResponse> {
        let response = self.build_and_send_request(request).await?;
        let status = response.status().as_u16();
        let stream = response
            .bytes_stream()
            .map(|item| item.map_err(Error::Transport))
            .boxed();
        Ok(HttpStreamResponse {
            status,
            body: Some(stream),
        })
    }
}

/// Appends `endpoint` (path plus optional query) to the path of `base`.
fn endpoint_url(base: &Url, endpoint: &str) -> Url {
    let (path, query) = match endpoint.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (endpoint, None),
    };
    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url.set_query(query);
    url.set_fragment(None);
    url
}
