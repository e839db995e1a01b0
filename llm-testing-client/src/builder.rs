use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;

use crate::transport::{ReqwestTransport, Transport};
use crate::{ApiClient, Error, Result};

/// Environment variable read when no base URL is configured.
pub const HOST_ENV_VAR: &str = "LLM_TESTING_HOST";

/// Backend origin used when neither the builder nor the environment provide one.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Path prefix shared by every backend endpoint.
pub const DEFAULT_API_PREFIX: &str = "/api";

/// A builder for constructing an [`ApiClient`].
///
/// - Uses either `LLM_TESTING_HOST` environment variable or `http://127.0.0.1:8000`.
/// - Prefixes every endpoint with `/api` unless told otherwise.
/// - Uses `reqwest`-based transport by default - [`ReqwestTransport`].
pub struct ApiClientBuilder {
    base_url: Option<String>,
    api_prefix: String,
    default_headers: Vec<(String, String)>,
    transport: Option<Arc<dyn Transport + Send + Sync>>,
}

impl ApiClientBuilder {
    /// Creates a new [`ApiClientBuilder`]. This method is called by [`ApiClient::builder`]
    pub(crate) fn new() -> Self {
        ApiClientBuilder {
            base_url: None,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            default_headers: Vec::new(),
            transport: None,
        }
    }

    /// Sets the origin of the backend (e.g. `http://localhost:8000`).
    ///
    /// If not set, the builder will try to read from the `LLM_TESTING_HOST` environment variable,
    /// defaulting to `http://127.0.0.1:8000` if the environment variable is not found.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the path prefix put in front of every endpoint. Defaults to `/api`.
    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Adds a header sent with every request.
    ///
    /// Headers passed to an individual [`ApiClient::api_call`] take precedence.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Sets a custom transport implementation for the client.
    ///
    /// If not set, a `reqwest`-based transport \([`ReqwestTransport`]\) will be used.
    /// For testing, you can use [`MockTransport`](crate::transport::MockTransport).
    pub fn transport(mut self, transport: Arc<dyn Transport + Send + Sync>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the [`ApiClient`] with the configured options.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Client`](variant@Error::Client) if the base URL or a default
    /// header is invalid, or if [`ReqwestTransport`] cannot be initialized.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub fn build(self) -> Result<ApiClient> {
        let transport = if let Some(t) = self.transport {
            t
        } else {
            let base_url_str = self.base_url.unwrap_or_else(|| {
                std::env::var(HOST_ENV_VAR).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            });

            let base_url = Url::parse(&base_url_str)
                .map_err(|e| Error::Client(format!("Invalid base URL: {}", e)))?;

            Arc::new(ReqwestTransport::new(base_url)?)
        };

        let mut default_headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Client(format!("Invalid header name {name:?}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::Client(format!("Invalid header value for {name}: {e}")))?;
            default_headers.insert(header_name, header_value);
        }

        Ok(ApiClient {
            transport,
            api_prefix: normalize_prefix(&self.api_prefix),
            default_headers,
        })
    }
}

/// Gives the prefix a single leading `/` and no trailing `/`; empty stays empty.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
