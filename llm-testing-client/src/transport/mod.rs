use async_trait::async_trait;

use crate::types::{HttpRequest, HttpResponse, HttpStreamResponse};
use crate::Result;

mod mock_transport;
mod reqwest_transport;

pub use mock_transport::MockTransport;
pub use reqwest_transport::ReqwestTransport;

/// Sends requests on behalf of [`ApiClient`](crate::ApiClient).
///
/// Implementations report every HTTP status as-is; interpreting non-2xx
/// statuses is left to the client. `Err` is reserved for failures that never
/// produced a response.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends a request and buffers the whole response body.
    async fn send_http_request(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Sends a request and returns the response body as a stream of bytes.
    async fn send_http_stream_request(&self, request: HttpRequest) -> Result<HttpStreamResponse>;
}
