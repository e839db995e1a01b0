use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::{Error, Result};

/// A boxed stream of response body bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A request relative to the API prefix, plus the caller's options.
#[derive(Default, Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub verb: HttpVerb,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Option<Bytes>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        is_success_status(self.status)
    }
}

/// Response whose body is handed over as it arrives.
pub struct HttpStreamResponse {
    pub status: u16,
    pub body: Option<ByteStream>,
}

impl HttpStreamResponse {
    pub fn is_success(&self) -> bool {
        is_success_status(self.status)
    }
}

impl fmt::Debug for HttpStreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStreamResponse")
            .field("status", &self.status)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

pub(crate) fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

impl HttpRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn get(mut self) -> Self {
        self.verb = HttpVerb::GET;
        self
    }

    pub fn post(mut self) -> Self {
        self.verb = HttpVerb::POST;
        self
    }

    pub fn put(mut self) -> Self {
        self.verb = HttpVerb::PUT;
        self
    }

    pub fn delete(mut self) -> Self {
        self.verb = HttpVerb::DELETE;
        self
    }

    /// Sets a header, replacing any earlier value with the same name.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Client(format!("Invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Client(format!("Invalid header value for {name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn body<T: Serialize>(mut self, body: T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}
