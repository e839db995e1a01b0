//! Contains all data structures used by the streaming chat endpoint.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::parser::{GenericStreamParser, StreamEventExt};
use crate::{Error, Result};

use super::Role;

/// A single message of the conversation sent to the backend.
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// The author of the message.
    pub role: Role,
    /// The text of the message.
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Body of `POST /api/chat-stream`.
///
/// Optional settings are left out of the JSON entirely when unset, so the
/// backend applies its own defaults.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// The conversation so far, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Name of the model to answer with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Upper bound on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// System prompt prepended by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Values substituted into `{{name}}` placeholders of the messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, String>>,
}

impl ChatRequest {
    /// Creates an empty [`ChatRequest`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to the conversation.
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Appends a user message.
    pub fn user(self, content: impl Into<String>) -> Self {
        self.message(ChatMessage::user(content))
    }

    /// Appends an assistant message.
    pub fn assistant(self, content: impl Into<String>) -> Self {
        self.message(ChatMessage::assistant(content))
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Adds a value for a prompt variable.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }
}

/// One incremental piece of a streamed chat answer.
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
pub struct ChatResponseChunk {
    /// Text delta to append to the answer.
    #[serde(default)]
    pub content: String,
    /// Set on the last chunk the backend sends for this answer.
    #[serde(default)]
    pub is_complete: bool,
    /// Model that produced the chunk.
    #[serde(default)]
    pub model: String,
    /// Token usage, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Value>,
}

/// An event received from a streaming chat response.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStreamEvent {
    /// A decoded `data:` record.
    Chunk(ChatResponseChunk),
    /// The response body ended normally. Always the last event.
    Completed,
}

/// A finite stream of [`ChatStreamEvent`]s for one chat request.
///
/// Ends after [`ChatStreamEvent::Completed`] or after the first error.
/// Dropping it releases the underlying response body.
pub struct ChatStream {
    pub inner: Pin<Box<dyn Stream<Item = Result<ChatStreamEvent>> + Send>>,
}

impl Stream for ChatStream {
    type Item = Result<ChatStreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl ChatStream {
    pub fn from_bytes_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
    {
        let parser = GenericStreamParser::<S, ChatResponseChunk, ChatStreamEvent>::new(stream);
        ChatStream {
            inner: Box::pin(parser),
        }
    }

    /// Drains the stream and returns the concatenated chunk contents.
    ///
    /// # Errors
    ///
    /// Returns the first error the stream yields, or [`Error::Protocol`] if it
    /// ends without a completion event.
    pub async fn collect_content(mut self) -> Result<String> {
        let mut content = String::new();
        while let Some(event) = self.next().await {
            match event? {
                ChatStreamEvent::Chunk(chunk) => content.push_str(&chunk.content),
                ChatStreamEvent::Completed => return Ok(content),
            }
        }
        Err(Error::Protocol("Chat stream ended without completing".into()))
    }
}

impl StreamEventExt<ChatResponseChunk> for ChatStreamEvent {
    fn from_message(msg: ChatResponseChunk) -> Self {
        ChatStreamEvent::Chunk(msg)
    }

    fn completed() -> Self {
        ChatStreamEvent::Completed
    }
}
