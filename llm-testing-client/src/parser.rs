//! Incremental decoding of `text/event-stream` response bodies.
//!
//! [`SseLineDecoder`] reassembles arbitrarily split byte chunks into complete
//! lines, and [`GenericStreamParser`] turns the `data: ` lines of a byte stream
//! into typed events.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use memchr::memchr;
#[cfg(feature = "metrics")]
use metrics::counter;
use serde::de::DeserializeOwned;

use crate::Result;

/// Prefix that marks a line carrying a JSON payload.
pub const DATA_PREFIX: &str = "data: ";

/// Buffers raw bytes and hands out newline-terminated lines.
///
/// Lines are cut at the `\n` byte before being decoded, so a multi-byte UTF-8
/// sequence split across two chunks is reassembled intact.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of body bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Takes the next complete line, without its terminating `\n`.
    pub fn next_line(&mut self) -> Option<String> {
        let newline_pos = memchr(b'\n', &self.buffer)?;
        let line = String::from_utf8_lossy(&self.buffer[..newline_pos]).into_owned();
        self.buffer.drain(..=newline_pos);
        Some(line)
    }

    /// Bytes received after the last newline.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Clears the decoder, returning the unterminated tail if there was one.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let tail = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Some(tail)
    }
}

/// Parses the payload of a `data: ` line.
///
/// Returns `None` for any other line (blank separators, comments, `event:`
/// fields), so only data records reach the caller.
pub fn parse_data_line<M: DeserializeOwned>(line: &str) -> Option<serde_json::Result<M>> {
    line.strip_prefix(DATA_PREFIX)
        .map(|payload| serde_json::from_str::<M>(payload))
}

/// Lets endpoint-specific event enums be built from a decoded record or
/// from the end of the stream.
pub trait StreamEventExt<M>: Sized {
    /// Create an event from a successfully deserialized record.
    fn from_message(msg: M) -> Self;

    /// Create the event emitted once the body ends.
    fn completed() -> Self;
}

/// Generic SSE parser over a byte stream.
///
/// - `S` is the underlying stream that yields `Result<Bytes>`
/// - `M` is the record type carried by each `data: ` line
/// - `E` is the event enum type that implements `StreamEventExt<M>`
///
/// Yields one event per well-formed record, then a single completion event
/// when `S` ends. A read error is yielded once and ends the stream without a
/// completion event. Malformed records are logged and skipped. The inner
/// stream is dropped as soon as the parser reaches either end state.
pub struct GenericStreamParser<S, M, E>
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin,
    M: DeserializeOwned,
    E: StreamEventExt<M>,
{
    inner: Option<S>,
    decoder: SseLineDecoder,
    _marker: PhantomData<(M, E)>,
}

impl<S, M, E> GenericStreamParser<S, M, E>
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin,
    M: DeserializeOwned,
    E: StreamEventExt<M>,
{
    pub fn new(stream: S) -> Self {
        Self {
            inner: Some(stream),
            decoder: SseLineDecoder::new(),
            _marker: PhantomData,
        }
    }

    /// Returns the next well-formed record among the buffered complete lines.
    fn parse_lines(&mut self) -> Option<E> {
        while let Some(line) = self.decoder.next_line() {
            match parse_data_line::<M>(&line) {
                None => continue,
                Some(Ok(msg)) => {
                    #[cfg(feature = "metrics")]
                    counter!("llm_testing_client.stream_records_total").increment(1);
                    return Some(E::from_message(msg));
                }
                Some(Err(_err)) => {
                    #[cfg(feature = "metrics")]
                    counter!("llm_testing_client.malformed_records_total").increment(1);
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %_err, line = %line, "skipping malformed SSE record");
                }
            }
        }
        None
    }

    fn close(&mut self) {
        self.inner = None;
        if let Some(_tail) = self.decoder.finish() {
            #[cfg(feature = "tracing")]
            tracing::debug!(tail = %_tail, "discarding unterminated SSE line");
        }
    }
}

impl<S, M, E> Stream for GenericStreamParser<S, M, E>
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin,
    M: DeserializeOwned + Unpin,
    E: StreamEventExt<M> + Unpin,
{
    type Item = Result<E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.parse_lines() {
                return Poll::Ready(Some(Ok(event)));
            }

            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };

            match Pin::new(inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.decoder.push(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    this.close();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.close();
                    return Poll::Ready(Some(Ok(E::completed())));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
