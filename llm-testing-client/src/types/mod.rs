//! Contains data structures for requests and responses to the backend API.
//!
//! This module defines the chat streaming types, the loosely shaped server
//! payloads, model listings, prompt variable helpers and the HTTP plumbing
//! shared by transports.

pub mod chat;
mod http;
mod models;
pub mod prompt;
mod server;
mod shared;

pub use http::*;
pub use models::*;
pub use server::*;
pub use shared::*;
