//! Minimal chat-completion client for OpenAI-compatible inference APIs.
//!
//! Several hosted inference providers expose the same `/chat/completions`
//! wire format; this crate speaks that format against a configurable base
//! URL with bearer auth. Some providers return the answer in a secondary
//! `reasoning` field instead of `content`, so the response types expose
//! both and callers decide how to salvage a reply.

mod client;
mod error;
mod types;

pub use client::ChatClient;
pub use error::AiClientError;
pub use types::{ChatRequest, ChatResponse, ResponseMessage, WireMessage};
