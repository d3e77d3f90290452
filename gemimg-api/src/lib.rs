//! Gemini image-generation client.
//!
//! Wraps the `models/{model}:generateContent` endpoint for the four calls
//! the plugin makes: generate, edit, compose (merge) and describe
//! (reverse/analyze/enhance). Supports direct Google access with the API
//! key as a query parameter, or a relay service with Bearer auth.
//!
//! [`ResilientApi`] adds a bounded exponential-backoff retry budget on top
//! of any [`ImageApi`] implementation.

#![warn(clippy::all)]

pub mod client;
pub mod refusal;
pub mod resilient;
pub mod types;

pub use client::{GeminiClient, ImageApi, ImageResult, InlineImage};
pub use refusal::translate_refusal;
pub use resilient::ResilientApi;
pub use types::{Content, GenerateContentRequest, Part};
