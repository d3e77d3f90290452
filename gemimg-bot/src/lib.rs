//! Gemini image-generation chat plugin.
//!
//! Wires the session store and command router to the Gemini image API and
//! exposes a single [`PluginHandler::handle`] entry point for the host
//! chat framework. A CLI channel is included for local testing.

pub mod cli;
pub mod handler;
pub mod message;
pub mod storage;

pub use cli::CliChannel;
pub use handler::PluginHandler;
pub use message::{InboundContent, InboundMessage, Reply};
pub use storage::ImageStorage;
