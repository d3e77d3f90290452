//! Shared plumbing for the gemimg plugin workspace.
//!
//! Provides the unified error type, the plugin configuration model with its
//! JSON loader, and `tracing` initialization used by every other crate.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{Error, Result};
