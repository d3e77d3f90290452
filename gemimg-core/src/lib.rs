//! gemimg core - session state and command routing.
//!
//! This crate owns the two pieces of the plugin with actual structure:
//!
//! - a per-user session store with lazy TTL expiry, holding the multi-turn
//!   image-conversation state,
//! - an inbound image cache with its own (shorter) TTL,
//! - a command router that classifies incoming text against configured
//!   command prefixes with longest-prefix-wins resolution.
//!
//! Everything here is synchronous and in-memory; network I/O lives in
//! `gemimg-api` and message plumbing in `gemimg-bot`.

#![warn(clippy::all)]

pub mod cache;
pub mod router;
pub mod session;

pub use cache::{sniff_mime, validate_upload, ImageCache};
pub use router::{CommandKind, Route, Router};
pub use session::{Role, Session, SessionContext, SessionMode, SessionStore, Turn};
