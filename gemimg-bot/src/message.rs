//! Message types exchanged with the host framework.
//!
//! The host owns transport and message parsing; the plugin only sees a
//! sender id plus either text or raw image bytes, and answers with text
//! and/or image replies. "Not handled" is expressed as no replies at all,
//! which the host treats as pass-through.

use serde::{Deserialize, Serialize};

/// A message dispatched to the plugin by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Opaque sender identifier (the session key).
    pub sender_id: String,
    /// Message payload.
    pub content: InboundContent,
}

/// Inbound payload types the plugin cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundContent {
    Text { text: String },
    Image { bytes: Vec<u8> },
}

impl InboundMessage {
    pub fn text(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            content: InboundContent::Text { text: text.into() },
        }
    }

    pub fn image(sender_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            sender_id: sender_id.into(),
            content: InboundContent::Image { bytes },
        }
    }
}

/// A reply sent back through the host's channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Reply {
    Text { text: String },
    Image { bytes: Vec<u8> },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(bytes: Vec<u8>) -> Self {
        Self::Image { bytes }
    }

    /// Text content, if this is a text reply.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }

    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}
