//! Short-lived cache for images users upload ahead of an edit or merge
//! command.
//!
//! Uploads arrive before the command that consumes them, so the bytes are
//! parked here under the sender's id with a TTL shorter than the session
//! TTL. Reads evict lazily, and the handler sweeps on every inbound message
//! to keep memory bounded.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Smallest byte count we accept as a plausible image upload. Anything
/// below this is a thumbnail placeholder or a broken download.
pub const MIN_IMAGE_BYTES: usize = 1000;

/// Size and format check applied to every accepted upload, returning the
/// sniffed mime type. Used by the cache and by flows that consume an
/// upload directly without caching it.
pub fn validate_upload(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return None;
    }
    sniff_mime(bytes)
}

/// Detect the mime type from magic bytes. Returns `None` for anything that
/// is not a recognizable raster format.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(b"\xff\xd8\xff") {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[derive(Debug, Clone)]
struct CachedImage {
    bytes: Vec<u8>,
    mime: &'static str,
    cached_at: Instant,
}

/// TTL-bounded map from user id to their most recent upload.
pub struct ImageCache {
    entries: DashMap<String, CachedImage>,
    ttl: Duration,
}

impl ImageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cache an upload, replacing any previous one from the same user.
    /// Returns `false` (and caches nothing) if the bytes are too small or
    /// not a recognizable image.
    pub fn put(&self, user_id: &str, bytes: Vec<u8>) -> bool {
        let Some(mime) = validate_upload(&bytes) else {
            tracing::warn!(
                user_id,
                size = bytes.len(),
                "Upload too small or not a recognizable image, ignoring"
            );
            return false;
        };

        tracing::debug!(user_id, mime, size = bytes.len(), "Cached inbound image");
        self.entries.insert(
            user_id.to_string(),
            CachedImage {
                bytes,
                mime,
                cached_at: Instant::now(),
            },
        );
        true
    }

    /// Fetch the user's cached upload if it has not expired. The entry stays
    /// cached so several commands can reuse the same upload within the TTL.
    pub fn get(&self, user_id: &str) -> Option<(Vec<u8>, &'static str)> {
        let entry = self.entries.get(user_id)?;
        if entry.cached_at.elapsed() >= self.ttl {
            drop(entry);
            self.entries.remove(user_id);
            return None;
        }
        Some((entry.bytes.clone(), entry.mime))
    }

    /// Drop the user's cached upload, if any.
    pub fn remove(&self, user_id: &str) {
        self.entries.remove(user_id);
    }

    /// Evict every expired entry.
    pub fn sweep(&self) {
        self.entries
            .retain(|_, entry| entry.cached_at.elapsed() < self.ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
