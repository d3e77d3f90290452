//! Per-user conversation sessions with TTL-based expiry.
//!
//! The store owns all session records exclusively; callers get clones and
//! write back through [`SessionStore::update`]. Expiry is lazy: every
//! operation checks `last_active_at` first and evicts stale entries. Reads
//! report an expired session as absent; mutators distinguish it with
//! `Error::Expired`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gemimg_common::{Error, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// What the session is currently doing. Determines how plain follow-up
/// text (no command prefix) is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Multi-turn generation started by a generate command.
    Generating,
    /// Multi-turn editing of an existing image.
    Editing,
    /// Collecting images for a merge, then composing.
    Merging,
    /// One-shot flow waiting for the user to upload a reference image.
    AwaitingReferenceImage,
    /// One-shot flow waiting for an image to analyze.
    AwaitingAnalysisImage,
}

impl SessionMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Editing => "editing",
            Self::Merging => "merging",
            Self::AwaitingReferenceImage => "awaiting-reference-image",
            Self::AwaitingAnalysisImage => "awaiting-analysis-image",
        }
    }
}

/// Conversation role, mirroring the Gemini wire roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// One conversation turn: text plus an optional image produced or supplied
/// at that point.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub image_path: Option<PathBuf>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            image_path: None,
        }
    }

    pub fn model(text: impl Into<String>, image_path: Option<PathBuf>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
            image_path,
        }
    }

    pub fn with_image(mut self, path: PathBuf) -> Self {
        self.image_path = Some(path);
        self
    }
}

/// Accumulated continuation state for a session.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    /// Conversation history, oldest first, bounded by the store.
    pub history: Vec<Turn>,
    /// Path of the most recently produced or uploaded image.
    pub last_image: Option<PathBuf>,
    /// Prompt waiting for images (merge flows).
    pub pending_prompt: Option<String>,
    /// Image slots collected for a merge, bounded by the handler.
    pub pending_images: Vec<Vec<u8>>,
}

/// A single user's session record.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub created_at: Instant,
    pub last_active_at: Instant,
    pub mode: SessionMode,
    pub context: SessionContext,
}

impl Session {
    fn new(user_id: &str, mode: SessionMode, context: SessionContext) -> Self {
        let now = Instant::now();
        Self {
            user_id: user_id.to_string(),
            created_at: now,
            last_active_at: now,
            mode,
            context,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.last_active_at.elapsed() >= ttl
    }
}

/// In-memory session store keyed by user id.
///
/// At most one active session per user. Operations are atomic per key: the
/// underlying map locks individual entries, so concurrent messages from the
/// same user serialize while unrelated users proceed in parallel.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
    max_history_turns: usize,
}

impl SessionStore {
    /// Create a store with the given inactivity TTL and history bound.
    pub fn new(ttl: Duration, max_history_turns: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            max_history_turns,
        }
    }

    /// Return the session if present and unexpired. An expired entry is
    /// evicted and reported as absent.
    pub fn get_or_none(&self, user_id: &str) -> Option<Session> {
        match self.sessions.entry(user_id.to_string()) {
            Entry::Occupied(occupied) => {
                if occupied.get().is_expired(self.ttl) {
                    tracing::debug!(user_id, "Evicting expired session on read");
                    occupied.remove();
                    None
                } else {
                    Some(occupied.get().clone())
                }
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Create a session for the user. Fails with `AlreadyActive` if a valid
    /// session exists; an expired leftover is replaced silently.
    pub fn create(
        &self,
        user_id: &str,
        mode: SessionMode,
        context: SessionContext,
    ) -> Result<Session> {
        match self.sessions.entry(user_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(self.ttl) {
                    let session = Session::new(user_id, mode, context);
                    occupied.insert(session.clone());
                    Ok(session)
                } else {
                    Err(Error::AlreadyActive(user_id.to_string()))
                }
            }
            Entry::Vacant(vacant) => {
                let session = Session::new(user_id, mode, context);
                vacant.insert(session.clone());
                tracing::debug!(user_id, mode = mode.as_str(), "Session created");
                Ok(session)
            }
        }
    }

    /// Refresh `last_active_at`. Fails with `NotFound` if absent, `Expired`
    /// if the entry's TTL elapsed.
    pub fn touch(&self, user_id: &str) -> Result<()> {
        self.update(user_id, |_| {})
    }

    /// Apply a mutation to the session, refresh its timestamp and trim the
    /// history to the configured bound. Fails with `NotFound` if absent and
    /// `Expired` if the entry's TTL elapsed (the stale entry is evicted).
    pub fn update(&self, user_id: &str, f: impl FnOnce(&mut Session)) -> Result<()> {
        match self.sessions.entry(user_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(self.ttl) {
                    occupied.remove();
                    return Err(Error::Expired(user_id.to_string()));
                }
                let session = occupied.get_mut();
                f(session);
                let history = &mut session.context.history;
                if history.len() > self.max_history_turns {
                    let excess = history.len() - self.max_history_turns;
                    history.drain(..excess);
                }
                session.last_active_at = Instant::now();
                Ok(())
            }
            Entry::Vacant(_) => Err(Error::NotFound(user_id.to_string())),
        }
    }

    /// Delete the session unconditionally. Idempotent.
    pub fn end(&self, user_id: &str) {
        if self.sessions.remove(user_id).is_some() {
            tracing::debug!(user_id, "Session ended");
        }
    }

    /// Evict every expired session. Reads already evict lazily; this exists
    /// so the handler can bound memory on each inbound message.
    pub fn sweep(&self) {
        self.sessions.retain(|_, session| !session.is_expired(self.ttl));
    }

    /// Number of live (possibly expired but not yet evicted) entries.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
