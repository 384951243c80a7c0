//! In-memory redaction session store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::Instant;
use uuid::Uuid;

use super::error::RedactionError;
use super::types::{PageInfo, RedactionRectangle, SessionDetails, SessionState};
use crate::storage::multipart::lock;
use crate::storage::{Provider, UploadedObject};

/// One prepared document and its redaction state.
#[derive(Debug)]
pub struct RedactionSession {
    /// Session identifier.
    pub session_id: String,
    /// Source provider.
    pub provider: Provider,
    /// Source bucket.
    pub bucket: String,
    /// Source key.
    pub key: String,
    /// Original document bytes.
    pub document: Bytes,
    /// Per-page dimensions.
    pub pages: Vec<PageInfo>,
    /// Rectangles from the last successful apply.
    pub redactions: Vec<RedactionRectangle>,
    /// Output of the last successful apply.
    pub redacted: Option<Bytes>,
    /// Lifecycle state.
    pub state: SessionState,
    /// When the session was prepared.
    pub created_at: DateTime<Utc>,
    /// When the last apply succeeded.
    pub redacted_at: Option<DateTime<Utc>>,
    /// Where the redacted output was saved.
    pub saved_to: Option<UploadedObject>,
    released: bool,
}

impl RedactionSession {
    /// A freshly prepared session.
    #[must_use]
    pub fn new(
        provider: Provider,
        bucket: &str,
        key: &str,
        document: Bytes,
        pages: Vec<PageInfo>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            provider,
            bucket: bucket.to_string(),
            key: key.to_string(),
            document,
            pages,
            redactions: Vec::new(),
            redacted: None,
            state: SessionState::Created,
            created_at: Utc::now(),
            redacted_at: None,
            saved_to: None,
            released: false,
        }
    }

    /// Replace the redaction list with the result of a successful apply.
    pub fn record_redaction(&mut self, rects: Vec<RedactionRectangle>, output: Bytes) {
        self.redactions = rects;
        self.redacted = Some(output);
        self.redacted_at = Some(Utc::now());
        self.state = SessionState::Redacted;
    }

    /// Record where the redacted output was persisted.
    pub fn record_save(&mut self, location: UploadedObject) {
        self.saved_to = Some(location);
        self.state = SessionState::Saved;
    }

    /// Drop document buffers. Later lock holders see the session as gone.
    pub fn release(&mut self) {
        self.document = Bytes::new();
        self.redacted = None;
        self.released = true;
    }

    /// Whether [`release`](Self::release) has run.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    /// Metadata snapshot.
    #[must_use]
    pub fn details(&self) -> SessionDetails {
        SessionDetails {
            session_id: self.session_id.clone(),
            provider: self.provider,
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            state: self.state,
            page_count: self.pages.len(),
            pages: self.pages.clone(),
            redactions: self.redactions.clone(),
            original_size: self.document.len(),
            redacted_size: self.redacted.as_ref().map(Bytes::len),
            created_at: self.created_at,
            redacted_at: self.redacted_at,
            saved_to: self.saved_to.clone(),
        }
    }
}

/// A stored session plus its last-access time.
#[derive(Debug)]
pub struct SessionSlot {
    session: RwLock<RedactionSession>,
    last_access: Mutex<Instant>,
}

impl SessionSlot {
    fn new(session: RedactionSession) -> Self {
        Self {
            session: RwLock::new(session),
            last_access: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self, now: Instant) {
        *lock(&self.last_access) = now;
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*lock(&self.last_access))
    }

    /// Shared access; many readers may hold it at once.
    ///
    /// Fails if the session was cleaned up while this caller waited.
    pub async fn read(&self) -> Result<RwLockReadGuard<'_, RedactionSession>, RedactionError> {
        let guard = self.session.read().await;
        if guard.released {
            return Err(RedactionError::session_not_found(&guard.session_id));
        }
        Ok(guard)
    }

    /// Exclusive access; waits for readers and any running apply.
    ///
    /// Fails if the session was cleaned up while this caller waited.
    pub async fn write(&self) -> Result<RwLockWriteGuard<'_, RedactionSession>, RedactionError> {
        let guard = self.session.write().await;
        if guard.released {
            return Err(RedactionError::session_not_found(&guard.session_id));
        }
        Ok(guard)
    }
}

/// Sessions keyed by id, expiring after a period without access.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Arc<SessionSlot>>,
    ttl: Duration,
}

impl SessionStore {
    /// Default idle window: one hour.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

    /// Create an empty store.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Store a session and return its id.
    pub fn insert(&self, session: RedactionSession) -> String {
        let id = session.session_id.clone();
        self.sessions
            .insert(id.clone(), Arc::new(SessionSlot::new(session)));
        id
    }

    /// Look up a live session and refresh its idle timer.
    ///
    /// A session idle longer than the TTL is evicted and reported missing.
    pub fn get(&self, session_id: &str) -> Result<Arc<SessionSlot>, RedactionError> {
        let now = Instant::now();
        let slot = self
            .sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RedactionError::session_not_found(session_id))?;

        if slot.idle_for(now) > self.ttl {
            self.sessions
                .remove_if(session_id, |_, stored| Arc::ptr_eq(stored, &slot));
            return Err(RedactionError::session_not_found(session_id));
        }
        slot.touch(now);
        Ok(slot)
    }

    /// Remove a live session.
    pub fn remove(&self, session_id: &str) -> Result<Arc<SessionSlot>, RedactionError> {
        let slot = self.get(session_id)?;
        self.sessions
            .remove_if(session_id, |_, stored| Arc::ptr_eq(stored, &slot));
        Ok(slot)
    }

    /// Evict every session idle past the TTL. Returns how many.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, slot| slot.idle_for(now) <= self.ttl);
        before.saturating_sub(self.sessions.len())
    }

    /// Live session count (including ones not yet swept).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
