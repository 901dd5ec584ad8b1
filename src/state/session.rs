use crate::types::{bearer_header, normalize_token, SessionEvent, SessionEventKind};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{broadcast, watch};

const EVENT_CAPACITY: usize = 64;

fn now_iso() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Owner of the live session token.
///
/// Clones share the same token. Every transition is broadcast to
/// subscribers as a [`SessionEvent`]; the token itself never leaves
/// through the event channel.
#[derive(Clone)]
pub struct SessionContext {
    token: Arc<watch::Sender<Option<String>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (token, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            token: Arc::new(token),
            events,
        }
    }

    pub fn get(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.borrow().is_some()
    }

    pub fn authorization_header(&self) -> Option<String> {
        self.token.borrow().as_deref().map(bearer_header)
    }

    /// Stores a token obtained from login. Returns `false` when `token` is
    /// blank or a placeholder, in which case the session is left untouched.
    pub fn set(&self, token: &str) -> bool {
        let Some(token) = normalize_token(token) else {
            tracing::warn!("ignoring empty session token");
            return false;
        };
        self.token.send_replace(Some(token));
        tracing::info!("session token set");
        self.emit(SessionEventKind::LoggedIn);
        true
    }

    pub fn clear(&self) {
        if self.take().is_some() {
            tracing::info!("session token cleared");
            self.emit(SessionEventKind::LoggedOut);
        }
    }

    pub(crate) fn refresh_to(&self, token: String) {
        self.token.send_replace(Some(token));
        tracing::info!("session token refreshed");
        self.emit(SessionEventKind::Refreshed);
    }

    pub(crate) fn expire(&self) {
        if self.take().is_some() {
            tracing::warn!("session expired, token cleared");
            self.emit(SessionEventKind::Expired);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn take(&self) -> Option<String> {
        self.token.send_replace(None)
    }

    fn emit(&self, kind: SessionEventKind) {
        // No subscribers is fine.
        let _ = self.events.send(SessionEvent { kind, at: now_iso() });
    }
}
