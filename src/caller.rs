//! Authenticated calls with transparent session token refresh.
//!
//! [`AuthenticatedCaller`] runs an operation with the current bearer header.
//! When the operation is rejected as unauthorized it exchanges the stale
//! token for a fresh one and retries exactly once. Concurrent callers that
//! hit the same expiry share a single refresh.

use crate::redact::redact_secrets;
use crate::state::SessionContext;
use crate::types::{bearer_header, normalize_token};
use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Classifies an operation failure as an authorization rejection.
pub trait AuthFailure {
    fn is_unauthorized(&self) -> bool;
}

/// Exchanges a (possibly expired) token for a new one.
///
/// `Ok(None)` means the endpoint answered but handed back no usable token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    type Error: Display + Send;

    async fn refresh(&self, token: &str) -> Result<Option<String>, Self::Error>;
}

#[derive(Debug, Error)]
pub enum CallError<E> {
    #[error("not logged in")]
    Unauthenticated,
    #[error("session expired, log in again")]
    SessionExpired,
    #[error("{0}")]
    Operation(E),
}

impl<E> CallError<E> {
    pub fn operation(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }
}

pub struct AuthenticatedCaller<R> {
    session: SessionContext,
    refresher: Arc<R>,
    refresh_gate: Arc<Mutex<()>>,
}

impl<R> Clone for AuthenticatedCaller<R> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            refresher: self.refresher.clone(),
            refresh_gate: self.refresh_gate.clone(),
        }
    }
}

impl<R: TokenRefresher> AuthenticatedCaller<R> {
    pub fn new(session: SessionContext, refresher: Arc<R>) -> Self {
        Self {
            session,
            refresher,
            refresh_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Runs `op(authorization, args)`, refreshing the token once on an
    /// unauthorized failure. `args` is cloned for the retry.
    pub async fn call_with_auth<A, T, E, F, Fut>(&self, op: F, args: A) -> Result<T, CallError<E>>
    where
        A: Clone,
        F: Fn(String, A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: AuthFailure + Display,
    {
        let Some(token) = self.session.get() else {
            return Err(CallError::Unauthenticated);
        };

        match op(bearer_header(&token), args.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_unauthorized() => return Err(CallError::Operation(e)),
            Err(e) => {
                tracing::debug!(error = %redact_secrets(&e.to_string()), "call rejected as unauthorized");
            }
        }

        let Some(fresh) = self.recover(&token).await else {
            return Err(CallError::SessionExpired);
        };
        op(bearer_header(&fresh), args)
            .await
            .map_err(CallError::Operation)
    }

    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, CallError<E>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: AuthFailure + Display,
    {
        self.call_with_auth(|authorization, ()| op(authorization), ())
            .await
    }

    /// Returns a token to retry with, refreshing `stale` unless another
    /// caller already did. `None` means the session is gone.
    async fn recover(&self, stale: &str) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;

        match self.session.get() {
            Some(current) if current != stale => {
                tracing::debug!("token already refreshed by a concurrent call");
                return Some(current);
            }
            Some(_) => {}
            None => return None,
        }

        match self.refresher.refresh(stale).await {
            Ok(Some(token)) => match normalize_token(&token) {
                Some(token) => {
                    self.session.refresh_to(token.clone());
                    Some(token)
                }
                None => self.expire("refresh returned an empty token"),
            },
            Ok(None) => self.expire("refresh returned no token"),
            Err(e) => {
                tracing::warn!(error = %redact_secrets(&e.to_string()), "token refresh failed");
                self.expire("token refresh failed")
            }
        }
    }

    fn expire(&self, reason: &str) -> Option<String> {
        tracing::warn!(reason, "session cannot be renewed");
        self.session.expire();
        None
    }
}
