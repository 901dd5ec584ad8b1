use super::SessionContext;
use crate::types::{normalize_token, SessionEventKind};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

const KEYRING_SERVICE: &str = "com.payportal.client";
pub const KEYRING_USER_SESSION_TOKEN: &str = "session_token";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("OS keychain/secret service is unavailable")]
    Unavailable,
    #[error("keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Somewhere a session token can outlive the process.
pub trait SecretStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, VaultError>;
    fn remember(&self, token: &str) -> Result<(), VaultError>;
    fn forget(&self) -> Result<(), VaultError>;
}

/// Persists the session token in the OS keychain.
#[derive(Clone)]
pub struct TokenVault {
    user: &'static str,
}

impl Default for TokenVault {
    fn default() -> Self {
        Self::new(KEYRING_USER_SESSION_TOKEN)
    }
}

impl TokenVault {
    pub fn new(user: &'static str) -> Self {
        Self { user }
    }

    fn entry(&self) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(KEYRING_SERVICE, self.user)
    }

    pub fn is_available(&self) -> bool {
        let Ok(entry) = self.entry() else {
            return false;
        };

        match entry.get_password() {
            Ok(_) => true,
            Err(keyring::Error::NoEntry) => true,
            Err(keyring::Error::BadEncoding(_)) => true,
            Err(keyring::Error::Ambiguous(_)) => true,
            Err(keyring::Error::NoStorageAccess(_)) => false,
            Err(keyring::Error::PlatformFailure(_)) => false,
            Err(_) => false,
        }
    }
}

impl SecretStore for TokenVault {
    fn load(&self) -> Result<Option<String>, VaultError> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(pwd) => Ok(normalize_token(&pwd)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(keyring::Error::NoStorageAccess(_)) | Err(keyring::Error::PlatformFailure(_)) => {
                Err(VaultError::Unavailable)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn remember(&self, token: &str) -> Result<(), VaultError> {
        self.entry()?.set_password(token)?;
        Ok(())
    }

    fn forget(&self) -> Result<(), VaultError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Mirrors one session transition into `store`.
///
/// Logins are persisted by whoever performed them, so `LoggedIn` is left
/// alone here; a session seeded from elsewhere must not overwrite the stored one.
pub fn apply_session_event(
    store: &dyn SecretStore,
    session: &SessionContext,
    kind: SessionEventKind,
) -> Result<(), VaultError> {
    match kind {
        SessionEventKind::LoggedIn => Ok(()),
        SessionEventKind::Refreshed => match session.get() {
            Some(token) => store.remember(&token),
            None => Ok(()),
        },
        SessionEventKind::LoggedOut | SessionEventKind::Expired => store.forget(),
    }
}

/// Keeps `store` in step with `session`. The task runs until the returned
/// handle is aborted.
pub fn spawn_vault_sync(store: Arc<dyn SecretStore>, session: SessionContext) -> JoinHandle<()> {
    let mut rx = session.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "token vault lagged behind session events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if let Err(e) = apply_session_event(store.as_ref(), &session, event.kind) {
                tracing::warn!(error = %e, kind = ?event.kind, "failed to sync session token to keychain");
            }
        }
    })
}
