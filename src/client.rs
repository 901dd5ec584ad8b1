use crate::caller::{AuthenticatedCaller, CallError};
use crate::portal::{PortalApiClient, PortalError};
use crate::settings::SettingsStore;
use crate::state::{spawn_vault_sync, SecretStore, SessionContext, TokenVault, VaultError};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error("portal returned an unusable token")]
    InvalidToken,
}

/// Everything a portal session needs, wired together.
pub struct Portal {
    api: Arc<PortalApiClient>,
    caller: AuthenticatedCaller<PortalApiClient>,
    vault: Option<Arc<dyn SecretStore>>,
    vault_sync: Option<JoinHandle<()>>,
}

impl Portal {
    /// Builds a portal client. With `rememberToken` on, the OS keychain backs
    /// the session when it is reachable.
    pub fn new(settings: &SettingsStore) -> Result<Self, PortalError> {
        let vault = settings
            .remember_token()
            .then(TokenVault::default)
            .filter(|vault| {
                let available = vault.is_available();
                if !available {
                    tracing::warn!(
                        "rememberToken is on but the OS keychain is unavailable; \
                         session will not be kept"
                    );
                }
                available
            })
            .map(|vault| Arc::new(vault) as Arc<dyn SecretStore>);
        Self::with_vault(settings, vault)
    }

    pub fn with_vault(
        settings: &SettingsStore,
        vault: Option<Arc<dyn SecretStore>>,
    ) -> Result<Self, PortalError> {
        let api = Arc::new(PortalApiClient::new(settings)?);
        let caller = AuthenticatedCaller::new(SessionContext::new(), api.clone());
        Ok(Self {
            api,
            caller,
            vault,
            vault_sync: None,
        })
    }

    pub fn session(&self) -> &SessionContext {
        self.caller.session()
    }

    pub fn remembers_session(&self) -> bool {
        self.vault.is_some()
    }

    /// Mirrors refreshes and expiries into the vault from a background task.
    /// For long-lived processes; must be called inside a Tokio runtime.
    pub fn mirror_session(&mut self) {
        if self.vault_sync.is_some() {
            return;
        }
        if let Some(vault) = &self.vault {
            self.vault_sync = Some(spawn_vault_sync(vault.clone(), self.session().clone()));
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), LoginError> {
        let token = self.api.login(username, password).await?;
        if !self.session().set(&token) {
            return Err(LoginError::InvalidToken);
        }
        tracing::info!(username, base_url = self.api.base_url(), "logged in");
        if let Some(vault) = &self.vault {
            if let Err(e) = vault.remember(&token) {
                tracing::warn!(error = %e, "could not remember session token");
            }
        }
        Ok(())
    }

    /// Loads a remembered token into the session. Returns whether one was found.
    pub fn restore(&self) -> Result<bool, VaultError> {
        let Some(vault) = &self.vault else {
            return Ok(false);
        };
        match vault.load()? {
            Some(token) => Ok(self.session().set(&token)),
            None => Ok(false),
        }
    }

    /// Writes the current session state to the vault, if remembering.
    pub fn persist_session(&self) -> Result<(), VaultError> {
        let Some(vault) = &self.vault else {
            return Ok(());
        };
        match self.session().get() {
            Some(token) => vault.remember(&token),
            None => vault.forget(),
        }
    }

    pub fn logout(&self) -> Result<(), VaultError> {
        self.session().clear();
        if let Some(vault) = &self.vault {
            vault.forget()?;
        }
        Ok(())
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, CallError<PortalError>> {
        let api = self.api.clone();
        self.caller
            .call_with_auth(
                move |authorization, (method, body): (Method, Option<Value>)| {
                    let api = api.clone();
                    let path = path.to_string();
                    async move {
                        api.request_json(method, &path, &authorization, body.as_ref())
                            .await
                    }
                },
                (method, body),
            )
            .await
    }

    pub async fn get(&self, path: &str) -> Result<Value, CallError<PortalError>> {
        self.request(Method::GET, path, None).await
    }
}

impl Drop for Portal {
    fn drop(&mut self) {
        if let Some(handle) = self.vault_sync.take() {
            handle.abort();
        }
    }
}
