mod session;
mod token_vault;

pub use session::SessionContext;
pub use token_vault::{
    apply_session_event, spawn_vault_sync, SecretStore, TokenVault, VaultError,
    KEYRING_USER_SESSION_TOKEN,
};

#[cfg(test)]
pub(crate) use token_vault::memory::MemoryStore;
