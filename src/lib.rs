pub mod caller;
pub mod client;
pub mod logging;
pub mod portal;
pub mod redact;
pub mod settings;
pub mod state;
pub mod types;

pub use caller::{AuthFailure, AuthenticatedCaller, CallError, TokenRefresher};
pub use client::{LoginError, Portal};
pub use portal::{PortalApiClient, PortalError};
pub use settings::SettingsStore;
pub use state::{SecretStore, SessionContext, TokenVault};
