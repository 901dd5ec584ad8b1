use serde_json::{json, Map, Value};
use std::{collections::HashMap, path::Path, time::Duration};
use thiserror::Error;

pub const DEFAULT_SETTINGS_FILE: &str = "portal-client.json";
pub const ENV_CONFIG_PATH: &str = "PORTAL_CONFIG";
pub const ENV_BASE_URL: &str = "PORTAL_BASE_URL";

pub const KEY_BASE_URL: &str = "baseUrl";
pub const KEY_LOGIN_PATH: &str = "loginPath";
pub const KEY_REFRESH_PATH: &str = "refreshPath";
pub const KEY_REQUEST_TIMEOUT_SECONDS: &str = "requestTimeoutSeconds";
pub const KEY_CONNECT_TIMEOUT_SECONDS: &str = "connectTimeoutSeconds";
pub const KEY_REMEMBER_TOKEN: &str = "rememberToken";
pub const KEY_LOG_FILTER: &str = "logFilter";

fn defaults() -> HashMap<String, Value> {
  HashMap::from([
    (KEY_BASE_URL.to_string(), json!("http://localhost:8080")),
    (KEY_LOGIN_PATH.to_string(), json!("/api/auth/login")),
    (KEY_REFRESH_PATH.to_string(), json!("/api/auth/refresh-token")),
    (KEY_REQUEST_TIMEOUT_SECONDS.to_string(), json!(30)),
    (KEY_CONNECT_TIMEOUT_SECONDS.to_string(), json!(10)),
    (KEY_REMEMBER_TOKEN.to_string(), json!(false)),
    (KEY_LOG_FILTER.to_string(), json!("info")),
  ])
}

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("cannot read settings file: {0}")]
  Io(#[from] std::io::Error),
  #[error("invalid settings json: {0}")]
  Json(#[from] serde_json::Error),
  #[error("settings file must contain a json object")]
  NotAnObject,
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
  values: HashMap<String, Value>,
}

impl Default for SettingsStore {
  fn default() -> Self {
    Self { values: defaults() }
  }
}

impl SettingsStore {
  /// Loads `path` over the defaults. A missing file is not an error.
  pub fn load(path: &Path) -> Result<Self, SettingsError> {
    let mut store = Self::default();
    match std::fs::read_to_string(path) {
      Ok(data) => store.merge_json(&data)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        tracing::debug!(path = %path.display(), "settings file not found, using defaults");
      }
      Err(e) => return Err(e.into()),
    }
    store.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(store)
  }

  pub fn merge_json(&mut self, data: &str) -> Result<(), SettingsError> {
    let value: Value = serde_json::from_str(data)?;
    let Value::Object(obj) = value else {
      return Err(SettingsError::NotAnObject);
    };
    self.merge(obj);
    Ok(())
  }

  fn merge(&mut self, obj: Map<String, Value>) {
    for (k, v) in obj {
      if v.is_null() {
        continue;
      }
      self.values.insert(k, v);
    }
  }

  pub(crate) fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(base_url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
      self.set(KEY_BASE_URL, base_url.trim());
    }
  }

  pub fn get_u64(&self, key: &str, fallback: u64) -> u64 {
    self
      .values
      .get(key)
      .and_then(|v| v.as_u64())
      .unwrap_or(fallback)
  }

  pub fn get_bool(&self, key: &str, fallback: bool) -> bool {
    self
      .values
      .get(key)
      .and_then(|v| v.as_bool())
      .unwrap_or(fallback)
  }

  pub fn get_string(&self, key: &str) -> Option<String> {
    let s = self.values.get(key)?.as_str()?.trim();
    if s.is_empty() {
      None
    } else {
      Some(s.to_string())
    }
  }

  pub fn set(&mut self, key: &str, value: impl Into<Value>) {
    self.values.insert(key.to_string(), value.into());
  }

  pub fn base_url(&self) -> String {
    self
      .get_string(KEY_BASE_URL)
      .unwrap_or_else(|| "http://localhost:8080".to_string())
      .trim_end_matches('/')
      .to_string()
  }

  pub fn login_path(&self) -> String {
    self
      .get_string(KEY_LOGIN_PATH)
      .unwrap_or_else(|| "/api/auth/login".to_string())
  }

  pub fn refresh_path(&self) -> String {
    self
      .get_string(KEY_REFRESH_PATH)
      .unwrap_or_else(|| "/api/auth/refresh-token".to_string())
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.get_u64(KEY_REQUEST_TIMEOUT_SECONDS, 30).max(1))
  }

  pub fn connect_timeout(&self) -> Duration {
    Duration::from_secs(self.get_u64(KEY_CONNECT_TIMEOUT_SECONDS, 10).max(1))
  }

  pub fn remember_token(&self) -> bool {
    self.get_bool(KEY_REMEMBER_TOKEN, false)
  }

  pub fn log_filter(&self) -> String {
    self
      .get_string(KEY_LOG_FILTER)
      .unwrap_or_else(|| "info".to_string())
  }
}
