use portal_client::settings::{SettingsStore, DEFAULT_SETTINGS_FILE, ENV_CONFIG_PATH};
use portal_client::types::normalize_token;
use portal_client::{logging, Portal};
use reqwest::Method;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;

const ENV_PASSWORD: &str = "PORTAL_PASSWORD";
const ENV_TOKEN: &str = "PORTAL_TOKEN";

const USAGE: &str = "usage: portal-client [--config <path>] <command>

commands:
  login <username>       log in (password read from PORTAL_PASSWORD)
  logout                 forget the current session
  whoami                 show whether a session is active
  get <path>             GET a portal resource
  delete <path>          DELETE a portal resource
  post <path> <json>     POST a json body
  put <path> <json>      PUT a json body";

#[derive(Debug, PartialEq)]
enum Command {
    Login { username: String },
    Logout,
    Whoami,
    Request {
        method: Method,
        path: String,
        body: Option<Value>,
    },
}

#[derive(Debug, PartialEq)]
struct Invocation {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut config_path = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().ok_or("--config needs a path")?;
            config_path = Some(PathBuf::from(path));
        } else {
            rest.push(arg.as_str());
        }
    }

    let command = match rest.as_slice() {
        ["login", username] => Command::Login {
            username: username.to_string(),
        },
        ["logout"] => Command::Logout,
        ["whoami"] => Command::Whoami,
        ["get", path] => Command::Request {
            method: Method::GET,
            path: path.to_string(),
            body: None,
        },
        ["delete", path] => Command::Request {
            method: Method::DELETE,
            path: path.to_string(),
            body: None,
        },
        [verb @ ("post" | "put"), path, body] => {
            let body: Value =
                serde_json::from_str(body).map_err(|e| format!("invalid json body: {e}"))?;
            Command::Request {
                method: if *verb == "post" { Method::POST } else { Method::PUT },
                path: path.to_string(),
                body: Some(body),
            }
        }
        [] => return Err("missing command".to_string()),
        other => return Err(format!("unrecognized command: {}", other.join(" "))),
    };

    Ok(Invocation {
        config_path,
        command,
    })
}

fn token_preview(token: &str) -> String {
    let head: String = token.chars().take(6).collect();
    if head.len() < token.len() {
        format!("{head}...")
    } else {
        head
    }
}

async fn run(invocation: Invocation, settings: SettingsStore) -> Result<(), String> {
    let portal = open_portal(&settings, std::env::var(ENV_TOKEN).ok())?;
    finish(&portal, invocation.command).await
}

/// Builds the portal and loads a session into it. A token handed in through
/// the environment belongs to this run only and never touches the keychain.
fn open_portal(settings: &SettingsStore, env_token: Option<String>) -> Result<Portal, String> {
    let seeded = env_token.filter(|token| normalize_token(token).is_some());
    let portal = match seeded {
        Some(_) => Portal::with_vault(settings, None),
        None => Portal::new(settings),
    }
    .map_err(|e| e.to_string())?;

    match seeded {
        Some(token) => {
            portal.session().set(&token);
            tracing::debug!("session seeded from {ENV_TOKEN}");
        }
        None => {
            if let Err(e) = portal.restore() {
                tracing::warn!(error = %e, "could not restore remembered session");
            }
        }
    }
    Ok(portal)
}

/// Runs `command`, then writes the session state back whatever the outcome.
/// A failed command may still have refreshed or expired the session.
async fn finish(portal: &Portal, command: Command) -> Result<(), String> {
    let result = execute(portal, command).await;
    if let Err(e) = portal.persist_session() {
        tracing::warn!(error = %e, "could not persist session");
    }
    result
}

async fn execute(portal: &Portal, command: Command) -> Result<(), String> {
    match command {
        Command::Login { username } => {
            let password = std::env::var(ENV_PASSWORD)
                .map_err(|_| format!("{ENV_PASSWORD} is not set"))?;
            portal
                .login(&username, &password)
                .await
                .map_err(|e| e.to_string())?;
            if portal.remembers_session() {
                eprintln!("logged in");
            } else {
                eprintln!("logged in; enable rememberToken to keep the session between runs");
            }
        }
        Command::Logout => {
            portal.logout().map_err(|e| e.to_string())?;
            eprintln!("logged out");
        }
        Command::Whoami => {
            if !portal.session().is_authenticated() {
                println!("not authenticated");
            } else if let Some(token) = portal.session().get() {
                println!("authenticated (token {})", token_preview(&token));
            }
        }
        Command::Request { method, path, body } => {
            let value = portal
                .request(method, &path, body)
                .await
                .map_err(|e| e.to_string())?;
            let out = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
            println!("{out}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let config_path = invocation
        .config_path
        .clone()
        .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));

    let settings = match SettingsStore::load(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}: {e}", config_path.display());
            return ExitCode::FAILURE;
        }
    };

    logging::init(&settings.log_filter());
    tracing::debug!(config = %config_path.display(), base_url = %settings.base_url(), "settings loaded");

    match run(invocation, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
