//! Configuration for the reel CLI.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `reel_core::ClientConfig`. The CLI layers its own flag
//! overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use reel_core::ClientConfig;
use reel_core::config::{DEFAULT_INBOUND_CAPACITY, DEFAULT_OUTBOUND_CAPACITY};

/// Keyring service name; entries are keyed `"{profile}/token"`.
const KEYRING_SERVICE: &str = "reel";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{0}' not found")]
    UnknownProfile(String),

    #[error("no token available for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownProfile(name.into()))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Output format: "plain" or "json".
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }
}

fn default_output() -> String {
    "plain".into()
}
fn default_reconnect_initial_ms() -> u64 {
    1_000
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}

/// A named server profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// WebSocket endpoint (e.g., "wss://reel.example.com/ws").
    pub server: String,

    /// Bearer token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    /// Override `defaults.reconnect_initial_ms`.
    pub reconnect_initial_ms: Option<u64>,

    /// Override `defaults.reconnect_max_ms`.
    pub reconnect_max_ms: Option<u64>,

    /// Stop reconnecting after this many failed attempts.
    pub max_retries: Option<u32>,

    pub inbound_capacity: Option<usize>,

    pub outbound_capacity: Option<usize>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "reel", "reel").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("reel");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` layered under `REEL_`-prefixed environment variables.
///
/// A missing file is not an error; defaults apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("REEL_").split("__"));

    let config: Config = figment.extract()?;
    tracing::debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve the bearer token from the credential chain (no CLI flag step).
///
/// `Ok(None)` means the profile is configured without a token. A
/// `token_env` that names an unset variable with nothing to fall back on
/// is an error.
pub fn resolve_token(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<SecretString>, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(Some(SecretString::from(val)));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(Some(SecretString::from(secret)));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(Some(SecretString::from(token.clone())));
    }

    if profile.token_env.is_some() {
        return Err(ConfigError::NoCredentials {
            profile: profile_name.into(),
        });
    }
    Ok(None)
}

/// Save `token` in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))?;
    entry.set_password(token)?;
    Ok(())
}

/// Parse and check a server URL.
pub fn parse_server(server: &str) -> Result<Url, ConfigError> {
    let url: Url = server.parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {server}"),
    })?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "server".into(),
            reason: format!("expected a ws:// or wss:// URL, got '{other}://'"),
        }),
    }
}

fn capacity(field: &str, value: Option<usize>, default: usize) -> Result<usize, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        }),
        Some(n) => Ok(n),
        None => Ok(default),
    }
}

/// Build a `ClientConfig` from a profile: no CLI flag overrides.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let url = parse_server(&profile.server)?;
    let token = resolve_token(profile, profile_name)?;

    let initial = profile
        .reconnect_initial_ms
        .unwrap_or(defaults.reconnect_initial_ms);
    let max = profile.reconnect_max_ms.unwrap_or(defaults.reconnect_max_ms);
    if initial > max {
        return Err(ConfigError::Validation {
            field: "reconnect_initial_ms".into(),
            reason: format!("{initial} exceeds reconnect_max_ms ({max})"),
        });
    }

    let mut config = ClientConfig::new(url);
    config.token = token;
    config.reconnect_initial_delay = Duration::from_millis(initial);
    config.reconnect_max_delay = Duration::from_millis(max);
    config.max_retries = profile.max_retries;
    config.inbound_capacity = capacity(
        "inbound_capacity",
        profile.inbound_capacity,
        DEFAULT_INBOUND_CAPACITY,
    )?;
    config.outbound_capacity = capacity(
        "outbound_capacity",
        profile.outbound_capacity,
        DEFAULT_OUTBOUND_CAPACITY,
    )?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn profile(server: &str) -> Profile {
        Profile {
            server: server.into(),
            ..Profile::default()
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("nope.toml")).unwrap();

        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.output, "plain");
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "prod"

[defaults]
output = "json"

[profiles.prod]
server = "wss://reel.example.com/ws"
max_retries = 5
inbound_capacity = 64
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        let (name, prod) = cfg.profile(None).unwrap();

        assert_eq!(name, "prod");
        assert_eq!(prod.server, "wss://reel.example.com/ws");
        assert_eq!(prod.max_retries, Some(5));
        assert_eq!(cfg.defaults.output, "json");
        assert_eq!(cfg.defaults.reconnect_max_ms, 30_000);
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                token_env: Some("REEL_TEST_TOKEN".into()),
                ..profile("ws://localhost:8080/ws")
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let (_, p) = loaded.profile(Some("default")).unwrap();
        assert_eq!(p.server, "ws://localhost:8080/ws");
        assert_eq!(p.token_env.as_deref(), Some("REEL_TEST_TOKEN"));
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let cfg = Config::default();
        let err = cfg.profile(Some("staging")).unwrap_err();
        assert_eq!(err.to_string(), "profile 'staging' not found");
    }

    #[test]
    fn server_must_be_websocket_url() {
        assert!(parse_server("wss://reel.example.com/ws").is_ok());
        assert!(matches!(
            parse_server("https://reel.example.com"),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            parse_server("not a url"),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn profile_translates_to_client_config() {
        let p = Profile {
            token: Some("s3cret".into()),
            reconnect_initial_ms: Some(250),
            max_retries: Some(3),
            outbound_capacity: Some(16),
            ..profile("ws://localhost:9000/ws")
        };

        let cfg = profile_to_client_config(&p, "reel-config-test", &Defaults::default()).unwrap();

        assert_eq!(cfg.url.as_str(), "ws://localhost:9000/ws");
        assert_eq!(cfg.reconnect_initial_delay, Duration::from_millis(250));
        assert_eq!(cfg.reconnect_max_delay, Duration::from_secs(30));
        assert_eq!(cfg.max_retries, Some(3));
        assert_eq!(cfg.inbound_capacity, DEFAULT_INBOUND_CAPACITY);
        assert_eq!(cfg.outbound_capacity, 16);
        assert!(cfg.token.is_some_and(|t| !t.expose_secret().is_empty()));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let p = Profile {
            inbound_capacity: Some(0),
            ..profile("ws://localhost/ws")
        };
        let err = profile_to_client_config(&p, "reel-config-test", &Defaults::default())
            .unwrap_err();
        assert!(err.to_string().contains("inbound_capacity"));
    }

    #[test]
    fn inverted_backoff_is_rejected() {
        let p = Profile {
            reconnect_initial_ms: Some(60_000),
            ..profile("ws://localhost/ws")
        };
        let err = profile_to_client_config(&p, "reel-config-test", &Defaults::default())
            .unwrap_err();
        assert!(err.to_string().contains("reconnect_max_ms"));
    }

    #[test]
    fn unset_token_env_without_fallback_fails() {
        let p = Profile {
            token_env: Some("REEL_CONFIG_TEST_SURELY_UNSET".into()),
            ..profile("ws://localhost/ws")
        };
        let err = resolve_token(&p, "reel-config-test").unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
    }
}
