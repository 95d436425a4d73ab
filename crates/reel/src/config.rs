//! Flag-aware connection resolution on top of `reel-config`.
//!
//! Precedence: CLI flag (or its env var) > profile > defaults.

use secrecy::SecretString;

use reel_config::{Config, ConfigError};
use reel_core::ClientConfig;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

/// Profile name in effect: `--profile`, then `default_profile`, then "default".
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    global
        .output
        .unwrap_or_else(|| output::format_from_config(&cfg.defaults.output))
}

/// Build a `ClientConfig` from the config file, profile, and CLI overrides.
pub fn resolve_client_config(global: &GlobalOpts, cfg: &Config) -> Result<ClientConfig, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let mut client = match cfg.profile(Some(&profile_name)) {
        Ok((name, profile)) => {
            let mut client = reel_config::profile_to_client_config(profile, name, &cfg.defaults)?;
            if let Some(ref server) = global.server {
                client.url = reel_config::parse_server(server)?;
            }
            client
        }
        // An explicitly requested profile must exist.
        Err(ConfigError::UnknownProfile(name)) if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        // No profile: build from flags / env vars alone.
        Err(_) => {
            let server = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
                path: reel_config::config_path().display().to_string(),
            })?;
            ClientConfig::new(reel_config::parse_server(server)?)
        }
    };

    if let Some(ref token) = global.token {
        client.token = Some(SecretString::from(token.clone()));
    }

    tracing::debug!(profile = %profile_name, url = %client.url, "resolved connection");
    Ok(client)
}
