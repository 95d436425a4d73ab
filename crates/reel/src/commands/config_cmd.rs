//! Config subcommand handlers.

use reel_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const MASK: &str = "********";

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&reel_config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = masked(reel_config::load_config_or_default());
            let rendered = match config::output_format(global, &cfg) {
                OutputFormat::Json => serde_json::to_string_pretty(&cfg)?,
                OutputFormat::Plain => toml::to_string_pretty(&cfg).map_err(|e| {
                    CliError::Validation {
                        field: "config".into(),
                        reason: format!("failed to render config: {e}"),
                    }
                })?,
            };
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            plaintext_token,
            token_env,
            force,
        } => {
            let server = global.server.as_deref().ok_or_else(|| CliError::Validation {
                field: "server".into(),
                reason: "config init needs --server <url>".into(),
            })?;
            reel_config::parse_server(server)?;

            let mut cfg = reel_config::load_config_or_default();
            let name = global.profile.clone().unwrap_or_else(|| "default".into());
            if cfg.profiles.contains_key(&name) && !force {
                return Err(CliError::ProfileExists { name });
            }

            let mut profile = Profile {
                server: server.into(),
                token_env,
                ..Profile::default()
            };
            if let Some(ref token) = global.token {
                if plaintext_token {
                    profile.token = Some(token.clone());
                } else {
                    reel_config::store_token(&name, token)?;
                    if !global.quiet {
                        eprintln!("Token stored in system keyring");
                    }
                }
            }

            if cfg.profiles.is_empty() {
                cfg.default_profile = Some(name.clone());
            }
            cfg.profiles.insert(name.clone(), profile);
            let path = reel_config::save_config(&cfg)?;

            tracing::info!(profile = %name, path = %path.display(), "profile written");
            if !global.quiet {
                eprintln!("Profile '{name}' written to {}", path.display());
            }
            Ok(())
        }
    }
}

fn masked(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
    }
    cfg
}
