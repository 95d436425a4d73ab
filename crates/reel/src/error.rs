//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use reel_config::ConfigError;
use reel_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(reel::connection_failed),
        help(
            "Check that the server is running and accessible.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Connection error: {reason}")]
    #[diagnostic(
        code(reel::connection_lost),
        help("The connection to the server failed or was closed. Retry the command.")
    )]
    ConnectionLost { reason: String },

    #[error("Send queue full ({capacity} pending messages)")]
    #[diagnostic(
        code(reel::backpressure),
        help("The server is not draining requests; raise outbound_capacity or retry later.")
    )]
    Backpressure { capacity: usize },

    #[error("No reply within {seconds}s")]
    #[diagnostic(
        code(reel::timeout),
        help("Increase the wait with --timeout or check that the server handles this type.")
    )]
    Timeout { seconds: u64 },

    #[error("Server rejected the request: {message}")]
    #[diagnostic(code(reel::rejected))]
    Rejected { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(reel::auth_failed),
        help(
            "The server rejected the token for profile '{profile}'.\n\
             Pass --token or set REEL_TOKEN, or store one with: reel config init --force"
        )
    )]
    AuthFailed { profile: String },

    #[error("No token available for profile '{profile}'")]
    #[diagnostic(
        code(reel::no_credentials),
        help("The profile names a token_env that is unset. Export it or pass --token.")
    )]
    NoCredentials { profile: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(reel::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(reel::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: reel --profile {name} --server <url> config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Profile '{name}' already exists")]
    #[diagnostic(code(reel::profile_exists), help("Use --force to replace it."))]
    ProfileExists { name: String },

    #[error("No server configured")]
    #[diagnostic(
        code(reel::no_config),
        help(
            "Pass --server <url>, or create a profile with: reel --server <url> config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(reel::config))]
    Config(Box<ConfigError>),

    #[error("Keyring access failed: {reason}")]
    #[diagnostic(code(reel::keyring), help("Use --plaintext-token or --token-env instead."))]
    Keyring { reason: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(reel::json), help("The request body must be a JSON object."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. }
            | Self::ConnectionLost { .. }
            | Self::Backpressure { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } | Self::Keyring { .. } => {
                exit_code::AUTH
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileExists { .. } | Self::Json(_) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionLost { reason },

            CoreError::AuthenticationFailed { message: _ } => CliError::AuthFailed {
                profile: "current".into(),
            },

            CoreError::Disconnected => CliError::ConnectionLost {
                reason: "the connection was closed".into(),
            },

            CoreError::Backpressure { capacity } => CliError::Backpressure { capacity },

            CoreError::Serialization { message } => CliError::Validation {
                field: "body".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "server".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Keyring(e) => CliError::Keyring {
                reason: e.to_string(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let timeout = CliError::Timeout { seconds: 1 };
        let auth = CliError::from(CoreError::AuthenticationFailed {
            message: "401".into(),
        });
        let usage = CliError::from(ConfigError::Validation {
            field: "server".into(),
            reason: "bad".into(),
        });

        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);
        assert_eq!(auth.exit_code(), exit_code::AUTH);
        assert_eq!(usage.exit_code(), exit_code::USAGE);
        assert_eq!(
            CliError::from(CoreError::Disconnected).exit_code(),
            exit_code::CONNECTION
        );
    }

    #[test]
    fn core_connection_error_renders_without_url() {
        let err = CliError::from(CoreError::ConnectionFailed {
            reason: "refused".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
        assert_eq!(err.to_string(), "Connection error: refused");
    }
}
