//! Clap derive structures for the `reel` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// reel -- subscribe to and drive a reel realtime server
#[derive(Debug, Parser)]
#[command(
    name = "reel",
    version,
    about = "Watch and send typed realtime messages from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "REEL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// WebSocket server URL (overrides profile)
    #[arg(long, short = 's', env = "REEL_SERVER", global = true)]
    pub server: Option<String>,

    /// Bearer token (overrides profile credentials)
    #[arg(long, env = "REEL_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format [default: from config, else plain]
    #[arg(long, short = 'o', env = "REEL_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per message: status and compact payload
    Plain,
    /// One JSON object per line
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Subscribe to a message type and print what arrives
    Watch(WatchArgs),

    /// Send one request and print the reply
    Send(SendArgs),

    /// Manage the config file and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Message type to subscribe to (e.g. "cinemas")
    pub message_type: String,

    /// Exit after the first message
    #[arg(long)]
    pub once: bool,

    /// Do not resubscribe after the connection is re-established
    #[arg(long)]
    pub no_retry: bool,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Message type to stamp on the request
    pub message_type: String,

    /// Request body as a JSON object (e.g. '{"action":"list"}')
    pub body: String,

    /// Seconds to wait for the reply
    #[arg(long, short = 't', default_value = "10")]
    pub timeout: u64,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the loaded configuration (tokens masked)
    Show,

    /// Write a profile from --server (and --token) to the config file
    Init {
        /// Store the token in the config file instead of the system keyring
        #[arg(long)]
        plaintext_token: bool,

        /// Environment variable to read the token from at runtime
        #[arg(long, conflicts_with = "plaintext_token")]
        token_env: Option<String>,

        /// Replace an existing profile of the same name
        #[arg(long, short = 'f')]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
