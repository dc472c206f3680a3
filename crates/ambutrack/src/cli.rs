//! Clap derive structures for the `ambutrack` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ambutrack -- live ambulance positions from the command line
#[derive(Debug, Parser)]
#[command(
    name = "ambutrack",
    version,
    about = "Watch live ambulance locations from the command line",
    long_about = "Follows the fleet-tracking channel of an ambulance dispatch service.\n\n\
        Loads the online fleet over REST, then keeps it current from the\n\
        live tracking socket, reconnecting after unexpected drops.",
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
    /// Service profile to use
    #[arg(long, short = 'p', env = "AMBUTRACK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API base URL (overrides profile)
    #[arg(long, env = "AMBUTRACK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Tracking socket URL (derived from the API URL by default)
    #[arg(long, env = "AMBUTRACK_SOCKET_URL", global = true)]
    pub socket_url: Option<String>,

    /// Bearer token (overrides keyring and profile)
    #[arg(long, env = "AMBUTRACK_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "AMBUTRACK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "AMBUTRACK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "AMBUTRACK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one vehicle id per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the online fleet once and print it
    #[command(alias = "ls")]
    Online,

    /// Follow live positions until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Minimum seconds between two renders of the fleet
    #[arg(long, short = 'i', default_value = "2", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Print the first loaded fleet and exit
    #[arg(long)]
    pub once: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive configuration wizard
    Init,

    /// Show the current configuration (tokens masked)
    Show,

    /// Print the config file path
    Path,

    /// Store a bearer token for the active profile
    SetToken {
        /// Token value (prompted for when omitted)
        token: Option<String>,

        /// Save into the config file instead of the system keyring
        #[arg(long)]
        plaintext: bool,
    },

    /// Forget the stored token for the active profile
    ClearToken,

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
