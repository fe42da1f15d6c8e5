//! Clap derive structures for the `poolcop` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// poolcop -- read your PoolCop through the PoolCopilot cloud API
#[derive(Debug, Parser)]
#[command(
    name = "poolcop",
    version,
    about = "Monitor a PoolCop pool controller from the command line",
    long_about = "Reads pool state (temperatures, pH, ORP, pumps, valves, history)\n\
        from the PoolCopilot cloud API and presents it as sensors.\n\n\
        Run `poolcop setup` once to validate an API key and create a profile.",
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
    /// Profile to use
    #[arg(long, short = 'p', env = "POOLCOP_PROFILE", global = true)]
    pub profile: Option<String>,

    /// PoolCopilot API key (overrides profile)
    #[arg(long, env = "POOLCOP_API_KEY", global = true, hide_env = true)]
    pub api_key: Option<String>,

    /// PoolCopilot API root
    #[arg(long, env = "POOLCOP_BASE_URL", global = true, hide = true)]
    pub base_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "POOLCOP_OUTPUT",
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

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "POOLCOP_TIMEOUT", global = true)]
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
    /// Plain text, one value per line (scripting)
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
    /// Validate an API key and save it as a profile
    Setup(SetupArgs),

    /// Show device info and refresh health
    #[command(alias = "st")]
    Status,

    /// List sensor readings
    #[command(alias = "s")]
    Sensors,

    /// List on/off states (pumps, valves, installed modules)
    #[command(alias = "bs")]
    BinarySensors,

    /// Show the device record all entities belong to
    Device,

    /// Read one value by dotted path below the PoolCop root
    Get(GetArgs),

    /// Print the full status document
    Raw,

    /// Poll continuously and print sensor changes until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SETUP / QUERY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SetupArgs {
    /// Profile name to create (defaults to the active profile)
    #[arg(long)]
    pub name: Option<String>,

    /// Store the API key in the config file instead of the system keyring
    #[arg(long)]
    pub plaintext: bool,

    /// Replace an existing profile for the same PoolCop
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Dotted path, e.g. `temperature.water` or `timers.0.start`
    pub path: String,

    /// Top-level key to resolve under
    #[arg(long, default_value = "PoolCop")]
    pub prefix: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Refresh interval in seconds (defaults to the profile's update interval)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Only print binary sensors
    #[arg(long, conflicts_with = "sensors_only")]
    pub binary_only: bool,

    /// Only print sensors
    #[arg(long)]
    pub sensors_only: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// Set a profile value
    Set {
        /// Profile key (title, api_key_env, base_url, timeout, ca_cert)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store an API key in the system keyring
    SetKey {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// Delete a profile and its keyring entry
    Remove {
        /// Profile name
        name: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
