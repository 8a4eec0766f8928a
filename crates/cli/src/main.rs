//! silauto CLI - startup cache population for the SILNLP data directory

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod format;
mod logging;

use commands::{cmd_config_show, cmd_daemon, cmd_diagnose, cmd_health, cmd_list, cmd_resolve};
use logging::{init_cli_logging, init_daemon_logging};
use silauto::config::Config;

#[derive(Parser)]
#[command(name = "silauto")]
#[command(about = "Scripture, draft and project caches for the SILNLP data directory")]
#[command(after_help = "\
QUICK START:
  silauto daemon                      # Populate caches and keep them fresh
  silauto diagnose                    # Time every scanner, find bottlenecks
  silauto health                      # Scan once and show per-domain health
  silauto resolve project ABC         # Compute one item on demand

CONFIGURATION:
  SILAUTO_CONFIG, SILNLP_DATA, SKIP_HEAVY_OPERATIONS_ON_STARTUP,
  MAX_CONCURRENT_FILE_PROCESSING, ENABLE_{SCRIPTURE,TRANSLATION,PROJECT}_CACHE")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

/// Subcommands for `silauto config`
#[derive(Subcommand)]
pub enum ConfigCommand {
  /// Show current effective configuration
  #[command(long_about = "Show the current effective configuration.\n\n\
    Displays which config file is being used and the merged result, including \
    environment overrides, as TOML.")]
  Show,
}

/// Subcommands for `silauto list`
#[derive(Subcommand)]
pub enum ListCommand {
  /// List scriptures, optionally filtered by name
  Scriptures {
    /// Case-insensitive name substring
    #[arg(short, long)]
    query: Option<String>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// List projects, newest first
  Projects {
    #[arg(long, default_value = "0")]
    skip: usize,
    #[arg(short, long, default_value_t = silauto::DEFAULT_PROJECT_LIMIT)]
    limit: usize,
    /// Only projects with this scripture filename (e.g. tpi-ABC)
    #[arg(long)]
    scripture_filename: Option<String>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// List drafts of a project and/or experiment
  Drafts {
    /// Target project id
    #[arg(short, long)]
    project_id: Option<String>,
    /// Experiment name (e.g. Team/exp1)
    #[arg(short, long)]
    experiment: Option<String>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

#[derive(Subcommand)]
enum Commands {
  /// Run the cache daemon until ctrl-c
  Daemon,

  /// Check every domain root and time each scanner on its own
  #[command(after_help = "\
Scanners run one after another (project, translation, scripture) with the \
configured concurrency ceiling. Nothing is cached.")]
  Diagnose {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Run the startup scans once and show per-domain health
  Health {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Compute one item on demand
  Resolve {
    /// Domain: scripture, translation (draft) or project
    domain: String,
    /// Item key (scripture name, draft path or project id)
    key: String,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Scan once and list cached items
  List {
    #[command(subcommand)]
    command: ListCommand,
  },

  /// Manage configuration
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  // An unreadable config still lets logging start; commands report the error
  let log_config = Config::load().map(|c| c.log).unwrap_or_default();

  // Use file logging for daemon, console-only for other commands
  let _guard = match &cli.command {
    Commands::Daemon => init_daemon_logging(&log_config),
    _ => {
      init_cli_logging(&log_config.level);
      None
    }
  };

  match cli.command {
    Commands::Daemon => cmd_daemon().await,
    Commands::Diagnose { json } => cmd_diagnose(json).await,
    Commands::Health { json } => cmd_health(json).await,
    Commands::Resolve { domain, key, json } => cmd_resolve(&domain, &key, json).await,
    Commands::List { command } => cmd_list(command).await,
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(),
    },
  }
}
