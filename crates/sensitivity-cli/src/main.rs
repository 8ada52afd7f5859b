mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, policy::PolicySubcommand};
use sensitivity_core::config::DEFAULT_CONFIG_FILE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sensitivity",
    about = "Apply security classification to collaboration workspaces",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to the YAML configuration
    #[arg(long, global = true, env = "SENSITIVITY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP trigger endpoints
    Serve {
        #[arg(long, default_value = "8080")]
        port: u16,
    },

    /// Run the classification saga once for a request payload
    Apply {
        /// Tier to use when the payload does not name one
        #[arg(long)]
        tier: Option<String>,

        /// Read the payload from a file instead of stdin
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },

    /// Inspect tier policies
    Policy {
        #[command(subcommand)]
        subcommand: PolicySubcommand,
    },

    /// Check the configuration file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Apply { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(&cli.config, port),
        Commands::Apply { tier, file } => {
            cmd::apply::run(&cli.config, tier.as_deref(), file, cli.json)
        }
        Commands::Policy { subcommand } => cmd::policy::run(&cli.config, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
