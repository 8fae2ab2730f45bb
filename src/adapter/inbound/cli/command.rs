//! Command-line interface definitions.
//!
//! `run` drives the engine against the paper broker, optionally from a
//! recorded feed; `check config` validates a configuration file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Default configuration path, relative to the working directory.
pub const DEFAULT_CONFIG: &str = "config.toml";

/// KRX/NXT cross-venue arbitrage engine
#[derive(Parser, Debug)]
#[command(name = "crossarb")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the engine in the foreground
    Run(RunArgs),

    /// Run diagnostic checks
    #[command(subcommand)]
    Check(CheckCommand),
}

/// Subcommands for `crossarb check`.
#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Validate the configuration file syntax and semantics.
    Config(ConfigPathArg),
}

/// Arguments for `crossarb run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// JSON-lines feed of quotes and session signals to replay.
    #[arg(short, long)]
    pub replay: Option<PathBuf>,

    /// Override log level (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty-printed logs.
    #[arg(long)]
    pub json_logs: bool,
}

/// A single configuration path argument.
#[derive(Args, Debug)]
pub struct ConfigPathArg {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults_to_local_config() {
        let cli = Cli::try_parse_from(["crossarb", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG));
        assert!(args.replay.is_none());
        assert!(!args.json_logs);
    }

    #[test]
    fn check_config_takes_path() {
        let cli = Cli::try_parse_from(["crossarb", "check", "config", "-c", "/tmp/x.toml"]).unwrap();
        let Commands::Check(CheckCommand::Config(arg)) = cli.command else {
            panic!("expected check config");
        };
        assert_eq!(arg.config, PathBuf::from("/tmp/x.toml"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
