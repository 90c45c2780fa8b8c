//! Command-line interface.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "grok-bridge",
    version,
    about = "OpenAI-compatible gateway in front of the Grok chat API"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the gateway (default when no subcommand is given)
    Run(RunArgs),
    /// Load and validate a config file, then print a summary
    CheckConfig(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to config file
    #[arg(short, long, default_value = "config.yaml", env = "GROK_BRIDGE_CONFIG")]
    pub config: String,

    /// Listen host
    #[arg(long, env = "GROK_BRIDGE_HOST")]
    pub host: Option<String>,

    /// Listen port
    #[arg(long, env = "GROK_BRIDGE_PORT")]
    pub port: Option<u16>,

    /// Log level
    #[arg(long, default_value = "info", env = "GROK_BRIDGE_LOG_LEVEL")]
    pub log_level: String,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            config: "config.yaml".to_string(),
            host: None,
            port: None,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Path to config file
    #[arg(short, long, default_value = "config.yaml", env = "GROK_BRIDGE_CONFIG")]
    pub config: String,
}
