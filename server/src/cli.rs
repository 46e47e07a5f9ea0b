use clap::Parser;
use std::path::PathBuf;

/// Command line for the game server.
#[derive(Parser, Debug, Clone)]
#[command(name = "bigtwo-server", version, about = "Four-seat Big Two game server")]
pub struct ServerCli {
    /// Path to config file
    #[arg(long, default_value = "bigtwo-server.toml")]
    pub config: PathBuf,

    /// Port to listen on (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Verbose logging
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Persist CLI overrides back to the config file
    #[arg(long, default_value_t = false)]
    pub persist: bool,
}
