//! modelrep CLI
//!
//! Rate AI models on-chain, browse the ledger ranking and read reviews.

mod commands;
mod config;
mod output;

#[cfg(feature = "api")]
mod api;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "modelrep")]
#[command(version)]
#[command(about = "modelrep - on-chain AI model ratings with off-chain reviews", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.modelrep/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Network to use (overrides the config file)
    #[arg(long, global = true)]
    network: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show models ranked by ledger reputation
    Ranking(commands::ranking::RankingArgs),

    /// Rate a model (1-5) with an optional comment and tag
    Rate(commands::rate::RateArgs),

    /// Show a model's reputation and recent reviews
    Reviews(commands::reviews::ReviewsArgs),

    /// List known networks and the active one
    Network,

    /// Run a local review API for development
    #[cfg(feature = "api")]
    Serve(api::ServeArgs),
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            output::error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };
    if let Some(network) = cli.network {
        settings.network = network;
    }

    let exit_code = match cli.command {
        Commands::Ranking(args) => commands::ranking::run(args, &settings).await,
        Commands::Rate(args) => commands::rate::run(args, &settings).await,
        Commands::Reviews(args) => commands::reviews::run(args, &settings).await,
        Commands::Network => commands::network::run(&settings),
        #[cfg(feature = "api")]
        Commands::Serve(args) => api::run(args).await,
    };

    std::process::exit(exit_code);
}
