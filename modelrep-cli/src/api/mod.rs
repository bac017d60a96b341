//! Local development server for the review API.

mod offchain;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use modelrep_core::Model;
use modelrep_offchain::MemoryOffchainStore;
use tokio::net::TcpListener;
use tracing::info;

use crate::output;

use offchain::router;

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Model catalog as a JSON array of {id, openrouterId, name, iconUrl?}
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs) -> i32 {
    match serve(args).await {
        Ok(()) => 0,
        Err(e) => {
            output::error(&format!("{:#}", e));
            1
        }
    }
}

fn default_catalog() -> Vec<Model> {
    vec![
        Model::new(1, "openai/gpt-4o", "GPT-4o"),
        Model::new(2, "anthropic/claude-3.5-sonnet", "Claude 3.5 Sonnet"),
        Model::new(3, "google/gemini-pro-1.5", "Gemini Pro 1.5"),
        Model::new(4, "meta-llama/llama-3.1-70b-instruct", "Llama 3.1 70B Instruct"),
        Model::new(5, "mistralai/mixtral-8x7b-instruct", "Mixtral 8x7B Instruct"),
    ]
}

fn load_catalog(path: Option<&PathBuf>) -> Result<Vec<Model>> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read catalog {}", path.display()))?;
            serde_json::from_str(&content).with_context(|| format!("Invalid catalog {}", path.display()))
        }
        None => Ok(default_catalog()),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let models = load_catalog(args.catalog.as_ref())?;
    let count = models.len();
    let store = Arc::new(MemoryOffchainStore::with_models(models));

    let addr = format!("127.0.0.1:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    output::success(&format!("Review API listening on http://{}", addr));
    output::kv("Models", &count.to_string());
    output::hint("Reviews are kept in memory and lost on exit.");
    info!(%addr, models = count, "review API started");

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;
    Ok(())
}
