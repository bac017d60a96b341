//! Ranking command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use modelrep_core::RankedView;
use modelrep_engine::ReputationAggregator;
use modelrep_offchain::OffchainStore;
use serde::Serialize;

use crate::commands::{caller, chain_client, print_json, review_store};
use crate::config::Settings;
use crate::output;

/// Arguments for the ranking command.
#[derive(Args)]
pub struct RankingArgs {
    /// Show your own ratings for this address
    #[arg(long)]
    pub address: Option<String>,

    /// Show only the first N models
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutput<'a> {
    network: &'a str,
    #[serde(flatten)]
    view: &'a RankedView,
}

/// Run the ranking command.
pub async fn run(args: RankingArgs, settings: &Settings) -> i32 {
    match execute(args, settings).await {
        Ok(()) => 0,
        Err(e) => {
            output::error(&format!("{:#}", e));
            1
        }
    }
}

async fn execute(args: RankingArgs, settings: &Settings) -> Result<()> {
    let network = settings.network_config()?;
    let chain = chain_client(settings, &network)?;
    let store = review_store(settings)?;
    let caller = caller(args.address.as_deref(), &chain)?;

    if !args.json {
        output::info(&format!("Loading model catalog from {}...", settings.api_url));
    }
    let models = store.list_models().await.context("Failed to load model catalog")?;

    let aggregator = ReputationAggregator::new(chain, settings.aggregator_config());
    let progress = (!args.json).then(|| {
        let mut rx = aggregator.subscribe();
        let total = models.len();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let loaded = rx.borrow_and_update().entries.len();
                if loaded > 0 {
                    output::info(&format!("Read {}/{} models from the ledger", loaded, total));
                }
            }
        })
    });

    let view: Arc<RankedView> = aggregator.load(models, caller).await;
    if let Some(handle) = progress {
        handle.abort();
    }

    let mut shown = (*view).clone();
    if let Some(limit) = args.limit {
        shown.entries.truncate(limit);
    }

    if args.json {
        return print_json(&JsonOutput {
            network: &network.name,
            view: &shown,
        });
    }

    output::header(&format!("Model Ranking ({})", network.name));
    output::ranking_table(&shown.entries);

    match view.total_ratings {
        Some(total) => output::kv("Ratings on ledger", &total.to_string()),
        None => output::warn("Total rating count unavailable"),
    }
    let unreadable = view.entries.iter().filter(|e| e.snapshot.is_none()).count();
    if unreadable > 0 {
        output::warn(&format!("{} model(s) could not be read and are shown as unrated", unreadable));
    }
    if view.entries.iter().any(|e| e.user_rating.is_some()) {
        output::hint("The Yours column shows your current rating.");
    }

    Ok(())
}
