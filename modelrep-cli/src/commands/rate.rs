//! Rate command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use modelrep_chain::ChainClient;
use modelrep_core::{
    ModelWithReputation, RatingRequest, ReviewTag, SubmissionErrorKind, SubmissionState, SubmissionStep,
};
use modelrep_engine::{ReputationAggregator, SubmissionOrchestrator};
use serde::Serialize;

use crate::commands::{chain_client, find_model, print_json, review_store};
use crate::config::{Settings, ENV_PRIVATE_KEY};
use crate::output;

/// Arguments for the rate command.
#[derive(Args)]
pub struct RateArgs {
    /// Model id from the catalog
    pub model_id: u64,

    /// Score from 1 to 5
    pub score: u8,

    /// Optional comment (up to 500 characters)
    #[arg(short, long)]
    pub comment: Option<String>,

    /// Optional tag (accurate, fast, creative, helpful, reliable, concise, coding, reasoning)
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutput<'a> {
    success: bool,
    #[serde(flatten)]
    state: &'a SubmissionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    reputation: Option<&'a ModelWithReputation>,
}

/// Run the rate command.
pub async fn run(args: RateArgs, settings: &Settings) -> i32 {
    match execute(args, settings).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            output::error(&format!("{:#}", e));
            1
        }
    }
}

fn parse_request(args: &RateArgs) -> Result<RatingRequest> {
    let tag = args
        .tag
        .as_deref()
        .map(str::parse::<ReviewTag>)
        .transpose()?;
    Ok(RatingRequest::new(args.model_id, args.score, args.comment.clone(), tag)?)
}

/// Returns whether the rating reached the ledger.
async fn execute(args: RateArgs, settings: &Settings) -> Result<bool> {
    // reject bad input before touching the network
    let request = parse_request(&args)?;

    let network = settings.network_config()?;
    let chain = chain_client(settings, &network)?;
    let store = review_store(settings)?;
    let model = find_model(store.as_ref(), request.model_id).await?;

    let aggregator = Arc::new(ReputationAggregator::new(chain.clone(), settings.aggregator_config()));
    aggregator.load(vec![model.clone()], chain.account()).await;

    let orchestrator = SubmissionOrchestrator::new(
        chain,
        store,
        aggregator.clone(),
        settings.orchestrator_config(&network),
    );

    let progress = (!args.json).then(|| {
        output::info(&format!("Rating {} with {}/5 on {}", model.display_name, request.score, network.name));
        let mut rx = orchestrator.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let step = rx.borrow_and_update().step;
                output::step(step);
            }
        })
    });

    let mut state = orchestrator.submit(request).await.context("Rating submission failed")?;
    if state.warning.is_some() {
        // one more try; the rating itself is already on the ledger
        state = orchestrator.retry_review().await.context("Review retry failed")?;
    }
    let success = state.step == SubmissionStep::Success;
    if success {
        orchestrator.wait_for_refresh().await;
    }
    if let Some(handle) = progress {
        handle.abort();
    }

    let view = aggregator.view();
    let reputation = view.get(model.id).filter(|_| success);

    if args.json {
        print_json(&JsonOutput {
            success,
            state: &state,
            reputation,
        })?;
        return Ok(success);
    }

    report(&state, reputation);
    Ok(success)
}

fn report(state: &SubmissionState, reputation: Option<&ModelWithReputation>) {
    println!();
    if let Some(error) = &state.error {
        output::error(&error.message);
        output::kv("Reason", error.kind.as_str());
        if let Some(tx) = state.tx_hash {
            output::kv("Transaction", &format!("{:?}", tx));
            output::hint("Check the transaction in a block explorer before rating again.");
        } else if error.kind == SubmissionErrorKind::WalletNotConnected {
            output::hint(&format!("Set {} to sign ratings.", ENV_PRIVATE_KEY));
        }
        return;
    }

    output::success("Rating confirmed on the ledger");
    if let Some(tx) = state.tx_hash {
        output::kv("Transaction", &format!("{:?}", tx));
    }
    if let Some(warning) = &state.warning {
        output::warn(&format!("Rating saved on-chain, but the review was not stored: {}", warning.message));
    }
    if let Some(entry) = reputation {
        output::kv("Average", &output::average(entry));
        output::kv("Ratings", &entry.total_ratings().to_string());
    }
    println!();
}
