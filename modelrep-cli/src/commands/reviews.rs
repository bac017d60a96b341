//! Reviews command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use modelrep_engine::{ReviewFeed, ReviewStatus};

use crate::commands::{chain_client, find_model, print_json, review_store};
use crate::config::Settings;
use crate::output;

/// Arguments for the reviews command.
#[derive(Args)]
pub struct ReviewsArgs {
    /// Model id from the catalog
    pub model_id: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the reviews command.
pub async fn run(args: ReviewsArgs, settings: &Settings) -> i32 {
    match execute(args, settings).await {
        Ok(()) => 0,
        Err(e) => {
            output::error(&format!("{:#}", e));
            1
        }
    }
}

async fn execute(args: ReviewsArgs, settings: &Settings) -> Result<()> {
    let network = settings.network_config()?;
    let chain = chain_client(settings, &network)?;
    let store = review_store(settings)?;
    let model = find_model(store.as_ref(), args.model_id).await?;

    let feed = ReviewFeed::new(chain, store);
    let loaded = feed.load(&model).await.context("Failed to load reviews")?;

    if args.json {
        return print_json(&loaded);
    }

    output::header(&format!("{} ({})", model.display_name, model.external_id));
    match &loaded.snapshot {
        Some(s) if s.is_rated() => {
            output::kv("Average", &format!("{:.2}", s.average_score));
            output::kv("Ratings", &s.total_ratings.to_string());
        }
        Some(_) => output::kv("Ratings", "none yet"),
        None => output::warn("Ledger reputation unavailable"),
    }

    if loaded.reviews.is_empty() {
        println!();
        output::info("No reviews yet.");
        return Ok(());
    }

    println!();
    for item in &loaded.reviews {
        let review = &item.review;
        let status = match item.status {
            ReviewStatus::Verified => "✓".green(),
            ReviewStatus::Unconfirmed => "?".yellow(),
        };
        let tag = review.tag.map(|t| format!(" [{}]", t)).unwrap_or_default();
        println!(
            "{} {}/5{}  {}  {}",
            status,
            review.score,
            tag.cyan(),
            format!("{:?}", review.reviewer).dimmed(),
            review.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
        );
        if let Some(comment) = &review.comment {
            println!("    {}", comment);
        }
    }

    let unconfirmed = loaded.reviews.len() - loaded.verified().count();
    if unconfirmed > 0 {
        println!();
        output::hint(&format!(
            "{} review(s) marked ? do not match the reviewer's current on-chain rating.",
            unconfirmed
        ));
    }

    Ok(())
}
