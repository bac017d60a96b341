//! Terminal output formatting.

use colored::Colorize;
use modelrep_core::{ModelWithReputation, SubmissionStep};

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg.red());
}

/// Print an info message.
pub fn info(msg: &str) {
    println!("{} {}", "→".cyan(), msg);
}

/// Print a warning message.
pub fn warn(msg: &str) {
    println!("{} {}", "!".yellow().bold(), msg.yellow());
}

/// Print a header.
pub fn header(msg: &str) {
    println!("\n{}", msg.white().bold());
    println!("{}", "─".repeat(msg.chars().count()).dimmed());
}

/// Print a key-value pair.
pub fn kv(key: &str, value: &str) {
    println!("  {} {}", format!("{}:", key).dimmed(), value);
}

/// Print a helpful hint.
pub fn hint(msg: &str) {
    println!("{} {}", "💡".dimmed(), msg.dimmed());
}

/// Print a submission step as it happens.
pub fn step(step: SubmissionStep) {
    let label = match step {
        SubmissionStep::Idle => return,
        SubmissionStep::SwitchingNetwork => "Checking wallet network...",
        SubmissionStep::Signing => "Signing and broadcasting rating...",
        SubmissionStep::Confirming => "Waiting for ledger confirmation...",
        SubmissionStep::SavingOffchain => "Saving review...",
        SubmissionStep::Success | SubmissionStep::Error => return,
    };
    info(label);
}

/// Average as shown to users: two decimals, or a dash when unrated.
pub fn average(entry: &ModelWithReputation) -> String {
    if entry.is_rated() {
        format!("{:.2}", entry.average_score())
    } else {
        "-".to_string()
    }
}

/// Print the ranking table.
pub fn ranking_table<'a>(entries: impl IntoIterator<Item = &'a ModelWithReputation>) {
    println!();
    println!(
        "{:<5} {:<32} {:>7} {:>8} {:>6}",
        "#".bold(),
        "Model".bold(),
        "Avg".bold(),
        "Ratings".bold(),
        "Yours".bold()
    );
    println!("{}", "─".repeat(62).dimmed());

    for entry in entries {
        let rank = entry.rank.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string());
        let yours = match entry.user_rating {
            Some(r) if r.optimistic => format!("{}*", r.score),
            Some(r) => r.score.to_string(),
            None => String::new(),
        };
        let name = if entry.is_rated() {
            entry.model.display_name.green()
        } else {
            entry.model.display_name.dimmed()
        };
        println!(
            "{:<5} {:<32} {:>7} {:>8} {:>6}",
            rank,
            name,
            average(entry),
            entry.total_ratings(),
            yours
        );
    }
    println!();
}
