//! Network command implementation.

use colored::Colorize;
use modelrep_chain::NETWORKS;

use crate::config::Settings;
use crate::output;

/// Run the network command.
pub fn run(settings: &Settings) -> i32 {
    output::header("Known Networks");

    println!();
    println!(
        "{:<3}{:<14} {:<10} {}",
        "",
        "Name".bold(),
        "Chain ID".bold(),
        "Description".bold()
    );
    println!("{}", "─".repeat(60).dimmed());

    for network in NETWORKS {
        let active = network.name.eq_ignore_ascii_case(&settings.network);
        println!(
            "{:<3}{:<14} {:<10} {}",
            if active { "*" } else { "" },
            network.name.green(),
            network.chain_id,
            network.description.dimmed()
        );
    }

    let config = match settings.network_config() {
        Ok(c) => c,
        Err(e) => {
            output::error(&format!("{:#}", e));
            return 1;
        }
    };

    output::header(&format!("Active: {}", config.name));
    output::kv("Chain ID", &config.chain_id.to_string());
    output::kv("RPC", &config.rpc_url);
    match config.contract_address {
        Some(address) => output::kv("Contract", &format!("{:?}", address)),
        None => output::kv("Contract", "not configured"),
    }
    output::kv("Review API", &settings.api_url);
    output::kv(
        "Signer",
        if settings.private_key.is_some() { "configured" } else { "none" },
    );

    println!();
    output::hint("Use --network <NAME> or set `network` in ~/.modelrep/config.toml.");

    0
}
