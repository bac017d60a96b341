mod common;

use std::fs;

use assert_cmd::Command;
use common::{encoded_reputation, TestEnv};
use predicates::prelude::*;
use serde_json::json;

#[tokio::test]
async fn test_help_lists_commands() {
    let env = TestEnv::new().await;
    env.modelrep()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ranking"))
        .stdout(predicate::str::contains("rate"))
        .stdout(predicate::str::contains("reviews"));
}

#[tokio::test]
async fn test_network_lists_known_networks() {
    let env = TestEnv::new().await;
    env.modelrep()
        .arg("network")
        .assert()
        .success()
        .stdout(predicate::str::contains("base-sepolia"))
        .stdout(predicate::str::contains("84532"))
        .stdout(predicate::str::contains("Active: local"))
        .stdout(predicate::str::contains("0x5fbdb2315678afecb367f032d93f642f64180aa3"));
}

#[tokio::test]
async fn test_config_file_unknown_network() {
    let env = TestEnv::new().await;
    let config = env.home_dir.path().join("custom.toml");
    fs::write(&config, "network = \"mars\"\n").unwrap();

    Command::cargo_bin("modelrep")
        .unwrap()
        .env("HOME", env.home_dir.path())
        .arg("--config")
        .arg(&config)
        .arg("network")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown network 'mars'"));
}

#[tokio::test]
async fn test_default_config_file_is_read() {
    let env = TestEnv::new().await;
    let dir = env.home_dir.path().join(".modelrep");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), "network = \"sepolia\"\n").unwrap();

    Command::cargo_bin("modelrep")
        .unwrap()
        .env("HOME", env.home_dir.path())
        .arg("network")
        .assert()
        .success()
        .stdout(predicate::str::contains("Active: sepolia"));
}

#[tokio::test]
async fn test_rate_rejects_bad_score() {
    let env = TestEnv::new().await;
    env.modelrep()
        .args(["rate", "1", "6"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid score: 6"));
}

#[tokio::test]
async fn test_rate_rejects_unknown_tag() {
    let env = TestEnv::new().await;
    env.modelrep()
        .args(["rate", "1", "4", "--tag", "sparkly"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown review tag"));
}

#[tokio::test]
async fn test_rate_without_wallet() {
    let env = TestEnv::new().await;
    env.mock_catalog(json!([{"id": 1, "openrouterId": "openai/gpt-4o", "name": "GPT-4o"}]))
        .await;
    env.mock_rpc(json!(encoded_reputation(450, 2))).await;

    env.modelrep()
        .args(["rate", "1", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Connect a wallet"))
        .stdout(predicate::str::contains("MODELREP_PRIVATE_KEY"));
}

#[tokio::test]
async fn test_rate_unknown_model() {
    let env = TestEnv::new().await;
    env.mock_catalog(json!([{"id": 1, "openrouterId": "openai/gpt-4o", "name": "GPT-4o"}]))
        .await;

    env.modelrep()
        .args(["rate", "9", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown model id 9"));
}

#[tokio::test]
async fn test_ranking_json() {
    let env = TestEnv::new().await;
    env.mock_catalog(json!([{"id": 1, "openrouterId": "openai/gpt-4o", "name": "GPT-4o"}]))
        .await;
    env.mock_rpc(json!(encoded_reputation(450, 2))).await;

    let output = env
        .modelrep()
        .args(["ranking", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["network"], "local");
    let entry = &body["entries"][0];
    assert_eq!(entry["model"]["name"], "GPT-4o");
    assert_eq!(entry["snapshot"]["averageScore"], 4.5);
    assert_eq!(entry["snapshot"]["totalRatings"], 2);
    assert_eq!(entry["rank"], 1);
}
