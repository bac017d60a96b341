use assert_cmd::Command;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock server standing in for both the review API and the JSON-RPC node.
pub struct TestEnv {
    pub server: MockServer,
    pub home_dir: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
            home_dir: TempDir::new().unwrap(),
        }
    }

    pub fn modelrep(&self) -> Command {
        let mut cmd = Command::cargo_bin("modelrep").unwrap();
        let home = self.home_dir.path();
        cmd.env("HOME", home);
        cmd.env("USERPROFILE", home);
        cmd.env_remove("MODELREP_PRIVATE_KEY");
        cmd.env_remove("MODELREP_CONTRACT");
        cmd.env("MODELREP_API_URL", self.server.uri());
        cmd.env("MODELREP_RPC_URL", self.server.uri());
        cmd.env("RUST_LOG", "off");
        cmd.args(["--network", "local"]);
        cmd
    }

    pub async fn mock_catalog(&self, models: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(models))
            .mount(&self.server)
            .await;
    }

    /// Answer every JSON-RPC call with `result`.
    pub async fn mock_rpc(&self, result: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": result
            })))
            .mount(&self.server)
            .await;
    }
}

/// ABI-encoded `(uint256 averageScore, uint256 totalRatings)`.
pub fn encoded_reputation(raw_average: u64, total: u64) -> String {
    format!("0x{:064x}{:064x}", raw_average, total)
}
