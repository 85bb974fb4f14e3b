use mockito::Server;
use pkgresearch::config::Endpoints;
use pkgresearch::ResearchConfig;

pub mod test_helpers {
    use super::*;

    pub async fn setup_test_server() -> mockito::ServerGuard {
        Server::new_async().await
    }

    /// Every endpoint on the mock server, no retries and local tools that never resolve
    pub fn create_test_config(server_url: &str) -> ResearchConfig {
        let mut config = ResearchConfig::default();
        config.endpoints = Endpoints::all_at(server_url);
        config.http_retries = 0;
        config.retry_delay_ms = 1;
        config.github_token = None;
        config.tools.npm = "pkgresearch-test-missing-npm".into();
        config.tools.pip = "pkgresearch-test-missing-pip".into();
        config.tools.gem = "pkgresearch-test-missing-gem".into();
        config
    }

    pub fn left_pad_packument() -> String {
        serde_json::json!({
            "name": "left-pad",
            "description": "String left pad",
            "dist-tags": { "latest": "1.3.0" },
            "versions": {
                "1.3.0": {
                    "name": "left-pad",
                    "version": "1.3.0",
                    "license": "WTFPL",
                    "repository": { "type": "git", "url": "git+https://github.com/stevemao/left-pad.git" }
                }
            },
            "readme": "# left-pad\n\n```js\nconst leftPad = require('left-pad')\nleftPad('foo', 5)\n```\n\nMore text.\n\n```js\nleftPad('foobar', 6)\n```\n"
        })
        .to_string()
    }

    pub fn setup_test_logger() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("pkgresearch=debug")
            .with_test_writer()
            .try_init();
    }
}
