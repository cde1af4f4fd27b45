use anyhow::{Context, Result};
use log::debug;
use std::time::Duration;

use crate::{client::RunClient, config::ClientConfig};

/// Connection settings gathered from the command line and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base: String,
    pub api_key: String,
    pub account_id: String,
    pub project_id: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl Config {
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(
            self.api_base.trim(),
            self.api_key.trim(),
            self.account_id.trim(),
            self.project_id.trim(),
        )
        .with_user_agent(format!("dbt-runner/{}", env!("DBT_RUNNER_VERSION")));

        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }

    pub fn build_client(&self) -> Result<RunClient> {
        let config = self.client_config();
        debug!("Client configuration: {:?}", config);
        RunClient::new(config).context("Failed to configure the run client")
    }
}
