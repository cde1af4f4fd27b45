//! Client configuration: endpoint, credentials and account scope.

use std::fmt;
use std::time::Duration;

use crate::error::{Result, RunError};

/// Default public API endpoint.
pub const DEFAULT_API_BASE: &str = "https://cloud.getdbt.com";

const DEFAULT_USER_AGENT: &str = "dbt-runner";

/// Immutable settings for a [`crate::RunClient`].
#[derive(Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub api_key: String,
    pub account_id: String,
    pub project_id: String,
    /// Per-request timeout; `None` leaves reqwest's default (no timeout).
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        account_id: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            account_id: account_id.into(),
            project_id: project_id.into(),
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Checks that every required field is present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("api_base", &self.api_base),
            ("api_key", &self.api_key),
            ("account_id", &self.account_id),
            ("project_id", &self.project_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(RunError::Configuration(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }

    /// `{api_base}/api/v2/accounts/{account_id}`
    pub fn accounts_url(&self) -> String {
        format!("{}/api/v2/accounts/{}", self.api_base, self.account_id)
    }

    /// Browser link for a run, suitable for error messages and logs.
    pub fn status_link(&self, run_id: u64) -> String {
        format!(
            "{}/deploy/{}/projects/{}/runs/{}/",
            self.api_base, self.account_id, self.project_id, run_id
        )
    }

    /// The API key with everything but a short prefix and suffix masked.
    pub fn redacted_key(&self) -> String {
        redact(&self.api_key)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.redacted_key())
            .field("account_id", &self.account_id)
            .field("project_id", &self.project_id)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "*********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
