//! Request body for triggering a job run.

use serde::Serialize;

use crate::error::{Result, RunError};

/// Cause recorded on runs triggered without an explicit one.
pub const DEFAULT_CAUSE: &str = "Triggered via API";

const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Options for a job run. Only fields that were set end up in the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriggerRun {
    pub cause: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_override: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps_override: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_pull_request_id: Option<u64>,
}

impl TriggerRun {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            ..Default::default()
        }
    }

    pub fn git_branch(mut self, branch: impl Into<String>) -> Self {
        self.git_branch = Some(branch.into());
        self
    }

    pub fn git_sha(mut self, sha: impl Into<String>) -> Self {
        self.git_sha = Some(sha.into());
        self
    }

    pub fn schema_override(mut self, schema: impl Into<String>) -> Self {
        self.schema_override = Some(schema.into());
        self
    }

    pub fn steps_override<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps_override = Some(steps.into_iter().map(Into::into).collect());
        self
    }

    pub fn pull_request_id(mut self, id: u64) -> Self {
        self.azure_pull_request_id = Some(id);
        self
    }

    /// Validates the options and returns the normalized request.
    ///
    /// Empty strings and empty step lists count as not supplied. The branch
    /// loses a leading `refs/heads/` and the schema gets `_` in place of `-`.
    pub fn normalize(self) -> Result<Self> {
        let git_branch = non_empty(self.git_branch);
        let git_sha = non_empty(self.git_sha);

        if git_branch.is_some() && git_sha.is_some() {
            return Err(RunError::InvalidArgument(
                "Either git_branch or git_sha can be provided, not both".to_string(),
            ));
        }

        let git_branch = git_branch.map(|branch| {
            branch
                .strip_prefix(BRANCH_REF_PREFIX)
                .map(str::to_string)
                .unwrap_or(branch)
        });
        let schema_override = non_empty(self.schema_override).map(|s| s.replace('-', "_"));
        let steps_override = self.steps_override.filter(|steps| !steps.is_empty());

        Ok(Self {
            cause: self.cause,
            git_branch,
            git_sha,
            schema_override,
            steps_override,
            azure_pull_request_id: self.azure_pull_request_id,
        })
    }

    /// Normalizes the options and serializes them into the JSON request body.
    pub fn to_body(&self) -> Result<serde_json::Value> {
        let normalized = self.clone().normalize()?;
        serde_json::to_value(&normalized)
            .map_err(|e| RunError::InvalidArgument(format!("Failed to encode request: {}", e)))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
