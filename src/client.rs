//! Run API client: trigger, inspect, cancel and fetch artifacts of job runs.

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Url;
use serde_json::Value;
use std::io::Write;

use crate::config::ClientConfig;
use crate::error::{Result, RunError};
use crate::http::HttpClient;
use crate::poll::{PollOptions, poll_until_terminal};
use crate::runtime::RealRuntime;
use crate::status::RunStatus;
use crate::trigger::TriggerRun;

/// Operations the run API offers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunApi: Send + Sync {
    /// Starts a run of `job_id` and returns the new run id.
    async fn trigger_run(&self, job_id: u64, request: &TriggerRun) -> Result<u64>;
    async fn get_run_status(&self, run_id: u64) -> Result<RunStatus>;
    /// Asks the API to cancel a run and returns its success flag unmodified.
    async fn cancel_run(&self, run_id: u64) -> Result<bool>;
    /// Latest `name` artifact produced by a job.
    async fn get_job_artifact(&self, job_id: u64, name: &str) -> Result<String>;
    async fn get_run_artifact(&self, run_id: u64, name: &str, step: Option<u32>)
    -> Result<String>;
    fn status_link(&self, run_id: u64) -> String;
}

/// Client for one account and project of the run API.
#[derive(Clone, Debug)]
pub struct RunClient {
    config: ClientConfig,
    http: HttpClient,
    base_url: String,
}

impl RunClient {
    /// Validates `config` and prepares the authenticated HTTP client.
    #[tracing::instrument(skip(config))]
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let http = HttpClient::from_config(&config)?;
        Ok(Self::with_http_client(config, http))
    }

    /// Uses an already configured HTTP client instead of building one.
    pub fn with_http_client(config: ClientConfig, http: HttpClient) -> Self {
        let base_url = config.accounts_url();
        Self {
            config,
            http,
            base_url,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn job_run_url(&self, job_id: u64) -> String {
        format!("{}/jobs/{}/run/", self.base_url, job_id)
    }

    fn job_artifact_url(&self, job_id: u64, name: &str) -> Result<String> {
        let job_url = format!("{}/jobs/{}/", self.base_url, job_id);
        artifact_url(&job_url, name)
    }

    fn run_url(&self, run_id: u64) -> String {
        format!("{}/runs/{}/", self.base_url, run_id)
    }

    fn run_artifact_url(&self, run_id: u64, name: &str) -> Result<String> {
        artifact_url(&self.run_url(run_id), name)
    }

    /// Waits until the run reaches a terminal status.
    ///
    /// See [`poll_until_terminal`] for the exact contract.
    pub async fn poll_until_terminal<F>(
        &self,
        run_id: u64,
        options: &PollOptions,
        on_status: F,
    ) -> Result<RunStatus>
    where
        F: FnMut(RunStatus) + Send,
    {
        poll_until_terminal(self, &RealRuntime, run_id, options, on_status).await
    }

    /// Fetches a job artifact and writes it to `sink`, returning the bytes written.
    pub async fn save_job_artifact<W: Write + ?Sized>(
        &self,
        job_id: u64,
        name: &str,
        sink: &mut W,
    ) -> Result<u64> {
        let content = self.get_job_artifact(job_id, name).await?;
        write_artifact(&content, sink)
    }

    /// Fetches a run artifact and writes it to `sink`, returning the bytes written.
    pub async fn save_run_artifact<W: Write + ?Sized>(
        &self,
        run_id: u64,
        name: &str,
        step: Option<u32>,
        sink: &mut W,
    ) -> Result<u64> {
        let content = self.get_run_artifact(run_id, name, step).await?;
        write_artifact(&content, sink)
    }
}

#[async_trait]
impl RunApi for RunClient {
    #[tracing::instrument(skip(self, request))]
    async fn trigger_run(&self, job_id: u64, request: &TriggerRun) -> Result<u64> {
        let body = request.to_body()?;
        let url = self.job_run_url(job_id);

        debug!("Triggering job {} at {}...", job_id, url);

        let response = self.http.post_json(&url, Some(&body)).await?;
        let run_id = field(&response, "/data/id")?
            .as_u64()
            .ok_or_else(|| RunError::ResponseShape("`data.id` is not a run id".to_string()))?;

        info!("Triggered job {} as run {}", job_id, run_id);
        Ok(run_id)
    }

    #[tracing::instrument(skip(self))]
    async fn get_run_status(&self, run_id: u64) -> Result<RunStatus> {
        let response = self.http.get_json(&self.run_url(run_id)).await?;
        let code = field(&response, "/data/status")?
            .as_i64()
            .ok_or_else(|| {
                RunError::ResponseShape("`data.status` is not an integer".to_string())
            })?;

        RunStatus::from_code(code)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_run(&self, run_id: u64) -> Result<bool> {
        let url = format!("{}cancel/", self.run_url(run_id));
        let response = self.http.post_json(&url, None).await?;
        let is_success = field(&response, "/status/is_success")?
            .as_bool()
            .ok_or_else(|| {
                RunError::ResponseShape("`status.is_success` is not a boolean".to_string())
            })?;

        debug!("Cancel request for run {} returned {}", run_id, is_success);
        Ok(is_success)
    }

    #[tracing::instrument(skip(self))]
    async fn get_job_artifact(&self, job_id: u64, name: &str) -> Result<String> {
        self.http
            .get_text(&self.job_artifact_url(job_id, name)?, &[])
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_run_artifact(
        &self,
        run_id: u64,
        name: &str,
        step: Option<u32>,
    ) -> Result<String> {
        let url = self.run_artifact_url(run_id, name)?;
        match step {
            Some(step) => {
                let step = step.to_string();
                self.http.get_text(&url, &[("step", step.as_str())]).await
            }
            None => self.http.get_text(&url, &[]).await,
        }
    }

    fn status_link(&self, run_id: u64) -> String {
        self.config.status_link(run_id)
    }
}

fn field<'a>(value: &'a Value, pointer: &str) -> Result<&'a Value> {
    value
        .pointer(pointer)
        .filter(|v| !v.is_null())
        .ok_or_else(|| {
            RunError::ResponseShape(format!(
                "missing `{}` in response",
                pointer.trim_start_matches('/').replace('/', ".")
            ))
        })
}

/// Appends `artifacts/{name}` to a resource URL ending in `/`.
///
/// Each `/`-separated part of the name is percent-encoded as its own path
/// segment, so `?` or `#` in a name cannot leak into the query or fragment.
fn artifact_url(resource_url: &str, name: &str) -> Result<String> {
    let mut url = Url::parse(resource_url)
        .map_err(|e| RunError::Configuration(format!("invalid api_base: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| RunError::Configuration("api_base cannot be a base URL".to_string()))?
        .pop_if_empty()
        .push("artifacts")
        .extend(name.split('/'));
    Ok(url.into())
}

/// Writes artifact content to `sink` and returns the number of bytes written.
pub fn write_artifact<W: Write + ?Sized>(content: &str, sink: &mut W) -> Result<u64> {
    sink.write_all(content.as_bytes())?;
    sink.flush()?;
    Ok(content.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    fn client(url: &str) -> RunClient {
        RunClient::new(ClientConfig::new(url, "test-key", "42", "7")).unwrap()
    }

    #[test]
    fn test_new_rejects_missing_fields() {
        let err = RunClient::new(ClientConfig::new("https://x", "", "42", "7")).unwrap_err();
        assert!(matches!(err, RunError::Configuration(_)));
    }

    #[test]
    fn test_status_link() {
        let client = client("https://cloud.example.com/");
        assert_eq!(
            client.status_link(99),
            "https://cloud.example.com/deploy/42/projects/7/runs/99/"
        );
    }

    #[test]
    fn test_urls() {
        let client = client("https://cloud.example.com");
        assert_eq!(
            client.job_run_url(5),
            "https://cloud.example.com/api/v2/accounts/42/jobs/5/run/"
        );
        assert_eq!(
            client.run_url(9),
            "https://cloud.example.com/api/v2/accounts/42/runs/9/"
        );
        assert_eq!(
            client.run_artifact_url(9, "manifest.json").unwrap(),
            "https://cloud.example.com/api/v2/accounts/42/runs/9/artifacts/manifest.json"
        );
        assert_eq!(
            client.job_artifact_url(5, "catalog.json").unwrap(),
            "https://cloud.example.com/api/v2/accounts/42/jobs/5/artifacts/catalog.json"
        );
    }

    #[test]
    fn test_artifact_name_is_percent_encoded() {
        let client = client("https://cloud.example.com");
        assert_eq!(
            client.run_artifact_url(9, "odd?name#1.json").unwrap(),
            "https://cloud.example.com/api/v2/accounts/42/runs/9/artifacts/odd%3Fname%231.json"
        );
        assert_eq!(
            client.job_artifact_url(5, "compiled/my model.sql").unwrap(),
            "https://cloud.example.com/api/v2/accounts/42/jobs/5/artifacts/compiled/my%20model.sql"
        );
    }

    #[tokio::test]
    async fn test_trigger_run() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("POST", "/api/v2/accounts/42/jobs/5/run/")
            .match_header("authorization", "Token test-key")
            .match_body(Matcher::Json(json!({
                "cause": "ci",
                "git_branch": "main",
                "schema_override": "my_schema"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": {"id": 1001, "status": 1}}"#)
            .create_async()
            .await;

        let request = TriggerRun::new("ci")
            .git_branch("refs/heads/main")
            .schema_override("my-schema");
        let run_id = client(&url).trigger_run(5, &request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(run_id, 1001);
    }

    #[tokio::test]
    async fn test_trigger_run_omits_unset_fields() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("POST", "/api/v2/accounts/42/jobs/5/run/")
            .match_body(Matcher::Json(json!({ "cause": "nightly" })))
            .with_status(200)
            .with_body(r#"{"data": {"id": 7}}"#)
            .create_async()
            .await;

        let run_id = client(&url)
            .trigger_run(5, &TriggerRun::new("nightly"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(run_id, 7);
    }

    #[tokio::test]
    async fn test_trigger_run_rejects_branch_and_sha_without_request() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let request = TriggerRun::new("ci").git_branch("main").git_sha("abc");
        let err = client(&url).trigger_run(5, &request).await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, RunError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_trigger_run_missing_id_is_shape_error() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("POST", "/api/v2/accounts/42/jobs/5/run/")
            .with_status(200)
            .with_body(r#"{"data": {}}"#)
            .create_async()
            .await;

        let err = client(&url)
            .trigger_run(5, &TriggerRun::new("ci"))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::ResponseShape(_)));
    }

    #[tokio::test]
    async fn test_trigger_run_http_error() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("POST", "/api/v2/accounts/42/jobs/5/run/")
            .with_status(400)
            .with_body(r#"{"status": {"is_success": false}}"#)
            .create_async()
            .await;

        let err = client(&url)
            .trigger_run(5, &TriggerRun::new("ci"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
    }

    #[tokio::test]
    async fn test_get_run_status_maps_every_known_code() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let client = client(&url);

        let cases = [
            (1, RunStatus::Queued),
            (2, RunStatus::Starting),
            (3, RunStatus::Running),
            (10, RunStatus::Success),
            (20, RunStatus::Error),
            (30, RunStatus::Cancelled),
        ];
        for (code, expected) in cases {
            let path = format!("/api/v2/accounts/42/runs/{}/", code);
            let mock = server
                .mock("GET", path.as_str())
                .with_status(200)
                .with_body(format!(r#"{{"data": {{"id": {}, "status": {}}}}}"#, code, code))
                .create_async()
                .await;

            let status = client.get_run_status(code as u64).await.unwrap();
            mock.assert_async().await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_get_run_status_unknown_code() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/api/v2/accounts/42/runs/1/")
            .with_status(200)
            .with_body(r#"{"data": {"status": 99}}"#)
            .create_async()
            .await;

        let err = client(&url).get_run_status(1).await.unwrap_err();
        assert!(matches!(err, RunError::UnknownStatus(99)));
    }

    #[tokio::test]
    async fn test_get_run_status_missing_status() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/api/v2/accounts/42/runs/1/")
            .with_status(200)
            .with_body(r#"{"data": {"status": null}}"#)
            .create_async()
            .await;

        let err = client(&url).get_run_status(1).await.unwrap_err();
        assert!(matches!(err, RunError::ResponseShape(_)));
    }

    #[tokio::test]
    async fn test_cancel_run_returns_upstream_flag() {
        for flag in [true, false] {
            let mut server = mockito::Server::new_async().await;
            let url = server.url();

            let mock = server
                .mock("POST", "/api/v2/accounts/42/runs/8/cancel/")
                .match_header("authorization", "Token test-key")
                .with_status(200)
                .with_body(format!(r#"{{"status": {{"is_success": {}}}}}"#, flag))
                .create_async()
                .await;

            let result = client(&url).cancel_run(8).await.unwrap();
            mock.assert_async().await;
            assert_eq!(result, flag);
        }
    }

    #[tokio::test]
    async fn test_get_job_artifact() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let body = r#"{"metadata": {"dbt_schema_version": "v12"}, "nodes": {}}"#;
        let mock = server
            .mock("GET", "/api/v2/accounts/42/jobs/5/artifacts/manifest.json")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let content = client(&url)
            .get_job_artifact(5, "manifest.json")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(content, body);
    }

    #[tokio::test]
    async fn test_get_run_artifact_with_step() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/api/v2/accounts/42/runs/9/artifacts/run_results.json")
            .match_query(Matcher::UrlEncoded("step".into(), "2".into()))
            .with_status(200)
            .with_body("step two results")
            .create_async()
            .await;

        let content = client(&url)
            .get_run_artifact(9, "run_results.json", Some(2))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(content, "step two results");
    }

    #[tokio::test]
    async fn test_get_run_artifact_not_found() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/api/v2/accounts/42/runs/9/artifacts/missing.json")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let err = client(&url)
            .get_run_artifact(9, "missing.json", None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        match err {
            RunError::Api { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "not found");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_save_run_artifact_writes_to_sink() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/api/v2/accounts/42/runs/9/artifacts/catalog.json")
            .with_status(200)
            .with_body("catalog")
            .create_async()
            .await;

        let mut sink = Vec::new();
        let written = client(&url)
            .save_run_artifact(9, "catalog.json", None, &mut sink)
            .await
            .unwrap();

        assert_eq!(written, 7);
        assert_eq!(sink, b"catalog");
    }

    #[tokio::test]
    async fn test_save_job_artifact_writes_to_sink() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/api/v2/accounts/42/jobs/5/artifacts/manifest.json")
            .match_header("authorization", "Token test-key")
            .with_status(200)
            .with_body(r#"{"nodes": {}}"#)
            .create_async()
            .await;

        let mut sink = Vec::new();
        let written = client(&url)
            .save_job_artifact(5, "manifest.json", &mut sink)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(written, 13);
        assert_eq!(sink, br#"{"nodes": {}}"#);
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_artifact_sink_failure_is_io_error() {
        let err = write_artifact("content", &mut BrokenSink).unwrap_err();
        assert!(matches!(err, RunError::Io(_)));
    }

    #[tokio::test]
    async fn test_save_job_artifact_sink_failure_is_io_error() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/api/v2/accounts/42/jobs/5/artifacts/catalog.json")
            .with_status(200)
            .with_body("catalog")
            .create_async()
            .await;

        let err = client(&url)
            .save_job_artifact(5, "catalog.json", &mut BrokenSink)
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Io(_)));
    }

    #[tokio::test]
    async fn test_poll_until_terminal_reports_link_on_error() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/api/v2/accounts/42/runs/3/")
            .with_status(200)
            .with_body(r#"{"data": {"status": 20}}"#)
            .expect(1)
            .create_async()
            .await;

        let options = PollOptions::new(Duration::from_millis(1));
        let err = client(&url)
            .poll_until_terminal(3, &options, |_| {})
            .await
            .unwrap_err();

        mock.assert_async().await;
        match err {
            RunError::RunFailed { status, link } => {
                assert_eq!(status, RunStatus::Error);
                assert_eq!(link, format!("{}/deploy/42/projects/7/runs/3/", url));
            }
            other => panic!("Expected RunFailed, got {:?}", other),
        }
    }
}
