//! Authenticated HTTP client that maps responses onto [`RunError`].

use log::debug;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{Result, RunError};

/// HTTP client carrying the fixed authorization and content-type headers.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    ///
    /// The client is expected to already carry any headers the API needs.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a reqwest Client with the headers derived from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        let mut auth_value = HeaderValue::from_str(&format!("Token {}", config.api_key))
            .map_err(|_| {
                RunError::Configuration("api_key contains invalid header characters".to_string())
            })?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        debug!("Using API key {} for authentication", config.redacted_key());

        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self::new(builder.build()?))
    }

    /// Sends one request and returns the status and raw body of a 2xx response.
    ///
    /// Non-2xx responses and 2xx bodies that are not valid UTF-8 become
    /// [`RunError::Api`]; failures below HTTP become [`RunError::Transport`].
    #[tracing::instrument(skip(self, body))]
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<(u16, String)> {
        debug!("{} {} ...", method, url);

        let mut request = self.client.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            debug!("Request to {} failed with HTTP {}", url, status.as_u16());
            return Err(RunError::api(
                status.as_u16(),
                String::from_utf8_lossy(&bytes),
            ));
        }

        let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
            debug!("Response from {} is not valid UTF-8: {}", url, e);
            RunError::api(status.as_u16(), String::from_utf8_lossy(e.as_bytes()))
        })?;

        Ok((status.as_u16(), text))
    }

    /// Performs a GET request and returns the body as text.
    pub async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        let (_, body) = self.request(Method::GET, url, query, None).await?;
        Ok(body)
    }

    /// Performs a GET request and decodes the JSON response.
    pub async fn get_json(&self, url: &str) -> Result<Value> {
        let (status, body) = self.request(Method::GET, url, &[], None).await?;
        decode_json(status, &body)
    }

    /// Performs a POST request with an optional JSON body and decodes the JSON response.
    pub async fn post_json(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let (status, text) = self.request(Method::POST, url, &[], body).await?;
        decode_json(status, &text)
    }
}

/// Parses a successful response body as JSON.
///
/// A body that is not JSON is reported as an API error carrying the body, so
/// callers see exactly what the server sent.
pub fn decode_json(status: u16, body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| {
        debug!("Failed to parse JSON response: {}", e);
        RunError::api(status, body)
    })
}
