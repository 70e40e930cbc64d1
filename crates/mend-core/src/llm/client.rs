//! HTTP client for the Ollama text-generation backend.
//!
//! The endpoint is validated against host and port allow-lists at
//! construction; a client that fails validation is never built. All calls
//! are bounded: the availability probe by a fixed 5 s timeout, generation by
//! the configured `ollama.timeout_ms`.

use crate::config::OllamaConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Hosts the LLM endpoint may resolve to.
const ALLOWED_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

/// Ports the LLM endpoint may use.
const ALLOWED_PORTS: &[u16] = &[80, 443, 8080, 11434];

/// Timeout for the availability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM endpoint not allowed: {url}: {reason}")]
    EndpointNotAllowed { url: String, reason: String },

    #[error("LLM backend unavailable: {0}")]
    Unavailable(String),

    #[error("LLM call timed out after {0} ms")]
    Timeout(u64),

    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for Ollama's `/api/tags` and `/api/generate` endpoints.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl OllamaClient {
    /// Build a client, rejecting endpoints outside the allow-lists.
    pub fn new(config: &OllamaConfig) -> Result<Self, LlmError> {
        let url = validate_endpoint(&config.url)?;
        Ok(Self {
            base_url: url.as_str().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            http: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Probe the model listing endpoint. Non-200 or no response within 5 s
    /// means unavailable.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let request = self.http.get(&url).timeout(PROBE_TIMEOUT).send();
        match request.await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Run one non-streaming generation and return the raw response text.
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: 0.2,
                top_p: 0.9,
            },
        };

        let call = self.http.post(&url).json(&body).send();
        let resp = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_millis() as u64))??;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = tokio::time::timeout(self.timeout, resp.json())
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_millis() as u64))??;
        Ok(parsed.response)
    }
}

/// Check an endpoint URL against the host and port allow-lists.
pub fn validate_endpoint(raw: &str) -> Result<Url, LlmError> {
    let url = Url::parse(raw).map_err(|e| LlmError::EndpointNotAllowed {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    let host = url
        .host_str()
        .ok_or_else(|| LlmError::EndpointNotAllowed {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        })?;
    if !ALLOWED_HOSTS.contains(&host) {
        return Err(LlmError::EndpointNotAllowed {
            url: raw.to_string(),
            reason: format!("host '{}' is not allow-listed", host),
        });
    }

    let port = url
        .port_or_known_default()
        .ok_or_else(|| LlmError::EndpointNotAllowed {
            url: raw.to_string(),
            reason: "missing port".to_string(),
        })?;
    if !ALLOWED_PORTS.contains(&port) {
        return Err(LlmError::EndpointNotAllowed {
            url: raw.to_string(),
            reason: format!("port {} is not allow-listed", port),
        });
    }

    Ok(url)
}
