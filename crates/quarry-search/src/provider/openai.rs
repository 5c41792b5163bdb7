//! OpenAI-compatible `/embeddings` client.
//!
//! One blocking POST per call through a `ureq` agent with a whole-request
//! timeout. HTTP status mapping:
//!
//! | Outcome                         | Error                          |
//! |---------------------------------|--------------------------------|
//! | transport failure / timeout     | `Unavailable`                  |
//! | 401, 403, 5xx                   | `Unavailable`                  |
//! | 429                             | `RateLimited` (+ Retry-After)  |
//! | other non-2xx, undecodable body | `Response`                     |

use quarry_core::config::EmbeddingConfig;
use quarry_core::error::ProviderError;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use super::{EmbeddingProvider, check_vector, non_blank};

pub struct OpenAiProvider {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("quarry/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_owned(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_key_env: String::from("OPENAI_API_KEY"),
        }
    }

    /// Build from config, reading the key from `config.api_key_env`.
    ///
    /// A missing key is not an error here; the first request reports it.
    #[must_use]
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok();
        let mut provider = Self::new(
            &config.base_url,
            &config.model,
            api_key,
            Duration::from_secs(config.timeout_secs),
        );
        provider.api_key_env.clone_from(&config.api_key_env);
        provider
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, input: Value, expected: usize) -> Result<Vec<Vec<f32>>, ProviderError> {
        let Some(api_key) = &self.api_key else {
            return Err(ProviderError::Unavailable(format!(
                "no API key: set {}",
                self.api_key_env
            )));
        };

        debug!(endpoint = %self.endpoint, model = %self.model, expected, "requesting embeddings");
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {api_key}"))
            .send_json(json!({ "model": self.model, "input": input }))
            .map_err(map_transport_error)?;

        let body = response.into_string().map_err(|err| {
            ProviderError::Unavailable(format!("failed to read embedding response: {err}"))
        })?;
        parse_response(&body, expected)
    }
}

impl EmbeddingProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::InvalidInput);
        }
        let mut vectors = self.request(Value::from(text), 1)?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::Response("empty embedding list".into()))
    }

    fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let texts = non_blank(texts)?;
        self.request(json!(texts), texts.len())
    }
}

/// Decode an `/embeddings` response body into `expected` vectors, ordered by
/// their `index` field when the provider sends one.
pub(crate) fn parse_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>, ProviderError> {
    let mut parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|err| ProviderError::Response(format!("invalid JSON: {err}")))?;

    if parsed.data.len() != expected {
        return Err(ProviderError::Response(format!(
            "expected {expected} embeddings, got {}",
            parsed.data.len()
        )));
    }

    if parsed.data.iter().all(|datum| datum.index.is_some()) {
        parsed.data.sort_by_key(|datum| datum.index);
    }

    parsed
        .data
        .into_iter()
        .map(|datum| check_vector(datum.embedding))
        .collect()
}

fn map_transport_error(err: ureq::Error) -> ProviderError {
    match err {
        ureq::Error::Status(429, response) => {
            let retry_after_secs = response
                .header("Retry-After")
                .and_then(|value| value.trim().parse::<u64>().ok());
            warn!(?retry_after_secs, "embedding provider rate limited the request");
            ProviderError::RateLimited { retry_after_secs }
        }
        ureq::Error::Status(code @ (401 | 403), _) => {
            warn!(code, "embedding provider rejected credentials");
            ProviderError::Unavailable(format!("authentication rejected (HTTP {code})"))
        }
        ureq::Error::Status(code, _) if code >= 500 => {
            warn!(code, "embedding provider failed");
            ProviderError::Unavailable(format!("provider error (HTTP {code})"))
        }
        ureq::Error::Status(code, response) => {
            let detail = response.into_string().unwrap_or_default();
            warn!(code, %detail, "embedding provider refused the request");
            ProviderError::Response(format!("unexpected HTTP {code}"))
        }
        ureq::Error::Transport(transport) => {
            warn!(error = %transport, "embedding provider unreachable");
            ProviderError::Unavailable(transport.to_string())
        }
    }
}
