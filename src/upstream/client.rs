//! One-attempt HTTP client for the upstream provider

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::time::Duration;

use super::error::UpstreamError;
use crate::config::UpstreamConfig;

/// Executes single calls against an OpenAI-compatible API
///
/// Performs exactly one attempt per call and classifies failures into
/// [`UpstreamError`]; retries and fallback belong to the layers above.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn from_config(
        config: &UpstreamConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut headers = HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", api_key))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(10)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
        })
    }

    /// POST one chat completion with the resolved model forced into the body
    pub async fn chat_completion(
        &self,
        model: &str,
        body: &Value,
    ) -> Result<Value, UpstreamError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut payload = body.clone();
        payload["model"] = Value::String(model.to_string());
        if let Some(obj) = payload.as_object_mut() {
            // The relay is non-streaming; strip the flag rather than forward it
            obj.remove("stream");
        }

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(classify_transport)
        } else {
            let message = error_message(response).await;
            Err(UpstreamError::from_status(status.as_u16(), message))
        }
    }

    /// GET the provider's model listing; used by the CLI connectivity probe
    pub async fn list_models(&self) -> Result<Vec<String>, UpstreamError> {
        let url = format!("{}/models", self.base_url);

        let response = self.http.get(&url).send().await.map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(UpstreamError::from_status(status.as_u16(), message));
        }

        let body: Value = response.json().await.map_err(classify_transport)?;
        let ids = body
            .get("data")
            .and_then(|d| d.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("id").and_then(|i| i.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ids)
    }
}

/// Map a reqwest transport failure into the taxonomy
fn classify_transport(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Network(err.to_string())
    }
}

/// Pull the provider's error message out of an error response body
async fn error_message(response: reqwest::Response) -> String {
    match response.json::<Value>().await {
        Ok(body) => body
            .pointer("/error/message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => "unreadable error body".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_with_api_key() {
        let config = UpstreamConfig {
            url: "https://api.openai.com/v1/".to_string(),
            api_key: Some("sk-test".to_string()),
            timeout_seconds: 15,
        };
        let client = UpstreamClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_from_config_rejects_invalid_key_bytes() {
        let config = UpstreamConfig {
            url: "https://api.openai.com/v1".to_string(),
            api_key: Some("bad\nkey".to_string()),
            timeout_seconds: 15,
        };
        assert!(UpstreamClient::from_config(&config).is_err());
    }
}
