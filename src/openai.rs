//! OpenAI-compatible client configuration with sensible defaults.

use crate::error::KvissError;
use async_openai::{config::OpenAIConfig, error::OpenAIError, Client};
use std::time::Duration;

/// Default timeout for backend API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create a client against the default API base with the configured timeout.
pub fn create_client() -> Client<OpenAIConfig> {
    create_client_with(None, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client against a custom API base (e.g. a local OpenAI-compatible
/// LLM runtime).
pub fn create_client_for_base(api_base: &str) -> Client<OpenAIConfig> {
    create_client_with(Some(api_base), Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

fn create_client_with(api_base: Option<&str>, timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    let mut config = OpenAIConfig::default();
    if let Some(base) = api_base {
        config = config.with_api_base(base.trim_end_matches('/'));
    }

    Client::with_config(config).with_http_client(http_client)
}

/// Map an `async-openai` error into our taxonomy, keeping transport errors
/// and retryable provider conditions distinguishable.
pub fn map_openai_err(err: OpenAIError, what: &str) -> KvissError {
    match err {
        OpenAIError::Reqwest(e) => KvissError::Http(e),
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.clone().unwrap_or_default();
            if matches!(
                kind.as_str(),
                "server_error" | "rate_limit_exceeded" | "requests" | "overloaded_error"
            ) {
                KvissError::ProviderUnavailable(format!("{}: {}", what, api.message))
            } else {
                KvissError::OpenAI(format!("{}: {}", what, api.message))
            }
        }
        other => KvissError::OpenAI(format!("{}: {}", what, other)),
    }
}
