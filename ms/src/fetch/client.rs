//! Messaging REST API client

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::ApiConfig;
use msgcache::{ChatMessage, Conversation};

/// Errors from REST refetch operations
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Thin client over the messaging service's read endpoints
///
/// Stateless: each call is an independent GET. The bearer token is read
/// once from the configured environment variable at construction.
pub struct MessageApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl MessageApiClient {
    /// Create a client from the API configuration
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        debug!(base_url = %config.base_url, timeout_ms = config.timeout_ms, "MessageApiClient::new");
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(FetchError::Network)?;

        let token = std::env::var(&config.token_env).ok();
        if token.is_none() {
            debug!(token_env = %config.token_env, "No bearer token in environment, requests go unauthenticated");
        }

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Fetch the full conversation list
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, FetchError> {
        debug!("list_conversations: called");
        self.get_json(self.conversations_url()).await
    }

    /// Fetch one conversation's messages, oldest first
    pub async fn list_messages(&self, conversation_id: &str, limit: Option<u32>) -> Result<Vec<ChatMessage>, FetchError> {
        debug!(%conversation_id, ?limit, "list_messages: called");
        self.get_json(self.messages_url(conversation_id, limit)).await
    }

    fn conversations_url(&self) -> String {
        format!("{}/conversations", self.base_url)
    }

    fn messages_url(&self, conversation_id: &str, limit: Option<u32>) -> String {
        let mut url = format!("{}/conversations/{}/messages", self.base_url, conversation_id);
        if let Some(limit) = limit {
            url.push_str(&format!("?limit={limit}"));
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, FetchError> {
        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn test_api_config() -> ApiConfig {
        ApiConfig {
            base_url: "https://api.example.com/message/".to_string(),
            token_env: "MSGSYNC_TEST_TOKEN".to_string(),
            timeout_ms: 5_000,
        }
    }

    #[test]
    #[serial]
    fn test_client_trims_trailing_slash() {
        let client = MessageApiClient::new(&test_api_config()).unwrap();
        assert_eq!(client.conversations_url(), "https://api.example.com/message/conversations");
    }

    #[test]
    #[serial]
    fn test_messages_url() {
        let client = MessageApiClient::new(&test_api_config()).unwrap();

        assert_eq!(
            client.messages_url("conv-1", None),
            "https://api.example.com/message/conversations/conv-1/messages"
        );
        assert_eq!(
            client.messages_url("conv-1", Some(50)),
            "https://api.example.com/message/conversations/conv-1/messages?limit=50"
        );
    }

    #[test]
    #[serial]
    fn test_token_read_from_environment() {
        // Env vars are process-global, hence #[serial] on this module
        unsafe { std::env::set_var("MSGSYNC_TEST_TOKEN", "tok-123") };
        let client = MessageApiClient::new(&test_api_config()).unwrap();
        assert_eq!(client.token.as_deref(), Some("tok-123"));

        unsafe { std::env::remove_var("MSGSYNC_TEST_TOKEN") };
        let client = MessageApiClient::new(&test_api_config()).unwrap();
        assert!(client.token.is_none());
    }
}
