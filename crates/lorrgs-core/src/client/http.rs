//! reqwest-backed GraphQL client with OAuth client-credentials auth.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::GraphQlClient;
use crate::config::UpdaterConfig;
use crate::errors::ClientError;

const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorItem {
    #[serde(default)]
    message: String,
}

/// One HTTP session for the lifetime of the updater process.
pub struct HttpClient {
    http: Client,
    api_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<String>>,
}

fn transport(err: reqwest::Error) -> ClientError {
    ClientError::Transport(err.to_string())
}

impl HttpClient {
    pub fn new(config: &UpdaterConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(transport)?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, ClientError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        debug!("Requesting access token from {}", self.token_url);
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(ClientError::Auth(format!(
                "token endpoint returned HTTP {}",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await.map_err(transport)?;
        *cached = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }
}

impl GraphQlClient for HttpClient {
    async fn query(&self, text: &str) -> Result<Value, ClientError> {
        let token = self.access_token().await?;
        let body = json!({ "query": format!("{{\n{text}\n}}") });
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limit (429) from {}", self.api_url);
            return Err(ClientError::RateLimited);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.forget_token().await;
            return Err(ClientError::Auth("access token rejected".to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let mut payload: Value = response.json().await.map_err(transport)?;
        if let Some(errors) = payload.get("errors").cloned() {
            let items: Vec<GraphQlErrorItem> = serde_json::from_value(errors).unwrap_or_default();
            if !items.is_empty() {
                let messages: Vec<String> = items.into_iter().map(|e| e.message).collect();
                return Err(ClientError::GraphQl(messages.join("; ")));
            }
        }
        Ok(payload
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}
