//! Gmail REST client: list/fetch/send/modify over HTTPS with an OAuth
//! bearer token. Message bodies cross the wire as the JSON payloads the
//! API defines; normalization to [`EmailMessage`] happens in `payload`.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::client::{EmailClient, MailQuery};
use crate::error::ClientError;
use crate::message::EmailMessage;
use crate::payload::{parse_gmail_message, to_gmail_raw};

const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Gmail API client for a single mailbox (`users/me`).
pub struct GmailClient {
    access_token: SecretString,
    base_url: String,
    client: Client,
}

impl GmailClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, DEFAULT_BASE_URL)
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/users/me/{path}", self.base_url)
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, ClientError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        read_json(response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, ClientError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        read_json(response).await
    }

    /// List message ids matching `q`, then fetch and normalize each one.
    /// Messages the parser rejects are logged and skipped.
    async fn list_and_parse(
        &self,
        q: &str,
        format: &str,
    ) -> Result<Vec<EmailMessage>, ClientError> {
        let listing = self.get_json(&self.api_url("messages"), &[("q", q)]).await?;
        let ids: Vec<String> = listing
            .get("messages")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        debug!(count = ids.len(), q, "Gmail listing fetched");

        let mut messages = Vec::with_capacity(ids.len());
        for id in &ids {
            let url = self.api_url(&format!("messages/{id}"));
            let msg = self.get_json(&url, &[("format", format)]).await?;
            match parse_gmail_message(&msg) {
                Ok(parsed) => messages.push(parsed),
                Err(e) => warn!(id = %id, error = %e, "Skipping unparseable Gmail message"),
            }
        }
        Ok(messages)
    }
}

#[async_trait]
impl EmailClient for GmailClient {
    async fn fetch_unread(&self) -> Result<Vec<EmailMessage>, ClientError> {
        self.list_and_parse("is:unread -in:chats", "full").await
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), ClientError> {
        let body = to_gmail_raw(message)?;
        let sent = self
            .post_json(&self.api_url("messages/send"), &body)
            .await?;
        let id = sent.get("id").and_then(Value::as_str).unwrap_or_default();
        debug!(id, "Gmail message sent");
        Ok(())
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), ClientError> {
        let url = self.api_url(&format!("messages/{message_id}/modify"));
        self.post_json(&url, &json!({"removeLabelIds": ["UNREAD"]}))
            .await?;
        Ok(())
    }

    async fn search(&self, query: &MailQuery) -> Result<Vec<EmailMessage>, ClientError> {
        // Header-only fetches are enough unless the caller wants bodies.
        let format = if query.include_body { "full" } else { "metadata" };
        self.list_and_parse(&query.to_gmail_query(), format).await
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        });
    }
    response
        .json()
        .await
        .map_err(|e| ClientError::Http(e.to_string()))
}
