//! Mail platform boundary.
//!
//! The engine only ever asks the mail platform two questions: "which
//! conversations match this query" and "what does this conversation look
//! like right now". Read state is queried live and never persisted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAIL_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRef {
    pub id: String,
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailMessage {
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDetails {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub messages: Vec<MailMessage>,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// The mail platform as seen by the engine. All callers fail open on
/// `MailError`: a broken mail platform degrades the session, never kills it.
#[async_trait]
pub trait MailPlatform: Send + Sync {
    /// `query` encodes unread / after-timestamp filters in the platform's
    /// search syntax (e.g. `"after:1722500000"`).
    async fn search(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ConversationRef>, MailError>;

    async fn get_details(&self, id: &str) -> Result<ConversationDetails, MailError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    conversations: Vec<ConversationRef>,
}

/// HTTP client for the mail platform's REST surface.
#[derive(Clone)]
pub struct HttpMailClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMailClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(MAIL_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
        }
    }
}

#[async_trait]
impl MailPlatform for HttpMailClient {
    async fn search(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ConversationRef>, MailError> {
        let url = format!("{}/api/conversations/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query)])
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.conversations)
    }

    async fn get_details(&self, id: &str) -> Result<ConversationDetails, MailError> {
        let url = format!("{}/api/conversations/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
