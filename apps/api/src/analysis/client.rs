//! HTTP client for the batch-analyze endpoint of the analysis service.
//! Retries on 429 and 5xx with exponential backoff; everything else is
//! returned to the cache layer, which fails open with default results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::{AnalysisError, AnalysisService};
use crate::models::analysis::{AnalysisResult, ThreadInput};
use crate::models::state::UserKeyword;

const ANALYZE_PATH: &str = "/api/batch-analyze";
const ANALYSIS_TIMEOUT_SECS: u64 = 15;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    threads: &'a [ThreadInput],
    keywords: &'a [UserKeyword],
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    results: Vec<AnalysisResult>,
}

#[derive(Clone)]
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAnalysisClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(ANALYSIS_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn analyze(
        &self,
        threads: &[ThreadInput],
        keywords: &[UserKeyword],
    ) -> Result<Vec<AnalysisResult>, AnalysisError> {
        let url = format!("{}{}", self.base_url, ANALYZE_PATH);
        let body = AnalyzeRequest { threads, keywords };

        let mut last_error: Option<AnalysisError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "analysis call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&url).json(&body);
            if let Some(key) = &self.api_key {
                request = request.header("x-api-key", key);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(AnalysisError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let message = response.text().await.unwrap_or_default();
                warn!("analysis API returned {}: {}", status, message);
                last_error = Some(AnalysisError::Api {
                    status: status.as_u16(),
                    message,
                });
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(AnalysisError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: AnalyzeResponse = response.json().await?;
            debug!(
                requested = threads.len(),
                returned = parsed.results.len(),
                "analysis batch succeeded"
            );
            return Ok(parsed.results);
        }

        Err(last_error.unwrap_or(AnalysisError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}
