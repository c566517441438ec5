//! Analysis service boundary and the TTL cache in front of it.
//!
//! ARCHITECTURAL RULE: no module calls the analysis service directly. All
//! analysis goes through `AnalysisCache::get_or_compute*`, which is the only
//! caller of `AnalysisService::analyze`.

pub mod cache;
pub mod client;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::analysis::{AnalysisResult, ThreadInput};
use crate::models::state::UserKeyword;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited after {retries} retries")]
    RateLimited { retries: u32 },
}

/// The external summarize/extract/prioritize service. A partial response
/// (ids missing) is not an error; the cache fills the holes with defaults.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(
        &self,
        threads: &[ThreadInput],
        keywords: &[UserKeyword],
    ) -> Result<Vec<AnalysisResult>, AnalysisError>;
}
