//! Short-TTL cache over the analysis service.
//!
//! Keyed by conversation id. A hit within the TTL window returns the cached
//! result without touching the service; a miss fetches, stores, and returns.
//! Service failure and ids missing from a response degrade to
//! `AnalysisResult::unavailable` — those defaults are NOT cached, so the
//! next invocation tries the service again.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::analysis::AnalysisService;
use crate::models::analysis::{AnalysisResult, ThreadInput};
use crate::models::state::UserKeyword;

/// Upper bound on ids per external call, to bound payload size and latency.
pub const ANALYSIS_CHUNK_SIZE: usize = 25;

/// TTL applied when the user has not configured one.
pub const DEFAULT_CACHE_TTL_MIN: u32 = 5;

struct CacheEntry {
    result: AnalysisResult,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct AnalysisCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unexpired cached result for `id`, if any.
    pub fn lookup(&self, id: &str, now: DateTime<Utc>) -> Option<AnalysisResult> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries
            .get(id)
            .filter(|e| e.expires_at > now)
            .map(|e| e.result.clone())
    }

    pub fn store(&self, result: AnalysisResult, ttl: Duration, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            result.id.clone(),
            CacheEntry {
                result,
                expires_at: now + ttl,
            },
        );
    }

    /// Explicit invalidation, used by mark-done and dismiss.
    pub fn invalidate(&self, id: &str) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.remove(id);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.clear();
    }

    /// All unexpired entries. Re-derivation after user actions reads from
    /// this rather than re-fetching anything.
    pub fn snapshot(&self, now: DateTime<Utc>) -> HashMap<String, AnalysisResult> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries
            .iter()
            .filter(|(_, e)| e.expires_at > now)
            .map(|(id, e)| (id.clone(), e.result.clone()))
            .collect()
    }

    pub async fn get_or_compute(
        &self,
        input: ThreadInput,
        keywords: &[UserKeyword],
        ttl: Duration,
        service: &dyn AnalysisService,
        now: DateTime<Utc>,
    ) -> AnalysisResult {
        let id = input.id.clone();
        let mut results = self
            .get_or_compute_many(vec![input], keywords, ttl, service, now)
            .await;
        results
            .remove(&id)
            .unwrap_or_else(|| AnalysisResult::unavailable(&id))
    }

    /// Batch variant: cache check per id, service called only for the
    /// uncached subset, in chunks of at most [`ANALYSIS_CHUNK_SIZE`].
    pub async fn get_or_compute_many(
        &self,
        inputs: Vec<ThreadInput>,
        keywords: &[UserKeyword],
        ttl: Duration,
        service: &dyn AnalysisService,
        now: DateTime<Utc>,
    ) -> HashMap<String, AnalysisResult> {
        let mut out = HashMap::with_capacity(inputs.len());
        let mut misses = Vec::new();

        for input in inputs {
            if out.contains_key(&input.id) {
                continue;
            }
            match self.lookup(&input.id, now) {
                Some(hit) => {
                    out.insert(input.id.clone(), hit);
                }
                None => misses.push(input),
            }
        }

        for chunk in misses.chunks(ANALYSIS_CHUNK_SIZE) {
            match service.analyze(chunk, keywords).await {
                Ok(results) => {
                    let mut by_id: HashMap<String, AnalysisResult> =
                        results.into_iter().map(|r| (r.id.clone(), r)).collect();
                    for input in chunk {
                        match by_id.remove(&input.id) {
                            Some(result) => {
                                self.store(result.clone(), ttl, now);
                                out.insert(input.id.clone(), result);
                            }
                            None => {
                                warn!(id = %input.id, "analysis response missing id, using default");
                                out.insert(input.id.clone(), AnalysisResult::unavailable(&input.id));
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, ids = chunk.len(), "analysis batch failed, using defaults");
                    for input in chunk {
                        out.insert(input.id.clone(), AnalysisResult::unavailable(&input.id));
                    }
                }
            }
        }

        out
    }
}
