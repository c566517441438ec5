//! Session-open orchestration: select candidates, analyze through the
//! cache, and derive the presentation groupings.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::analysis::cache::{AnalysisCache, DEFAULT_CACHE_TTL_MIN};
use crate::analysis::AnalysisService;
use crate::mail::{ConversationDetails, MailPlatform};
use crate::models::analysis::ThreadInput;
use crate::models::state::{DeadlineOverride, FlaggedMail, SavedTask, UserKeyword};
use crate::store::{self, StateKey, StateStore, StoreError};
use crate::triage::buckets::{build_timeline, Timeline};
use crate::triage::categorize::{keyword_categories, partition_by_priority, KeywordCategory, PriorityGroups};
use crate::triage::selector::{select_candidates, VisibilityPolicy};

const SNIPPET_MAX_CHARS: usize = 200;

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub candidates: Vec<String>,
    pub priorities: PriorityGroups,
    pub categories: Vec<KeywordCategory>,
    pub timeline: Timeline,
}

/// Groupings only — what user actions re-render from the current cache
/// contents, without re-running selection or analysis.
#[derive(Debug, Serialize)]
pub struct DerivedView {
    pub priorities: PriorityGroups,
    pub categories: Vec<KeywordCategory>,
    pub timeline: Timeline,
}

/// The full session-open flow.
///
/// Only State Store failures propagate; the mail platform and the analysis
/// service both fail open into a degraded (stale or empty) view.
pub async fn open_session(
    store: &dyn StateStore,
    mail: &dyn MailPlatform,
    analysis: &dyn AnalysisService,
    cache: &AnalysisCache,
    user_id: &str,
    policy: VisibilityPolicy,
    now: DateTime<Utc>,
) -> Result<SessionView, StoreError> {
    let candidates = select_candidates(store, mail, user_id, policy, now).await?;

    let mut inputs = Vec::with_capacity(candidates.len());
    for id in &candidates {
        match mail.get_details(id).await {
            Ok(details) => inputs.push(thread_input(&details)),
            Err(e) => {
                debug!(id = %id, error = %e, "details fetch failed, analyzing bare id");
                inputs.push(ThreadInput::bare(id));
            }
        }
    }

    let keywords: Vec<UserKeyword> = store::read(store, user_id, StateKey::UserKeywords).await?;
    let ttl = cache_ttl(store, user_id).await?;
    let results = cache
        .get_or_compute_many(inputs, &keywords, ttl, analysis, now)
        .await;

    let overrides: Vec<DeadlineOverride> =
        store::read(store, user_id, StateKey::DeadlineOverrides).await?;

    Ok(SessionView {
        priorities: partition_by_priority(&results),
        categories: keyword_categories(&results, &keywords),
        timeline: build_timeline(&results, &overrides, now),
        candidates,
    })
}

/// Re-derives the groupings from current cache contents for everything the
/// user can still see (pool plus saved and flagged conversations). Used
/// after each action; calls nothing external.
pub async fn rederive(
    store: &dyn StateStore,
    cache: &AnalysisCache,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<DerivedView, StoreError> {
    let pool: Vec<String> = store::read(store, user_id, StateKey::UnresolvedThreadIds).await?;
    let saved: Vec<SavedTask> = store::read(store, user_id, StateKey::SavedTasks).await?;
    let flagged: Vec<FlaggedMail> = store::read(store, user_id, StateKey::FlaggedMails).await?;

    let visible: HashSet<&str> = pool
        .iter()
        .map(String::as_str)
        .chain(saved.iter().map(|t| t.conversation_id.as_str()))
        .chain(flagged.iter().map(|f| f.conversation_id.as_str()))
        .collect();

    let mut results = cache.snapshot(now);
    results.retain(|id, _| visible.contains(id.as_str()));

    let keywords: Vec<UserKeyword> = store::read(store, user_id, StateKey::UserKeywords).await?;
    let overrides: Vec<DeadlineOverride> =
        store::read(store, user_id, StateKey::DeadlineOverrides).await?;

    Ok(DerivedView {
        priorities: partition_by_priority(&results),
        categories: keyword_categories(&results, &keywords),
        timeline: build_timeline(&results, &overrides, now),
    })
}

/// User-configured cache TTL, defaulting to [`DEFAULT_CACHE_TTL_MIN`].
pub async fn cache_ttl(store: &dyn StateStore, user_id: &str) -> Result<Duration, StoreError> {
    let minutes: Option<u32> = store::read(store, user_id, StateKey::AnalysisCacheTtlMin).await?;
    Ok(Duration::minutes(
        i64::from(minutes.unwrap_or(DEFAULT_CACHE_TTL_MIN)),
    ))
}

fn thread_input(details: &ConversationDetails) -> ThreadInput {
    let last = details.messages.last();
    ThreadInput {
        id: details.id.clone(),
        subject: details.subject.clone(),
        snippet: last
            .map(|m| truncate(&m.body, SNIPPET_MAX_CHARS))
            .unwrap_or_default(),
        last_message: last.map(|m| m.body.clone()),
        from: last.map(|m| m.from.clone()),
        to: last.map(|m| m.to.clone()).unwrap_or_default(),
        date: last.and_then(|m| m.date.clone()),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::analysis::AnalysisError;
    use crate::mail::{ConversationRef, MailError, MailMessage};
    use crate::models::analysis::{AnalysisResult, ExtractedTask, Priority, PriorityLabel, TaskType};
    use crate::store::MemoryStore;

    struct StubMail {
        delta: Mutex<Vec<ConversationRef>>,
    }

    #[async_trait]
    impl MailPlatform for StubMail {
        async fn search(
            &self,
            _query: &str,
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<ConversationRef>, MailError> {
            Ok(std::mem::take(&mut *self.delta.lock().unwrap()))
        }

        async fn get_details(&self, id: &str) -> Result<ConversationDetails, MailError> {
            Ok(ConversationDetails {
                id: id.to_string(),
                subject: format!("subject {id}"),
                unread: true,
                participants: vec!["a@x".to_string()],
                messages: vec![MailMessage {
                    from: "a@x".to_string(),
                    to: vec!["b@x".to_string()],
                    date: Some("2026-08-08T09:00:00Z".to_string()),
                    body: "please send the budget numbers".to_string(),
                }],
            })
        }
    }

    struct StubAnalysis {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisService for StubAnalysis {
        async fn analyze(
            &self,
            threads: &[ThreadInput],
            _keywords: &[UserKeyword],
        ) -> Result<Vec<AnalysisResult>, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(threads
                .iter()
                .map(|t| AnalysisResult {
                    id: t.id.clone(),
                    summary: format!("budget discussion in {}", t.id),
                    priority: Priority {
                        label: PriorityLabel::P1,
                        score: 0.8,
                        reasons: vec!["deadline".to_string()],
                    },
                    tasks: vec![ExtractedTask {
                        title: "send numbers".to_string(),
                        owner: None,
                        due: Some("TBD".to_string()),
                        task_type: TaskType::Action,
                    }],
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_open_session_analyzes_candidates_and_buckets_tasks() {
        let store = MemoryStore::new();
        let mail = StubMail {
            delta: Mutex::new(vec![
                ConversationRef {
                    id: "c1".to_string(),
                    unread: true,
                },
                ConversationRef {
                    id: "c2".to_string(),
                    unread: true,
                },
            ]),
        };
        let analysis = StubAnalysis {
            calls: AtomicUsize::new(0),
        };
        let cache = AnalysisCache::new();

        let view = open_session(
            &store,
            &mail,
            &analysis,
            &cache,
            "u1",
            VisibilityPolicy::SnoozeDismiss,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(view.candidates.len(), 2);
        assert_eq!(view.priorities.p1.len(), 2);
        assert_eq!(view.timeline.tbd.len(), 2);
        assert_eq!(analysis.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_open_within_ttl_hits_cache() {
        let store = MemoryStore::new();
        let mail = StubMail {
            delta: Mutex::new(vec![ConversationRef {
                id: "c1".to_string(),
                unread: true,
            }]),
        };
        let analysis = StubAnalysis {
            calls: AtomicUsize::new(0),
        };
        let cache = AnalysisCache::new();
        let now = Utc::now();

        open_session(
            &store,
            &mail,
            &analysis,
            &cache,
            "u1",
            VisibilityPolicy::SnoozeDismiss,
            now,
        )
        .await
        .unwrap();
        // delta drained; c1 stays pooled, analysis comes from cache
        let view = open_session(
            &store,
            &mail,
            &analysis,
            &cache,
            "u1",
            VisibilityPolicy::SnoozeDismiss,
            now + Duration::seconds(30),
        )
        .await
        .unwrap();

        assert_eq!(view.candidates, vec!["c1"]);
        assert_eq!(analysis.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rederive_reads_only_cache_and_store() {
        let store = MemoryStore::new();
        let cache = AnalysisCache::new();
        let now = Utc::now();

        store::write(
            &store,
            "u1",
            StateKey::UnresolvedThreadIds,
            &vec!["c1".to_string()],
        )
        .await
        .unwrap();
        cache.store(
            AnalysisResult {
                id: "c1".to_string(),
                summary: "cached".to_string(),
                priority: Priority::default(),
                tasks: vec![],
            },
            Duration::minutes(5),
            now,
        );
        // cached but no longer visible anywhere
        cache.store(AnalysisResult::unavailable("gone"), Duration::minutes(5), now);

        let view = rederive(&store, &cache, "u1", now).await.unwrap();
        assert_eq!(view.priorities.p3, vec!["c1"]);
    }

    #[tokio::test]
    async fn test_cache_ttl_defaults_to_five_minutes() {
        let store = MemoryStore::new();
        assert_eq!(
            cache_ttl(&store, "u1").await.unwrap(),
            Duration::minutes(5)
        );
        store::write(&store, "u1", StateKey::AnalysisCacheTtlMin, &15u32)
            .await
            .unwrap();
        assert_eq!(
            cache_ttl(&store, "u1").await.unwrap(),
            Duration::minutes(15)
        );
    }
}
